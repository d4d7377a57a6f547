//! geopack is a CLI tool to deploy and trade booster pack NFT collections.

mod cli;
mod commands;
mod settings;
mod wallet;

use anyhow::Result;
use clap::Parser;
use geopack_deploy::Wallet;

use cli::{Cli, Command};
use wallet::CliWallet;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match &cli.command {
        Command::Init { path, force } => return commands::init(path, *force),
        Command::Validate(input) => return commands::validate_input(input, cli.output),
        _ => {}
    }

    let config = settings::load_config(cli.config.as_deref())?;
    let wallet = || CliWallet::from_args(cli.private_key.as_deref(), cli.from, &config.chain.rpc_url);

    match &cli.command {
        Command::Init { .. } | Command::Validate(_) => Ok(()),
        Command::Deploy(args) => commands::deploy(&config, wallet()?, args, cli.output).await,
        Command::Mint {
            drop,
            amount,
            recipient,
            quote,
        } => {
            commands::mint(
                &config,
                &wallet()?,
                *drop,
                *amount,
                *recipient,
                *quote,
                cli.output,
            )
            .await
        }
        Command::Sell {
            drop,
            token_ids,
            rarity,
        } => commands::sell(&config, &wallet()?, *drop, token_ids, *rarity, cli.output).await,
        Command::Open { drop, token_ids } => {
            commands::open(&config, &wallet()?, *drop, token_ids, cli.output).await
        }
        Command::Token(command) => commands::token(&config, &wallet()?, command, cli.output).await,
        Command::Price => commands::price(&config, cli.output).await,
        Command::Recent => commands::recent(&config, cli.output).await,
        Command::Owned { wallet: owner } => {
            let owner = match owner {
                Some(owner) => *owner,
                None => wallet()?.address(),
            };
            commands::owned(&config, owner, cli.output).await
        }
    }
}
