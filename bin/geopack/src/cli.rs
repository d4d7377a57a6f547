use std::path::PathBuf;

use alloy_core::primitives::{Address, U256};
use clap::{Args, Parser, Subcommand};
use geopack_deploy::{CONFIG_FILENAME, CollectionForm, Rarity};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "geopack")]
#[command(
    author,
    version,
    about = "Deploy and trade booster pack NFT collections"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "GEOPACK_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a GeoPack.toml configuration file or the directory holding it.
    ///
    /// Defaults to ./GeoPack.toml when present. GEOPACK_ prefixed environment
    /// variables override file values, with `__` separating sections
    /// (e.g. GEOPACK_CHAIN__RPC_URL).
    #[arg(long, global = true, alias = "conf", env = "GEOPACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Private key used to sign marketplace challenges. Transactions are still
    /// sent through the RPC provider, which must manage the same account.
    #[arg(long, global = true, env = "GEOPACK_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Account managed by the RPC provider, used when no private key is given.
    #[arg(long, global = true, env = "GEOPACK_FROM")]
    pub from: Option<Address>,

    /// Output format for results.
    #[arg(long, global = true, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a configuration file with default values.
    Init {
        #[arg(default_value = CONFIG_FILENAME)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Check images and rarities without touching the network.
    Validate(InputArgs),

    /// Upload, draft, deploy and confirm a new collection.
    Deploy(DeployArgs),

    /// Mint packs from a deployed drop.
    Mint {
        #[arg(long)]
        drop: Address,

        #[arg(long, default_value_t = 1)]
        amount: u64,

        /// Receiver of the packs, defaults to the sender.
        #[arg(long)]
        recipient: Option<Address>,

        /// Only print the mint price.
        #[arg(long)]
        quote: bool,
    },

    /// Sell cards back to their drop, one transaction per card.
    Sell {
        #[arg(long)]
        drop: Address,

        #[arg(long = "token-id", required = true, num_args = 1..)]
        token_ids: Vec<u64>,

        /// Rarity of the cards, to show the expected payout.
        #[arg(long)]
        rarity: Option<Rarity>,
    },

    /// Open packs.
    Open {
        #[arg(long)]
        drop: Address,

        #[arg(long = "token-id", required = true, num_args = 1..)]
        token_ids: Vec<u64>,
    },

    /// Trade a drop's token.
    #[command(subcommand)]
    Token(TokenCommand),

    /// Current ETH price in USD.
    Price,

    /// Recently deployed collections.
    Recent,

    /// Collections owned by a wallet, defaults to the signing wallet.
    Owned { wallet: Option<Address> },
}

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Buy tokens with ETH.
    Buy {
        #[arg(long)]
        token: Address,

        /// ETH to spend, e.g. 0.01.
        #[arg(long)]
        eth: String,

        /// Minimum tokens to receive, in wei.
        #[arg(long, default_value_t = U256::ZERO)]
        min_out: U256,
    },

    /// Sell tokens for ETH.
    Sell {
        #[arg(long)]
        token: Address,

        /// Whole tokens to sell.
        #[arg(long)]
        amount: u64,

        /// Minimum ETH to receive, in wei.
        #[arg(long, default_value_t = U256::ZERO)]
        min_eth_out: U256,
    },
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Directory of card images (png, jpeg or webp).
    #[arg(long)]
    pub images: PathBuf,

    /// CSV of `filename,rarity` rows.
    #[arg(long)]
    pub csv: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub symbol: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Owner of the deployed contracts, defaults to the deploying wallet.
    #[arg(long)]
    pub owner: Option<Address>,

    /// Number of packs available.
    #[arg(long, default_value_t = 100)]
    pub pack_amount: u64,

    #[arg(long)]
    pub featured_image_url: Option<String>,

    #[arg(long)]
    pub bg_color: Option<String>,

    #[arg(long)]
    pub disable_foil: bool,

    #[arg(long)]
    pub disable_wear: bool,

    #[arg(long)]
    pub nsfw: bool,

    #[arg(long)]
    pub twitter: Option<String>,

    #[arg(long)]
    pub website: Option<String>,
}

impl DeployArgs {
    /// The collection form. The creator is filled in by the deployment.
    pub fn to_form(&self) -> CollectionForm {
        CollectionForm {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            description: self.description.clone(),
            creator: Address::ZERO,
            owner: self.owner,
            featured_image_url: self.featured_image_url.clone(),
            bg_color: self.bg_color.clone(),
            disable_foil: self.disable_foil,
            disable_wear: self.disable_wear,
            is_nsfw: self.nsfw,
            twitter_link: self.twitter.clone(),
            website_link: self.website.clone(),
            pack_amount: self.pack_amount,
        }
    }
}
