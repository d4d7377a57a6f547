use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy_core::primitives::{
    Address,
    utils::{format_ether, parse_ether},
};
use anyhow::{Context, Result};
use comfy_table::Table;
use geopack_deploy::{
    AuthState, Authenticator, CollectionSummary, Config, DeployError, DeploymentFlow,
    DeploymentOutcome, DeploymentRequest, DropClient, FlowSettings, HttpMarketplace, ImageFile,
    MarketplaceApi, Rarity, RarityAssignment, ResponseCache, RpcChain, TxReceipt, Wallet,
    economics::to_wei, metadata::parse_rarity_csv, validate::validate,
};
use serde::Serialize;

use crate::cli::{DeployArgs, InputArgs, OutputFormat, TokenCommand};
use crate::wallet::CliWallet;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
    }
    Config::default().save_to_file(path)?;
    println!("Wrote {}", path.display());
    println!("Set contracts.factory and marketplace.api_key before deploying.");
    Ok(())
}

pub fn validate_input(input: &InputArgs, output: OutputFormat) -> Result<()> {
    let (images, rarities) = read_input(input)?;
    let report = validate(&images, &rarities);

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "valid": report.valid,
            "errors": report.errors,
        }))?,
        OutputFormat::Table if report.valid => {
            println!("{} images and rarities are valid", images.len());
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["#", "Problem"]);
            for (index, error) in report.errors.iter().enumerate() {
                table.add_row(vec![(index + 1).to_string(), error.clone()]);
            }
            println!("{table}");
        }
    }

    if !report.valid {
        anyhow::bail!("Validation failed with {} errors", report.errors.len());
    }
    Ok(())
}

pub async fn deploy(
    config: &Config,
    wallet: CliWallet,
    args: &DeployArgs,
    output: OutputFormat,
) -> Result<()> {
    config.validate()?;
    let (images, rarities) = read_input(&args.input)?;

    let settings = FlowSettings::from_config(config)?;
    let mut auth = Authenticator::new(Duration::from_secs(config.marketplace.token_ttl_secs));
    if let Some(path) = AuthState::default_path() {
        auth = auth.with_state_file(path);
    }

    let flow = DeploymentFlow::new(
        marketplace(config)?,
        RpcChain::new(&config.chain.rpc_url)?,
        wallet,
        settings,
    )
    .with_authenticator(auth);

    tracing::info!(
        name = %args.name,
        images = images.len(),
        deployer = %flow.wallet().address(),
        chain_id = config.chain.chain_id,
        "Starting deployment..."
    );

    let mut progress = flow.subscribe();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let update = progress.borrow_and_update().clone();
            tracing::info!(state = %update.state, step = ?update.step, "{}", update.message);
        }
    });

    let request = DeploymentRequest {
        form: args.to_form(),
        images,
        rarities,
    };
    let result = flow.run(request).await;
    drop(flow);
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "Progress watcher stopped abnormally");
    }

    match result {
        Ok(outcome) => print_outcome(&outcome, output),
        Err(e) => {
            if e.is_retryable() {
                eprintln!("Deployment failed. It is safe to run it again.");
            } else if matches!(e, DeployError::Config(_)) {
                eprintln!("Nothing was deployed. Fix the configuration and run it again.");
            } else {
                eprintln!(
                    "Deployment failed after reaching the chain or marketplace. \
                     Check the transaction before running it again."
                );
            }
            Err(e.into())
        }
    }
}

pub async fn mint(
    config: &Config,
    wallet: &CliWallet,
    drop: Address,
    amount: u64,
    recipient: Option<Address>,
    quote: bool,
    output: OutputFormat,
) -> Result<()> {
    let chain = RpcChain::new(&config.chain.rpc_url)?;
    let client = drop_client(config, &chain, wallet.address());

    if quote {
        let price = client.mint_price(drop, amount).await?;
        return match output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "amount": amount,
                "priceWei": price.to_string(),
                "priceEth": format_ether(price),
            })),
            OutputFormat::Table => {
                println!("{} packs cost {} ETH", amount, format_ether(price));
                Ok(())
            }
        };
    }

    let recipient = recipient.unwrap_or_else(|| wallet.address());
    let receipt = client
        .mint(drop, amount, recipient, config.contracts.referrer)
        .await?;
    print_receipts(&[("mint", receipt)], output)
}

pub async fn sell(
    config: &Config,
    wallet: &CliWallet,
    drop: Address,
    token_ids: &[u64],
    rarity: Option<Rarity>,
    output: OutputFormat,
) -> Result<()> {
    if let Some(offer) = rarity.and_then(|r| config.economics.offer_for(r)) {
        tracing::info!(
            cards = token_ids.len(),
            offer_per_card = offer,
            total = offer.saturating_mul(token_ids.len() as u64),
            "Expected payout in tokens"
        );
    }

    let chain = RpcChain::new(&config.chain.rpc_url)?;
    let client = drop_client(config, &chain, wallet.address());

    let mut receipts = Vec::with_capacity(token_ids.len());
    for token_id in token_ids {
        let receipt = client
            .sell_and_claim_offer(drop, *token_id)
            .await
            .with_context(|| format!("Failed to sell card #{}", token_id))?;
        receipts.push(("sell", receipt));
    }
    print_receipts(&receipts, output)
}

pub async fn open(
    config: &Config,
    wallet: &CliWallet,
    drop: Address,
    token_ids: &[u64],
    output: OutputFormat,
) -> Result<()> {
    let chain = RpcChain::new(&config.chain.rpc_url)?;
    let receipt = drop_client(config, &chain, wallet.address())
        .open(drop, token_ids)
        .await?;
    print_receipts(&[("open", receipt)], output)
}

pub async fn token(
    config: &Config,
    wallet: &CliWallet,
    command: &TokenCommand,
    output: OutputFormat,
) -> Result<()> {
    let chain = RpcChain::new(&config.chain.rpc_url)?;
    let client = drop_client(config, &chain, wallet.address());

    let receipt = match command {
        TokenCommand::Buy {
            token,
            eth,
            min_out,
        } => {
            let value = parse_ether(eth).with_context(|| format!("Invalid ETH amount '{}'", eth))?;
            ("buy", client.buy_tokens(*token, value, *min_out).await?)
        }
        TokenCommand::Sell {
            token,
            amount,
            min_eth_out,
        } => (
            "token sell",
            client
                .sell_tokens(*token, to_wei(*amount), *min_eth_out)
                .await?,
        ),
    };
    print_receipts(&[receipt], output)
}

pub async fn price(config: &Config, output: OutputFormat) -> Result<()> {
    let price = marketplace(config)?.eth_price().await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "ethUsd": price })),
        OutputFormat::Table => {
            println!("1 ETH = ${:.2}", price);
            Ok(())
        }
    }
}

pub async fn recent(config: &Config, output: OutputFormat) -> Result<()> {
    let collections = marketplace(config)?.recent_collections().await?;
    print_collections(&collections, output)
}

pub async fn owned(config: &Config, wallet: Address, output: OutputFormat) -> Result<()> {
    let collections = marketplace(config)?.owner_collections(wallet).await?;
    print_collections(&collections, output)
}

fn marketplace(config: &Config) -> Result<HttpMarketplace> {
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(
        config.marketplace.cache_ttl_secs,
    )));
    HttpMarketplace::new(&config.marketplace, cache)
}

fn drop_client<'a>(config: &Config, chain: &'a RpcChain, sender: Address) -> DropClient<'a, RpcChain> {
    DropClient::new(chain, sender)
        .with_tx_timeout(config.deployment.tx_timeout())
        .with_receipt_poll_interval(config.deployment.receipt_poll_interval())
        .with_retry(config.deployment.retry)
}

/// Read the image directory and rarity CSV.
///
/// Images are ordered by filename so token ids are stable across runs.
fn read_input(input: &InputArgs) -> Result<(Vec<ImageFile>, Vec<RarityAssignment>)> {
    let csv = std::fs::read_to_string(&input.csv)
        .context(format!("Failed to read rarity CSV {}", input.csv.display()))?;
    let rarities = parse_rarity_csv(&csv)?;

    let entries = std::fs::read_dir(&input.images)
        .context(format!("Failed to read image directory {}", input.images.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !path.is_file() || filename.starts_with('.') || !is_image {
            tracing::debug!(file = %filename, "Skipping non-image file");
            continue;
        }
        let bytes = std::fs::read(&path).context(format!("Failed to read {}", path.display()))?;
        images.push(ImageFile { filename, bytes });
    }
    images.sort_by(|a, b| a.filename.cmp(&b.filename));

    tracing::debug!(images = images.len(), rows = rarities.len(), "Input loaded");
    Ok((images, rarities))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_outcome(outcome: &DeploymentOutcome, output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        return print_json(outcome);
    }

    let or_unknown = |address: Option<Address>| {
        address.map_or_else(|| "unknown".to_string(), |a| a.to_string())
    };

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Draft".to_string(), outcome.draft.draft_id.to_string()]);
    table.add_row(vec!["Slug".to_string(), outcome.draft.slug.clone()]);
    table.add_row(vec!["Transaction".to_string(), outcome.deployment.tx_hash.to_string()]);
    table.add_row(vec!["Drop contract".to_string(), or_unknown(outcome.deployment.drop_contract)]);
    table.add_row(vec!["Token contract".to_string(), or_unknown(outcome.deployment.token_contract)]);
    table.add_row(vec![
        "Collection".to_string(),
        outcome.collection_url.clone().unwrap_or_default(),
    ]);
    table.add_row(vec![
        "Indexed".to_string(),
        if outcome.ready { "yes" } else { "pending" }.to_string(),
    ]);
    println!("{table}");

    if outcome.deployment.addresses_missing() {
        eprintln!(
            "Contract addresses could not be read from the receipt. \
             Look up transaction {} on a block explorer.",
            outcome.deployment.tx_hash
        );
    }
    Ok(())
}

fn print_receipts(receipts: &[(&str, TxReceipt)], output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        let rows: Vec<_> = receipts
            .iter()
            .map(|(action, receipt)| {
                serde_json::json!({
                    "action": action,
                    "txHash": receipt.transaction_hash,
                    "success": receipt.succeeded(),
                })
            })
            .collect();
        return print_json(&rows);
    }

    let mut table = Table::new();
    table.set_header(vec!["Action", "Transaction"]);
    for (action, receipt) in receipts {
        table.add_row(vec![action.to_string(), receipt.transaction_hash.to_string()]);
    }
    println!("{table}");
    Ok(())
}

fn print_collections(collections: &[CollectionSummary], output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        return print_json(&collections);
    }
    if collections.is_empty() {
        println!("No collections found");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Symbol", "Slug", "Drop contract"]);
    for collection in collections {
        table.add_row(vec![
            collection.name.clone(),
            collection.symbol.clone().unwrap_or_default(),
            collection.slug.clone().unwrap_or_default(),
            collection.contract_address.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");
    Ok(())
}
