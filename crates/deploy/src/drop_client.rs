//! Interactions with a deployed booster drop and its token.

use std::time::Duration;

use alloy_core::{
    primitives::{Address, B256, U256},
    sol_types::SolCall,
};
use anyhow::{Context, Result};

use crate::{
    RetryPolicy,
    abi::{IBoosterDrop, IBoosterToken},
    chain::{
        Chain, DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_TX_TIMEOUT, TxReceipt, TxRequest,
        ensure_sender_managed, wait_for_receipt, with_padded_gas,
    },
    retry::retry,
};

/// Sends drop and token transactions from one account.
#[derive(Debug, Clone)]
pub struct DropClient<'a, C> {
    chain: &'a C,
    sender: Address,
    tx_timeout: Duration,
    receipt_poll_interval: Duration,
    retry: RetryPolicy,
}

impl<'a, C: Chain> DropClient<'a, C> {
    pub fn new(chain: &'a C, sender: Address) -> Self {
        Self {
            chain,
            sender,
            tx_timeout: DEFAULT_TX_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Price in wei of minting `amount` packs.
    pub async fn mint_price(&self, drop: Address, amount: u64) -> Result<U256> {
        let call = IBoosterDrop::getMintPriceCall {
            amount: U256::from(amount),
        };
        let output = retry(&self.retry, "Mint price lookup", || {
            self.chain.call(drop, call.abi_encode().into())
        })
        .await?;
        IBoosterDrop::getMintPriceCall::abi_decode_returns(&output)
            .context("Failed to decode mint price")
    }

    /// Mint `amount` packs to `recipient`, paying the quoted price.
    pub async fn mint(
        &self,
        drop: Address,
        amount: u64,
        recipient: Address,
        referrer: Option<Address>,
    ) -> Result<TxReceipt> {
        if amount == 0 {
            anyhow::bail!("Mint amount must be at least 1");
        }
        let price = self.mint_price(drop, amount).await?;
        let referrer = referrer.unwrap_or(Address::ZERO);
        let data = IBoosterDrop::mintCall {
            amount: U256::from(amount),
            recipient,
            referrer,
            originReferrer: referrer,
        }
        .abi_encode();

        tracing::info!(%drop, amount, %price, "Minting packs");
        self.send(TxRequest::new(self.sender, drop, data).value(price), "mint")
            .await
    }

    /// Sell a card back to the drop for its rarity offer.
    pub async fn sell_and_claim_offer(&self, drop: Address, token_id: u64) -> Result<TxReceipt> {
        let data = IBoosterDrop::sellAndClaimOfferCall {
            tokenId: U256::from(token_id),
        }
        .abi_encode();
        tracing::info!(%drop, token_id, "Selling card");
        self.send(TxRequest::new(self.sender, drop, data), "sell").await
    }

    /// Open packs, revealing their cards.
    pub async fn open(&self, drop: Address, token_ids: &[u64]) -> Result<TxReceipt> {
        if token_ids.is_empty() {
            anyhow::bail!("No packs to open");
        }
        let data = IBoosterDrop::openCall {
            tokenIds: token_ids.iter().map(|id| U256::from(*id)).collect(),
        }
        .abi_encode();
        tracing::info!(%drop, count = token_ids.len(), "Opening packs");
        self.send(TxRequest::new(self.sender, drop, data), "open").await
    }

    /// Buy the drop's token with `eth_value` wei.
    pub async fn buy_tokens(
        &self,
        token: Address,
        eth_value: U256,
        min_tokens_out: U256,
    ) -> Result<TxReceipt> {
        let data = IBoosterToken::buyCall {
            minTokensOut: min_tokens_out,
        }
        .abi_encode();
        tracing::info!(%token, %eth_value, "Buying tokens");
        self.send(TxRequest::new(self.sender, token, data).value(eth_value), "buy")
            .await
    }

    pub async fn sell_tokens(
        &self,
        token: Address,
        amount: U256,
        min_eth_out: U256,
    ) -> Result<TxReceipt> {
        let data = IBoosterToken::sellCall {
            tokenAmount: amount,
            minEthOut: min_eth_out,
        }
        .abi_encode();
        tracing::info!(%token, %amount, "Selling tokens");
        self.send(TxRequest::new(self.sender, token, data), "token sell")
            .await
    }

    async fn send(&self, tx: TxRequest, what: &str) -> Result<TxReceipt> {
        ensure_sender_managed(self.chain, self.sender).await?;
        let tx = retry(&self.retry, "Gas estimation", || {
            with_padded_gas(self.chain, tx.clone())
        })
        .await?;
        let hash: B256 = self
            .chain
            .send_transaction(&tx)
            .await
            .with_context(|| format!("Failed to submit {} transaction", what))?;
        tracing::info!(tx_hash = %hash, "{} transaction submitted", what);
        wait_for_receipt(self.chain, hash, self.tx_timeout, self.receipt_poll_interval).await
    }
}
