//! EVM chain access: calls, gas estimation, submission and receipts.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::rpc::{self, deserialize_u64_from_hex};

/// Gas estimates are padded by this percentage before submission.
pub const GAS_PADDING_PERCENT: u64 = 20;

/// Default upper bound on waiting for a transaction to be mined.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between receipt polls.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A transaction to estimate or submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

impl TxRequest {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            data: data.into(),
            value: U256::ZERO,
            gas: None,
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// JSON-RPC transaction object.
    pub fn to_rpc_json(&self) -> Value {
        let mut tx = json!({
            "from": self.from,
            "to": self.to,
            "data": self.data,
            "value": format!("{:#x}", self.value),
        });
        if let Some(gas) = self.gas {
            tx["gas"] = json!(format!("{:#x}", gas));
        }
        tx
    }
}

/// A log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The parts of a transaction receipt the deployer needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub status: u64,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Access to an EVM chain through a wallet-connected provider.
///
/// `send_transaction` is expected to sign with the sender's key, for example
/// through a node-managed or wallet-backed account.
pub trait Chain: Send + Sync {
    /// Whether the provider can sign transactions for `address`.
    fn manages_account(&self, address: Address) -> impl Future<Output = Result<bool>> + Send;

    /// `eth_call` against the latest block.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    fn estimate_gas(&self, tx: &TxRequest) -> impl Future<Output = Result<u64>> + Send;

    /// Broadcast a transaction, returning its hash.
    fn send_transaction(&self, tx: &TxRequest) -> impl Future<Output = Result<B256>> + Send;

    /// The receipt of a mined transaction, `None` while pending.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<TxReceipt>>> + Send;
}

/// [`Chain`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcChain {
    client: reqwest::Client,
    url: String,
}

impl RpcChain {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client(rpc::DEFAULT_TIMEOUT)?,
            url: url.into(),
        })
    }

    /// `eth_chainId` of the endpoint.
    pub async fn chain_id(&self) -> Result<u64> {
        let id: String = rpc::json_rpc_call(&self.client, &self.url, "eth_chainId", vec![]).await?;
        rpc::parse_hex_u64(&id)
    }
}

impl Chain for RpcChain {
    async fn manages_account(&self, address: Address) -> Result<bool> {
        let accounts: Vec<Address> =
            rpc::json_rpc_call(&self.client, &self.url, "eth_accounts", vec![]).await?;
        Ok(accounts.contains(&address))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_call",
            vec![json!({ "to": to, "data": data }), json!("latest")],
        )
        .await
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let gas: String = rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_estimateGas",
            vec![tx.to_rpc_json()],
        )
        .await?;
        rpc::parse_hex_u64(&gas)
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256> {
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_sendTransaction",
            vec![tx.to_rpc_json()],
        )
        .await
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>> {
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_getTransactionReceipt",
            vec![json!(hash)],
        )
        .await
    }
}

/// Fail unless the provider can send transactions from `sender`.
///
/// Runs before any side effect so a key that only signs marketplace
/// challenges is rejected up front.
pub async fn ensure_sender_managed<C: Chain>(chain: &C, sender: Address) -> Result<()> {
    let managed = chain
        .manages_account(sender)
        .await
        .context("Failed to list the provider's accounts")?;
    if !managed {
        anyhow::bail!(
            "The RPC provider does not manage account {}: transactions are sent with \
             eth_sendTransaction, so use a node or wallet RPC that holds this key",
            sender
        );
    }
    tracing::debug!(%sender, "Sender is managed by the provider");
    Ok(())
}

/// Pad a gas estimate by [`GAS_PADDING_PERCENT`].
pub fn pad_gas(estimate: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(GAS_PADDING_PERCENT) / 100)
}

/// Estimate gas for `tx` and return it with the padded limit set.
pub async fn with_padded_gas<C: Chain>(chain: &C, mut tx: TxRequest) -> Result<TxRequest> {
    let estimate = chain
        .estimate_gas(&tx)
        .await
        .context("Failed to estimate gas")?;
    let padded = pad_gas(estimate);
    tracing::debug!(estimate, padded, to = %tx.to, "Gas estimated");
    tx.gas = Some(padded);
    Ok(tx)
}

/// Poll for the receipt of `hash` until it is mined or `timeout` elapses.
///
/// A mined transaction with a failed status is an error.
pub async fn wait_for_receipt<C: Chain>(
    chain: &C,
    hash: B256,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TxReceipt> {
    let poll = async {
        loop {
            match chain.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => {
                    tracing::trace!(error = %e, tx_hash = %hash, "Receipt query failed, retrying...");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    let receipt = tokio::time::timeout(timeout, poll).await.map_err(|_| {
        anyhow::anyhow!(
            "Timed out after {}s waiting for transaction {} to be mined",
            timeout.as_secs(),
            hash
        )
    })?;

    if !receipt.succeeded() {
        anyhow::bail!("Transaction {} was reverted", hash);
    }

    Ok(receipt)
}
