//! On-chain deployment of a drop through the factory.

use std::time::Duration;

use alloy_core::{
    primitives::{Address, B256, Bytes, U256},
    sol_types::{SolCall, SolEvent},
};
use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    DeployError, DeploymentState, DeploymentStep, DraftRecord, ProgressReporter, RetryPolicy,
    abi::{IBoosterDropFactory, IFeeWrapper},
    chain::{
        Chain, DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_TX_TIMEOUT, ReceiptLog, TxRequest,
        wait_for_receipt, with_padded_gas,
    },
    retry::retry,
};

/// Outcome of a mined deployment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub tx_hash: B256,
    pub drop_contract: Option<Address>,
    pub token_contract: Option<Address>,
}

impl DeploymentResult {
    /// The transaction was mined but no `DropCreated` log could be decoded.
    pub fn addresses_missing(&self) -> bool {
        self.drop_contract.is_none() || self.token_contract.is_none()
    }
}

/// Addresses announced by a `DropCreated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedDrop {
    pub drop_contract: Address,
    pub token_contract: Address,
    pub owner: Address,
}

/// Submits `createDropWithConfig`, directly or through the fee wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnchainDeployer {
    factory: Address,
    fee_wrapper: Option<Address>,
    tx_timeout: Duration,
    receipt_poll_interval: Duration,
    retry: RetryPolicy,
}

impl OnchainDeployer {
    pub fn new(factory: Address) -> Self {
        Self {
            factory,
            fee_wrapper: None,
            tx_timeout: DEFAULT_TX_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_fee_wrapper(mut self, fee_wrapper: Option<Address>) -> Self {
        self.fee_wrapper = fee_wrapper;
        self
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Policy for idempotent chain reads such as gas estimation.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Calldata of `createDropWithConfig` for `record`.
    ///
    /// Token and NFT share the collection name and symbol.
    pub fn encode_create_call(record: &DraftRecord) -> Bytes {
        let metadata = &record.metadata;
        IBoosterDropFactory::createDropWithConfigCall {
            tokenName: metadata.name.clone(),
            tokenSymbol: metadata.symbol.clone(),
            nftName: metadata.name.clone(),
            nftSymbol: metadata.symbol.clone(),
            owner: metadata.effective_owner(),
            packAmount: U256::from(metadata.pack_amount),
            config: record.contract_config.to_sol(),
        }
        .abi_encode()
        .into()
    }

    /// Read the wrapper's current protocol fee. No retry: a stale or
    /// unreadable fee must not be guessed.
    pub async fn protocol_fee<C: Chain>(chain: &C, fee_wrapper: Address) -> Result<U256> {
        let output = chain
            .call(fee_wrapper, IFeeWrapper::protocolFeeCall {}.abi_encode().into())
            .await
            .context("Failed to read protocol fee")?;
        IFeeWrapper::protocolFeeCall::abi_decode_returns(&output)
            .context("Failed to decode protocol fee")
    }

    /// Build the transaction that creates the drop.
    async fn build_transaction<C: Chain>(
        &self,
        chain: &C,
        sender: Address,
        record: &DraftRecord,
    ) -> Result<TxRequest> {
        let create = Self::encode_create_call(record);

        match self.fee_wrapper {
            Some(wrapper) => {
                let fee = Self::protocol_fee(chain, wrapper).await?;
                tracing::info!(%fee, %wrapper, "Deploying through fee wrapper");
                let data = IFeeWrapper::deployWithFeeCall { data: create }.abi_encode();
                Ok(TxRequest::new(sender, wrapper, data).value(fee))
            }
            None => Ok(TxRequest::new(sender, self.factory, create)),
        }
    }

    /// Deploy the drop for `record` from `sender`.
    ///
    /// Moves the reporter through `Preparing`, `Deploying` and `Confirming`.
    /// A mined transaction without a decodable `DropCreated` log still
    /// succeeds, with [`DeploymentResult::addresses_missing`] set.
    pub async fn deploy<C: Chain>(
        &self,
        chain: &C,
        sender: Address,
        record: &DraftRecord,
        progress: &ProgressReporter,
    ) -> Result<DeploymentResult, DeployError> {
        progress
            .advance(
                DeploymentState::Preparing,
                Some(DeploymentStep::Encoding),
                "Encoding deployment transaction",
            )
            .map_err(|e| DeployError::state(&e))?;

        let tx = self
            .build_transaction(chain, sender, record)
            .await
            .map_err(|e| DeployError::chain(&e, false))?;
        let tx = retry(&self.retry, "Gas estimation", || {
            with_padded_gas(chain, tx.clone())
        })
        .await
        .map_err(|e| DeployError::chain(&e, false))?;

        progress
            .advance(
                DeploymentState::Deploying,
                Some(DeploymentStep::Submitting),
                "Submitting deployment transaction",
            )
            .map_err(|e| DeployError::state(&e))?;

        let tx_hash = chain
            .send_transaction(&tx)
            .await
            .context("Failed to submit deployment transaction")
            .map_err(|e| DeployError::chain(&e, false))?;
        tracing::info!(%tx_hash, draft_id = %record.draft_id, "Deployment transaction submitted");

        progress
            .advance(
                DeploymentState::Confirming,
                Some(DeploymentStep::WaitingForReceipt),
                format!("Waiting for transaction {}", tx_hash),
            )
            .map_err(|e| DeployError::state(&e))?;

        let receipt = wait_for_receipt(chain, tx_hash, self.tx_timeout, self.receipt_poll_interval)
            .await
            .map_err(|e| DeployError::chain(&e, true))?;

        let result = match self.find_drop_created(&receipt.logs) {
            Some(created) => {
                tracing::info!(
                    drop_contract = %created.drop_contract,
                    token_contract = %created.token_contract,
                    owner = %created.owner,
                    "Drop deployed"
                );
                DeploymentResult {
                    tx_hash,
                    drop_contract: Some(created.drop_contract),
                    token_contract: Some(created.token_contract),
                }
            }
            None => {
                tracing::warn!(%tx_hash, "No DropCreated event in receipt, contract addresses unknown");
                DeploymentResult {
                    tx_hash,
                    drop_contract: None,
                    token_contract: None,
                }
            }
        };

        Ok(result)
    }

    /// First well-formed `DropCreated` log emitted by the factory.
    pub fn find_drop_created(&self, logs: &[ReceiptLog]) -> Option<CreatedDrop> {
        logs.iter()
            .filter(|log| log.address == self.factory)
            .filter(|log| log.topics.first() == Some(&IBoosterDropFactory::DropCreated::SIGNATURE_HASH))
            .find_map(|log| {
                IBoosterDropFactory::DropCreated::decode_raw_log(
                    log.topics.iter().copied(),
                    &log.data,
                )
                .ok()
            })
            .map(|event| CreatedDrop {
                drop_contract: event.dropContract,
                token_contract: event.tokenContract,
                owner: event.owner,
            })
            .filter(|created| {
                !created.drop_contract.is_zero() && !created.token_contract.is_zero()
            })
    }
}
