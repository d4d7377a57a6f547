//! In-memory marketplace and chain used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use alloy_core::sol_types::{SolCall, SolEvent};
use anyhow::Result;
use geopack_deploy::{
    AuthChallenge, CollectionForm, CollectionMetadata, CollectionSummary, ConfirmRequest,
    ConfirmResponse, DeploymentRequest, DraftResponse, Economics, FlowSettings, ImageFile,
    MarketplaceApi, MetadataUploader, OnchainDeployer, RarityAssignment, ReadinessPoller,
    ReceiptLog, RetryPolicy, TxReceipt, TxRequest,
    abi::{IBoosterDrop, IBoosterDropFactory, IFeeWrapper},
    chain::Chain,
    economics::DEFAULT_BASE_URI_TEMPLATE,
    validate::{MIN_HEIGHT, MIN_WIDTH},
};
use image::{DynamicImage, GrayImage, ImageOutputFormat};

pub const FACTORY: Address = Address::repeat_byte(0xfa);
pub const FEE_WRAPPER: Address = Address::repeat_byte(0xfe);
pub const DROP: Address = Address::repeat_byte(0xd0);
pub const TOKEN: Address = Address::repeat_byte(0x70);
pub const TX_HASH: B256 = B256::repeat_byte(0xab);
pub const CHAIN_ID: u64 = 8453;

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketplaceCalls {
    pub auth_message: Counter,
    pub verify: Counter,
    pub upload: Counter,
    pub slug: Counter,
    pub draft: Counter,
    pub confirm: Counter,
    pub ready: Counter,
}

/// Scriptable [`MarketplaceApi`].
#[derive(Debug, Clone)]
pub struct FakeMarketplace {
    pub calls: MarketplaceCalls,
    /// Remaining failures per filename, `usize::MAX` for always.
    pub upload_failures: Arc<Mutex<HashMap<String, usize>>>,
    pub slug_fails: bool,
    /// `None` simulates an HTTP 500.
    pub draft_response: Option<DraftResponse>,
    pub confirm_fails: bool,
    pub confirm_success: bool,
    /// Ready from this attempt on (1-based), never when `None`.
    pub ready_at: Option<usize>,
    /// Time each readiness request takes before answering.
    pub ready_delay: Duration,
    /// Time each upload takes.
    pub upload_delay: Duration,
    pub uploads_in_flight: Arc<AtomicUsize>,
    pub peak_uploads_in_flight: Arc<AtomicUsize>,
    /// `start <file>` and `end <file>` in the order they happened.
    pub upload_log: Arc<Mutex<Vec<String>>>,
    pub drafts: Arc<Mutex<Vec<CollectionMetadata>>>,
    pub confirms: Arc<Mutex<Vec<ConfirmRequest>>>,
}

impl Default for FakeMarketplace {
    fn default() -> Self {
        Self {
            calls: MarketplaceCalls::default(),
            upload_failures: Arc::default(),
            slug_fails: false,
            draft_response: Some(DraftResponse {
                draft_id: Some("draft-1".to_string()),
                slug: Some("geo-cards".to_string()),
            }),
            confirm_fails: false,
            confirm_success: true,
            ready_at: Some(1),
            ready_delay: Duration::ZERO,
            upload_delay: Duration::ZERO,
            uploads_in_flight: Arc::default(),
            peak_uploads_in_flight: Arc::default(),
            upload_log: Arc::default(),
            drafts: Arc::default(),
            confirms: Arc::default(),
        }
    }
}

impl FakeMarketplace {
    pub fn fail_upload(&self, filename: &str, times: usize) {
        self.upload_failures
            .lock()
            .unwrap()
            .insert(filename.to_string(), times);
    }

    pub fn peak_uploads(&self) -> usize {
        self.peak_uploads_in_flight.load(Ordering::SeqCst)
    }

    pub fn upload_log(&self) -> Vec<String> {
        self.upload_log.lock().unwrap().clone()
    }
}

impl MarketplaceApi for FakeMarketplace {
    async fn auth_message(&self, address: Address) -> Result<AuthChallenge> {
        let n = self.calls.auth_message.hit();
        Ok(AuthChallenge {
            message: format!("Sign in as {}", address),
            nonce: n.to_string(),
        })
    }

    async fn verify_signature(
        &self,
        _address: Address,
        challenge: &AuthChallenge,
        signature: &str,
    ) -> Result<String> {
        self.calls.verify.hit();
        anyhow::ensure!(signature.starts_with("0x"), "bad signature");
        Ok(format!("token-{}", challenge.nonce))
    }

    async fn upload_image(&self, token: &str, filename: &str, _bytes: &[u8]) -> Result<String> {
        self.calls.upload.hit();
        anyhow::ensure!(token.starts_with("token-"), "HTTP 401: unauthorized");

        if !self.upload_delay.is_zero() {
            let now = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_uploads_in_flight.fetch_max(now, Ordering::SeqCst);
            self.upload_log.lock().unwrap().push(format!("start {}", filename));
            tokio::time::sleep(self.upload_delay).await;
            self.upload_log.lock().unwrap().push(format!("end {}", filename));
            self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let mut failures = self.upload_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(filename) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                anyhow::bail!("upload request failed: HTTP 502: bad gateway");
            }
        }
        Ok(format!("https://cdn.example/{}", filename))
    }

    async fn generate_slug(&self, name: &str) -> Result<String> {
        self.calls.slug.hit();
        if self.slug_fails {
            anyhow::bail!("generate slug request failed: HTTP 500");
        }
        Ok(name.to_lowercase().replace(' ', "-"))
    }

    async fn create_draft(&self, _token: &str, metadata: &CollectionMetadata) -> Result<DraftResponse> {
        self.calls.draft.hit();
        self.drafts.lock().unwrap().push(metadata.clone());
        self.draft_response
            .clone()
            .ok_or_else(|| anyhow::anyhow!("create draft request failed: HTTP 500: Internal Server Error"))
    }

    async fn confirm_draft(&self, _token: &str, request: &ConfirmRequest) -> Result<ConfirmResponse> {
        self.calls.confirm.hit();
        self.confirms.lock().unwrap().push(request.clone());
        if self.confirm_fails {
            anyhow::bail!("confirm draft request failed: HTTP 500");
        }
        Ok(ConfirmResponse {
            success: self.confirm_success,
            collection_url: Some("https://vibechain.com/market/geo-cards".to_string()),
        })
    }

    async fn collection_ready(&self, contract: Address, chain_id: u64) -> Result<bool> {
        let attempt = self.calls.ready.hit() + 1;
        if !self.ready_delay.is_zero() {
            tokio::time::sleep(self.ready_delay).await;
        }
        anyhow::ensure!(contract == DROP && chain_id == CHAIN_ID, "unknown collection");
        Ok(self.ready_at.is_some_and(|at| attempt >= at))
    }

    async fn eth_price(&self) -> Result<f64> {
        Ok(3000.0)
    }

    async fn recent_collections(&self) -> Result<Vec<CollectionSummary>> {
        Ok(vec![])
    }

    async fn owner_collections(&self, _wallet: Address) -> Result<Vec<CollectionSummary>> {
        Ok(vec![])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChainCalls {
    pub call: Counter,
    pub estimate: Counter,
    pub send: Counter,
    pub receipt: Counter,
}

/// Scriptable [`Chain`] whose transactions are mined on the first receipt poll.
#[derive(Debug, Clone)]
pub struct FakeChain {
    pub calls: ChainCalls,
    /// `None` makes `protocolFee()` fail.
    pub protocol_fee: Option<U256>,
    pub mint_price: U256,
    pub reverts: bool,
    pub never_mined: bool,
    pub emits_drop_created: bool,
    pub send_error: Option<String>,
    /// The node holds no key for the sender.
    pub unmanaged_sender: bool,
    pub sent: Arc<Mutex<Vec<TxRequest>>>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            calls: ChainCalls::default(),
            protocol_fee: Some(U256::from(1_000_000_000_000_000u64)),
            mint_price: U256::from(5_000u64),
            reverts: false,
            never_mined: false,
            emits_drop_created: true,
            send_error: None,
            unmanaged_sender: false,
            sent: Arc::default(),
        }
    }
}

impl FakeChain {
    pub fn last_sent(&self) -> Option<TxRequest> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl Chain for FakeChain {
    async fn manages_account(&self, _address: Address) -> Result<bool> {
        Ok(!self.unmanaged_sender)
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        self.calls.call.hit();
        let selector = &data[..4];
        if selector == IFeeWrapper::protocolFeeCall::SELECTOR {
            let fee = self
                .protocol_fee
                .ok_or_else(|| anyhow::anyhow!("RPC error: execution reverted"))?;
            return Ok(Bytes::from(fee.to_be_bytes::<32>().to_vec()));
        }
        if selector == IBoosterDrop::getMintPriceCall::SELECTOR {
            return Ok(Bytes::from(self.mint_price.to_be_bytes::<32>().to_vec()));
        }
        anyhow::bail!("unexpected call")
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64> {
        self.calls.estimate.hit();
        Ok(100_000)
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256> {
        self.calls.send.hit();
        if let Some(error) = &self.send_error {
            anyhow::bail!("{}", error);
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(TX_HASH)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>> {
        self.calls.receipt.hit();
        if self.never_mined {
            return Ok(None);
        }
        let logs = if self.emits_drop_created {
            vec![ReceiptLog {
                address: FACTORY,
                topics: vec![
                    IBoosterDropFactory::DropCreated::SIGNATURE_HASH,
                    DROP.into_word(),
                    TOKEN.into_word(),
                    Address::repeat_byte(0x01).into_word(),
                ],
                data: Bytes::new(),
            }]
        } else {
            vec![]
        };
        Ok(Some(TxReceipt {
            transaction_hash: hash,
            status: if self.reverts { 0 } else { 1 },
            logs,
        }))
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
    }
}

pub fn settings() -> FlowSettings {
    FlowSettings {
        chain_id: CHAIN_ID,
        economics: Economics::default(),
        base_uri_template: DEFAULT_BASE_URI_TEMPLATE.to_string(),
        uploader: MetadataUploader::new(3, fast_retry()),
        readiness: ReadinessPoller::new(Duration::from_millis(1), 30),
        deployer: OnchainDeployer::new(FACTORY)
            .with_tx_timeout(Duration::from_millis(200))
            .with_receipt_poll_interval(Duration::from_millis(5))
            .with_retry(fast_retry()),
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(GrayImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// Valid images named `card1.png..` with the given wire rarities.
pub fn request_with_rarities(rarities: &[u8]) -> DeploymentRequest {
    let bytes = png(MIN_WIDTH, MIN_HEIGHT);
    let images = (1..=rarities.len())
        .map(|i| ImageFile {
            filename: format!("card{}.png", i),
            bytes: bytes.clone(),
        })
        .collect();
    let rarities = rarities
        .iter()
        .enumerate()
        .map(|(i, rarity)| RarityAssignment {
            filename: format!("card{}.png", i + 1),
            rarity: *rarity,
        })
        .collect();

    DeploymentRequest {
        form: CollectionForm {
            name: "Geo Cards".to_string(),
            symbol: "GEO".to_string(),
            description: "Cards of shapes".to_string(),
            pack_amount: 100,
            ..Default::default()
        },
        images,
        rarities,
    }
}

pub fn valid_request() -> DeploymentRequest {
    request_with_rarities(&[1, 2, 3, 4, 5])
}
