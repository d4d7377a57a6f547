//! Wallet signing and marketplace authentication.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use alloy_core::primitives::Address;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    MarketplaceApi,
    cache::{Clock, SystemClock, TtlCache},
    rpc,
};

/// A signer for marketplace challenges.
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;

    /// EIP-191 personal signature over `message`, as `0x`-prefixed hex.
    fn sign_message(&self, message: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Wallet backed by an in-process private key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .context("Invalid private key")?;
        Ok(Self { signer })
    }

    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }
}

impl Wallet for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .signer
            .sign_message_sync(message.as_bytes())
            .context("Failed to sign message")?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

/// Wallet whose key lives behind a JSON-RPC provider (`personal_sign`).
#[derive(Debug, Clone)]
pub struct RpcWallet {
    client: reqwest::Client,
    url: String,
    address: Address,
}

impl RpcWallet {
    pub fn new(url: impl Into<String>, address: Address) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client(rpc::DEFAULT_TIMEOUT)?,
            url: url.into(),
            address,
        })
    }
}

impl Wallet for RpcWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let data = format!("0x{}", hex::encode(message.as_bytes()));
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "personal_sign",
            vec![json!(data), json!(self.address)],
        )
        .await
    }
}

/// The last authenticated wallet, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub last_address: Address,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthState {
    /// `<data dir>/geopack/auth.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("geopack").join("auth.json"))
    }

    /// Load the state, `None` if no state has been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read auth state from {}", path.display()))?;
        let state = serde_json::from_str(&content).context("Failed to parse auth state JSON")?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize auth state")?;
        std::fs::write(path, json)
            .context(format!("Failed to write auth state to {}", path.display()))
    }
}

/// Obtains and caches bearer tokens for a wallet.
///
/// Tokens live in memory only. Authenticating with a different address than
/// the previous one drops every cached token.
#[derive(Debug)]
pub struct Authenticator<C = SystemClock> {
    tokens: TtlCache<String, C>,
    last_address: Mutex<Option<Address>>,
    state_path: Option<PathBuf>,
}

impl Authenticator<SystemClock> {
    pub fn new(token_ttl: Duration) -> Self {
        Self::with_clock(token_ttl, SystemClock)
    }
}

impl<C: Clock> Authenticator<C> {
    pub fn with_clock(token_ttl: Duration, clock: C) -> Self {
        Self {
            tokens: TtlCache::with_clock(token_ttl, clock),
            last_address: Mutex::new(None),
            state_path: None,
        }
    }

    /// Persist the last authenticated address at `path`, seeding it from any
    /// previous run.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        match AuthState::load(&path) {
            Ok(state) => {
                *self.last_address.get_mut().unwrap_or_else(|e| e.into_inner()) =
                    state.map(|s| s.last_address);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable auth state"),
        }
        self.state_path = Some(path);
        self
    }

    pub fn last_address(&self) -> Option<Address> {
        *self.last_address.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return a token for `wallet`, running challenge, sign and verify when
    /// none is cached.
    pub async fn authenticate<M, W>(&self, api: &M, wallet: &W) -> Result<String>
    where
        M: MarketplaceApi,
        W: Wallet,
    {
        let address = wallet.address();
        self.observe(address);

        let key = address.to_string();
        if let Some(token) = self.tokens.get(&key) {
            tracing::debug!(%address, "Using cached auth token");
            return Ok(token);
        }

        let challenge = api
            .auth_message(address)
            .await
            .context("Failed to fetch auth challenge")?;
        let signature = wallet
            .sign_message(&challenge.message)
            .await
            .context("Failed to sign auth challenge")?;
        let token = api
            .verify_signature(address, &challenge, &signature)
            .await
            .context("Failed to verify signature")?;

        self.tokens.insert(key, token.clone());
        self.persist(address);
        tracing::info!(%address, "Authenticated with marketplace");
        Ok(token)
    }

    /// Forget the token of `address`, for example after a 401.
    pub fn invalidate(&self, address: Address) {
        self.tokens.invalidate(&address.to_string());
    }

    fn observe(&self, address: Address) {
        let mut last = self.last_address.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = last.filter(|previous| *previous != address) {
            tracing::info!(%previous, current = %address, "Wallet switched, clearing auth tokens");
            self.tokens.clear();
        }
        *last = Some(address);
    }

    fn persist(&self, address: Address) {
        let Some(path) = &self.state_path else {
            return;
        };
        let state = AuthState {
            last_address: address,
            authenticated_at: Utc::now(),
        };
        if let Err(e) = state.save(path) {
            tracing::warn!(error = %e, "Failed to persist auth state");
        }
    }
}
