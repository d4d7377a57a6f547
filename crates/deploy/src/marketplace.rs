//! Client for the marketplace REST API.
//!
//! [`MarketplaceApi`] is the seam the deployment flow talks to;
//! [`HttpMarketplace`] is the real implementation over `reqwest`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{CollectionMetadata, MarketplaceConfig, TtlCache, rpc};

/// Header carrying the marketplace API key.
pub const API_KEY_HEADER: &str = "API-KEY";

/// Shared cache for idempotent lookups.
pub type ResponseCache = TtlCache<Value>;

/// Signing challenge returned for a wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub message: String,
    pub nonce: String,
}

/// Raw draft creation response. `draft_id` is validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftResponse {
    pub draft_id: Option<String>,
    pub slug: Option<String>,
}

/// Binds a draft to the deployed contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub draft_id: String,
    pub tx_hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_contract: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_contract: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfirmResponse {
    pub success: bool,
    pub collection_url: Option<String>,
}

/// A collection as listed by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionSummary {
    pub name: String,
    pub symbol: Option<String>,
    pub slug: Option<String>,
    #[serde(alias = "dropContract", alias = "contract")]
    pub contract_address: Option<String>,
    #[serde(alias = "tokenContract")]
    pub token_address: Option<String>,
    #[serde(alias = "featuredImageUrl")]
    pub image_url: Option<String>,
}

/// Operations of the marketplace backend used by the deployment flow.
pub trait MarketplaceApi: Send + Sync {
    /// `GET /auth/message/{address}`
    fn auth_message(&self, address: Address)
    -> impl Future<Output = Result<AuthChallenge>> + Send;

    /// `POST /auth/verify-signature`, returning a bearer token.
    fn verify_signature(
        &self,
        address: Address,
        challenge: &AuthChallenge,
        signature: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// `POST /image/upload`, returning the hosted URL.
    fn upload_image(
        &self,
        token: &str,
        filename: &str,
        bytes: &[u8],
    ) -> impl Future<Output = Result<String>> + Send;

    /// `POST /boosterbox/generate-slug`
    fn generate_slug(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// `POST /boosterbox/metadata/draft`
    fn create_draft(
        &self,
        token: &str,
        metadata: &CollectionMetadata,
    ) -> impl Future<Output = Result<DraftResponse>> + Send;

    /// `POST /boosterbox/metadata/confirm`
    fn confirm_draft(
        &self,
        token: &str,
        request: &ConfirmRequest,
    ) -> impl Future<Output = Result<ConfirmResponse>> + Send;

    /// `GET /boosterbox/contractAddress/{addr}/ready`
    fn collection_ready(
        &self,
        contract: Address,
        chain_id: u64,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// `GET /boosterbox/eth-price`, in USD.
    fn eth_price(&self) -> impl Future<Output = Result<f64>> + Send;

    /// `GET /boosterbox/recent`
    fn recent_collections(&self) -> impl Future<Output = Result<Vec<CollectionSummary>>> + Send;

    /// `GET /boosterbox/owner/{wallet}`
    fn owner_collections(
        &self,
        wallet: Address,
    ) -> impl Future<Output = Result<Vec<CollectionSummary>>> + Send;
}

/// [`MarketplaceApi`] over HTTP.
///
/// Every request carries the API key; authenticated endpoints also carry the
/// bearer token. Lookups go through the shared [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Arc<ResponseCache>,
}

impl HttpMarketplace {
    pub fn new(config: &MarketplaceConfig, cache: Arc<ResponseCache>) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client(Duration::from_secs(config.request_timeout_secs))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            cache,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Send a request and parse a JSON body, failing on non-2xx.
    async fn send_json(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response", what))?;

        if !status.is_success() {
            anyhow::bail!("{} request failed: {}", what, rpc::error_text(status, &body));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse {} response", what))
    }

    async fn cached_json(&self, key: &str, path: &str, what: &str) -> Result<Value> {
        self.cache
            .get_or_try_insert_with(key, || self.send_json(self.get(path), what))
            .await
    }
}

impl MarketplaceApi for HttpMarketplace {
    async fn auth_message(&self, address: Address) -> Result<AuthChallenge> {
        let json = self
            .send_json(self.get(&format!("auth/message/{}", address)), "auth message")
            .await?;
        parse_challenge(&json)
    }

    async fn verify_signature(
        &self,
        address: Address,
        challenge: &AuthChallenge,
        signature: &str,
    ) -> Result<String> {
        let body = json!({
            "address": address,
            "message": challenge.message,
            "nonce": challenge.nonce,
            "signature": signature,
        });
        let json = self
            .send_json(self.post("auth/verify-signature").json(&body), "verify signature")
            .await?;
        string_field(&json, &["accessToken"]).context("Verify signature response has no accessToken")
    }

    async fn upload_image(&self, token: &str, filename: &str, bytes: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))
            .context("Invalid upload content type")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let json = self
            .send_json(
                self.post("image/upload").bearer_auth(token).multipart(form),
                "image upload",
            )
            .await?;
        string_field(&json, &["url", "imageUrl", "image"])
            .with_context(|| format!("Upload response for {} has no URL", filename))
    }

    async fn generate_slug(&self, name: &str) -> Result<String> {
        let json = self
            .send_json(
                self.post("boosterbox/generate-slug").json(&json!({ "name": name })),
                "generate slug",
            )
            .await?;
        string_field(&json, &["slug"]).context("Generate slug response has no slug")
    }

    async fn create_draft(&self, token: &str, metadata: &CollectionMetadata) -> Result<DraftResponse> {
        let json = self
            .send_json(
                self.post("boosterbox/metadata/draft")
                    .bearer_auth(token)
                    .json(metadata),
                "create draft",
            )
            .await?;
        Ok(DraftResponse {
            draft_id: string_field(&json, &["draftId", "id"]),
            slug: string_field(&json, &["slug"]),
        })
    }

    async fn confirm_draft(&self, token: &str, request: &ConfirmRequest) -> Result<ConfirmResponse> {
        let json = self
            .send_json(
                self.post("boosterbox/metadata/confirm")
                    .bearer_auth(token)
                    .json(request),
                "confirm draft",
            )
            .await?;
        let success = field(&json, "success")
            .and_then(Value::as_bool)
            .context("Confirm response has no success flag")?;
        Ok(ConfirmResponse {
            success,
            collection_url: string_field(&json, &["collectionUrl", "url"]),
        })
    }

    async fn collection_ready(&self, contract: Address, chain_id: u64) -> Result<bool> {
        let request = self
            .get(&format!("boosterbox/contractAddress/{}/ready", contract))
            .query(&[("chainId", chain_id)]);
        let json = self.send_json(request, "collection ready").await?;
        Ok(["ready", "isReady"]
            .iter()
            .find_map(|key| field(&json, key).and_then(Value::as_bool))
            .unwrap_or(false))
    }

    async fn eth_price(&self) -> Result<f64> {
        let json = self
            .cached_json("eth-price", "boosterbox/eth-price", "eth price")
            .await?;
        ["price", "ethPrice", "usd"]
            .iter()
            .find_map(|key| field(&json, key).and_then(number))
            .context("ETH price response has no price")
    }

    async fn recent_collections(&self) -> Result<Vec<CollectionSummary>> {
        let json = self
            .cached_json("recent", "boosterbox/recent", "recent collections")
            .await?;
        parse_collections(json)
    }

    async fn owner_collections(&self, wallet: Address) -> Result<Vec<CollectionSummary>> {
        let key = format!("owner:{}", wallet);
        let json = self
            .cached_json(&key, &format!("boosterbox/owner/{}", wallet), "owner collections")
            .await?;
        parse_collections(json)
    }
}

/// Look up `key` at the top level or under `data`.
fn field<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    json.get(key)
        .or_else(|| json.get("data").and_then(|data| data.get(key)))
}

/// The first non-empty string among `keys`.
fn string_field(json: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        field(json, key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// A number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn parse_challenge(json: &Value) -> Result<AuthChallenge> {
    Ok(AuthChallenge {
        message: string_field(json, &["message"]).context("Auth challenge has no message")?,
        nonce: field(json, "nonce")
            .and_then(|n| match n {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .context("Auth challenge has no nonce")?,
    })
}

fn parse_collections(json: Value) -> Result<Vec<CollectionSummary>> {
    let list = match json {
        Value::Array(_) => json,
        Value::Object(mut object) => ["data", "boosterBoxes", "collections", "results"]
            .iter()
            .find_map(|key| object.remove(*key).filter(Value::is_array))
            .context("Collection list response has no list")?,
        _ => anyhow::bail!("Collection list response is not a list"),
    };
    serde_json::from_value(list).context("Failed to parse collection list")
}

fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
