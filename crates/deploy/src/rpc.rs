//! Shared HTTP and JSON-RPC utilities.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

/// Default timeout for HTTP and RPC requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Call `method` on the node at `url`.
///
/// A JSON-RPC error object becomes an error carrying its code and message.
/// A `null` result deserializes as-is, so `Option<T>` covers pending lookups.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let request = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    let response: RpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("{} request failed", method))?
        .json()
        .await
        .with_context(|| format!("Malformed {} response", method))?;

    if let Some(error) = response.error {
        anyhow::bail!("{} returned RPC error {}: {}", method, error.code, error.message);
    }

    serde_json::from_value(response.result)
        .with_context(|| format!("Unexpected {} result", method))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity '{}'", value))
}

/// Deserialize a u64 from a hex string (with 0x prefix).
pub fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

/// Best-effort error text from a non-2xx HTTP response body.
///
/// Prefers a `message` or `error` string field, falls back to the raw body.
pub fn error_text(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["message", "error"].iter().find_map(|key| {
            json.get(key).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("message").and_then(|m| m.as_str()).map(String::from),
                _ => None,
            })
        })
    });

    let detail = detail.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    });

    format!("HTTP {}: {}", status.as_u16(), detail)
}
