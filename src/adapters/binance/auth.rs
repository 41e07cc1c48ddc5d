//! Binance Authentication - HMAC-SHA256 Query Signing
//!
//! Signs every USER_DATA/TRADE request by appending
//! `signature = hex(HMAC-SHA256(secret, query))` to the query string.
//! Credentials come from environment variables
//! (BINANCE_API_KEY, BINANCE_API_SECRET).

use anyhow::{Context, Result};
use chrono::Utc;

/// Binance API credentials and signer.
pub struct BinanceAuth {
    /// Sent as the `X-MBX-APIKEY` header.
    api_key: String,
    /// Only ever used to compute signatures.
    api_secret: String,
}

impl BinanceAuth {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load credentials from environment variables.
    ///
    /// Required env vars: BINANCE_API_KEY, BINANCE_API_SECRET.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("BINANCE_API_KEY").context("BINANCE_API_KEY not set")?;
        let api_secret =
            std::env::var("BINANCE_API_SECRET").context("BINANCE_API_SECRET not set")?;

        anyhow::ensure!(
            !api_key.is_empty() && !api_secret.is_empty(),
            "Binance credentials must not be empty"
        );

        Ok(Self::new(api_key, api_secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex-encoded HMAC-SHA256 of `query`.
    pub fn sign(&self, query: &str) -> String {
        let mac = hmac_sha256::HMAC::mac(query.as_bytes(), self.api_secret.as_bytes());
        hex::encode(mac)
    }

    /// Build a signed query string, preserving parameter order and
    /// appending `recvWindow`, `timestamp` and `signature`.
    pub fn signed_query(
        &self,
        params: &[(&str, String)],
        recv_window_ms: u64,
        timestamp_ms: i64,
    ) -> String {
        let mut query = encode_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("recvWindow={recv_window_ms}&timestamp={timestamp_ms}"));

        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    /// Current Unix time in milliseconds.
    pub fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl std::fmt::Debug for BinanceAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceAuth")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// `k1=v1&k2=v2` in the given order. Values are symbols, decimals,
/// enum names and hex ids, none of which need escaping.
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
