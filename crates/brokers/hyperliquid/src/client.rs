use hypergate_core::TradingError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

/// Status codes from load balancers and restarts that are worth retrying.
const RETRYABLE_STATUS_CODES: &[u16] = &[502, 503, 504];
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

/// JSON-over-POST client for the info and exchange endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn for_network(testnet: bool) -> Self {
        let base_url = if testnet {
            TESTNET_API_URL
        } else {
            MAINNET_API_URL
        };
        Self::new(Client::new(), base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_mainnet(&self) -> bool {
        self.base_url == MAINNET_API_URL
    }

    /// POST `body` to `path` and decode the JSON reply.
    ///
    /// 502/503/504 responses are retried with exponential backoff
    /// (100ms, 200ms, 400ms); any other non-success status is returned as an
    /// error carrying the response body.
    pub async fn post<B, R>(&self, path: &'static str, body: &B) -> Result<R, TradingError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| TradingError::Http(format!("{} request failed: {}", path, e)))?;

            let status = response.status().as_u16();
            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    status,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    path,
                    "Retryable HTTP error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| TradingError::Http(format!("{} body read failed: {}", path, e)))?;

            if status >= 400 {
                return Err(TradingError::Http(format!(
                    "{} returned status {}: {}",
                    path, status, text
                )));
            }

            debug!(path, status, "Received response");
            return serde_json::from_str(&text)
                .map_err(|e| TradingError::Decode(format!("{} response: {}", path, e)));
        }

        Err(TradingError::Http(format!(
            "Max retries ({}) exceeded for {}",
            MAX_RETRIES, path
        )))
    }
}
