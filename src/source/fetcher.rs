// Retrying decorator over a transport: fixed wait between attempts, fatal on exhaustion.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use super::traits::{FetchedResponse, HttpTransport};
use crate::error::{HarvestError, HarvestResult};

pub struct ResilientFetcher {
    inner: Arc<dyn HttpTransport>,
    max_attempts: u32,
    retry_wait: Duration,
}

impl ResilientFetcher {
    pub fn new(inner: Arc<dyn HttpTransport>, max_attempts: u32, retry_wait: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            retry_wait,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// GET with retries. Non-2xx statuses are returned, not raised; only
    /// exhausting the attempt budget produces an error.
    pub async fn get(&self, url: &str) -> HarvestResult<FetchedResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.inner.get(url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "get failed (attempt {}/{}) url={}: {}",
                        attempt, self.max_attempts, url, e
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) => {
                    warn!(
                        "get failed after {} attempts url={}: {}",
                        attempt, url, e
                    );
                    return Err(HarvestError::TransportExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
            }
        }
    }

    /// GET a JSON document. A missing or empty body is `AssetAbsent`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> HarvestResult<T> {
        let resp = self.get(url).await?;
        if resp.is_absent() {
            return Err(HarvestError::AssetAbsent {
                url: url.to_string(),
            });
        }
        serde_json::from_slice(&resp.body).map_err(|source| HarvestError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
