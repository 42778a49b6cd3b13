use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A completed HTTP exchange. Any status code counts as a response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True when the remote reports the resource missing or sends nothing.
    pub fn is_absent(&self) -> bool {
        self.status == 404 || self.body.is_empty()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET. `Err` means a transport-level failure (connect, timeout, reset).
    async fn get(&self, url: &str) -> Result<FetchedResponse>;
}
