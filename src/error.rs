// Error taxonomy for fetches, downloads and runs.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// Every attempt of the resilient fetcher failed at the transport level.
    #[error("connection failed after {attempts} attempts for {url}: {last_error}")]
    TransportExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// The remote answered but the resource is missing or empty.
    #[error("resource absent: {url}")]
    AssetAbsent { url: String },

    /// An asset document could not be decoded.
    #[error("malformed document at {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download worker failed: {0}")]
    Worker(String),

    #[error("interrupted")]
    Interrupted,
}

impl HarvestError {
    /// Errors that end the whole run rather than just the current operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::TransportExhausted { .. }
                | HarvestError::Io { .. }
                | HarvestError::Worker(_)
                | HarvestError::Interrupted
        )
    }
}

pub type HarvestResult<T> = std::result::Result<T, HarvestError>;
