// Engine orchestration: harvest sessions, the download pool and their side outputs.

pub mod cache;
pub mod downloader;
pub mod harvest;
pub mod manifest;
pub mod stats;
