// Network access: transport backends and the retrying fetcher on top of them.

pub mod fetcher;
pub mod http_source;
pub mod traits;
