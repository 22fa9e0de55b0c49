use crate::config::ConfigError;
use crate::data::StoreError;
use gxcrawler_scanner::CrawlError;
use thiserror::Error;

/// Any failure of a full crawl-and-store run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RunError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunError::Crawl(CrawlError::Interrupted))
    }
}
