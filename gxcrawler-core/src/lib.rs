pub mod config;
pub mod crawl;
pub mod data;
pub mod error;
pub mod report;

pub use config::{Config, ConfigError, ConfigSource};
pub use crawl::{CrawlOptions, CrawlProgressCallback, CrawlSummary, execute_crawl, persist_revisions};
pub use data::{Database, StoreError, StoredObject, StoredRevision};
pub use error::RunError;
pub use report::{ReportFormat, generate_crawl_report};
