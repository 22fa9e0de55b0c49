pub mod handlers;

pub use gxcrawler_core::crawl::{CrawlOptions, CrawlSummary, execute_crawl};
pub use gxcrawler_core::report::{ReportFormat, generate_crawl_report};
