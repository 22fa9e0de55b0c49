pub mod crawler;
pub mod decoder;
pub mod error;
pub mod grid;
pub mod record;
pub mod session;
pub mod token;

#[cfg(test)]
mod testing;

pub use crawler::{CrawlEvent, Crawler, ProgressCallback, crawl};
pub use error::CrawlError;
pub use grid::GridPaginator;
pub use record::{DateRange, PageResult, RevisionObject, RevisionRecord};
pub use session::{Credentials, HandshakeStep, Session, SessionClient, SessionState};
