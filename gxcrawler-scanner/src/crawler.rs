use crate::error::Result;
use crate::grid::GridPaginator;
use crate::record::{DateRange, PageResult, RevisionRecord};
use crate::session::{Credentials, HandshakeStep, Session, SessionClient};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

/// Progress notifications emitted while a crawl runs, in crawl order.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    HandshakeStep(HandshakeStep),
    PageFetched {
        page: u32,
        rows: usize,
    },
    RecordDecoded {
        page: u32,
        row: usize,
        build: String,
        objects: usize,
    },
}

pub type ProgressCallback = Arc<dyn Fn(CrawlEvent) + Send + Sync>;

/// Extracts every revision in a date range from one server.
///
/// Each crawl builds its own [`Session`], runs the handshake once and walks
/// the activity grid to the end. The session is dropped when the crawl
/// returns, successful or not.
pub struct Crawler {
    credentials: Credentials,
    timeout_secs: u64,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout_secs: 30,
            progress_callback: None,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    /// Crawl `start..=end`; without both bounds only today is crawled.
    pub async fn crawl(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RevisionRecord>> {
        let range = DateRange::resolve(start, end)?;
        let pages = self.crawl_pages(range).await?;
        Ok(pages.into_iter().flat_map(|page| page.records).collect())
    }

    /// Crawl a range and keep the page grouping.
    pub async fn crawl_pages(&self, range: DateRange) -> Result<Vec<PageResult>> {
        info!(
            "Starting crawl of {} ({} to {})",
            self.credentials.url, range.start, range.end
        );

        let mut session = Session::new(&self.credentials.url)?;
        let client =
            SessionClient::with_timeout(self.credentials.clone(), &session, self.timeout_secs)?;

        client
            .handshake(&mut session, |step| self.emit(CrawlEvent::HandshakeStep(step)))
            .await?;

        let mut paginator = GridPaginator::new(&client, &session, range);
        if let Some(ref callback) = self.progress_callback {
            paginator = paginator.with_progress_callback(callback.clone());
        }

        let mut pages = Vec::new();
        while let Some(page) = paginator.next_page().await? {
            pages.push(page);
        }

        let revisions: usize = pages.iter().map(|p| p.records.len()).sum();
        info!("Crawl complete. {} pages, {} revisions", pages.len(), revisions);
        Ok(pages)
    }
}

/// One-shot crawl with default settings.
pub async fn crawl(
    credentials: Credentials,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<RevisionRecord>> {
    Crawler::new(credentials).crawl(start, end).await
}
