use crate::config::{Config, ConfigSource};
use crate::data::{Database, StoreError};
use crate::error::RunError;
use chrono::NaiveDate;
use gxcrawler_scanner::{CrawlError, CrawlEvent, Crawler, DateRange, PageResult, RevisionRecord};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Options for configuring a crawl run
pub struct CrawlOptions {
    pub config_source: ConfigSource,
    pub database_path: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub timeout_secs: u64,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress as console lines
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub range: DateRange,
    pub pages: usize,
    pub revisions: usize,
    pub objects: usize,
    pub database_path: PathBuf,
}

fn describe(event: &CrawlEvent) -> String {
    match event {
        CrawlEvent::HandshakeStep(step) => format!("Handshake: {}", step),
        CrawlEvent::PageFetched { page, rows } => {
            format!("Page {}: {} revisions", page, rows)
        }
        CrawlEvent::RecordDecoded {
            page,
            row,
            build,
            objects,
        } => format!("Page {} row {}: build {} ({} objects)", page, row, build, objects),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Starting crawl...");
    pb
}

/// Store records in crawl order, stopping at the first failure.
///
/// Records inserted before the failure stay committed. Returns the number
/// of revisions and objects written.
pub fn persist_revisions(
    db: &mut Database,
    records: &[RevisionRecord],
) -> Result<(usize, usize), StoreError> {
    let mut objects = 0;
    for (stored, record) in records.iter().enumerate() {
        if let Err(e) = db.insert_revision(record) {
            warn!("Stopping after {} stored revisions: {}", stored, e);
            return Err(e);
        }
        objects += record.objects.len();
    }
    Ok((records.len(), objects))
}

/// Load configuration, crawl the range and store every revision.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, RunError> {
    let CrawlOptions {
        config_source,
        database_path,
        start,
        end,
        timeout_secs,
        show_progress_bars,
    } = options;

    let config = Config::load(&config_source)?;
    let range = DateRange::resolve(start, end)?;
    let mut db = Database::new(&database_path)?;

    let progress_bar = show_progress_bars.then(spinner);

    let events_bar = progress_bar.clone();
    let events_callback = progress_callback.clone();
    let crawler = Crawler::new(config.credentials())
        .with_timeout(timeout_secs)
        .with_progress_callback(Arc::new(move |event: CrawlEvent| {
            let line = describe(&event);
            if let Some(ref pb) = events_bar {
                pb.set_message(line.clone());
                pb.tick();
            }
            if let Some(ref callback) = events_callback {
                callback(line);
            }
        }));

    let pages: Vec<PageResult> = tokio::select! {
        result = crawler.crawl_pages(range) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(CrawlError::Interrupted),
    }
    .inspect_err(|_| {
        if let Some(ref pb) = progress_bar {
            pb.abandon_with_message("Crawl aborted");
        }
    })?;

    let records: Vec<RevisionRecord> = pages.iter().flat_map(|p| p.records.clone()).collect();
    if let Some(ref pb) = progress_bar {
        pb.set_message(format!("Storing {} revisions...", records.len()));
    }

    let stored = persist_revisions(&mut db, &records);
    if let Some(ref pb) = progress_bar {
        match &stored {
            Ok((revisions, _)) => {
                pb.finish_with_message(format!("Crawl complete! {} revisions stored", revisions))
            }
            Err(_) => pb.abandon_with_message("Storing revisions failed"),
        }
    }
    let (revisions, objects) = stored?;

    info!(
        "Stored {} revisions and {} objects in {}",
        revisions,
        objects,
        database_path.display()
    );

    Ok(CrawlSummary {
        range,
        pages: pages.len(),
        revisions,
        objects,
        database_path,
    })
}
