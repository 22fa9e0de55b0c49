// Tests for storing crawled revisions and run failures that need no server

use gxcrawler_core::config::ConfigSource;
use gxcrawler_core::crawl::{CrawlOptions, execute_crawl, persist_revisions};
use gxcrawler_core::data::{Database, StoreError};
use gxcrawler_core::error::RunError;
use gxcrawler_scanner::RevisionRecord;
use tempfile::TempDir;

fn record(build: &str) -> RevisionRecord {
    RevisionRecord {
        build: build.to_string(),
        date: "01/02/2021 09:30:00".to_string(),
        seconds: "3".to_string(),
        user: "ana".to_string(),
        name: format!("Revision {}", build),
        operation: "Commit".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_persist_revisions_in_order() {
    let mut db = Database::open_in_memory().unwrap();
    let (revisions, objects) =
        persist_revisions(&mut db, &[record("1"), record("2"), record("3")]).unwrap();

    assert_eq!(revisions, 3);
    assert_eq!(objects, 0);
    assert_eq!(db.count_revisions().unwrap(), 3);
}

#[test]
fn test_persist_stops_at_first_conflict() {
    let mut db = Database::open_in_memory().unwrap();
    let records = [record("1"), record("2"), record("2"), record("3")];

    let err = persist_revisions(&mut db, &records).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { build: 2 }));

    // earlier records stay, later ones are never attempted
    assert_eq!(db.count_revisions().unwrap(), 2);
    assert!(db.get_revision(3).unwrap().is_none());
}

fn options(dir: &TempDir, config: ConfigSource) -> CrawlOptions {
    CrawlOptions {
        config_source: config,
        database_path: dir.path().join("crawl.db"),
        start: None,
        end: None,
        timeout_secs: 2,
        show_progress_bars: false,
    }
}

#[tokio::test]
async fn test_execute_crawl_without_config_file() {
    let dir = TempDir::new().unwrap();
    let source = ConfigSource::File(dir.path().join("missing.env"));

    let err = execute_crawl(options(&dir, source), None).await.unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
    assert!(!Database::exists(&dir.path().join("crawl.db")));
}

#[tokio::test]
async fn test_execute_crawl_unreachable_server() {
    let dir = TempDir::new().unwrap();
    let env = dir.path().join(".env");
    std::fs::write(
        &env,
        "GX_USER=ana\nGX_PASSWORD=pw\nGX_URL=http://127.0.0.1:9/gx\nGX_KBNAME=KB\n",
    )
    .unwrap();

    let err = execute_crawl(options(&dir, ConfigSource::File(env)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Crawl(_)));

    let db = Database::new(&dir.path().join("crawl.db")).unwrap();
    assert_eq!(db.count_revisions().unwrap(), 0);
}
