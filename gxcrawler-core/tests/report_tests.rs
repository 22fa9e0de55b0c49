// Tests for revision report rendering

use gxcrawler_core::data::{StoredObject, StoredRevision};
use gxcrawler_core::report::{ReportFormat, generate_crawl_report};

fn stored(build: i64, objects: usize) -> StoredRevision {
    StoredRevision {
        build,
        date: "26/10/2020 11:51:00".to_string(),
        seconds: 12,
        user: "ana".to_string(),
        comment: String::new(),
        name: format!("Revision {}", build),
        operation: "Commit".to_string(),
        objects: (1..=objects)
            .map(|i| StoredObject {
                object_type: "Transaction".to_string(),
                name: format!("Customer{}", i),
                guid: format!("guid-{}", i),
                entity_id: i as i64,
                operation: "Inserted".to_string(),
            })
            .collect(),
    }
}

#[test]
fn test_text_report_lists_revisions_and_objects() {
    let revisions = vec![stored(104, 2), stored(103, 0)];
    let report = generate_crawl_report(&revisions, ReportFormat::Text).unwrap();

    assert!(report.contains("Revisions:    2"));
    assert!(report.contains("Objects:      2"));
    assert!(report.contains("## Build 104  Revision 104"));
    assert!(report.contains("Transaction Customer2 [guid-2]"));
    assert!(report.contains("(no objects)"));
    assert!(!report.contains("Comment:"));

    let first = report.find("Build 104").unwrap();
    let second = report.find("Build 103").unwrap();
    assert!(first < second);
}

#[test]
fn test_json_report_round_trips() {
    let revisions = vec![stored(7, 1)];
    let report = generate_crawl_report(&revisions, ReportFormat::Json).unwrap();

    let parsed: Vec<StoredRevision> = serde_json::from_str(&report).unwrap();
    assert_eq!(parsed, revisions);
}
