// Report generation from stored revisions

use crate::data::StoredRevision;
use serde::{Deserialize, Serialize};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Render stored revisions, in the order given.
pub fn generate_crawl_report(
    revisions: &[StoredRevision],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(revisions)),
        ReportFormat::Json => serde_json::to_string_pretty(revisions),
    }
}

fn generate_text_report(revisions: &[StoredRevision]) -> String {
    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push('\n');

    if revisions.is_empty() {
        report.push_str("No revisions stored\n");
        report.push_str(DIVIDER);
        report.push('\n');
        return report;
    }

    let total_objects: usize = revisions.iter().map(|r| r.objects.len()).sum();
    report.push_str(&format!("Revisions:    {}\n", revisions.len()));
    report.push_str(&format!("Objects:      {}\n", total_objects));
    report.push_str(DIVIDER);
    report.push_str("\n\n");

    for revision in revisions {
        report.push_str(&format!("## Build {}  {}\n", revision.build, revision.name));
        report.push_str(&format!("  Date:       {}\n", revision.date));
        report.push_str(&format!("  User:       {}\n", revision.user));
        report.push_str(&format!("  Operation:  {}\n", revision.operation));
        report.push_str(&format!("  Seconds:    {}\n", revision.seconds));
        if !revision.comment.is_empty() {
            report.push_str(&format!("  Comment:    {}\n", revision.comment));
        }

        if revision.objects.is_empty() {
            report.push_str("  (no objects)\n");
        } else {
            report.push_str(&format!("  {} objects\n", revision.objects.len()));
            for object in &revision.objects {
                report.push_str(&format!(
                    "    {:<10} {} {} [{}]\n",
                    object.operation, object.object_type, object.name, object.guid
                ));
            }
        }
        report.push('\n');
    }

    report
}
