use crate::error::{CrawlError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// One change-set recorded by the server, keyed by its build number.
///
/// Values are kept exactly as the grid delivered them. Numeric columns
/// (`build`, `seconds` and each object's `entity_id`) are coerced when the
/// record is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub build: String,
    pub date: String,
    pub seconds: String,
    pub user: String,
    pub comment: String,
    pub name: String,
    pub operation: String,
    pub objects: Vec<RevisionObject>,
}

/// One knowledge-base object touched by a revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionObject {
    pub object_type: String,
    pub name: String,
    pub guid: String,
    pub entity_id: String,
    pub operation: String,
}

/// Records decoded from a single activity grid page, in row order.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub page: u32,
    pub records: Vec<RevisionRecord>,
}

impl PageResult {
    pub fn object_count(&self) -> usize {
        self.records.iter().map(|r| r.objects.len()).sum()
    }
}

/// Inclusive calendar range used to filter the activity grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CrawlError::InvalidRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn today() -> Self {
        let today = Local::now().date_naive();
        Self {
            start: today,
            end: today,
        }
    }

    /// Both bounds are used only when both are given; otherwise the range
    /// is today alone.
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Ok(Self::today()),
        }
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}
