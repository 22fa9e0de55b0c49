//! Decoding of the activity grid's positionally tagged JSON.
//!
//! The server does not send rows as objects. Every cell is a flat key made of
//! a fixed prefix and the zero-padded row index (`vBUILD_0007`), so a row is
//! rebuilt by looking up each prefix of an ordered tag table at one index.

use crate::error::{CrawlError, Result};
use crate::record::{RevisionObject, RevisionRecord};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Upper bound on object rows read for a single revision.
pub const MAX_OBJECT_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionField {
    Date,
    Seconds,
    User,
    Comment,
    Name,
    Operation,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectField {
    Type,
    Name,
    Guid,
    EntityId,
    Operation,
}

pub const REVISION_TAGS: &[(&str, RevisionField)] = &[
    ("vREVISIONDATE_", RevisionField::Date),
    ("vSECONDS_", RevisionField::Seconds),
    ("vUSER_", RevisionField::User),
    ("vCOMMENT_", RevisionField::Comment),
    ("vREVISIONNAME_", RevisionField::Name),
    ("vOPERATION_", RevisionField::Operation),
    ("vBUILD_", RevisionField::Build),
];

pub const OBJECT_TAGS: &[(&str, ObjectField)] = &[
    ("W0077vTYPE_", ObjectField::Type),
    ("W0077vNAMEAUX_", ObjectField::Name),
    ("W0077vENTITYGUID_", ObjectField::Guid),
    ("W0077vENTITYID_", ObjectField::EntityId),
    ("W0077vOBJOPERATION_", ObjectField::Operation),
];

/// A record whose fields are spread over positional tags.
pub trait TaggedRow: Default {
    type Field: Copy + Debug + 'static;

    const TAGS: &'static [(&'static str, Self::Field)];

    fn assign(&mut self, field: Self::Field, value: String);
}

impl TaggedRow for RevisionRecord {
    type Field = RevisionField;

    const TAGS: &'static [(&'static str, RevisionField)] = REVISION_TAGS;

    fn assign(&mut self, field: RevisionField, value: String) {
        match field {
            RevisionField::Date => self.date = value,
            RevisionField::Seconds => self.seconds = value,
            RevisionField::User => self.user = value,
            RevisionField::Comment => self.comment = value,
            RevisionField::Name => self.name = value,
            RevisionField::Operation => self.operation = value,
            RevisionField::Build => self.build = value,
        }
    }
}

impl TaggedRow for RevisionObject {
    type Field = ObjectField;

    const TAGS: &'static [(&'static str, ObjectField)] = OBJECT_TAGS;

    fn assign(&mut self, field: ObjectField, value: String) {
        match field {
            ObjectField::Type => self.object_type = value,
            ObjectField::Name => self.name = value,
            ObjectField::Guid => self.guid = value,
            ObjectField::EntityId => self.entity_id = value,
            ObjectField::Operation => self.operation = value,
        }
    }
}

/// Builds the key for `prefix` at row `index`, e.g. `vUSER_0003`.
pub fn tag(prefix: &str, index: usize) -> String {
    format!("{}{:04}", prefix, index)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rebuild the row at `index` from a flat tag map.
///
/// Every tag of the table must be present; a missing one means the
/// prefix/index assumption no longer matches the server.
pub fn decode_row<T: TaggedRow>(values: &Map<String, Value>, index: usize) -> Result<T> {
    let mut row = T::default();
    for (prefix, field) in T::TAGS {
        let key = tag(prefix, index);
        let value = values.get(&key).ok_or_else(|| {
            CrawlError::DecodeError(format!("tag {} ({:?}) missing for row {}", key, field, index))
        })?;
        row.assign(*field, value_text(value));
    }
    Ok(row)
}

fn values_entry(body: &Value, position: usize) -> Result<&Map<String, Value>> {
    body.get("gxValues")
        .and_then(|v| v.get(position))
        .and_then(|v| v.as_object())
        .ok_or_else(|| CrawlError::DecodeError(format!("gxValues[{}] missing from response", position)))
}

/// Number of rows the grid reports for this page; an absent count is zero.
pub fn grid_count(body: &Value) -> usize {
    let count = body
        .get("gxGrids")
        .and_then(|grids| grids.get(0))
        .and_then(|grid| grid.get("Count"));

    match count {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Row cells of a grid refresh response (`gxValues[0]`).
pub fn grid_rows(body: &Value) -> Result<&Map<String, Value>> {
    values_entry(body, 0)
}

/// Decode rows `1..=count` of a grid refresh response, without objects.
pub fn decode_page(body: &Value, count: usize) -> Result<Vec<RevisionRecord>> {
    let values = grid_rows(body)?;
    (1..=count).map(|row| decode_row(values, row)).collect()
}

/// Lazy sequence of the objects listed in an online-activate response.
///
/// Rows are read from index 1 while the type tag is present. The first gap
/// ends the sequence, so rows past a hole are never looked at. Cloning the
/// iterator restarts it from its current position.
#[derive(Debug, Clone)]
pub struct ObjectRows<'a> {
    values: &'a Map<String, Value>,
    next: usize,
    done: bool,
}

impl<'a> ObjectRows<'a> {
    pub fn new(values: &'a Map<String, Value>) -> Self {
        Self {
            values,
            next: 1,
            done: false,
        }
    }
}

impl Iterator for ObjectRows<'_> {
    type Item = Result<RevisionObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next > MAX_OBJECT_ROWS {
            return None;
        }

        let (type_prefix, _) = OBJECT_TAGS[0];
        if !self.values.contains_key(&tag(type_prefix, self.next)) {
            self.done = true;
            return None;
        }

        let row = decode_row(self.values, self.next);
        if row.is_err() {
            self.done = true;
        }
        self.next += 1;
        Some(row)
    }
}

/// Object rows of an online-activate response (`gxValues[1]`).
pub fn object_rows(body: &Value) -> Result<ObjectRows<'_>> {
    Ok(ObjectRows::new(values_entry(body, 1)?))
}

pub fn decode_objects(body: &Value) -> Result<Vec<RevisionObject>> {
    object_rows(body)?.collect()
}

/// Convert a grid date (`10/26/20 11:51 AM`) into the request layout
/// (`26/10/2020 11:51:00`). The clock is kept as shown; the meridiem is dropped.
pub fn format_request_date(raw: &str) -> Result<String> {
    let mut parts = raw.split_whitespace();
    let (date, clock) = match (parts.next(), parts.next()) {
        (Some(date), Some(clock)) => (date, clock),
        _ => {
            return Err(CrawlError::DecodeError(format!(
                "revision date '{}' has no time component",
                raw
            )));
        }
    };

    let date = NaiveDate::parse_from_str(date, "%m/%d/%y")
        .map_err(|e| CrawlError::DecodeError(format!("revision date '{}': {}", raw, e)))?;
    let clock = NaiveTime::parse_from_str(clock, "%H:%M")
        .map_err(|e| CrawlError::DecodeError(format!("revision time '{}': {}", raw, e)))?;

    Ok(format!("{} {}:00", date.format("%d/%m/%Y"), clock.format("%H:%M")))
}
