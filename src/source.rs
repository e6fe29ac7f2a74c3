//! Record sources: where feedback records come from.
//!
//! Two backends share one validation path:
//! - `JsonFileSource`: a JSON array of record objects
//! - `SqliteSource`: a table with `transcript`, `product_name`, `timestamp`
//!   and optionally `location` columns

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::types::FeedbackRecord;

pub const DEFAULT_TABLE: &str = "feedback";

const REQUIRED_COLUMNS: [&str; 3] = ["transcript", "product_name", "timestamp"];

/// Restricts which records a source returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub product: Option<String>,
}

impl RecordFilter {
    pub fn product(name: impl Into<String>) -> Self {
        Self {
            product: Some(name.into()),
        }
    }

    fn matches(&self, product_name: &str) -> bool {
        match &self.product {
            Some(p) => p == product_name,
            None => true,
        }
    }
}

pub trait RecordSource {
    /// Load every record passing `filter`. An empty result is `EmptyDataset`.
    fn load(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>, PipelineError>;
}

/// Pick a source by file extension: `.db`/`.sqlite` → SQLite, anything else JSON.
pub fn source_for_path(path: &Path) -> Box<dyn RecordSource> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("db") | Some("sqlite") | Some("sqlite3") => Box::new(SqliteSource::new(path)),
        _ => Box::new(JsonFileSource::new(path)),
    }
}

/// Parse the timestamp formats found in exported feedback.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Source-agnostic row before validation.
#[derive(Debug, Deserialize)]
struct RawRecord {
    transcript: Option<String>,
    product_name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    timestamp: Option<String>,
}

fn validate(index: usize, raw: RawRecord) -> Result<FeedbackRecord, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidRecord {
        index,
        reason: reason.to_string(),
    };

    let transcript = raw.transcript.unwrap_or_default();
    if transcript.trim().is_empty() {
        return Err(invalid("transcript is empty"));
    }
    let product_name = raw.product_name.unwrap_or_default().trim().to_string();
    if product_name.is_empty() {
        return Err(invalid("product_name is empty"));
    }
    let raw_ts = raw.timestamp.ok_or_else(|| invalid("timestamp is missing"))?;
    let timestamp = parse_timestamp(&raw_ts)
        .ok_or_else(|| invalid(&format!("unrecognized timestamp '{}'", raw_ts)))?;

    Ok(FeedbackRecord {
        transcript,
        product_name,
        location: raw.location.unwrap_or_default().trim().to_string(),
        timestamp,
    })
}

fn finish(
    rows: impl IntoIterator<Item = RawRecord>,
    filter: &RecordFilter,
) -> Result<Vec<FeedbackRecord>, PipelineError> {
    let mut records = Vec::new();
    for (index, raw) in rows.into_iter().enumerate() {
        // Rows for other products are skipped unvalidated, matching the SQL filter.
        let product = raw.product_name.as_deref().unwrap_or_default().trim();
        if !filter.matches(product) {
            continue;
        }
        records.push(validate(index, raw)?);
    }
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    Ok(records)
}

// =============================================================================
// JSON
// =============================================================================

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonFileSource {
    fn load(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>, PipelineError> {
        let content = std::fs::read_to_string(&self.path)?;
        let rows: Vec<RawRecord> = serde_json::from_str(&content).map_err(|e| {
            PipelineError::Source(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        let records = finish(rows, filter)?;
        log::info!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

// =============================================================================
// SQLite
// =============================================================================

pub struct SqliteSource {
    path: PathBuf,
    table: String,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn columns(conn: &Connection, table: &str) -> Result<Vec<String>, PipelineError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text columns may hold text or numbers depending on how the table was written.
fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Like [`value_to_string`], but integer timestamps are epoch seconds.
fn timestamp_to_string(value: Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(
            DateTime::from_timestamp(i, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| i.to_string()),
        ),
        other => value_to_string(other),
    }
}

impl RecordSource for SqliteSource {
    fn load(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>, PipelineError> {
        if !is_identifier(&self.table) {
            return Err(PipelineError::Configuration(format!(
                "invalid table name '{}'",
                self.table
            )));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let columns = Self::columns(&conn, &self.table)?;
        if columns.is_empty() {
            return Err(PipelineError::Source(format!(
                "table '{}' not found in {}",
                self.table,
                self.path.display()
            )));
        }
        for required in REQUIRED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                return Err(PipelineError::MissingColumn(required.to_string()));
            }
        }
        let location_expr = if columns.iter().any(|c| c == "location") {
            "location"
        } else {
            "NULL"
        };

        let mut sql = format!(
            "SELECT transcript, product_name, {}, timestamp FROM {}",
            location_expr, self.table
        );
        if filter.product.is_some() {
            sql.push_str(" WHERE product_name = ?1");
        }
        sql.push_str(" ORDER BY rowid");

        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RawRecord> {
            Ok(RawRecord {
                transcript: value_to_string(row.get(0)?),
                product_name: value_to_string(row.get(1)?),
                location: value_to_string(row.get(2)?),
                timestamp: timestamp_to_string(row.get(3)?),
            })
        };
        let rows = match &filter.product {
            Some(product) => stmt
                .query_map([product], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };

        let records = finish(rows, filter)?;
        log::info!(
            "Loaded {} records from {}:{}",
            records.len(),
            self.path.display(),
            self.table
        );
        Ok(records)
    }
}
