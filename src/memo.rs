//! Process-wide memo of the last successful CHI aggregation.
//!
//! A single slot with no key: whatever was stored last is served to every
//! caller until it expires. Writers replace the whole entry under the lock,
//! so readers see either the old rows or the new rows, never a mix.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::types::ChiRow;

#[derive(Debug, Clone)]
struct MemoEntry {
    rows: Arc<Vec<ChiRow>>,
    computed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ChiMemo {
    ttl: Duration,
    slot: RwLock<Option<MemoEntry>>,
}

impl ChiMemo {
    pub fn new(ttl_secs: u64) -> Self {
        // Saturates for TTLs past what chrono can represent
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Rows from the last store, if younger than the TTL.
    pub fn fresh(&self) -> Option<Arc<Vec<ChiRow>>> {
        self.fresh_at(Utc::now())
    }

    pub fn fresh_at(&self, now: DateTime<Utc>) -> Option<Arc<Vec<ChiRow>>> {
        let slot = self.slot.read();
        let entry = slot.as_ref()?;
        if now - entry.computed_at < self.ttl {
            Some(Arc::clone(&entry.rows))
        } else {
            None
        }
    }

    pub fn store(&self, rows: Vec<ChiRow>) -> Arc<Vec<ChiRow>> {
        self.store_at(rows, Utc::now())
    }

    pub fn store_at(&self, rows: Vec<ChiRow>, computed_at: DateTime<Utc>) -> Arc<Vec<ChiRow>> {
        let rows = Arc::new(rows);
        *self.slot.write() = Some(MemoEntry {
            rows: Arc::clone(&rows),
            computed_at,
        });
        rows
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    pub fn computed_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().as_ref().map(|e| e.computed_at)
    }
}
