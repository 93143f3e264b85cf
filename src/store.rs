//! Keyed persistence for scans and their result lists.
//!
//! A scan and its results live in one map entry, so every mutation keyed by
//! a scan id (append, update, delete) is atomic for that id while different
//! ids proceed independently.

use std::cmp::Ordering;
use std::net::IpAddr;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConsoleError, Result};
use crate::types::{Scan, ScanEntry, ScanUpdate};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new scan with an empty result list.
    async fn create(&self, scan: Scan) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Scan>;

    /// All scans, most recent `start_time` first.
    async fn list(&self) -> Result<Vec<Scan>>;

    async fn update(&self, id: Uuid, update: ScanUpdate) -> Result<Scan>;

    /// Append results and bump `hosts_up` by the number of open entries.
    async fn append_results(&self, scan_id: Uuid, entries: Vec<ScanEntry>) -> Result<Scan>;

    /// Results ordered by ip, then port.
    async fn results(&self, scan_id: Uuid) -> Result<Vec<ScanEntry>>;

    /// Remove a scan together with its results.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[derive(Debug)]
struct ScanRecord {
    scan: Scan,
    results: Vec<ScanEntry>,
}

/// In-process [`RecordStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<Uuid, ScanRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, scan: Scan) -> Result<()> {
        match self.records.entry(scan.id) {
            Entry::Occupied(_) => Err(ConsoleError::DuplicateKey(scan.id)),
            Entry::Vacant(slot) => {
                debug!(scan_id = %scan.id, "scan record created");
                slot.insert(ScanRecord {
                    scan,
                    results: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Scan> {
        self.records
            .get(&id)
            .map(|r| r.scan.clone())
            .ok_or_else(|| ConsoleError::scan_not_found(id))
    }

    async fn list(&self) -> Result<Vec<Scan>> {
        let mut scans: Vec<Scan> = self.records.iter().map(|r| r.scan.clone()).collect();
        scans.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(scans)
    }

    async fn update(&self, id: Uuid, update: ScanUpdate) -> Result<Scan> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| ConsoleError::scan_not_found(id))?;
        record.scan.apply(update, OffsetDateTime::now_utc())?;
        Ok(record.scan.clone())
    }

    async fn append_results(&self, scan_id: Uuid, entries: Vec<ScanEntry>) -> Result<Scan> {
        let mut record = self
            .records
            .get_mut(&scan_id)
            .ok_or_else(|| ConsoleError::scan_not_found(scan_id))?;
        let opened = entries.iter().filter(|e| e.is_open()).count() as u64;
        record.results.extend(entries);
        record.scan.hosts_up += opened;
        debug!(%scan_id, opened, total = record.results.len(), "results appended");
        Ok(record.scan.clone())
    }

    async fn results(&self, scan_id: Uuid) -> Result<Vec<ScanEntry>> {
        let record = self
            .records
            .get(&scan_id)
            .ok_or_else(|| ConsoleError::scan_not_found(scan_id))?;
        let mut results = record.results.clone();
        drop(record);
        results.sort_by(|a, b| compare_ip(&a.ip, &b.ip).then(a.port.cmp(&b.port)));
        Ok(results)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        match self.records.remove(&id) {
            Some(_) => {
                debug!(scan_id = %id, "scan record deleted");
                Ok(())
            }
            None => Err(ConsoleError::scan_not_found(id)),
        }
    }
}

/// Numeric order when both sides are addresses, otherwise plain string order.
/// Parsed addresses sort ahead of anything unparsable.
fn compare_ip(a: &str, b: &str) -> Ordering {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
