//! Scan lifecycle: record creation, engine call, normalization, persistence.
//!
//! Once a scan record exists, it ends `completed` or `failed`. The stage
//! after record creation runs on its own task, so it finishes even when the
//! caller of [`ScanOrchestrator::submit`] goes away. Engine errors,
//! post-engine store errors and panics all mark the record failed.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::{BlocklistFile, BlocklistRequest, ScanEngine};
use crate::error::{ConsoleError, Result};
use crate::export::CsvExport;
use crate::normalize::{self, NormalizeContext};
use crate::request::{EffectiveRequest, ScanRequest};
use crate::store::RecordStore;
use crate::targets;
use crate::types::{Scan, ScanEntry, ScanUpdate};

/// What a successful submission hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub results: Vec<ScanEntry>,
    pub count: usize,
    pub output_file: Option<String>,
    #[serde(skip)]
    pub scan: Scan,
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    store: Arc<dyn RecordStore>,
    engine: Arc<dyn ScanEngine>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("store", &std::any::type_name_of_val(self.store.as_ref()))
            .field("engine", &std::any::type_name_of_val(self.engine.as_ref()))
            .finish()
    }
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<dyn ScanEngine>) -> Self {
        Self { store, engine }
    }

    /// Run one scan end to end. Waits for the engine to answer; dropping the
    /// returned future does not stop the scan or its bookkeeping.
    pub async fn submit(&self, request: ScanRequest) -> Result<ScanOutcome> {
        let effective = request.resolve()?;
        let command = serde_json::to_string_pretty(&effective.engine).map_err(|e| {
            ConsoleError::InvalidRequest(format!("request cannot be serialized: {e}"))
        })?;

        let scan = Scan::new(
            effective.targets().join(", "),
            effective.port(),
            effective.probe_module(),
            command,
        );
        let scan_id = scan.id;
        self.store.create(scan).await?;
        info!(
            %scan_id,
            targets = %effective.targets().join(", "),
            port = ?effective.port(),
            probe_module = effective.probe_module(),
            "scan started"
        );

        let this = self.clone();
        tokio::spawn(async move { this.drive(scan_id, effective).await })
            .await
            .unwrap_or(Err(ConsoleError::Aborted))
    }

    /// Run the engine stage and record how it ended.
    async fn drive(self, scan_id: Uuid, effective: EffectiveRequest) -> Result<ScanOutcome> {
        let this = self.clone();
        let run = tokio::spawn(async move { this.run(scan_id, &effective).await })
            .await
            .unwrap_or_else(|e| {
                error!(%scan_id, error = %e, "scan task aborted");
                Err(ConsoleError::Aborted)
            });

        match run {
            Ok(outcome) => {
                info!(
                    %scan_id,
                    results = outcome.count,
                    hosts_up = outcome.scan.hosts_up,
                    hosts_scanned = outcome.scan.hosts_scanned,
                    "scan completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(%scan_id, error = %err, "scan failed");
                self.mark_failed(scan_id, &err).await;
                Err(err)
            }
        }
    }

    async fn run(&self, scan_id: Uuid, effective: &EffectiveRequest) -> Result<ScanOutcome> {
        let outcome = self.engine.scan(&effective.engine).await?.into_outcome()?;

        let ctx = NormalizeContext {
            port: effective.port(),
            protocol: effective.protocol,
        };
        let observed = normalize::normalize(&outcome.hosts, &ctx)?;
        let timestamp = OffsetDateTime::now_utc();
        let results: Vec<ScanEntry> = observed
            .into_iter()
            .map(|o| o.into_entry(scan_id, timestamp))
            .collect();
        if !results.is_empty() {
            self.store.append_results(scan_id, results.clone()).await?;
        }

        // An engine-reported total always wins over the CIDR estimate.
        let hosts_scanned = outcome
            .total_hosts_scanned
            .unwrap_or_else(|| targets::estimate_total_hosts(effective.targets()));
        let scan = self
            .store
            .update(scan_id, ScanUpdate::completed(hosts_scanned))
            .await?;

        Ok(ScanOutcome {
            scan_id,
            count: results.len(),
            results,
            output_file: outcome.output_file,
            scan,
        })
    }

    async fn mark_failed(&self, scan_id: Uuid, err: &ConsoleError) {
        if let Err(e) = self
            .store
            .update(scan_id, ScanUpdate::failed(err.to_string()))
            .await
        {
            error!(%scan_id, error = %e, "could not record scan failure");
        }
    }

    pub async fn list_scans(&self) -> Result<Vec<Scan>> {
        self.store.list().await
    }

    pub async fn get_scan(&self, id: Uuid) -> Result<Scan> {
        self.store.get(id).await
    }

    pub async fn results(&self, scan_id: Uuid) -> Result<Vec<ScanEntry>> {
        self.store.results(scan_id).await
    }

    pub async fn delete_scan(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        info!(scan_id = %id, "scan deleted");
        Ok(())
    }

    /// CSV of the scan's results; [`ConsoleError::NoResults`] when there are none.
    pub async fn export_csv(&self, scan_id: Uuid) -> Result<CsvExport> {
        let results = self.store.results(scan_id).await?;
        if results.is_empty() {
            return Err(ConsoleError::NoResults(scan_id));
        }
        Ok(CsvExport::from_entries(&results))
    }

    pub async fn probe_modules(&self) -> Result<serde_json::Value> {
        self.engine.probe_modules().await
    }

    pub async fn engine_health(&self) -> Result<serde_json::Value> {
        self.engine.health().await
    }

    pub async fn create_blocklist(&self, request: BlocklistRequest) -> Result<BlocklistFile> {
        if request.subnets.iter().all(|s| s.trim().is_empty()) {
            return Err(ConsoleError::InvalidRequest("subnets are required".to_string()));
        }
        self.engine.create_blocklist(&request).await
    }

    pub async fn create_standard_blocklist(&self) -> Result<BlocklistFile> {
        self.engine.create_standard_blocklist().await
    }
}
