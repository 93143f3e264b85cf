#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netzap_console::engine::{
    BlocklistFile, BlocklistRequest, EngineRequest, EngineResponse, ScanEngine,
};
use netzap_console::orchestrator::ScanOrchestrator;
use netzap_console::store::{MemoryStore, RecordStore};
use netzap_console::types::{Scan, ScanEntry, ScanUpdate};
use netzap_console::{ConsoleError, Result};
use uuid::Uuid;
use serde_json::{json, Value};

/// What the fake engine does when asked to scan.
pub enum Reply {
    Json(Value),
    /// Answer with the body after a pause.
    Delayed(Duration, Value),
    Unreachable,
    Panic,
}

/// Scripted stand-in for the scan engine service.
pub struct FakeEngine {
    reply: Reply,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<EngineRequest>>,
}

impl FakeEngine {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(body: Value) -> Self {
        Self::new(Reply::Json(body))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanEngine for FakeEngine {
    async fn scan(&self, request: &EngineRequest) -> Result<EngineResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Reply::Json(v) => serde_json::from_value(v.clone())
                .map_err(|e| ConsoleError::MalformedResponse(e.to_string())),
            Reply::Delayed(pause, v) => {
                tokio::time::sleep(*pause).await;
                serde_json::from_value(v.clone())
                    .map_err(|e| ConsoleError::MalformedResponse(e.to_string()))
            }
            Reply::Unreachable => Err(ConsoleError::EngineUnreachable(
                "connection refused".to_string(),
            )),
            Reply::Panic => panic!("engine exploded"),
        }
    }

    async fn probe_modules(&self) -> Result<Value> {
        Ok(json!(["tcp_synscan", "icmp_echoscan", "udp"]))
    }

    async fn health(&self) -> Result<Value> {
        match self.reply {
            Reply::Unreachable => Err(ConsoleError::EngineUnreachable(
                "connection refused".to_string(),
            )),
            _ => Ok(json!({"name": "zmap-sdk", "version": "test"})),
        }
    }

    async fn create_blocklist(&self, request: &BlocklistRequest) -> Result<BlocklistFile> {
        Ok(BlocklistFile {
            file_path: Some(format!("/tmp/blocklist-{}.txt", request.subnets.len())),
            message: Some("Blocklist created".to_string()),
        })
    }

    async fn create_standard_blocklist(&self) -> Result<BlocklistFile> {
        Ok(BlocklistFile {
            file_path: Some("/tmp/standard-blocklist.txt".to_string()),
            message: Some("Standard blocklist created".to_string()),
        })
    }
}

pub fn orchestrator(engine: FakeEngine) -> (ScanOrchestrator, Arc<FakeEngine>) {
    let engine = Arc::new(engine);
    let orchestrator = ScanOrchestrator::new(Arc::new(MemoryStore::new()), engine.clone());
    (orchestrator, engine)
}

/// In-memory store whose `append_results` always fails.
#[derive(Default)]
pub struct RejectingStore {
    inner: MemoryStore,
}

#[async_trait]
impl RecordStore for RejectingStore {
    async fn create(&self, scan: Scan) -> Result<()> {
        self.inner.create(scan).await
    }

    async fn get(&self, id: Uuid) -> Result<Scan> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Scan>> {
        self.inner.list().await
    }

    async fn update(&self, id: Uuid, update: ScanUpdate) -> Result<Scan> {
        self.inner.update(id, update).await
    }

    async fn append_results(&self, _scan_id: Uuid, _results: Vec<ScanEntry>) -> Result<Scan> {
        Err(ConsoleError::InvalidRequest("result batch rejected".to_string()))
    }

    async fn results(&self, scan_id: Uuid) -> Result<Vec<ScanEntry>> {
        self.inner.results(scan_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.delete(id).await
    }
}

/// The two-host synack/rst answer used across tests.
pub fn synack_rst() -> Value {
    json!({
        "ips_found": [
            {"ip": "10.0.0.1", "classification": "synack"},
            {"ip": "10.0.0.2", "classification": "rst"}
        ]
    })
}
