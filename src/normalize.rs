//! Decoding of the engine's host entries into canonical observations.
//!
//! The engine reports hosts either as bare address strings or as records
//! whose field names depend on the output module (`ip`/`saddr`,
//! `port`/`dport`, `status`/`classification`). Each entry is decoded into
//! [`RawHost`]; shapes outside that set are rejected instead of guessed at.

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ConsoleError, Result};
use crate::types::{Protocol, ScanEntry};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawHost {
    Address(String),
    Record(HostRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HostRecord {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub saddr: Option<String>,
    #[serde(default)]
    pub port: Option<PortField>,
    #[serde(default)]
    pub dport: Option<PortField>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
}

/// Ports arrive as numbers from some output modules and as strings from others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(i64),
    Text(String),
}

impl PortField {
    fn as_port(&self) -> Option<u16> {
        let n = match self {
            PortField::Number(n) => *n,
            PortField::Text(s) => s.trim().parse::<i64>().ok()?,
        };
        u16::try_from(n).ok().filter(|p| *p != 0)
    }
}

/// What the normalizer needs to know about the scan the entries belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeContext {
    /// Port the scan targeted, used when an entry carries none.
    pub port: Option<u16>,
    pub protocol: Protocol,
}

/// A canonical result before it is stamped and attached to a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostObservation {
    pub id: Uuid,
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub status: String,
}

impl HostObservation {
    pub fn into_entry(self, scan_id: Uuid, timestamp: OffsetDateTime) -> ScanEntry {
        ScanEntry {
            id: self.id,
            scan_id,
            ip: self.ip,
            port: self.port,
            protocol: self.protocol,
            status: self.status,
            timestamp,
        }
    }
}

impl RawHost {
    fn resolve(self, ctx: &NormalizeContext) -> Option<HostObservation> {
        let fallback_port = ctx.port.unwrap_or(0);
        let (ip, port, status) = match self {
            RawHost::Address(ip) => (ip, fallback_port, "open".to_string()),
            RawHost::Record(rec) => {
                let ip = non_empty(rec.ip).or_else(|| non_empty(rec.saddr))?;
                let port = rec
                    .port
                    .as_ref()
                    .and_then(PortField::as_port)
                    .or_else(|| rec.dport.as_ref().and_then(PortField::as_port))
                    .unwrap_or(fallback_port);
                let status = non_empty(rec.status).unwrap_or_else(|| {
                    match rec.classification.as_deref() {
                        Some("synack") => "open".to_string(),
                        _ => "closed".to_string(),
                    }
                });
                (ip, port, status)
            }
        };
        let ip = ip.trim().to_string();
        if ip.is_empty() {
            return None;
        }
        Some(HostObservation {
            id: Uuid::new_v4(),
            ip,
            port,
            protocol: ctx.protocol,
            status,
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Normalize raw engine entries in input order. Duplicates are kept.
pub fn normalize(entries: &[Value], ctx: &NormalizeContext) -> Result<Vec<HostObservation>> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let raw = RawHost::deserialize(value).map_err(|_| {
                ConsoleError::MalformedResponse(format!("host entry {idx} has unsupported shape: {value}"))
            })?;
            raw.resolve(ctx).ok_or_else(|| {
                ConsoleError::MalformedResponse(format!("host entry {idx} carries no address: {value}"))
            })
        })
        .collect()
}
