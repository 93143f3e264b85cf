use std::fmt;

use serde::{Deserialize, Serialize};
use time::{format_description::well_known, OffsetDateTime};
use uuid::Uuid;

use crate::error::{ConsoleError, Result};

/// Lifecycle state of a scan. `Completed` and `Failed` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    InProgress,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScanStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::InProgress => "in-progress",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocol a result was observed on, derived from the probe module.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// `icmp_echoscan` and friends are ICMP, `udp` probes are UDP, everything else is TCP.
    pub fn for_probe_module(module: &str) -> Self {
        let module = module.trim().to_ascii_lowercase();
        if module.starts_with("icmp") {
            Protocol::Icmp
        } else if module.starts_with("udp") {
            Protocol::Udp
        } else {
            Protocol::Tcp
        }
    }

    /// Port used when the caller names none. ICMP probes have no port.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Protocol::Tcp => Some(80),
            Protocol::Udp => Some(53),
            Protocol::Icmp => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the scanning engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: Uuid,
    pub target: String,
    pub port: Option<u16>,
    pub scan_type: String,
    pub command: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub end_time: Option<OffsetDateTime>,
    pub hosts_scanned: u64,
    pub hosts_up: u64,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Scan {
    /// A fresh `in-progress` record with a new id and the current time as start.
    pub fn new(
        target: impl Into<String>,
        port: Option<u16>,
        scan_type: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            port,
            scan_type: scan_type.into(),
            command: command.into(),
            start_time: OffsetDateTime::now_utc(),
            end_time: None,
            hosts_scanned: 0,
            hosts_up: 0,
            status: ScanStatus::InProgress,
            error: None,
        }
    }

    /// Apply a partial update. `end_time` is stamped with `now` on the
    /// transition into a terminal state; a terminal scan never changes status again.
    pub fn apply(&mut self, update: ScanUpdate, now: OffsetDateTime) -> Result<()> {
        if let Some(status) = update.status {
            if self.status.is_terminal() {
                return Err(ConsoleError::TerminalState {
                    id: self.id,
                    status: self.status,
                });
            }
            self.status = status;
            if status.is_terminal() {
                self.end_time = Some(now);
            }
        }
        if let Some(n) = update.hosts_scanned {
            self.hosts_scanned = n;
        }
        if self.status == ScanStatus::Failed {
            if let Some(error) = update.error {
                self.error = Some(error);
            }
        }
        Ok(())
    }
}

/// Partial mutation of a [`Scan`]; unset fields are left alone.
///
/// `hosts_up` is not here: only [`RecordStore::append_results`] moves it.
///
/// [`RecordStore::append_results`]: crate::store::RecordStore::append_results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanUpdate {
    pub status: Option<ScanStatus>,
    pub hosts_scanned: Option<u64>,
    pub error: Option<String>,
}

impl ScanUpdate {
    pub fn completed(hosts_scanned: u64) -> Self {
        Self {
            status: Some(ScanStatus::Completed),
            hosts_scanned: Some(hosts_scanned),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ScanStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// One discovered host/port/protocol observation belonging to a scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanEntry {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ScanEntry {
    pub fn is_open(&self) -> bool {
        self.status == "open"
    }
}

/// RFC 3339 rendering used for exports and logs.
pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
