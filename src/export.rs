use serde::Serialize;
use uuid::Uuid;

use crate::types::{rfc3339, ScanEntry};

pub const CSV_HEADERS: [&str; 5] = ["IP", "Port", "Protocol", "Status", "Timestamp"];

/// Tabular export of a scan's results.
///
/// Fields are joined with commas as-is; values containing commas are not
/// quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvExport {
    /// One row per entry, in the order given.
    pub fn from_entries(entries: &[ScanEntry]) -> Self {
        let rows = entries
            .iter()
            .map(|e| {
                vec![
                    e.ip.clone(),
                    e.port.to_string(),
                    e.protocol.to_string(),
                    e.status.clone(),
                    rfc3339(e.timestamp),
                ]
            })
            .collect();
        Self {
            headers: CSV_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn to_csv(&self) -> String {
        std::iter::once(&self.headers)
            .chain(self.rows.iter())
            .map(|row| row.join(","))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn file_name(scan_id: Uuid) -> String {
        format!("scan-results-{scan_id}.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;
    use time::macros::datetime;

    #[test]
    fn header_and_rows() {
        let scan_id = Uuid::new_v4();
        let ts = datetime!(2024-05-01 12:30:00 UTC);
        let entries = vec![
            ScanEntry {
                id: Uuid::new_v4(),
                scan_id,
                ip: "10.0.0.1".into(),
                port: 443,
                protocol: Protocol::Tcp,
                status: "open".into(),
                timestamp: ts,
            },
            ScanEntry {
                id: Uuid::new_v4(),
                scan_id,
                ip: "10.0.0.2".into(),
                port: 443,
                protocol: Protocol::Tcp,
                status: "closed".into(),
                timestamp: ts,
            },
        ];
        let csv = CsvExport::from_entries(&entries).to_csv();
        assert_eq!(
            csv,
            "IP,Port,Protocol,Status,Timestamp\n\
             10.0.0.1,443,tcp,open,2024-05-01T12:30:00Z\n\
             10.0.0.2,443,tcp,closed,2024-05-01T12:30:00Z"
        );
    }

    #[test]
    fn file_name_mentions_scan() {
        let id = Uuid::nil();
        assert_eq!(
            CsvExport::file_name(id),
            "scan-results-00000000-0000-0000-0000-000000000000.csv"
        );
    }
}
