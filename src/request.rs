use serde::{Deserialize, Serialize};

use crate::engine::EngineRequest;
use crate::error::{ConsoleError, Result};
use crate::targets;
use crate::types::Protocol;

pub const DEFAULT_PROBE_MODULE: &str = "tcp_synscan";

/// A scan submission as callers send it.
///
/// Several fields have alternates kept for older clients: `subnet` (a single
/// string, possibly holding several targets) next to `subnets`, `port` next to
/// `target_port`, and `scan_type`/`scanType` next to `probe_module`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub target_port: Option<u16>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub blocklist_file: Option<String>,
    #[serde(default)]
    pub allowlist_file: Option<String>,
    #[serde(default)]
    pub bandwidth: Option<String>,
    #[serde(default)]
    pub probe_module: Option<String>,
    #[serde(default, alias = "scanType")]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub rate: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub verbosity: Option<u8>,
    #[serde(default)]
    pub return_results: Option<bool>,
}

/// The request after defaults and alternates are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRequest {
    pub engine: EngineRequest,
    pub protocol: Protocol,
}

impl EffectiveRequest {
    pub fn port(&self) -> Option<u16> {
        self.engine.target_port
    }

    pub fn probe_module(&self) -> &str {
        &self.engine.probe_module
    }

    pub fn targets(&self) -> &[String] {
        &self.engine.subnets
    }
}

impl ScanRequest {
    pub fn targets(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .subnets
            .iter()
            .flat_map(|s| targets::split_targets(s))
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        self.subnet
            .as_deref()
            .map(targets::split_targets)
            .unwrap_or_default()
    }

    /// Resolve alternates and defaults. Fails when no target is given.
    pub fn resolve(&self) -> Result<EffectiveRequest> {
        let subnets = self.targets();
        if subnets.is_empty() {
            return Err(ConsoleError::InvalidRequest(
                "target subnets are required".to_string(),
            ));
        }

        let probe_module = text(&self.probe_module)
            .or_else(|| text(&self.scan_type))
            .unwrap_or_else(|| DEFAULT_PROBE_MODULE.to_string());
        let protocol = Protocol::for_probe_module(&probe_module);
        let target_port = port(self.target_port)
            .or_else(|| port(self.port))
            .or_else(|| protocol.default_port());

        Ok(EffectiveRequest {
            engine: EngineRequest {
                target_port,
                subnets,
                output_file: text(&self.output_file),
                blocklist_file: text(&self.blocklist_file),
                allowlist_file: text(&self.allowlist_file),
                bandwidth: text(&self.bandwidth),
                probe_module,
                rate: self.rate.filter(|r| *r != 0),
                seed: self.seed.filter(|s| *s != 0),
                verbosity: self.verbosity.filter(|v| *v != 0),
                return_results: self.return_results.unwrap_or(true),
            },
            protocol,
        })
    }
}

fn text(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn port(p: Option<u16>) -> Option<u16> {
    p.filter(|p| *p != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> ScanRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn empty_targets_rejected() {
        let err = ScanRequest::default().resolve().unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidRequest(_)));
        let err = parse(json!({"subnets": ["  "], "subnet": ""})).resolve().unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidRequest(_)));
    }

    #[test]
    fn defaults_to_tcp_syn_on_port_80() {
        let eff = parse(json!({"subnets": ["10.0.0.0/24"]})).resolve().unwrap();
        assert_eq!(eff.probe_module(), "tcp_synscan");
        assert_eq!(eff.port(), Some(80));
        assert_eq!(eff.protocol, Protocol::Tcp);
        assert!(eff.engine.return_results);
    }

    #[test]
    fn alternate_fields_resolve() {
        let eff = parse(json!({
            "subnet": "10.0.0.0/24, 10.0.1.5",
            "port": 8443,
            "scanType": "udp"
        }))
        .resolve()
        .unwrap();
        assert_eq!(eff.targets(), ["10.0.0.0/24", "10.0.1.5"]);
        assert_eq!(eff.port(), Some(8443));
        assert_eq!(eff.probe_module(), "udp");
        assert_eq!(eff.protocol, Protocol::Udp);
    }

    #[test]
    fn explicit_fields_take_precedence() {
        let eff = parse(json!({
            "subnets": ["192.168.0.0/16"],
            "subnet": "10.0.0.1",
            "target_port": 443,
            "port": 80,
            "probe_module": "tcp_synscan",
            "scan_type": "icmp_echoscan"
        }))
        .resolve()
        .unwrap();
        assert_eq!(eff.targets(), ["192.168.0.0/16"]);
        assert_eq!(eff.port(), Some(443));
        assert_eq!(eff.probe_module(), "tcp_synscan");
    }

    #[test]
    fn icmp_has_no_default_port() {
        let eff = parse(json!({"subnets": ["10.0.0.1"], "probe_module": "icmp_echoscan"}))
            .resolve()
            .unwrap();
        assert_eq!(eff.port(), None);
        assert_eq!(eff.protocol, Protocol::Icmp);
    }

    #[test]
    fn blank_options_dropped() {
        let eff = parse(json!({
            "subnets": ["10.0.0.1"],
            "output_file": "",
            "bandwidth": " 10M ",
            "rate": 0,
            "return_results": false
        }))
        .resolve()
        .unwrap();
        assert_eq!(eff.engine.output_file, None);
        assert_eq!(eff.engine.bandwidth.as_deref(), Some("10M"));
        assert_eq!(eff.engine.rate, None);
        assert!(!eff.engine.return_results);
    }
}
