//! Mapping from a scan configuration to ZMap command-line arguments.
//!
//! The mapping is a fixed, ordered rule table. Each rule names a field, says
//! how to read it, when it is worth emitting (unset, blank and default values
//! are skipped), and which flag form it takes. Targets always close the
//! argument list as positionals. The same output backs the command preview
//! and the request handed to the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::{ScanRequest, DEFAULT_PROBE_MODULE};
use crate::targets;

pub const PROGRAM: &str = "zmap";

/// Every option the console can configure. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    // basic
    pub target_port: Option<u16>,
    pub output_file: Option<String>,
    pub blocklist_file: Option<String>,
    pub allowlist_file: Option<String>,
    pub subnets: Vec<String>,

    // scan options
    pub rate: Option<u64>,
    /// Bandwidth with unit suffix, e.g. `10M`.
    pub bandwidth: Option<String>,
    /// Address count or percentage of the address space, e.g. `1000` or `10%`.
    pub max_targets: Option<String>,
    pub max_runtime: Option<u64>,
    pub max_results: Option<u64>,
    pub probes: Option<u32>,
    pub cooldown_time: Option<u32>,
    pub seed: Option<u64>,
    pub retries: Option<u32>,
    pub dryrun: bool,
    pub shards: Option<u32>,
    pub shard: Option<u32>,

    // network
    pub source_port: Option<String>,
    pub source_ip: Option<String>,
    pub gateway_mac: Option<String>,
    pub source_mac: Option<String>,
    pub interface: Option<String>,
    pub vpn: bool,

    // probe module
    pub probe_module: Option<String>,
    pub probe_args: Option<String>,

    // output
    pub output_fields: Vec<String>,
    pub output_module: Option<String>,
    pub output_args: Option<String>,
    pub output_filter: Option<String>,

    // logging and metadata
    pub verbosity: Option<u8>,
    pub log_file: Option<String>,
    pub log_directory: Option<String>,
    pub metadata_file: Option<String>,
    pub status_updates_file: Option<String>,
    pub quiet: bool,
    pub disable_syslog: bool,
    pub notes: Option<String>,
    pub user_metadata: Option<String>,

    // additional
    pub config_file: Option<String>,
    pub max_sendto_failures: Option<i64>,
    pub min_hitrate: Option<f64>,
    pub sender_threads: Option<u32>,
    pub cores: Vec<u32>,
    pub ignore_invalid_hosts: bool,
}

#[derive(Debug, Clone, Copy)]
enum Form {
    /// `-p 443`
    Short(&'static str),
    /// `--retries=5`
    Long(&'static str),
    /// `-d`, emitted when the field is true
    Switch(&'static str),
}

type Extract = fn(&ScanConfig) -> Option<String>;
type EmitIf = fn(&ScanConfig, &str) -> bool;

struct FlagRule {
    field: &'static str,
    form: Form,
    extract: Extract,
    emit_if: EmitIf,
}

fn always(_: &ScanConfig, _: &str) -> bool {
    true
}

fn text(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn num<T: ToString>(v: Option<T>) -> Option<String> {
    v.map(|v| v.to_string())
}

fn flag(b: bool) -> Option<String> {
    b.then(String::new)
}

fn joined<T: ToString>(items: &[T]) -> Option<String> {
    let parts: Vec<String> = items
        .iter()
        .map(|i| i.to_string())
        .filter(|s| !s.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

/// Canonical emission order.
const RULES: &[FlagRule] = &[
    FlagRule { field: "targetPort", form: Form::Short("-p"), extract: |c| num(c.target_port), emit_if: always },
    FlagRule { field: "outputFile", form: Form::Short("-o"), extract: |c| text(&c.output_file), emit_if: always },
    FlagRule { field: "blocklistFile", form: Form::Short("-b"), extract: |c| text(&c.blocklist_file), emit_if: always },
    FlagRule { field: "allowlistFile", form: Form::Short("-w"), extract: |c| text(&c.allowlist_file), emit_if: always },
    FlagRule { field: "rate", form: Form::Short("-r"), extract: |c| num(c.rate), emit_if: always },
    FlagRule { field: "bandwidth", form: Form::Short("-B"), extract: |c| text(&c.bandwidth), emit_if: always },
    FlagRule { field: "maxTargets", form: Form::Short("-n"), extract: |c| text(&c.max_targets), emit_if: always },
    FlagRule { field: "maxRuntime", form: Form::Short("-t"), extract: |c| num(c.max_runtime), emit_if: always },
    FlagRule { field: "maxResults", form: Form::Short("-N"), extract: |c| num(c.max_results), emit_if: always },
    FlagRule { field: "probes", form: Form::Short("-P"), extract: |c| num(c.probes), emit_if: |_, v| v != "1" },
    FlagRule { field: "cooldownTime", form: Form::Short("-c"), extract: |c| num(c.cooldown_time), emit_if: |_, v| v != "8" },
    FlagRule { field: "seed", form: Form::Short("-e"), extract: |c| num(c.seed), emit_if: always },
    FlagRule { field: "retries", form: Form::Long("--retries"), extract: |c| num(c.retries), emit_if: |_, v| v != "10" },
    FlagRule { field: "dryrun", form: Form::Switch("-d"), extract: |c| flag(c.dryrun), emit_if: always },
    FlagRule { field: "shards", form: Form::Long("--shards"), extract: |c| num(c.shards), emit_if: |_, v| v != "1" },
    FlagRule {
        field: "shard",
        form: Form::Long("--shard"),
        extract: |c| num(c.shard.or(c.shards.filter(|n| *n != 1).map(|_| 0))),
        emit_if: |c, v| v != "0" || c.shards.is_some_and(|n| n != 1),
    },
    FlagRule { field: "sourcePort", form: Form::Short("-s"), extract: |c| text(&c.source_port), emit_if: always },
    FlagRule { field: "sourceIp", form: Form::Short("-S"), extract: |c| text(&c.source_ip), emit_if: always },
    FlagRule { field: "gatewayMac", form: Form::Short("-G"), extract: |c| text(&c.gateway_mac), emit_if: always },
    FlagRule { field: "sourceMac", form: Form::Long("--source-mac"), extract: |c| text(&c.source_mac), emit_if: always },
    FlagRule { field: "interface", form: Form::Short("-i"), extract: |c| text(&c.interface), emit_if: always },
    FlagRule { field: "vpn", form: Form::Switch("-X"), extract: |c| flag(c.vpn), emit_if: always },
    FlagRule {
        field: "probeModule",
        form: Form::Short("-M"),
        extract: |c| text(&c.probe_module),
        emit_if: |_, v| v != DEFAULT_PROBE_MODULE,
    },
    FlagRule { field: "probeArgs", form: Form::Long("--probe-args"), extract: |c| text(&c.probe_args), emit_if: always },
    FlagRule { field: "outputFields", form: Form::Short("-f"), extract: |c| joined(&c.output_fields), emit_if: always },
    FlagRule { field: "outputModule", form: Form::Short("-O"), extract: |c| text(&c.output_module), emit_if: |_, v| v != "default" },
    FlagRule { field: "outputArgs", form: Form::Long("--output-args"), extract: |c| text(&c.output_args), emit_if: always },
    FlagRule { field: "outputFilter", form: Form::Long("--output-filter"), extract: |c| text(&c.output_filter), emit_if: always },
    FlagRule { field: "verbosity", form: Form::Short("-v"), extract: |c| num(c.verbosity), emit_if: |_, v| v != "3" },
    FlagRule { field: "logFile", form: Form::Short("-l"), extract: |c| text(&c.log_file), emit_if: always },
    FlagRule { field: "logDirectory", form: Form::Short("-L"), extract: |c| text(&c.log_directory), emit_if: always },
    FlagRule { field: "metadataFile", form: Form::Short("-m"), extract: |c| text(&c.metadata_file), emit_if: always },
    FlagRule { field: "statusUpdatesFile", form: Form::Short("-u"), extract: |c| text(&c.status_updates_file), emit_if: always },
    FlagRule { field: "quiet", form: Form::Switch("-q"), extract: |c| flag(c.quiet), emit_if: always },
    FlagRule { field: "disableSyslog", form: Form::Switch("--disable-syslog"), extract: |c| flag(c.disable_syslog), emit_if: always },
    FlagRule { field: "notes", form: Form::Long("--notes"), extract: |c| text(&c.notes), emit_if: always },
    FlagRule { field: "userMetadata", form: Form::Long("--user-metadata"), extract: |c| text(&c.user_metadata), emit_if: always },
    FlagRule {
        field: "configFile",
        form: Form::Short("-C"),
        extract: |c| text(&c.config_file),
        emit_if: |_, v| v != "/etc/zmap/zmap.conf",
    },
    FlagRule {
        field: "maxSendtoFailures",
        form: Form::Long("--max-sendto-failures"),
        extract: |c| num(c.max_sendto_failures),
        emit_if: |_, v| v != "-1",
    },
    FlagRule {
        field: "minHitrate",
        form: Form::Long("--min-hitrate"),
        extract: |c| num(c.min_hitrate),
        emit_if: |c, _| c.min_hitrate.is_some_and(|h| h != 0.0),
    },
    FlagRule { field: "senderThreads", form: Form::Short("-T"), extract: |c| num(c.sender_threads), emit_if: |_, v| v != "1" },
    FlagRule { field: "cores", form: Form::Long("--cores"), extract: |c| joined(&c.cores), emit_if: always },
    FlagRule { field: "ignoreInvalidHosts", form: Form::Switch("--ignore-invalid-hosts"), extract: |c| flag(c.ignore_invalid_hosts), emit_if: always },
];

/// Names of the configurable fields in emission order.
pub fn field_order() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|r| r.field)
}

/// A ZMap invocation: program name plus ordered argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl ScanConfig {
    /// Targets from `subnets`, each entry split on commas and whitespace.
    pub fn targets(&self) -> Vec<String> {
        self.subnets
            .iter()
            .flat_map(|s| targets::split_targets(s))
            .collect()
    }

    pub fn command_line(&self) -> CommandLine {
        let mut args = Vec::new();
        for rule in RULES {
            let Some(value) = (rule.extract)(self) else {
                continue;
            };
            if !(rule.emit_if)(self, &value) {
                continue;
            }
            match rule.form {
                Form::Short(f) => {
                    args.push(f.to_string());
                    args.push(value);
                }
                Form::Long(f) => args.push(format!("{f}={value}")),
                Form::Switch(f) => args.push(f.to_string()),
            }
        }
        args.extend(self.targets());
        CommandLine {
            program: PROGRAM,
            args,
        }
    }

    /// The submit-path request carrying the options the engine accepts.
    pub fn to_request(&self) -> ScanRequest {
        ScanRequest {
            target_port: self.target_port,
            subnets: self.targets(),
            output_file: text(&self.output_file),
            blocklist_file: text(&self.blocklist_file),
            allowlist_file: text(&self.allowlist_file),
            bandwidth: text(&self.bandwidth),
            probe_module: text(&self.probe_module),
            rate: self.rate,
            seed: self.seed,
            verbosity: self.verbosity,
            return_results: Some(true),
            ..ScanRequest::default()
        }
    }
}

impl CommandLine {
    pub fn to_vec(&self) -> Vec<String> {
        std::iter::once(self.program.to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// POSIX single-quoting for tokens a shell would otherwise split or expand.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,%@+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn empty_config_is_bare_program() {
        let cmd = ScanConfig::default().command_line();
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.to_string(), "zmap");
    }

    #[test]
    fn basic_flags_and_trailing_targets() {
        let cfg = ScanConfig {
            target_port: Some(443),
            output_file: Some("out.csv".into()),
            subnets: vec!["10.0.0.0/24, 10.0.1.0/24".into()],
            ..ScanConfig::default()
        };
        assert_eq!(
            cfg.command_line().to_string(),
            "zmap -p 443 -o out.csv 10.0.0.0/24 10.0.1.0/24"
        );
    }

    #[test]
    fn default_values_are_omitted() {
        let cfg = ScanConfig {
            probes: Some(1),
            cooldown_time: Some(8),
            retries: Some(10),
            shards: Some(1),
            shard: Some(0),
            probe_module: Some("tcp_synscan".into()),
            output_module: Some("default".into()),
            verbosity: Some(3),
            config_file: Some("/etc/zmap/zmap.conf".into()),
            max_sendto_failures: Some(-1),
            min_hitrate: Some(0.0),
            sender_threads: Some(1),
            output_file: Some("   ".into()),
            ..ScanConfig::default()
        };
        assert!(cfg.command_line().args.is_empty());
    }

    #[test]
    fn switches_lists_and_long_flags() {
        let cfg = ScanConfig {
            dryrun: true,
            vpn: false,
            retries: Some(3),
            output_fields: vec!["saddr".into(), "daddr".into(), "sport".into()],
            cores: vec![0, 2],
            ignore_invalid_hosts: true,
            subnets: vec!["192.168.1.0/24".into()],
            ..ScanConfig::default()
        };
        assert_eq!(
            cfg.command_line().args,
            vec![
                "--retries=3",
                "-d",
                "-f",
                "saddr,daddr,sport",
                "--cores=0,2",
                "--ignore-invalid-hosts",
                "192.168.1.0/24",
            ]
        );
    }

    #[test]
    fn shard_follows_shards() {
        let cfg = ScanConfig {
            shards: Some(4),
            ..ScanConfig::default()
        };
        assert_eq!(cfg.command_line().args, vec!["--shards=4", "--shard=0"]);

        let cfg = ScanConfig {
            shard: Some(2),
            ..ScanConfig::default()
        };
        assert_eq!(cfg.command_line().args, vec!["--shard=2"]);
    }

    #[test]
    fn preview_quotes_free_text() {
        let cfg = ScanConfig {
            probe_module: Some("udp".into()),
            probe_args: Some("file:/tmp/dns probe".into()),
            notes: Some("weekly sweep".into()),
            user_metadata: Some(r#"{"team":"it's"}"#.into()),
            ..ScanConfig::default()
        };
        assert_eq!(
            cfg.command_line().to_string(),
            r#"zmap -M udp '--probe-args=file:/tmp/dns probe' '--notes=weekly sweep' '--user-metadata={"team":"it'\''s"}'"#
        );
    }

    #[test]
    fn output_is_deterministic() {
        let cfg = ScanConfig {
            target_port: Some(22),
            rate: Some(10_000),
            bandwidth: Some("10M".into()),
            seed: Some(42),
            interface: Some("eth0".into()),
            quiet: true,
            subnets: vec!["10.0.0.0/8".into()],
            ..ScanConfig::default()
        };
        let first = cfg.command_line();
        for _ in 0..5 {
            assert_eq!(cfg.command_line(), first);
            assert_eq!(cfg.clone().to_request(), cfg.to_request());
        }
        assert_eq!(first.to_vec()[0], "zmap");
        assert_eq!(first.args.last().map(String::as_str), Some("10.0.0.0/8"));
    }

    #[test]
    fn every_field_has_one_rule() {
        let fields: Vec<&str> = field_order().collect();
        let unique: HashSet<&str> = fields.iter().copied().collect();
        assert_eq!(fields.len(), unique.len());
        assert!(!unique.contains("subnets"));
    }

    #[test]
    fn request_carries_engine_fields() {
        let cfg: ScanConfig = serde_json::from_value(serde_json::json!({
            "targetPort": 443,
            "subnets": ["10.0.0.0/30"],
            "probeModule": "tcp_synscan",
            "rate": 5000,
            "dryrun": true
        }))
        .unwrap();
        let eff = cfg.to_request().resolve().unwrap();
        assert_eq!(eff.engine.target_port, Some(443));
        assert_eq!(eff.engine.subnets, vec!["10.0.0.0/30"]);
        assert_eq!(eff.engine.rate, Some(5000));
        assert!(eff.engine.return_results);
    }
}
