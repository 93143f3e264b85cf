use netzap_console::command::ScanConfig;
use serde_json::json;

#[test]
fn config_json_to_command_line() {
    let config: ScanConfig = serde_json::from_value(json!({
        "targetPort": 443,
        "blocklistFile": "/etc/zmap/blocklist.conf",
        "bandwidth": "10M",
        "cooldownTime": 8,
        "probeModule": "icmp_echoscan",
        "outputFields": ["saddr", "classification"],
        "verbosity": 5,
        "subnets": ["10.0.0.0/8", "172.16.0.0/12"]
    }))
    .expect("parse ok");

    assert_eq!(
        config.command_line().to_string(),
        "zmap -p 443 -b /etc/zmap/blocklist.conf -B 10M -M icmp_echoscan \
         -f saddr,classification -v 5 10.0.0.0/8 172.16.0.0/12"
    );
}

#[test]
fn preview_and_submit_share_one_mapping() {
    let config: ScanConfig = serde_json::from_value(json!({
        "targetPort": 8080,
        "rate": 500,
        "seed": 7,
        "subnets": ["192.168.1.0/24"]
    }))
    .unwrap();

    let first = config.to_request().resolve().unwrap();
    let second = config.to_request().resolve().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.engine.target_port, Some(8080));
    assert_eq!(first.engine.seed, Some(7));
    assert_eq!(first.engine.subnets, config.targets());
    assert_eq!(config.command_line(), config.clone().command_line());
}
