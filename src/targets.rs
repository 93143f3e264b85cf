use ipnet::IpNet;

/// Split a free-form target string (`"10.0.0.0/24, 192.168.1.5 172.16.0.0/16"`)
/// into individual targets. Commas and whitespace both separate entries.
pub fn split_targets(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Best-effort number of addresses covered by one target.
///
/// An IPv4 CIDR covers `2^(32 - prefix)` addresses and an IPv6 CIDR
/// `2^(128 - prefix)`, saturating at `u64::MAX`. A bare address, or anything
/// that does not parse as a network (e.g. `10.0.0.0/abc`), counts as 1.
pub fn estimate_host_count(target: &str) -> u64 {
    match target.trim().parse::<IpNet>() {
        Ok(IpNet::V4(net)) => 1u64 << (32 - u32::from(net.prefix_len())),
        Ok(IpNet::V6(net)) => 1u64
            .checked_shl(128 - u32::from(net.prefix_len()))
            .unwrap_or(u64::MAX),
        Err(_) => 1,
    }
}

/// Sum of [`estimate_host_count`] over all targets.
pub fn estimate_total_hosts<S: AsRef<str>>(targets: &[S]) -> u64 {
    targets
        .iter()
        .map(|t| estimate_host_count(t.as_ref()))
        .fold(0u64, u64::saturating_add)
}
