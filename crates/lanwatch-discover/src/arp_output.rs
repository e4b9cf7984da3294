//! Parser for `arp-scan --plain` output.
//!
//! Each responder is one tab-separated line: `ip`, `mac`, and (without
//! `--quiet`) a vendor column. Anything that does not look like a responder
//! is skipped rather than failing the sweep.

use std::net::IpAddr;

use ipnet::IpNet;
use lanwatch_core::Observation;

/// Parse arp-scan output into observations.
///
/// When `scope` is given, responders outside it are dropped. Duplicate
/// responses are kept; the reconciler resolves them.
pub fn parse_arp_scan(output: &str, scope: Option<&IpNet>) -> Vec<Observation> {
    output
        .lines()
        .filter_map(|line| parse_line(line, scope))
        .collect()
}

fn parse_line(line: &str, scope: Option<&IpNet>) -> Option<Observation> {
    let mut fields = line.split('\t').map(str::trim);
    let ip_field = fields.next()?;
    // arp-scan may append a "(DUP: n)" marker after the MAC.
    let mac_field = fields.next()?.split_whitespace().next().unwrap_or_default();

    let ip: IpAddr = match ip_field.parse() {
        Ok(ip) => ip,
        Err(_) => {
            if !line.trim().is_empty() {
                tracing::debug!(line, "Skipping non-responder line");
            }
            return None;
        }
    };

    if let Some(net) = scope {
        if !net.contains(&ip) {
            tracing::debug!(ip = %ip, scope = %net, "Responder outside target network");
            return None;
        }
    }

    let Some(mac) = normalize_mac(mac_field) else {
        tracing::debug!(ip = %ip, mac = mac_field, "Skipping responder with malformed MAC");
        return None;
    };

    Some(Observation::new(ip.to_string(), mac))
}

/// Normalize a MAC to lowercase colon-separated octets.
///
/// Accepts `:` or `-` separators. Returns `None` unless there are exactly six
/// two-digit hex octets.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(|c: char| c == ':' || c == '-').collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }
    Some(octets.join(":").to_ascii_lowercase())
}

/// Interpret a scan target as a network when it is one.
///
/// Targets such as `10.0.0.1/20` are accepted and truncated to their network.
/// Ranges or hostnames return `None` and are passed to arp-scan untouched.
pub fn target_network(target: &str) -> Option<IpNet> {
    target.parse::<IpNet>().ok().map(|net| net.trunc())
}
