//! Network collector: interfaces, routes, DNS, firewall rules.
//!
//! Interfaces come from `getifaddrs` (loopback addresses excluded); routes
//! from `ip route` (Linux) or `netstat -nr` (macOS); DNS from
//! `/etc/resolv.conf`; firewall rules from `iptables -L -n` or
//! `pfctl -s rules`. Unreadable rule sources degrade to an empty list.

use super::runner::CommandRunner;
use crate::model::{DnsConfig, FirewallRule, NetworkInterface, NetworkState, Route};
use drift_common::{CollectError, Deadline};
use drift_config::NetworkConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Collect the network category.
pub fn collect_network(
    config: &NetworkConfig,
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (NetworkState, Option<CollectError>) {
    let mut state = NetworkState::default();

    if config.interfaces {
        state.interfaces = collect_interfaces();
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.routes {
        state.routes = collect_routes(runner, deadline);
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.dns {
        if let Ok(data) = std::fs::read_to_string("/etc/resolv.conf") {
            state.dns = parse_resolv_conf(&data);
        }
    }

    if config.firewall_rules {
        state.firewall_rules = collect_firewall_rules(runner, deadline);
    }

    debug!(
        interfaces = state.interfaces.len(),
        routes = state.routes.len(),
        "network state collected"
    );
    (state, None)
}

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Enumerate interfaces with their non-loopback addresses, MAC and MTU.
#[cfg(unix)]
fn collect_interfaces() -> BTreeMap<String, NetworkInterface> {
    use std::ffi::CStr;
    use std::net::{Ipv4Addr, Ipv6Addr};

    let mut interfaces: BTreeMap<String, NetworkInterface> = BTreeMap::new();

    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return interfaces;
    }

    let mut cursor = addrs;
    while !cursor.is_null() {
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        if ifa.ifa_name.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .to_string();

        let entry = interfaces
            .entry(name.clone())
            .or_insert_with(|| NetworkInterface {
                name: name.clone(),
                ..Default::default()
            });
        entry.is_up = ifa.ifa_flags & (libc::IFF_UP as u32) != 0;

        if ifa.ifa_addr.is_null() {
            continue;
        }
        let family = unsafe { (*ifa.ifa_addr).sa_family } as i32;

        match family {
            libc::AF_INET => {
                let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                if !ip.is_loopback() {
                    entry.ip_addresses.push(ip.to_string());
                }
            }
            libc::AF_INET6 => {
                let sin6 = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in6) };
                let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                if !ip.is_loopback() {
                    entry.ip_addresses.push(ip.to_string());
                }
            }
            #[cfg(target_os = "linux")]
            libc::AF_PACKET => {
                let sll = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_ll) };
                let len = (sll.sll_halen as usize).min(sll.sll_addr.len());
                if len > 0 {
                    entry.mac_address = format_mac(&sll.sll_addr[..len]);
                }
            }
            #[cfg(target_os = "macos")]
            libc::AF_LINK => {
                let sdl = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_dl) };
                let nlen = sdl.sdl_nlen as usize;
                let alen = sdl.sdl_alen as usize;
                if alen > 0 && nlen + alen <= sdl.sdl_data.len() {
                    let bytes: Vec<u8> = sdl.sdl_data[nlen..nlen + alen]
                        .iter()
                        .map(|&b| b as u8)
                        .collect();
                    entry.mac_address = format_mac(&bytes);
                }
                if !ifa.ifa_data.is_null() {
                    let data = unsafe { &*(ifa.ifa_data as *const libc::if_data) };
                    entry.mtu = data.ifi_mtu;
                }
            }
            _ => {}
        }
    }

    unsafe { libc::freeifaddrs(addrs) };

    #[cfg(target_os = "linux")]
    for (name, entry) in interfaces.iter_mut() {
        if let Ok(raw) = std::fs::read_to_string(format!("/sys/class/net/{name}/mtu")) {
            if let Ok(mtu) = raw.trim().parse::<u32>() {
                entry.mtu = mtu;
            }
        }
    }

    interfaces
}

#[cfg(not(unix))]
fn collect_interfaces() -> BTreeMap<String, NetworkInterface> {
    BTreeMap::new()
}

#[cfg(unix)]
fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

fn collect_routes(runner: &CommandRunner, deadline: &Deadline) -> Vec<Route> {
    if cfg!(target_os = "macos") {
        match runner.stdout("netstat", &["-nr"], deadline) {
            Some(output) => parse_darwin_routes(&output),
            None => Vec::new(),
        }
    } else if cfg!(target_os = "linux") {
        match runner.stdout("ip", &["route"], deadline) {
            Some(output) => parse_linux_routes(&output),
            None => Vec::new(),
        }
    } else {
        Vec::new()
    }
}

/// Parse `ip route` rows: `DEST [via GW] dev IF [metric N] ...`.
/// The default route is reported separately by the kernel and skipped.
fn parse_linux_routes(output: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("default") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }

        let mut route = Route {
            destination: fields[0].to_string(),
            ..Default::default()
        };
        let mut iter = fields.iter().peekable();
        while let Some(field) = iter.next() {
            match *field {
                "via" => {
                    if let Some(gw) = iter.next() {
                        route.gateway = gw.to_string();
                    }
                }
                "dev" => {
                    if let Some(dev) = iter.next() {
                        route.interface = dev.to_string();
                    }
                }
                "metric" => {
                    if let Some(metric) = iter.next() {
                        route.metric = metric.parse().unwrap_or(0);
                    }
                }
                _ => {}
            }
        }
        routes.push(route);
    }
    routes
}

/// Parse `netstat -nr` rows, skipping section and column headers.
fn parse_darwin_routes(output: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    for line in output.lines().skip(1) {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("Routing")
            || line.starts_with("Internet")
            || line.starts_with("Destination")
        {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        routes.push(Route {
            destination: fields[0].to_string(),
            gateway: fields[1].to_string(),
            interface: fields[fields.len() - 1].to_string(),
            metric: 0,
        });
    }
    routes
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

/// Parse `nameserver` and `search` lines from resolv.conf, in file order.
fn parse_resolv_conf(data: &str) -> DnsConfig {
    let mut dns = DnsConfig::default();
    for line in data.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("nameserver") {
            if let Some(server) = rest.split_whitespace().next() {
                dns.nameservers.push(server.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("search") {
            dns.search_domains
                .extend(rest.split_whitespace().map(|s| s.to_string()));
        }
    }
    dns
}

// ---------------------------------------------------------------------------
// Firewall
// ---------------------------------------------------------------------------

fn collect_firewall_rules(runner: &CommandRunner, deadline: &Deadline) -> Vec<FirewallRule> {
    if cfg!(target_os = "macos") {
        match runner.stdout("pfctl", &["-s", "rules"], deadline) {
            Some(output) => parse_pfctl_rules(&output),
            None => Vec::new(),
        }
    } else if cfg!(target_os = "linux") {
        match runner.stdout("iptables", &["-L", "-n"], deadline) {
            Some(output) => parse_iptables_rules(&output),
            None => Vec::new(),
        }
    } else {
        Vec::new()
    }
}

/// Parse `iptables -L -n`, tracking the current chain across sections.
fn parse_iptables_rules(output: &str) -> Vec<FirewallRule> {
    let mut rules = Vec::new();
    let mut chain = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("target") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Chain ") {
            chain = rest.split_whitespace().next().unwrap_or("").to_string();
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }
        rules.push(FirewallRule {
            chain: chain.clone(),
            rule: line.to_string(),
            action: fields[0].to_string(),
            protocol: fields[1].to_string(),
            source: fields[3].to_string(),
            destination: fields[4].to_string(),
        });
    }
    rules
}

/// Parse `pfctl -s rules`: every non-comment line is one raw rule.
fn parse_pfctl_rules(output: &str) -> Vec<FirewallRule> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| FirewallRule {
            rule: line.to_string(),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolv_conf() {
        let data = "\
# generated by resolvconf
nameserver 10.0.0.2
nameserver 10.0.0.3
search corp.example.com internal.example.com
options timeout:1
";
        let dns = parse_resolv_conf(data);
        assert_eq!(dns.nameservers, vec!["10.0.0.2", "10.0.0.3"]);
        assert_eq!(
            dns.search_domains,
            vec!["corp.example.com", "internal.example.com"]
        );
    }

    #[test]
    fn test_parse_linux_routes() {
        let output = "\
default via 10.0.0.1 dev eth0 proto dhcp metric 100
10.0.0.0/24 dev eth0 proto kernel scope link src 10.0.0.5 metric 100
172.17.0.0/16 via 10.0.0.254 dev eth1 metric 50
";
        let routes = parse_linux_routes(output);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].destination, "10.0.0.0/24");
        assert_eq!(routes[0].interface, "eth0");
        assert_eq!(routes[0].metric, 100);
        assert_eq!(routes[1].gateway, "10.0.0.254");
        assert_eq!(routes[1].metric, 50);
    }

    #[test]
    fn test_parse_darwin_routes() {
        let output = "\
Routing tables

Internet:
Destination        Gateway            Flags           Netif Expire
default            192.168.1.1        UGScg             en0
192.168.1          link#13            UCS               en0
";
        let routes = parse_darwin_routes(output);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].destination, "default");
        assert_eq!(routes[0].gateway, "192.168.1.1");
        assert_eq!(routes[0].interface, "en0");
    }

    #[test]
    fn test_parse_iptables_rules() {
        let output = "\
Chain INPUT (policy ACCEPT)
target     prot opt source               destination
ACCEPT     tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:22
DROP       all  --  10.1.2.3             0.0.0.0/0

Chain FORWARD (policy DROP)
target     prot opt source               destination
";
        let rules = parse_iptables_rules(output);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].chain, "INPUT");
        assert_eq!(rules[0].action, "ACCEPT");
        assert_eq!(rules[0].protocol, "tcp");
        assert_eq!(rules[0].source, "0.0.0.0/0");
        assert_eq!(rules[1].action, "DROP");
        assert_eq!(rules[1].source, "10.1.2.3");
    }

    #[test]
    fn test_parse_pfctl_rules() {
        let output = "# comment\nblock drop in all\npass out all flags S/SA keep state\n";
        let rules = parse_pfctl_rules(output);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].rule, "block drop in all");
        assert!(rules[0].chain.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_interfaces_excludes_loopback_ips() {
        let interfaces = collect_interfaces();
        for iface in interfaces.values() {
            for ip in &iface.ip_addresses {
                assert_ne!(ip, "127.0.0.1");
                assert_ne!(ip, "::1");
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_format_mac() {
        assert_eq!(
            format_mac(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
            "de:ad:be:ef:00:01"
        );
    }
}
