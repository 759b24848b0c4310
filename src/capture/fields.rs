//! Parsing of `tshark -T fields` output into protocol and port summaries.
//!
//! Expected line shape, one per frame:
//!
//! ```text
//! eth:ethertype:ip:udp:dns|53,40211|
//! eth:ethertype:ip:tcp|||
//! eth:ethertype:ip:tcp:http|,|80,51234
//! ```
//!
//! Fields are `frame.protocols`, `udp.port`, `tcp.port`. Port fields hold
//! `src,dst` pairs; tunnelled frames may repeat the pair.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

/// Port category name to unique ports in first-seen order.
pub type Ports = BTreeMap<String, Vec<u16>>;

/// Protocols and ports seen in a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSummary {
    /// Unique protocol tags in first-seen order.
    pub protocols: Vec<String>,
    /// Unique ports per category.
    pub ports: Ports,
}

/// Port category keys as stored on records.
pub const UDP_SRC_PORTS: &str = "udpSrcPorts";
/// See [`UDP_SRC_PORTS`].
pub const UDP_DST_PORTS: &str = "udpDstPorts";
/// See [`UDP_SRC_PORTS`].
pub const TCP_SRC_PORTS: &str = "tcpSrcPorts";
/// See [`UDP_SRC_PORTS`].
pub const TCP_DST_PORTS: &str = "tcpDstPorts";

#[derive(Default)]
struct UniqueList<T> {
    seen: HashSet<T>,
    items: Vec<T>,
}

impl<T: Clone + Eq + std::hash::Hash> UniqueList<T> {
    fn push(&mut self, item: T) {
        if self.seen.insert(item.clone()) {
            self.items.push(item);
        }
    }
}

/// Parses the full stdout of the fields query.
#[must_use]
pub fn parse_field_lines(output: &str) -> TrafficSummary {
    let mut protocols: UniqueList<String> = UniqueList::default();
    let mut ports: BTreeMap<&'static str, UniqueList<u16>> = BTreeMap::new();

    for line in output.lines() {
        let mut fields = line.trim_end_matches('\r').split('|');
        let frame_protocols = fields.next().unwrap_or_default();
        let udp = fields.next().unwrap_or_default();
        let tcp = fields.next().unwrap_or_default();

        for protocol in frame_protocols.split(':').filter(|p| !p.is_empty()) {
            protocols.push(protocol.to_string());
        }
        collect_ports(udp, UDP_SRC_PORTS, UDP_DST_PORTS, &mut ports);
        collect_ports(tcp, TCP_SRC_PORTS, TCP_DST_PORTS, &mut ports);
    }

    TrafficSummary {
        protocols: protocols.items,
        ports: ports
            .into_iter()
            .map(|(key, list)| (key.to_string(), list.items))
            .collect(),
    }
}

fn collect_ports(
    field: &str,
    src_key: &'static str,
    dst_key: &'static str,
    ports: &mut BTreeMap<&'static str, UniqueList<u16>>,
) {
    for (index, raw) in field.split(',').enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(port) = raw.parse::<u16>() else {
            trace!(value = raw, "ignoring unparsable port");
            continue;
        };
        let key = if index % 2 == 0 { src_key } else { dst_key };
        ports.entry(key).or_default().push(port);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protocols_unique_in_first_seen_order() {
        let output = "eth:ethertype:ip:udp:dns|53,40211|\neth:ethertype:ip:tcp:http||80,51234\neth:ethertype:ip:udp:dns|40211,53|\n";
        let summary = parse_field_lines(output);
        assert_eq!(
            summary.protocols,
            vec!["eth", "ethertype", "ip", "udp", "dns", "tcp", "http"]
        );
    }

    #[test]
    fn test_ports_split_by_direction_and_transport() {
        let output = "eth:ip:udp|53,40211|\neth:ip:tcp||80,51234\neth:ip:udp|40211,53|\n";
        let summary = parse_field_lines(output);
        assert_eq!(summary.ports[UDP_SRC_PORTS], vec![53, 40211]);
        assert_eq!(summary.ports[UDP_DST_PORTS], vec![40211, 53]);
        assert_eq!(summary.ports[TCP_SRC_PORTS], vec![80]);
        assert_eq!(summary.ports[TCP_DST_PORTS], vec![51234]);
    }

    #[test]
    fn test_missing_categories_are_omitted() {
        let summary = parse_field_lines("eth:arp||\n");
        assert_eq!(summary.protocols, vec!["eth", "arp"]);
        assert!(summary.ports.is_empty());
    }

    #[test]
    fn test_tunnelled_pairs_and_bad_ports() {
        let summary = parse_field_lines("eth:ip:udp:ip:udp|4789,1000,53,2000|\neth:ip:tcp||x,99999\n");
        assert_eq!(summary.ports[UDP_SRC_PORTS], vec![4789, 53]);
        assert_eq!(summary.ports[UDP_DST_PORTS], vec![1000, 2000]);
        assert!(!summary.ports.contains_key(TCP_SRC_PORTS));
        assert!(!summary.ports.contains_key(TCP_DST_PORTS));
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(parse_field_lines(""), TrafficSummary::default());
    }
}
