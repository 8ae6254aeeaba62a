//! Zones and the per-pass zone directory
//!
//! A zone whose name parses as a CIDR network (`10.0.0.0/8`) is a reverse
//! zone; every other zone is a forward zone. The [`ZoneDirectory`] is a
//! read-only snapshot built once per pass from the backend's zone listing.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::config::DomainFilter;
use crate::router;

/// Whether a zone maps names to addresses or addresses to names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    /// Authoritative zone for a domain suffix
    Forward,
    /// Reverse zone identified by a CIDR network
    Reverse,
}

/// An authoritative zone visible to this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Zone {
    name: String,
    network: Option<IpNetwork>,
}

impl Zone {
    /// Create a zone, deriving its kind from the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let network = parse_cidr(&name);
        Self { name, network }
    }

    /// Zone name as listed by the backend
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward or reverse
    pub fn kind(&self) -> ZoneKind {
        if self.network.is_some() {
            ZoneKind::Reverse
        } else {
            ZoneKind::Forward
        }
    }

    /// Whether this is a forward zone
    pub fn is_forward(&self) -> bool {
        self.kind() == ZoneKind::Forward
    }

    /// Whether this is a reverse zone
    pub fn is_reverse(&self) -> bool {
        self.kind() == ZoneKind::Reverse
    }

    /// Network of a reverse zone
    pub fn network(&self) -> Option<IpNetwork> {
        self.network
    }

    /// Whether a reverse zone's network contains `address`
    pub fn contains(&self, address: IpAddr) -> bool {
        self.network.is_some_and(|net| net.contains(address))
    }

    /// DNS name of a reverse zone (`2.0.192.in-addr.arpa`).
    ///
    /// IPv4 prefixes that do not fall on an octet boundary use the RFC 2317
    /// classless form (`0/25.2.0.192.in-addr.arpa`). IPv6 prefixes must fall
    /// on a nibble boundary. Forward zones return `None`.
    pub fn arpa_name(&self) -> Option<String> {
        match self.network? {
            IpNetwork::V4(net) => {
                let octets = net.network().octets();
                let prefix = usize::from(net.prefix());
                let full = prefix / 8;
                let mut labels: Vec<String> = octets[..full]
                    .iter()
                    .rev()
                    .map(|o| o.to_string())
                    .collect();
                if prefix % 8 != 0 {
                    labels.insert(0, format!("{}/{}", octets[full], prefix));
                }
                labels.push("in-addr.arpa".to_string());
                Some(labels.join("."))
            }
            IpNetwork::V6(net) => {
                let prefix = usize::from(net.prefix());
                if prefix % 4 != 0 {
                    return None;
                }
                let nibbles: Vec<u8> = net
                    .network()
                    .octets()
                    .iter()
                    .flat_map(|b| [b >> 4, b & 0x0f])
                    .collect();
                let mut labels: Vec<String> = nibbles[..prefix / 4]
                    .iter()
                    .rev()
                    .map(|n| format!("{:x}", n))
                    .collect();
                labels.push("ip6.arpa".to_string());
                Some(labels.join("."))
            }
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<String> for Zone {
    fn from(name: String) -> Self {
        Zone::new(name)
    }
}

impl From<&str> for Zone {
    fn from(name: &str) -> Self {
        Zone::new(name)
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.name
    }
}

/// Only names written as `address/prefix` count as reverse zones; a bare
/// address is a (strange) forward zone name.
fn parse_cidr(name: &str) -> Option<IpNetwork> {
    if !name.contains('/') {
        return None;
    }
    name.parse::<IpNetwork>().ok()
}

/// Zones visible to one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ZoneDirectory {
    zones: Vec<Zone>,
}

impl ZoneDirectory {
    /// Build a directory from an already filtered zone list
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// Build a directory, keeping only the zones the domain filter admits
    pub fn filtered<I>(zones: I, filter: &DomainFilter) -> Self
    where
        I: IntoIterator<Item = Zone>,
    {
        let zones = zones
            .into_iter()
            .filter(|zone| {
                let admitted = filter.matches_zone(zone);
                if !admitted {
                    tracing::debug!("Zone {} excluded by domain filter", zone);
                }
                admitted
            })
            .collect();
        Self { zones }
    }

    /// All zones, in listing order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Forward zones, in listing order
    pub fn forward(&self) -> Vec<Zone> {
        self.zones.iter().filter(|z| z.is_forward()).cloned().collect()
    }

    /// Reverse zones, in listing order
    pub fn reverse(&self) -> Vec<Zone> {
        self.zones.iter().filter(|z| z.is_reverse()).cloned().collect()
    }

    /// Number of zones
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether the directory has no zones
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Forward zone owning `name`
    pub fn find_forward_zone(&self, name: &str) -> Option<&Zone> {
        router::find_forward_zone(&self.zones, name)
    }

    /// Reverse zone owning `address`
    pub fn find_reverse_zone(&self, address: &str) -> Option<&Zone> {
        router::find_reverse_zone(&self.zones, address)
    }
}
