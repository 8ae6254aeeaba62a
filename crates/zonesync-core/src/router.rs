//! Zone ownership lookups
//!
//! Both lookups return `None` rather than an error when nothing matches;
//! callers decide whether an unmatched change is dropped or escalated.

use std::net::IpAddr;

use crate::zone::Zone;

/// Find the forward zone that owns `name`.
///
/// A zone matches when `name` equals the zone name or ends with
/// `"." + zone`. Among matches the longest zone name (the most specific)
/// wins. Comparison ignores ASCII case and a trailing root dot.
pub fn find_forward_zone<'a>(zones: &'a [Zone], name: &str) -> Option<&'a Zone> {
    let name = normalize(name);
    let mut result: Option<&Zone> = None;

    for zone in zones.iter().filter(|z| z.is_forward()) {
        let zone_name = normalize(zone.name());
        if zone_name.is_empty() {
            continue;
        }

        let owns = name == zone_name
            || name
                .strip_suffix(zone_name.as_str())
                .is_some_and(|head| head.ends_with('.'));

        if owns && result.is_none_or(|best| zone.name().len() > best.name().len()) {
            result = Some(zone);
        }
    }

    result
}

/// Find the reverse zone whose network contains `address`.
///
/// Among containing networks the one with the largest prefix length wins.
/// Equal prefixes resolve to the last one listed. An `address` that is not
/// an IP literal matches nothing.
pub fn find_reverse_zone<'a>(zones: &'a [Zone], address: &str) -> Option<&'a Zone> {
    let ip: IpAddr = match address.trim().parse() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!("Target {} is not an IP address: {}", address, e);
            return None;
        }
    };

    let mut result: Option<(&Zone, u8)> = None;

    for zone in zones {
        let Some(network) = zone.network() else {
            continue;
        };
        if !network.contains(ip) {
            continue;
        }

        let prefix = network.prefix();
        if result.is_none_or(|(_, best)| prefix >= best) {
            result = Some((zone, prefix));
        }
    }

    result.map(|(zone, _)| zone)
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(names: &[&str]) -> Vec<Zone> {
        names.iter().map(|n| Zone::new(*n)).collect()
    }

    #[test]
    fn test_most_specific_forward_zone_wins() {
        let zones = zones(&["example.com", "a.example.com"]);

        let zone = find_forward_zone(&zones, "host.a.example.com").unwrap();
        assert_eq!(zone.name(), "a.example.com");

        let zone = find_forward_zone(&zones, "host.b.example.com").unwrap();
        assert_eq!(zone.name(), "example.com");
    }

    #[test]
    fn test_forward_zone_order_does_not_matter() {
        let zones = zones(&["a.example.com", "example.com"]);
        let zone = find_forward_zone(&zones, "host.a.example.com").unwrap();
        assert_eq!(zone.name(), "a.example.com");
    }

    #[test]
    fn test_apex_and_case() {
        let zones = zones(&["Example.COM"]);
        assert!(find_forward_zone(&zones, "example.com").is_some());
        assert!(find_forward_zone(&zones, "WWW.example.com.").is_some());
    }

    #[test]
    fn test_suffix_must_be_label_aligned() {
        let zones = zones(&["example.com"]);
        assert!(find_forward_zone(&zones, "badexample.com").is_none());
        assert!(find_forward_zone(&zones, "example.org").is_none());
    }

    #[test]
    fn test_reverse_zones_are_not_forward_candidates() {
        let zones = zones(&["10.0.0.0/8"]);
        assert!(find_forward_zone(&zones, "10.0.0.0/8").is_none());
    }

    #[test]
    fn test_largest_prefix_wins() {
        let zones = zones(&["10.0.0.0/8", "10.1.0.0/16", "example.com"]);

        let zone = find_reverse_zone(&zones, "10.1.2.3").unwrap();
        assert_eq!(zone.name(), "10.1.0.0/16");

        let zone = find_reverse_zone(&zones, "10.2.0.1").unwrap();
        assert_eq!(zone.name(), "10.0.0.0/8");
    }

    #[test]
    fn test_equal_prefix_last_seen_wins() {
        let zones = zones(&["10.1.0.0/16", "10.1.0.0/16"]);
        let zone = find_reverse_zone(&zones, "10.1.0.9").unwrap();
        assert!(std::ptr::eq(zone, &zones[1]));
    }

    #[test]
    fn test_reverse_lookup_misses() {
        let zones = zones(&["10.0.0.0/8", "2001:db8::/32"]);
        assert!(find_reverse_zone(&zones, "192.168.1.1").is_none());
        assert!(find_reverse_zone(&zones, "host.example.com").is_none());
        assert_eq!(
            find_reverse_zone(&zones, "2001:db8::1").unwrap().name(),
            "2001:db8::/32"
        );
    }
}
