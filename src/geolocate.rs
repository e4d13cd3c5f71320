//! IP address geolocation against a local MaxMind GeoLite2-City database.

use crate::types::{GeoPoint, LocatedIps};
use anyhow::{Context, Result};
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{info, warn};

/// Lookup seam. The real implementation reads a GeoLite2 database; tests
/// substitute a fixed table.
pub trait Locate {
    /// Resolves one raw input token to a coordinate. Any failure (malformed
    /// token, no record, record without coordinates) collapses to `None`.
    fn locate(&self, ip: &str) -> Option<GeoPoint>;
}

pub struct GeoDatabase {
    reader: Reader<Vec<u8>>,
}

impl GeoDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("Failed to open GeoLite2 database: {:?}", path))?;
        Ok(GeoDatabase { reader })
    }
}

impl Locate for GeoDatabase {
    fn locate(&self, ip: &str) -> Option<GeoPoint> {
        let addr: IpAddr = ip.parse().ok()?;
        let result = self.reader.lookup(addr).ok()?;
        let city: geoip2::City = result.decode().ok()??;
        match (city.location.latitude, city.location.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        }
    }
}

/// Resolves every IP in input order and accumulates the results.
///
/// Successes land in the flat point sequence and in the per-IP occurrence
/// list. Failures are logged and skipped; they never abort the batch.
pub fn aggregate<L: Locate>(db: &L, ips: &[String]) -> LocatedIps {
    info!("Processing {} IPs...", ips.len());

    let mut located = LocatedIps::default();
    for ip in ips {
        match db.locate(ip) {
            Some(point) => {
                located.points.push(point);
                located.by_ip.entry(ip.clone()).or_default().push(point);
            }
            None => warn!("Unable to locate or process IP: {}", ip),
        }
    }
    located
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StubLocate(HashMap<&'static str, GeoPoint>);

    impl Locate for StubLocate {
        fn locate(&self, ip: &str) -> Option<GeoPoint> {
            self.0.get(ip).copied()
        }
    }

    fn stub() -> StubLocate {
        let mut table = HashMap::new();
        table.insert(
            "8.8.8.8",
            GeoPoint {
                lat: 37.4,
                lon: -122.1,
            },
        );
        table.insert(
            "1.1.1.1",
            GeoPoint {
                lat: -33.4,
                lon: 143.2,
            },
        );
        StubLocate(table)
    }

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicates_count_separately_in_both_structures() {
        let located = aggregate(&stub(), &ips(&["8.8.8.8", "8.8.8.8", "1.1.1.1"]));

        assert_eq!(located.points.len(), 3);
        assert_eq!(located.by_ip.len(), 2);
        assert_eq!(located.by_ip["8.8.8.8"].len(), 2);
        assert_eq!(located.by_ip["1.1.1.1"].len(), 1);
    }

    #[test]
    fn point_sequence_preserves_input_order() {
        let located = aggregate(&stub(), &ips(&["1.1.1.1", "8.8.8.8"]));
        assert_eq!(located.points[0].lat, -33.4);
        assert_eq!(located.points[1].lat, 37.4);
    }

    #[test]
    fn unresolved_ips_are_dropped_entirely() {
        let located = aggregate(&stub(), &ips(&["8.8.8.8", "10.0.0.1", "not-an-ip", ""]));

        assert_eq!(located.points.len(), 1);
        assert_eq!(located.by_ip.len(), 1);
        assert!(!located.by_ip.contains_key("10.0.0.1"));
        assert!(!located.by_ip.contains_key("not-an-ip"));
        assert!(!located.by_ip.contains_key(""));
    }

    #[test]
    fn empty_input_yields_empty_aggregates() {
        let located = aggregate(&stub(), &[]);
        assert!(located.points.is_empty());
        assert!(located.by_ip.is_empty());
    }

    #[test]
    fn occurrence_lists_are_never_empty() {
        let located = aggregate(&stub(), &ips(&["8.8.8.8", "10.0.0.1"]));
        for occurrences in located.by_ip.values() {
            assert!(!occurrences.is_empty());
        }
    }

    #[test]
    fn missing_database_file_is_an_error() {
        let result = GeoDatabase::open(Path::new("/no/such/GeoLite2-City.mmdb"));
        assert!(result.is_err());
    }
}
