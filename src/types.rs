use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Everything the lookup stage produced: the flat point sequence in input
/// order, and per-IP occurrence lists for the styles that size or group
/// markers by IP.
#[derive(Debug, Default)]
pub struct LocatedIps {
    pub points: Vec<GeoPoint>,
    // Map<IP, every resolved occurrence of that IP>
    pub by_ip: HashMap<String, Vec<GeoPoint>>,
}

/// Plot bounding box in decimal degrees, parsed from `west/east/south/north`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Extent {
    pub const GLOBE: Extent = Extent {
        west: -180.0,
        east: 180.0,
        south: -90.0,
        north: 90.0,
    };

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

impl FromStr for Extent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split('/')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("extents must be numeric west/east/south/north: {e}"))?;
        if parts.len() != 4 {
            return Err(format!(
                "extents must have exactly 4 fields (west/east/south/north), got {}",
                parts.len()
            ));
        }
        let extent = Extent {
            west: parts[0],
            east: parts[1],
            south: parts[2],
            north: parts[3],
        };
        if extent.west < -180.0 || extent.east > 180.0 || extent.south < -90.0 || extent.north > 90.0
        {
            return Err("extents outside world bounds (-180/180/-90/90)".to_string());
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err("extents must satisfy west < east and south < north".to_string());
        }
        Ok(extent)
    }
}

/// Fixed endpoint for connectionmap arcs, parsed from `lon/lat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub lon: f64,
    pub lat: f64,
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split('/')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("destination must be numeric lon/lat: {e}"))?;
        if parts.len() != 2 {
            return Err(format!(
                "destination must have exactly 2 fields (lon/lat), got {}",
                parts.len()
            ));
        }
        let dest = Destination {
            lon: parts[0],
            lat: parts[1],
        };
        if dest.lon < -180.0 || dest.lon > 180.0 || dest.lat < -90.0 || dest.lat > 90.0 {
            return Err("destination outside world bounds".to_string());
        }
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_parses_west_east_south_north() {
        let e: Extent = "-10/30/35/70".parse().unwrap();
        assert_eq!(
            e,
            Extent {
                west: -10.0,
                east: 30.0,
                south: 35.0,
                north: 70.0
            }
        );
        assert_eq!(e.width(), 40.0);
        assert_eq!(e.height(), 35.0);
    }

    #[test]
    fn extent_rejects_wrong_field_count() {
        assert!("1/2/3".parse::<Extent>().is_err());
        assert!("1/2/3/4/5".parse::<Extent>().is_err());
    }

    #[test]
    fn extent_rejects_non_numeric() {
        assert!("a/b/c/d".parse::<Extent>().is_err());
    }

    #[test]
    fn extent_rejects_inverted_corners() {
        assert!("30/-10/35/70".parse::<Extent>().is_err());
        assert!("-10/30/70/35".parse::<Extent>().is_err());
    }

    #[test]
    fn extent_rejects_out_of_world_bounds() {
        assert!("-200/30/35/70".parse::<Extent>().is_err());
        assert!("-10/30/35/95".parse::<Extent>().is_err());
    }

    #[test]
    fn globe_extent_spans_whole_world() {
        assert_eq!(Extent::GLOBE.width(), 360.0);
        assert_eq!(Extent::GLOBE.height(), 180.0);
    }

    #[test]
    fn destination_parses_lon_lat() {
        let d: Destination = "0.12/51.50".parse().unwrap();
        assert_eq!(d.lon, 0.12);
        assert_eq!(d.lat, 51.50);
    }

    #[test]
    fn destination_rejects_bad_input() {
        assert!("0.12".parse::<Destination>().is_err());
        assert!("x/y".parse::<Destination>().is_err());
        assert!("190/0".parse::<Destination>().is_err());
        assert!("0/91".parse::<Destination>().is_err());
    }
}
