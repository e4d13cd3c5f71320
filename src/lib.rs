//! Batch IP-to-map visualization: read IPs, geolocate them against a local
//! GeoLite2 database, and render the points on a world map image.

pub mod basemap;
pub mod config;
pub mod geolocate;
pub mod input;
pub mod render;
pub mod types;
