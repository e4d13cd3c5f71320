use crate::types::{Destination, Extent};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(author, version, about = "Visualize IP addresses on a world map")]
pub struct Cli {
    /// Input file with one IP per line. Reads standard input when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Path to save the rendered image (e.g. /tmp/output.png)
    #[arg(short, long, value_name = "FILE", default_value = "output.png")]
    pub output: PathBuf,

    /// Full path to a MaxMind GeoLite2-City.mmdb database file
    /// (download from https://dev.maxmind.com/geoip/geoip2/geolite2/)
    #[arg(long, value_name = "FILE")]
    pub db: PathBuf,

    /// GeoJSON file with land/country polygons for the base map
    /// (e.g. Natural Earth ne_110m_admin_0_countries)
    #[arg(
        long,
        value_name = "FILE",
        default_value = "assets/ne_110m_admin_0_countries.geojson"
    )]
    pub basemap: PathBuf,

    /// Extents for the plot as west/east/south/north. Defaults to the globe.
    #[arg(short, long, value_name = "W/E/S/N", allow_hyphen_values = true)]
    pub extents: Option<Extent>,

    /// Plot type
    #[arg(short = 't', long = "type", value_enum, default_value_t = PlotStyle::Scatter)]
    pub plot_type: PlotStyle,

    /// Destination for connectionmap arcs as lon/lat (e.g. -d 0.12/51.50)
    #[arg(short, long, value_name = "LON/LAT", allow_hyphen_values = true)]
    pub destination: Option<Destination>,

    /// Optional TOML file overriding colors and marker sizing
    #[arg(long, value_name = "FILE")]
    pub style: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlotStyle {
    Scatter,
    Bubble,
    Connectionmap,
    Heatmap,
    Hexbin,
}

/// Rendering knobs with built-in defaults. Every field can be overridden from
/// a TOML file passed with --style.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas resolution. 20 px/degree gives a 7200x3600 image for the globe.
    pub pixels_per_degree: f64,
    pub sea_color: String,
    pub land_color: String,
    pub border_color: String,
    pub scatter: ScatterStyle,
    pub bubble: BubbleStyle,
    pub connection: ConnectionStyle,
    pub heatmap: HeatmapStyle,
    pub hexbin: HexbinStyle,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScatterStyle {
    pub color: String,
    pub radius: f64,
    pub alpha: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BubbleStyle {
    pub color: String,
    pub edge_color: String,
    pub radius: f64,
    pub alpha: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionStyle {
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeatmapStyle {
    pub color: String,
    pub alpha: f64,
    /// Magnitude contributed by each occurrence of an IP.
    pub base_size: f64,
    /// Magnitude ceiling, keeps busy IPs from swallowing the map.
    pub max_magnitude: f64,
    /// Pixel radius per unit of magnitude.
    pub marker_scale: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HexbinStyle {
    /// Number of hexagons across the canvas width.
    pub gridsize: u32,
    /// Bins with fewer points than this are not drawn.
    pub min_count: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            pixels_per_degree: 20.0,
            sea_color: "#FFFFFF".to_string(),
            land_color: "#DEDACF".to_string(),
            border_color: "#000000".to_string(),
            scatter: ScatterStyle::default(),
            bubble: BubbleStyle::default(),
            connection: ConnectionStyle::default(),
            heatmap: HeatmapStyle::default(),
            hexbin: HexbinStyle::default(),
        }
    }
}

impl Default for ScatterStyle {
    fn default() -> Self {
        ScatterStyle {
            color: "#CA002A".to_string(),
            radius: 8.0,
            alpha: 0.5,
        }
    }
}

impl Default for BubbleStyle {
    fn default() -> Self {
        BubbleStyle {
            color: "#FFA500".to_string(),
            edge_color: "#000000".to_string(),
            radius: 30.0,
            alpha: 0.6,
        }
    }
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        ConnectionStyle {
            color: "#CA002A".to_string(),
        }
    }
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        HeatmapStyle {
            color: "#FF0000".to_string(),
            alpha: 0.7,
            base_size: 0.5,
            max_magnitude: 5.0,
            marker_scale: 8.0,
        }
    }
}

impl Default for HexbinStyle {
    fn default() -> Self {
        HexbinStyle {
            gridsize: 40,
            min_count: 1,
        }
    }
}

impl RenderConfig {
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read style file: {:?}", path))?;
                let config: RenderConfig = toml::from_str(&content)
                    .with_context(|| "Failed to parse style TOML")?;
                Ok(config)
            }
            None => Ok(RenderConfig::default()),
        }
    }
}
