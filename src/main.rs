use anyhow::Result;
use clap::Parser;
use geoipmap::basemap;
use geoipmap::config::{Cli, RenderConfig};
use geoipmap::geolocate::{self, GeoDatabase};
use geoipmap::input;
use geoipmap::render;
use geoipmap::types::Extent;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = RenderConfig::load_or_default(cli.style.as_deref())?;

    // 1. Collect IPs
    let ips = input::collect_ips(cli.input.as_deref())?;

    // 2. Geolocate and aggregate
    let db = GeoDatabase::open(&cli.db)?;
    let located = geolocate::aggregate(&db, &ips);

    // 3. Render
    let basemap = basemap::load_basemap(&cli.basemap)?;
    let extent = cli.extents.unwrap_or(Extent::GLOBE);
    render::render_map(
        &located,
        &basemap,
        cli.plot_type,
        extent,
        cli.destination,
        &config,
        &cli.output,
    )?;

    Ok(())
}
