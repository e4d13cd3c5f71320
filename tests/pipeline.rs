//! End-to-end tests for the collect -> geolocate -> render pipeline, with the
//! database lookup replaced by a fixed table.

use geoipmap::basemap::Basemap;
use geoipmap::config::{PlotStyle, RenderConfig};
use geoipmap::geolocate::{self, Locate};
use geoipmap::render;
use geoipmap::types::{Destination, Extent, GeoPoint, LocatedIps};
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

fn small_basemap() -> Basemap {
    let geojson = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-130,30],[-110,30],[-110,45],[-130,45],[-130,30]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[135,-40],[150,-40],[150,-25],[135,-25],[135,-40]]]
                }
            }
        ]
    }"#
    .parse()
    .unwrap();
    Basemap::from_geojson(geojson).unwrap()
}

// Small canvas so the tests stay fast.
fn test_config() -> RenderConfig {
    RenderConfig {
        pixels_per_degree: 2.0,
        ..RenderConfig::default()
    }
}

fn located() -> LocatedIps {
    let ips: Vec<String> = ["8.8.8.8", "8.8.8.8", "1.1.1.1", "10.0.0.1", ""]
        .iter()
        .map(|s| s.to_string())
        .collect();
    geolocate::aggregate(&stub(), &ips)
}

#[test]
fn aggregation_matches_the_worked_example() {
    let located = located();

    // 3 resolved occurrences, 2 distinct IPs, unresolvables dropped
    assert_eq!(located.points.len(), 3);
    assert_eq!(located.by_ip.len(), 2);
    assert_eq!(located.by_ip["8.8.8.8"].len(), 2);
    assert_eq!(located.by_ip["1.1.1.1"].len(), 1);
    assert!(!located.by_ip.contains_key("10.0.0.1"));
    assert!(!located.by_ip.contains_key(""));
}

#[test]
fn scatter_pipeline_writes_an_image_of_the_expected_size() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("scatter.png");

    render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Scatter,
        Extent::GLOBE,
        None,
        &test_config(),
        &output,
    )
    .unwrap();

    let img = image::open(&output).unwrap().to_rgba8();
    assert_eq!(img.width(), 720);
    assert_eq!(img.height(), 360);
}

#[test]
fn bounded_extents_shrink_the_canvas() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("us.png");
    let extent: Extent = "-130/-110/30/45".parse().unwrap();

    render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Scatter,
        extent,
        None,
        &test_config(),
        &output,
    )
    .unwrap();

    let img = image::open(&output).unwrap().to_rgba8();
    assert_eq!(img.width(), 40);
    assert_eq!(img.height(), 30);
}

#[test]
fn every_non_connection_style_renders() {
    let dir = tempfile::tempdir().unwrap();
    for (name, style) in [
        ("scatter", PlotStyle::Scatter),
        ("bubble", PlotStyle::Bubble),
        ("heatmap", PlotStyle::Heatmap),
        ("hexbin", PlotStyle::Hexbin),
    ] {
        let output = dir.path().join(format!("{name}.png"));
        render::render_map(
            &located(),
            &small_basemap(),
            style,
            Extent::GLOBE,
            None,
            &test_config(),
            &output,
        )
        .unwrap();
        assert!(output.exists(), "{name} produced no file");
    }
}

#[test]
fn connectionmap_renders_with_a_destination() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("connections.png");
    let dest: Destination = "0.12/51.50".parse().unwrap();

    render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Connectionmap,
        Extent::GLOBE,
        Some(dest),
        &test_config(),
        &output,
    )
    .unwrap();

    assert!(output.exists());
}

#[test]
fn connectionmap_without_destination_fails_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("never.png");

    let result = render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Connectionmap,
        Extent::GLOBE,
        None,
        &test_config(),
        &output,
    );

    assert!(result.is_err());
    assert!(!output.exists());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("destination"));
}

#[test]
fn repeated_scatter_renders_are_pixel_identical() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.png");

    for output in [&first, &second] {
        render::render_map(
            &located(),
            &small_basemap(),
            PlotStyle::Scatter,
            Extent::GLOBE,
            None,
            &test_config(),
            output,
        )
        .unwrap();
    }

    let a = image::open(&first).unwrap().to_rgba8();
    let b = image::open(&second).unwrap().to_rgba8();
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn empty_input_still_renders_a_base_map() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.png");

    render::render_map(
        &LocatedIps::default(),
        &small_basemap(),
        PlotStyle::Hexbin,
        Extent::GLOBE,
        None,
        &test_config(),
        &output,
    )
    .unwrap();

    assert!(output.exists());
}

#[test]
fn scatter_marks_the_map_where_ips_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mark.png");
    let config = test_config();

    render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Scatter,
        Extent::GLOBE,
        None,
        &config,
        &output,
    )
    .unwrap();

    let img = image::open(&output).unwrap().to_rgba8();
    // 8.8.8.8 projects to ((lon+180), (90-lat)) * 2 px/degree
    let x = ((-122.1f64 + 180.0) * 2.0).round() as u32;
    let y = ((90.0f64 - 37.4) * 2.0).round() as u32;
    let px = img.get_pixel(x, y);
    // the semi-transparent crimson marker reads redder than any base color
    assert!(px.0[0] > px.0[2] + 30, "expected a red marker, got {:?}", px);
}

#[test]
fn points_outside_bounded_extents_clip_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.png");
    // extent far away from both stub coordinates
    let extent: Extent = "-10/10/-10/10".parse().unwrap();

    render::render_map(
        &located(),
        &small_basemap(),
        PlotStyle::Bubble,
        extent,
        None,
        &test_config(),
        &output,
    )
    .unwrap();

    assert!(output.exists());
}
