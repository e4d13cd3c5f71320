use crate::basemap::Basemap;
use crate::config::{
    BubbleStyle, ConnectionStyle, HeatmapStyle, HexbinStyle, PlotStyle, RenderConfig, ScatterStyle,
};
use crate::types::{Destination, Extent, GeoPoint, LocatedIps};
use anyhow::{bail, Context, Result};
use geo::algorithm::haversine_intermediate::HaversineIntermediate;
use geo::{LineString, Point, Polygon};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

// Segments per great-circle arc.
const ARC_SAMPLES: u32 = 64;
// Stroke width of the bubble edge ring, in pixels.
const BUBBLE_EDGE_WIDTH: f64 = 2.0;

/// Equirectangular pixel canvas over the plot extent.
pub struct Canvas {
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(extent: Extent, pixels_per_degree: f64) -> Canvas {
        let width = (extent.width() * pixels_per_degree).round().max(1.0) as u32;
        let height = (extent.height() * pixels_per_degree).round().max(1.0) as u32;
        Canvas {
            extent,
            width,
            height,
        }
    }

    /// Degrees to (sub)pixel coordinates, x east, y down.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon - self.extent.west) / self.extent.width() * self.width as f64;
        let y = (self.extent.north - lat) / self.extent.height() * self.height as f64;
        (x, y)
    }

    fn contains(&self, (x, y): (f64, f64)) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.width as f64 && y <= self.height as f64
    }
}

/// Draws the base map plus the selected overlay and writes one image.
///
/// The connectionmap precondition is checked before any drawing, so a missing
/// destination never leaves a partial file behind.
pub fn render_map(
    located: &LocatedIps,
    basemap: &Basemap,
    style: PlotStyle,
    extent: Extent,
    destination: Option<Destination>,
    config: &RenderConfig,
    output: &Path,
) -> Result<()> {
    let destination = validate_destination(style, destination)?;

    info!("Generating map and saving it to {:?}", output);
    let canvas = Canvas::new(extent, config.pixels_per_degree);
    let mut img = RgbaImage::from_pixel(canvas.width, canvas.height, hex_to_rgba(&config.sea_color));

    draw_basemap(&mut img, &canvas, basemap, config);

    match style {
        PlotStyle::Scatter => draw_scatter(&mut img, &canvas, &located.points, &config.scatter),
        PlotStyle::Bubble => draw_bubbles(&mut img, &canvas, located, &config.bubble),
        PlotStyle::Connectionmap => {
            if let Some(dest) = destination {
                draw_connections(&mut img, &canvas, located, dest, &config.connection);
            }
        }
        PlotStyle::Heatmap => draw_heatmap(&mut img, &canvas, located, &config.heatmap),
        PlotStyle::Hexbin => draw_hexbin(&mut img, &canvas, &located.points, &config.hexbin),
    }

    img.save(output)
        .with_context(|| format!("Failed to write image to {:?}", output))?;
    Ok(())
}

fn validate_destination(
    style: PlotStyle,
    destination: Option<Destination>,
) -> Result<Option<Destination>> {
    match (style, destination) {
        (PlotStyle::Connectionmap, None) => bail!(
            "No destination specified. Please specify -d/--destination with longitude and \
             latitude as input (i.e. -d 0.12/51.50)"
        ),
        (_, destination) => Ok(destination),
    }
}

// Base map: land fill first, then every ring stroked for coastlines and
// country borders.
fn draw_basemap(img: &mut RgbaImage, canvas: &Canvas, basemap: &Basemap, config: &RenderConfig) {
    let land = hex_to_rgba(&config.land_color);
    let border = hex_to_rgba(&config.border_color);

    let visible = basemap.polygons_in(&canvas.extent);
    for &polygon in &visible {
        let rings = project_rings(canvas, polygon);
        fill_rings(img, &rings, land, 1.0);
    }
    for &polygon in &visible {
        for ring in project_rings(canvas, polygon) {
            stroke_ring(img, &ring, border);
        }
    }
}

fn project_rings(canvas: &Canvas, polygon: &Polygon<f64>) -> Vec<Vec<(f64, f64)>> {
    let mut rings = vec![project_ring(canvas, polygon.exterior())];
    for hole in polygon.interiors() {
        rings.push(project_ring(canvas, hole));
    }
    rings
}

fn project_ring(canvas: &Canvas, ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.coords().map(|c| canvas.project(c.x, c.y)).collect()
}

fn draw_scatter(img: &mut RgbaImage, canvas: &Canvas, points: &[GeoPoint], style: &ScatterStyle) {
    let color = hex_to_rgba(&style.color);
    for point in points {
        let (x, y) = canvas.project(point.lon, point.lat);
        draw_disc(img, x, y, style.radius, color, style.alpha);
    }
}

// One uniform marker per distinct IP, so repeated occurrences of the same
// address never stack bubbles.
fn draw_bubbles(img: &mut RgbaImage, canvas: &Canvas, located: &LocatedIps, style: &BubbleStyle) {
    let fill = hex_to_rgba(&style.color);
    let edge = hex_to_rgba(&style.edge_color);
    for occurrences in located.by_ip.values() {
        let Some(first) = occurrences.first() else {
            continue;
        };
        let (x, y) = canvas.project(first.lon, first.lat);
        draw_disc(img, x, y, style.radius, fill, style.alpha);
        draw_ring(img, x, y, style.radius, BUBBLE_EDGE_WIDTH, edge);
    }
}

fn draw_connections(
    img: &mut RgbaImage,
    canvas: &Canvas,
    located: &LocatedIps,
    dest: Destination,
    style: &ConnectionStyle,
) {
    let color = hex_to_rgba(&style.color);
    let to = Point::new(dest.lon, dest.lat);

    for occurrences in located.by_ip.values() {
        let Some(first) = occurrences.first() else {
            continue;
        };
        let from = Point::new(first.lon, first.lat);
        let mut prev: Option<(f64, f64)> = None;
        for arc_point in arc_points(from, to) {
            let (x, y) = canvas.project(arc_point.x(), arc_point.y());
            if let Some((px, py)) = prev {
                // a jump over half the canvas means the arc wrapped the dateline
                if (x - px).abs() < canvas.width as f64 / 2.0 {
                    draw_line(img, (px, py), (x, y), color, 1.0);
                }
            }
            prev = Some((x, y));
        }
    }
}

/// Great-circle samples from `from` to `to`, endpoints included.
fn arc_points(from: Point<f64>, to: Point<f64>) -> Vec<Point<f64>> {
    if (from.x() - to.x()).abs() < 1e-9 && (from.y() - to.y()).abs() < 1e-9 {
        // zero-length arc, the intermediate-point formula is undefined here
        return vec![from];
    }
    (0..=ARC_SAMPLES)
        .map(|k| from.haversine_intermediate(&to, k as f64 / ARC_SAMPLES as f64))
        .collect()
}

// Occurrence-weighted markers: each occurrence adds base_size to the
// magnitude, capped at max_magnitude.
fn draw_heatmap(img: &mut RgbaImage, canvas: &Canvas, located: &LocatedIps, style: &HeatmapStyle) {
    let color = hex_to_rgba(&style.color);
    for occurrences in located.by_ip.values() {
        let Some(first) = occurrences.first() else {
            continue;
        };
        let magnitude = marker_magnitude(occurrences.len(), style);
        let (x, y) = canvas.project(first.lon, first.lat);
        draw_disc(img, x, y, magnitude * style.marker_scale, color, style.alpha);
    }
}

fn marker_magnitude(count: usize, style: &HeatmapStyle) -> f64 {
    (count as f64 * style.base_size).min(style.max_magnitude)
}

fn draw_hexbin(img: &mut RgbaImage, canvas: &Canvas, points: &[GeoPoint], style: &HexbinStyle) {
    let projected: Vec<(f64, f64)> = points
        .iter()
        .map(|p| canvas.project(p.lon, p.lat))
        .filter(|&p| canvas.contains(p))
        .collect();
    if projected.is_empty() || style.gridsize == 0 {
        return;
    }

    let sx = canvas.width as f64 / style.gridsize as f64;
    let bins = hexbin_counts(&projected, sx);
    let max_count = bins.values().copied().max().unwrap_or(0);
    if max_count == 0 {
        return;
    }

    for (&key, &count) in &bins {
        if count < style.min_count.max(1) {
            continue;
        }
        let t = if max_count > 1 {
            (count as f64).ln() / (max_count as f64).ln()
        } else {
            1.0
        };
        let (cx, cy) = bin_center(key, sx);
        let ring = hexagon_ring(cx, cy, sx / 3f64.sqrt());
        fill_rings(img, &[ring], jet(t), 1.0);
    }
}

// Two interleaved rectangular lattices make a regular hexagonal tiling;
// each point is assigned to the nearer lattice center. Keys are doubled
// lattice indices so both lattices share one map.
fn hexbin_counts(points: &[(f64, f64)], sx: f64) -> HashMap<(i64, i64), u32> {
    let sy = sx * 3f64.sqrt();
    let mut counts: HashMap<(i64, i64), u32> = HashMap::new();

    for &(x, y) in points {
        let i = (x / sx).round();
        let j = (y / sy).round();
        let i2 = (x / sx - 0.5).round();
        let j2 = (y / sy - 0.5).round();

        let da = (x - i * sx).powi(2) + (y - j * sy).powi(2);
        let db = (x - (i2 + 0.5) * sx).powi(2) + (y - (j2 + 0.5) * sy).powi(2);

        let key = if da <= db {
            (2 * i as i64, 2 * j as i64)
        } else {
            (2 * i2 as i64 + 1, 2 * j2 as i64 + 1)
        };
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
}

fn bin_center(key: (i64, i64), sx: f64) -> (f64, f64) {
    let sy = sx * 3f64.sqrt();
    (key.0 as f64 * sx / 2.0, key.1 as f64 * sy / 2.0)
}

fn hexagon_ring(cx: f64, cy: f64, radius: f64) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = (0..6)
        .map(|k| {
            let angle = (60.0 * k as f64 + 30.0).to_radians();
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect();
    ring.push(ring[0]);
    ring
}

// Piecewise approximation of the classic jet colormap, t in [0, 1].
fn jet(t: f64) -> Rgba<u8> {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let r = 1.5 - (4.0 * t - 3.0).abs();
    let g = 1.5 - (4.0 * t - 2.0).abs();
    let b = 1.5 - (4.0 * t - 1.0).abs();
    Rgba([channel(r), channel(g), channel(b), 255])
}

fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel =
        |range| u8::from_str_radix(hex.get(range).unwrap_or("0"), 16).unwrap_or(0);
    let r = channel(0..2);
    let g = channel(2..4);
    let b = channel(4..6);
    Rgba([r, g, b, 255])
}

// Drawing primitives. Everything funnels through blend_pixel, which clips to
// the canvas.

fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, alpha: f64) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let dst = *img.get_pixel(x, y);
    let mut out = [0u8; 4];
    for c in 0..3 {
        out[c] = (color.0[c] as f64 * alpha + dst.0[c] as f64 * (1.0 - alpha)).round() as u8;
    }
    out[3] = 255;
    img.put_pixel(x, y, Rgba(out));
}

fn draw_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>, alpha: f64) {
    let r2 = radius * radius;
    for py in (cy - radius).floor() as i64..=(cy + radius).ceil() as i64 {
        for px in (cx - radius).floor() as i64..=(cx + radius).ceil() as i64 {
            let dx = px as f64 + 0.5 - cx;
            let dy = py as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                blend_pixel(img, px, py, color, alpha);
            }
        }
    }
}

fn draw_ring(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, width: f64, color: Rgba<u8>) {
    let outer = radius * radius;
    let inner = (radius - width).max(0.0).powi(2);
    for py in (cy - radius).floor() as i64..=(cy + radius).ceil() as i64 {
        for px in (cx - radius).floor() as i64..=(cx + radius).ceil() as i64 {
            let dx = px as f64 + 0.5 - cx;
            let dy = py as f64 + 0.5 - cy;
            let d2 = dx * dx + dy * dy;
            if d2 <= outer && d2 >= inner {
                blend_pixel(img, px, py, color, 1.0);
            }
        }
    }
}

fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>, alpha: f64) {
    let w = img.width() as f64;
    let h = img.height() as f64;
    // segment entirely off one side of the canvas
    if (from.0 < 0.0 && to.0 < 0.0)
        || (from.1 < 0.0 && to.1 < 0.0)
        || (from.0 >= w && to.0 >= w)
        || (from.1 >= h && to.1 >= h)
    {
        return;
    }

    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
    for i in 0..=steps as u64 {
        let t = i as f64 / steps;
        blend_pixel(
            img,
            (from.0 + dx * t).round() as i64,
            (from.1 + dy * t).round() as i64,
            color,
            alpha,
        );
    }
}

fn stroke_ring(img: &mut RgbaImage, ring: &[(f64, f64)], color: Rgba<u8>) {
    for pair in ring.windows(2) {
        draw_line(img, pair[0], pair[1], color, 1.0);
    }
}

// Scanline fill over a set of rings (exterior plus holes), even-odd rule.
fn fill_rings(img: &mut RgbaImage, rings: &[Vec<(f64, f64)>], color: Rgba<u8>, alpha: f64) {
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;
    for ring in rings {
        for &(_, y) in ring {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if min_y > max_y {
        return;
    }

    let y_start = min_y.floor().max(0.0) as i64;
    let y_end = max_y.ceil().min(img.height() as f64) as i64;

    for py in y_start..y_end {
        let yc = py as f64 + 0.5;
        let mut crossings: Vec<f64> = Vec::new();
        for ring in rings {
            for pair in ring.windows(2) {
                let (xa, ya) = pair[0];
                let (xb, yb) = pair[1];
                if (ya <= yc && yb > yc) || (yb <= yc && ya > yc) {
                    crossings.push(xa + (yc - ya) * (xb - xa) / (yb - ya));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks(2) {
            if span.len() < 2 {
                break;
            }
            let x_start = span[0].round().max(0.0) as i64;
            let x_end = span[1].round().min(img.width() as f64) as i64;
            for px in x_start..x_end {
                blend_pixel(img, px, py, color, alpha);
            }
        }
    }
}
