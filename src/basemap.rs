use crate::types::Extent;
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::Polygon;
use geojson::{GeoJson, Value};
use rstar::{RTree, RTreeObject, AABB};
use std::convert::TryInto;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// One land polygon from the base map layer, indexable by bounding box.
pub struct LandPolygon(pub Polygon<f64>);

impl RTreeObject for LandPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        match self.0.bounding_rect() {
            Some(bbox) => AABB::from_corners(
                [bbox.min().x, bbox.min().y],
                [bbox.max().x, bbox.max().y],
            ),
            // degenerate polygons are filtered at load time
            None => AABB::from_point([0.0, 0.0]),
        }
    }
}

/// Country/land geometry for the base map: the land/sea mask and the
/// coastline and border strokes are all derived from these polygons.
pub struct Basemap {
    tree: RTree<LandPolygon>,
}

impl Basemap {
    pub fn from_geojson(geojson: GeoJson) -> Result<Self> {
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(anyhow!("Base map must be a GeoJSON FeatureCollection")),
        };

        let mut polygons = Vec::new();

        for feature in collection.features {
            if let Some(geom) = feature.geometry {
                match geom.value {
                    Value::Polygon(_) | Value::MultiPolygon(_) => {
                        let geo_geom: geo::Geometry<f64> = geom
                            .value
                            .try_into()
                            .map_err(|e| anyhow!("Failed to convert geometry: {:?}", e))?;

                        match geo_geom {
                            geo::Geometry::Polygon(p) => {
                                if p.exterior().0.len() >= 4 {
                                    polygons.push(LandPolygon(p));
                                }
                            }
                            geo::Geometry::MultiPolygon(mp) => {
                                for p in mp {
                                    if p.exterior().0.len() >= 4 {
                                        polygons.push(LandPolygon(p));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
        }

        if polygons.is_empty() {
            return Err(anyhow!("Base map contains no polygon features"));
        }

        info!("Building spatial index for {} land polygons...", polygons.len());
        let tree = RTree::bulk_load(polygons);
        Ok(Basemap { tree })
    }

    /// Land polygons whose bounding box intersects the plot extent.
    pub fn polygons_in(&self, extent: &Extent) -> Vec<&Polygon<f64>> {
        let view = AABB::from_corners([extent.west, extent.south], [extent.east, extent.north]);
        self.tree
            .locate_in_envelope_intersecting(&view)
            .map(|land| &land.0)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

pub fn load_basemap(path: &Path) -> Result<Basemap> {
    info!("Loading base map from {:?}...", path);
    let file = File::open(path).with_context(|| {
        format!(
            "Failed to open base map {:?} (download e.g. ne_110m_admin_0_countries.geojson \
             from Natural Earth and point --basemap at it)",
            path
        )
    })?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse base map GeoJSON")?;
    Basemap::from_geojson(geojson)
}
