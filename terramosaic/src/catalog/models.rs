//! Serde models for the STAC-style search protocol
//!
//! These mirror the subset of the catalog's wire format the mosaic pipeline
//! consumes: item id, footprint geometry, `eo:cloud_cover`, acquisition
//! datetime, and per-band asset hrefs.

use std::collections::HashMap;

use geo::{LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use super::CatalogError;

/// Response body of a `POST /search` request.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub features: Vec<StacItem>,
}

/// One item (scene) returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacItem {
    pub id: String,
    pub geometry: GeoJsonGeometry,
    pub properties: StacProperties,
    pub assets: HashMap<String, StacAsset>,
}

/// The item properties the pipeline reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacProperties {
    /// Estimated cloud obstruction in percent; lower is better.
    #[serde(rename = "eo:cloud_cover")]
    pub cloud_cover: f64,
    /// Acquisition timestamp as reported by the catalog.
    #[serde(default)]
    pub datetime: Option<String>,
}

/// One downloadable asset reference of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacAsset {
    pub href: String,
}

/// A GeoJSON geometry as it appears on the wire. Only polygonal types are
/// meaningful for scene footprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonGeometry {
    #[serde(rename = "type")]
    pub geometry_type: String,
    pub coordinates: serde_json::Value,
}

impl GeoJsonGeometry {
    /// Converts the wire geometry into a `geo` multi-polygon.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Decode`] for non-polygonal geometry types or
    /// malformed coordinate arrays.
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>, CatalogError> {
        match self.geometry_type.as_str() {
            "Polygon" => {
                let rings: Vec<Vec<[f64; 2]>> = serde_json::from_value(self.coordinates.clone())
                    .map_err(|e| CatalogError::Decode(format!("Bad Polygon coordinates: {}", e)))?;
                Ok(MultiPolygon(vec![rings_to_polygon(&rings)?]))
            }
            "MultiPolygon" => {
                let polys: Vec<Vec<Vec<[f64; 2]>>> =
                    serde_json::from_value(self.coordinates.clone()).map_err(|e| {
                        CatalogError::Decode(format!("Bad MultiPolygon coordinates: {}", e))
                    })?;
                let polygons = polys
                    .iter()
                    .map(|rings| rings_to_polygon(rings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MultiPolygon(polygons))
            }
            other => Err(CatalogError::Decode(format!(
                "Unsupported footprint geometry type: {}",
                other
            ))),
        }
    }
}

fn rings_to_polygon(rings: &[Vec<[f64; 2]>]) -> Result<Polygon<f64>, CatalogError> {
    let mut exterior_and_holes = rings.iter().map(|ring| {
        LineString::from(
            ring.iter()
                .map(|&[x, y]| (x, y))
                .collect::<Vec<(f64, f64)>>(),
        )
    });
    let exterior = exterior_and_holes
        .next()
        .ok_or_else(|| CatalogError::Decode("Polygon with no rings".to_string()))?;
    Ok(Polygon::new(exterior, exterior_and_holes.collect()))
}
