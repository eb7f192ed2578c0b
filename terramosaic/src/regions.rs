//! Region (city) input
//!
//! Both pipelines consume named geographic entities: a unique identifier,
//! a display name, and a polygon footprint, supplied as a GeoJSON
//! FeatureCollection loaded once per run.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::{BoundingRect, MultiPolygon};
use serde::Deserialize;
use thiserror::Error;

use crate::bounds::BoundingBox;
use crate::catalog::GeoJsonGeometry;

/// Errors raised while loading the region file.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The region file is absent.
    #[error("Region file not found: {0}")]
    Missing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed region file: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
    geometry: GeoJsonGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    asset_identifier: u64,
    asset_name: String,
}

/// One named geographic entity to process.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: u64,
    pub name: String,
    pub footprint: MultiPolygon<f64>,
}

impl Region {
    /// Axis-aligned bounds of the footprint, normalized to canonical
    /// longitude/latitude ranges.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let rect = self.footprint.bounding_rect()?;
        Some(
            BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
                .normalize(),
        )
    }
}

/// Loads all regions from a GeoJSON FeatureCollection.
pub fn load_regions<P: AsRef<Path>>(path: P) -> Result<Vec<Region>, RegionError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RegionError::Missing(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let collection: FeatureCollection =
        serde_json::from_reader(reader).map_err(|e| RegionError::Decode(e.to_string()))?;

    collection
        .features
        .into_iter()
        .map(|feature| {
            let footprint = feature
                .geometry
                .to_multi_polygon()
                .map_err(|e| RegionError::Decode(e.to_string()))?;
            Ok(Region {
                id: feature.properties.asset_identifier,
                name: feature.properties.asset_name,
                footprint,
            })
        })
        .collect()
}
