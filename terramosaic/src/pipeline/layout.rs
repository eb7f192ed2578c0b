//! Directory layout convention
//!
//! Maps a region identifier to the on-disk locations of its inputs and
//! outputs under one data root:
//!
//! ```text
//! <root>/city_ids_and_bounds.geojson      region input
//! <root>/s2_archive/                      asset archive + query cache
//! <root>/sentinel2_images/<id>/<year>/<season>.tif
//! <root>/osm_networks/<id>.json.gz        road graph input
//! <root>/osm_images/<id>.tif              road mask output
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::daterange::Season;

/// Path conventions for one data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Region input GeoJSON.
    pub fn regions_path(&self) -> PathBuf {
        self.root.join("city_ids_and_bounds.geojson")
    }

    /// Archive directory holding downloaded assets and the query cache.
    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("s2_archive")
    }

    /// Directory of one region's mosaics.
    pub fn region_image_dir(&self, region_id: u64) -> PathBuf {
        self.root.join("sentinel2_images").join(region_id.to_string())
    }

    /// Output path of one mosaic.
    pub fn mosaic_path(&self, region_id: u64, year: i32, season: Season) -> PathBuf {
        self.region_image_dir(region_id)
            .join(year.to_string())
            .join(format!("{season}.tif"))
    }

    /// Road graph input for one region.
    pub fn road_graph_path(&self, region_id: u64) -> PathBuf {
        self.root
            .join("osm_networks")
            .join(format!("{region_id}.json.gz"))
    }

    /// Road mask output for one region.
    pub fn road_mask_path(&self, region_id: u64) -> PathBuf {
        self.root.join("osm_images").join(format!("{region_id}.tif"))
    }

    /// First mosaic found for a region, in sorted order. All of a region's
    /// mosaics share the same grid regardless of year and season, so any
    /// one serves as the reference image.
    pub fn first_region_image(&self, region_id: u64) -> Option<PathBuf> {
        let mut tifs = Vec::new();
        collect_tifs(&self.region_image_dir(region_id), &mut tifs);
        tifs.sort();
        tifs.into_iter().next()
    }
}

fn collect_tifs(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tifs(&path, out);
        } else if path.extension().is_some_and(|e| e == "tif") {
            out.push(path);
        }
    }
}
