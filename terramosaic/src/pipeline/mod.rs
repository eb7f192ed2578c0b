//! Per-region pipelines and the batch driver
//!
//! The mosaic path resolves a minimal-cloud tile set (catalog search +
//! greedy cover selection, memoized through the query cache), downloads the
//! selected assets, composites them on an output grid, and writes one
//! GeoTIFF per (region, year, season). The road path rasterizes the
//! region's road graph against its reference mosaic and writes an aligned
//! three-channel mask.
//!
//! The batch driver fans regions out over a bounded rayon pool sized to
//! roughly half the logical CPUs, leaving headroom for download I/O. Every
//! unit of work returns a typed result; failures are collected into a
//! [`BatchReport`] and never abort sibling workers.

mod layout;

pub use layout::DataLayout;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array3;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::bounds::BoundingBox;
use crate::cache::{ArchiveFetcher, CacheError, FetchError, QueryCache, QueryKey};
use crate::catalog::{CandidateTile, CatalogClient, CatalogError, HttpClient, ReqwestClient};
use crate::cover::select_optimal_cover;
use crate::daterange::{DateRange, DateRangeError, Season};
use crate::mosaic::{Mosaic, MosaicError};
use crate::raster::{read_geotiff, read_grid, write_geotiff, write_geotiff_u16};
use crate::raster::{GeoTiffError, Raster, RasterGrid};
use crate::rasterize::rasterize_roads;
use crate::regions::{load_regions, Region, RegionError};
use crate::reproject::{CrsReprojector, ReprojectError};
use crate::roads::{RoadGraphError, RoadVectorIndex};

/// Default maximum cloud cover for catalog searches, in percent.
pub const DEFAULT_MAX_CLOUD_COVER: f64 = 15.0;

/// Band assets composited into a mosaic, in output band order (RGB).
pub const DEFAULT_ASSETS: [&str; 3] = ["B04", "B03", "B02"];

/// Everything that can fail inside one unit of pipeline work.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Mosaic(#[from] MosaicError),

    #[error(transparent)]
    Reproject(#[from] ReprojectError),

    #[error(transparent)]
    GeoTiff(#[from] GeoTiffError),

    #[error(transparent)]
    RoadGraph(#[from] RoadGraphError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    DateRange(#[from] DateRangeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required road graph file absent for a region.
    #[error("Road graph not found: {0}")]
    MissingGraph(PathBuf),

    /// No reference mosaic exists for a region; the mosaic path must run
    /// first.
    #[error("No reference image found for region {0}")]
    MissingReferenceImage(u64),

    /// A region's footprint was empty or degenerate.
    #[error("Region {0} has an empty footprint")]
    EmptyFootprint(u64),

    /// The configuration requested no band assets.
    #[error("No band assets configured")]
    NoAssetsConfigured,

    /// A selected tile was missing a requested band asset.
    #[error("Tile {tile} has no asset for band {band}")]
    MissingAsset { tile: String, band: String },
}

/// Tuning knobs for one batch run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    pub catalog_url: String,
    pub collection: String,
    pub years: Vec<i32>,
    pub seasons: Vec<Season>,
    pub max_cloud_cover: f64,
    /// Band assets in output band order.
    pub assets: Vec<String>,
    /// EPSG code of mosaic output grids.
    pub epsg: u32,
    /// Bypass cache lookups and overwrite entries.
    pub force_refresh: bool,
    /// Precompute composites for fast window reads.
    pub optimize: bool,
    /// Worker threads; defaults to half the logical CPUs.
    pub pool_size: Option<usize>,
}

impl PipelineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            catalog_url: crate::catalog::DEFAULT_CATALOG_URL.to_string(),
            collection: crate::catalog::DEFAULT_COLLECTION.to_string(),
            years: vec![2021],
            seasons: Season::ALL.to_vec(),
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            epsg: 4326,
            force_refresh: false,
            optimize: true,
            pool_size: None,
        }
    }

    pub fn with_years(mut self, years: Vec<i32>) -> Self {
        self.years = years;
        self
    }

    pub fn with_seasons(mut self, seasons: Vec<Season>) -> Self {
        self.seasons = seasons;
        self
    }

    pub fn with_max_cloud_cover(mut self, max_cloud_cover: f64) -> Self {
        self.max_cloud_cover = max_cloud_cover;
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size.max(1));
        self
    }

    fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cpus / 2).max(1)
        })
    }
}

/// Which pipeline a report entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Mosaic,
    Roads,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Mosaic => write!(f, "mosaic"),
            Task::Roads => write!(f, "roads"),
        }
    }
}

/// Outcome of one unit of work.
#[derive(Debug)]
pub struct UnitOutcome {
    pub region_id: u64,
    pub region_name: String,
    pub task: Task,
    /// Extra context such as "2021/summer" for mosaic units.
    pub detail: String,
    pub result: Result<(), PipelineError>,
}

/// Aggregated outcomes of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    fn merge(&mut self, mut other: Vec<UnitOutcome>) {
        self.outcomes.append(&mut other);
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&UnitOutcome> = self.failed().collect();
        writeln!(
            f,
            "{} units succeeded, {} failed",
            self.succeeded_count(),
            failed.len()
        )?;
        for outcome in failed {
            let error = outcome
                .result
                .as_ref()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_default();
            writeln!(
                f,
                "  {} {} ({}): {}",
                outcome.region_id, outcome.task, outcome.detail, error
            )?;
        }
        Ok(())
    }
}

/// The mosaic path for one run: catalog, cache, archive, compositing.
pub struct MosaicPipeline {
    config: PipelineConfig,
    layout: DataLayout,
    http: Arc<dyn HttpClient>,
}

impl MosaicPipeline {
    pub fn new(config: PipelineConfig, http: Arc<dyn HttpClient>) -> Self {
        let layout = DataLayout::new(&config.data_root);
        Self {
            config,
            layout,
            http,
        }
    }

    /// Resolves the minimal tile set for one query, through the cache when
    /// possible, and materializes the selected assets locally. Returned
    /// tiles carry absolute local asset paths.
    pub fn resolve_tiles(
        &self,
        daterange: &DateRange,
        bounds: &BoundingBox,
    ) -> Result<Vec<CandidateTile>, PipelineError> {
        let bounds = bounds.normalize();
        let archive = self.layout.archive_dir();
        let cache = QueryCache::open(&archive)?;
        let key = QueryKey {
            daterange: *daterange,
            bounds,
            max_cloud_cover: self.config.max_cloud_cover,
            assets: self.config.assets.clone(),
            epsg: self.config.epsg,
        };

        if !self.config.force_refresh {
            if let Some(tiles) = cache.lookup(&key)? {
                return Ok(tiles);
            }
        }

        let catalog = CatalogClient::with_endpoint(
            self.http.clone(),
            &self.config.catalog_url,
            &self.config.collection,
        );
        let candidates = catalog.search(daterange, &bounds, self.config.max_cloud_cover)?;
        let mut selected = select_optimal_cover(candidates, &bounds);

        // Pull every requested band into the archive, rewriting hrefs to
        // the local relative form the cache persists.
        let fetcher = ArchiveFetcher::new(&archive);
        for tile in &mut selected {
            for band in &self.config.assets {
                let href = tile.assets.get(band).cloned().ok_or_else(|| {
                    PipelineError::MissingAsset {
                        tile: tile.id.clone(),
                        band: band.clone(),
                    }
                })?;
                let relative = fetcher.ensure_local(self.http.as_ref(), &href)?;
                tile.assets
                    .insert(band.clone(), relative.to_string_lossy().into_owned());
            }
        }

        cache.store(&key, &selected)?;
        // Re-read through the cache so hrefs come back absolute, exactly as
        // a later cache hit would produce them.
        Ok(cache.lookup(&key)?.unwrap_or(selected))
    }

    /// Chooses the output grid: the query bounds at the first tile's
    /// native resolution re-expressed in the output CRS.
    fn output_grid(
        &self,
        reprojector: &mut CrsReprojector,
        first_band: &RasterGrid,
        bounds: &BoundingBox,
    ) -> Result<RasterGrid, PipelineError> {
        let (x_res, y_res) = first_band.resolution();
        let [min_x, min_y, max_x, max_y] = first_band.bounds();
        let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

        let (ox, oy) = reprojector.transform(first_band.epsg, self.config.epsg, cx, cy)?;
        let (ox2, oy2) =
            reprojector.transform(first_band.epsg, self.config.epsg, cx + x_res, cy + y_res)?;
        let (out_x_res, out_y_res) = ((ox2 - ox).abs(), (oy2 - oy).abs());

        Ok(RasterGrid::from_bounds_resolution(
            bounds.to_array(),
            out_x_res,
            out_y_res,
            self.config.epsg,
        ))
    }

    /// Warps each selected tile's bands onto the output grid and composites
    /// them front-to-back.
    pub fn composite(
        &self,
        tiles: &[CandidateTile],
        bounds: &BoundingBox,
    ) -> Result<Raster<u16>, PipelineError> {
        let first = tiles.first().ok_or(MosaicError::EmptyStack)?;
        let first_band = self
            .config
            .assets
            .first()
            .ok_or(PipelineError::NoAssetsConfigured)?;
        let first_band_path = first
            .assets
            .get(first_band)
            .ok_or_else(|| PipelineError::MissingAsset {
                tile: first.id.clone(),
                band: first_band.clone(),
            })?;

        let mut reprojector = CrsReprojector::new();
        let first_grid = read_grid(first_band_path)?;
        let target = self.output_grid(&mut reprojector, &first_grid, bounds)?;

        let mut stack = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let mut data =
                Array3::<u16>::zeros((self.config.assets.len(), target.height, target.width));
            for (band_index, band) in self.config.assets.iter().enumerate() {
                let path = tile.assets.get(band).ok_or_else(|| {
                    PipelineError::MissingAsset {
                        tile: tile.id.clone(),
                        band: band.clone(),
                    }
                })?;
                let native = read_geotiff(path)?;
                let warped = reprojector.warp(&native, &target)?;
                data.index_axis_mut(ndarray::Axis(0), band_index)
                    .assign(&warped.data.index_axis(ndarray::Axis(0), 0));
            }
            stack.push(Raster::new(target, data));
        }

        let mut mosaic = Mosaic::from_stack(stack)?;
        if self.config.optimize {
            mosaic.optimize();
        }
        Ok(mosaic.read_full())
    }

    /// Runs the full mosaic path for one region, one unit per
    /// (year, season). Existing non-empty outputs are skipped.
    pub fn run_region(&self, region: &Region) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::new();
        let Some(bounds) = region.bounds() else {
            outcomes.push(UnitOutcome {
                region_id: region.id,
                region_name: region.name.clone(),
                task: Task::Mosaic,
                detail: String::new(),
                result: Err(PipelineError::EmptyFootprint(region.id)),
            });
            return outcomes;
        };

        for &year in &self.config.years {
            for &season in &self.config.seasons {
                let detail = format!("{year}/{season}");
                let output = self.layout.mosaic_path(region.id, year, season);
                if output
                    .metadata()
                    .map(|m| m.len() > 0)
                    .unwrap_or(false)
                {
                    info!(region = region.id, %detail, "Skipping existing mosaic");
                    continue;
                }

                let result = self.run_unit(&bounds, year, season, &output);
                if let Err(error) = &result {
                    warn!(region = region.id, %detail, %error, "Mosaic unit failed");
                }
                outcomes.push(UnitOutcome {
                    region_id: region.id,
                    region_name: region.name.clone(),
                    task: Task::Mosaic,
                    detail,
                    result,
                });
            }
        }
        outcomes
    }

    fn run_unit(
        &self,
        bounds: &BoundingBox,
        year: i32,
        season: Season,
        output: &std::path::Path,
    ) -> Result<(), PipelineError> {
        let daterange = DateRange::for_season(year, season)?;
        let tiles = self.resolve_tiles(&daterange, bounds)?;
        let mosaic = self.composite(&tiles, bounds)?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_geotiff_u16(output, &mosaic)?;
        info!(path = %output.display(), "Wrote mosaic");
        Ok(())
    }
}

/// The road path for one run: graph loading, rasterization, two-way warp.
pub struct RoadPipeline {
    layout: DataLayout,
}

impl RoadPipeline {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            layout: DataLayout::new(data_root.into()),
        }
    }

    /// Produces the aligned road mask for one region.
    pub fn run_region(&self, region: &Region) -> Result<(), PipelineError> {
        let graph_path = self.layout.road_graph_path(region.id);
        if !graph_path.exists() {
            return Err(PipelineError::MissingGraph(graph_path));
        }

        let reference_path = self
            .layout
            .first_region_image(region.id)
            .ok_or(PipelineError::MissingReferenceImage(region.id))?;
        let reference = read_grid(&reference_path)?;

        let index = RoadVectorIndex::load(&graph_path)?;
        let mut reprojector = CrsReprojector::new();

        // Rasterize in the road network's native CRS, then warp the mask
        // back onto the reference grid exactly.
        let warped_grid = reprojector.forward_grid(&reference, index.epsg())?;
        let [min_x, min_y, max_x, max_y] = warped_grid.bounds();
        let roads = index.query(&BoundingBox::new(min_x, min_y, max_x, max_y));
        let burned = rasterize_roads(&roads, &warped_grid);
        let mask = reprojector.warp_to_exact_grid(&burned, &reference)?;

        let output = self.layout.road_mask_path(region.id);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_geotiff(&output, &mask)?;
        info!(path = %output.display(), "Wrote road mask");
        Ok(())
    }
}

/// Batch driver: fans regions out over a bounded worker pool and collects
/// per-unit outcomes. A failing region never aborts its siblings.
pub struct BatchDriver {
    config: PipelineConfig,
    regions: Vec<Region>,
    http: Arc<dyn HttpClient>,
}

impl BatchDriver {
    /// Loads the region list and prepares a driver.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let layout = DataLayout::new(&config.data_root);
        let regions = load_regions(layout.regions_path())?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
        Ok(Self {
            config,
            regions,
            http,
        })
    }

    /// Driver over a caller-supplied HTTP client, for tests and embedding.
    pub fn with_http(
        config: PipelineConfig,
        regions: Vec<Region>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            regions,
            http,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn pool(&self) -> Result<rayon::ThreadPool, PipelineError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_pool_size())
            .build()
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))
    }

    /// Runs the mosaic path for every region.
    pub fn run_mosaics(&self) -> Result<BatchReport, PipelineError> {
        let pipeline = MosaicPipeline::new(self.config.clone(), self.http.clone());
        let pool = self.pool()?;

        let outcomes: Vec<Vec<UnitOutcome>> = pool.install(|| {
            self.regions
                .par_iter()
                .map(|region| pipeline.run_region(region))
                .collect()
        });

        let mut report = BatchReport::default();
        for batch in outcomes {
            report.merge(batch);
        }
        Ok(report)
    }

    /// Runs the road path for every region.
    pub fn run_roads(&self) -> Result<BatchReport, PipelineError> {
        let pipeline = RoadPipeline::new(&self.config.data_root);
        let pool = self.pool()?;

        let outcomes: Vec<UnitOutcome> = pool.install(|| {
            self.regions
                .par_iter()
                .map(|region| {
                    let result = pipeline.run_region(region);
                    if let Err(error) = &result {
                        warn!(region = region.id, %error, "Road unit failed");
                    }
                    UnitOutcome {
                        region_id: region.id,
                        region_name: region.name.clone(),
                        task: Task::Roads,
                        detail: String::new(),
                        result,
                    }
                })
                .collect()
        });

        Ok(BatchReport { outcomes })
    }

    /// Runs both paths, mosaics first so road masks have reference images.
    pub fn run(&self) -> Result<BatchReport, PipelineError> {
        let mut report = self.run_mosaics()?;
        report.merge(self.run_roads()?.outcomes);
        Ok(report)
    }
}
