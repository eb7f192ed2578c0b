//! TerraMosaic - Paired satellite imagery and road-network label datasets
//!
//! This library acquires cloud-minimal Sentinel-2 mosaics for arbitrary
//! geographic regions and produces road-network raster masks aligned
//! pixel-for-pixel with those mosaics.
//!
//! # High-Level API
//!
//! For most use cases, the [`pipeline`] module provides the batch driver:
//!
//! ```ignore
//! use terramosaic::pipeline::{BatchDriver, PipelineConfig};
//! use terramosaic::daterange::Season;
//!
//! let config = PipelineConfig::new("data")
//!     .with_years(vec![2021])
//!     .with_seasons(vec![Season::Spring, Season::Summer, Season::Fall]);
//! let driver = BatchDriver::new(config)?;
//!
//! let report = driver.run()?;
//! println!("{report}");
//! ```
//!
//! The two engines are usable on their own: the mosaic path is
//! [`catalog`] + [`cover`] + [`cache`] + [`mosaic`], and the road path is
//! [`roads`] + [`rasterize`] + [`reproject`].

pub mod bounds;
pub mod cache;
pub mod catalog;
pub mod cover;
pub mod daterange;
pub mod mosaic;
pub mod pipeline;
pub mod raster;
pub mod rasterize;
pub mod regions;
pub mod reproject;
pub mod roads;
