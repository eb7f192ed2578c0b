//! STAC-style spatio-temporal catalog client
//!
//! Performs one search per (date range, bounds, cloud threshold) query
//! against a remote catalog endpoint for a fixed imagery collection and
//! returns scored candidate tiles. The two failure modes are distinct error
//! kinds because the caller's recovery differs: no results at all suggests
//! widening the date range, while results that all fail the cloud filter
//! suggest relaxing the threshold.

mod http;
mod models;

pub use http::{HttpClient, ReqwestClient};
pub use models::{GeoJsonGeometry, SearchResponse, StacAsset, StacItem, StacProperties};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::collections::HashMap;
use std::sync::Arc;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bounds::BoundingBox;
use crate::daterange::DateRange;

/// Default catalog endpoint (Earth Search on AWS).
pub const DEFAULT_CATALOG_URL: &str = "https://earth-search.aws.element84.com/v1";

/// Default imagery collection queried for mosaics.
pub const DEFAULT_COLLECTION: &str = "sentinel-2-l2a";

/// Maximum number of items requested per search.
pub const SEARCH_PAGE_LIMIT: u32 = 500;

/// Errors that can occur while querying the catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Transport-level failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The date/bounds query matched nothing at all.
    #[error("No items found for {daterange} within {bounds:?}")]
    NoCandidates {
        daterange: String,
        bounds: [f64; 4],
    },

    /// Items matched the query but none passed the cloud filter.
    #[error("No items with eo:cloud_cover below {max_cloud_cover} (of {matched} matched)")]
    NoLowCloudCandidates { max_cloud_cover: f64, matched: usize },
}

/// A discovered remote scene: footprint, cloud score, and per-band asset
/// references. Immutable once fetched from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTile {
    pub id: String,
    pub footprint: MultiPolygon<f64>,
    /// Cloud obstruction estimate in percent; lower is better.
    pub cloud_cover: f64,
    /// Acquisition timestamp as reported by the catalog.
    pub acquired: Option<String>,
    /// Band name to asset href.
    pub assets: HashMap<String, String>,
}

impl CandidateTile {
    fn from_item(item: StacItem) -> Result<Self, CatalogError> {
        let footprint = item.geometry.to_multi_polygon()?;
        Ok(Self {
            id: item.id,
            footprint,
            cloud_cover: item.properties.cloud_cover,
            acquired: item.properties.datetime,
            assets: item
                .assets
                .into_iter()
                .map(|(band, asset)| (band, asset.href))
                .collect(),
        })
    }
}

/// Handle to one catalog endpoint, created once and passed by reference into
/// the components that need it. Lifecycle is scoped to one pipeline run.
pub struct CatalogClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    collection: String,
}

impl CatalogClient {
    /// Creates a client for the default Earth Search endpoint and
    /// collection.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_endpoint(http, DEFAULT_CATALOG_URL, DEFAULT_COLLECTION)
    }

    /// Creates a client for a custom endpoint and collection.
    pub fn with_endpoint(http: Arc<dyn HttpClient>, base_url: &str, collection: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        }
    }

    /// Searches the catalog and returns all candidate tiles with cloud cover
    /// strictly below `max_cloud_cover`.
    ///
    /// Idempotent per identical query parameters, modulo catalog staleness.
    ///
    /// # Errors
    ///
    /// * [`CatalogError::NoCandidates`] when the date/bounds query matched
    ///   no items at all.
    /// * [`CatalogError::NoLowCloudCandidates`] when items matched but none
    ///   passed the cloud filter.
    pub fn search(
        &self,
        daterange: &DateRange,
        bounds: &BoundingBox,
        max_cloud_cover: f64,
    ) -> Result<Vec<CandidateTile>, CatalogError> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "datetime": daterange.to_string(),
            "bbox": bounds.to_array(),
            "limit": SEARCH_PAGE_LIMIT,
            "collections": [self.collection],
        });

        debug!(daterange = %daterange, ?bounds, "Searching catalog");
        let raw = self.http.post_json(&url, &body)?;
        let response: SearchResponse = serde_json::from_slice(&raw)
            .map_err(|e| CatalogError::Decode(format!("Bad search response: {}", e)))?;

        if response.features.is_empty() {
            return Err(CatalogError::NoCandidates {
                daterange: daterange.to_string(),
                bounds: bounds.to_array(),
            });
        }

        let matched = response.features.len();
        let tiles = response
            .features
            .into_iter()
            .filter(|item| item.properties.cloud_cover < max_cloud_cover)
            .map(CandidateTile::from_item)
            .collect::<Result<Vec<_>, _>>()?;

        if tiles.is_empty() {
            return Err(CatalogError::NoLowCloudCandidates {
                max_cloud_cover,
                matched,
            });
        }

        debug!(matched, passing = tiles.len(), "Catalog search complete");
        Ok(tiles)
    }
}
