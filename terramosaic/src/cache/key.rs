//! Canonical query keys
//!
//! A key is a pure, total function of the query parameters. Any change to
//! the date range, normalized bounds, cloud threshold, requested assets, or
//! output CRS must produce a different key, so semantically different
//! queries can never collide.

use crate::bounds::BoundingBox;
use crate::daterange::DateRange;

/// Identifies one mosaic query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryKey {
    pub daterange: DateRange,
    /// Normalized bounds; callers pass output of [`BoundingBox::normalize`].
    pub bounds: BoundingBox,
    pub max_cloud_cover: f64,
    /// Requested band assets, in request order.
    pub assets: Vec<String>,
    /// EPSG code of the output grid.
    pub epsg: u32,
}

impl QueryKey {
    /// Renders the deterministic string form used as the store key.
    ///
    /// Floats use Rust's shortest round-trip formatting, so two keys are
    /// equal exactly when the underlying parameters are bit-equal.
    pub fn canonical(&self) -> String {
        let b = &self.bounds;
        format!(
            "daterange:{}\nbounds:[{}, {}, {}, {}]\nmax_cloudcover:{}\nassets:[{}]\nepsg:{}",
            self.daterange,
            b.min_lon,
            b.min_lat,
            b.max_lon,
            b.max_lat,
            self.max_cloud_cover,
            self.assets.join(", "),
            self.epsg
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daterange::Season;

    fn base_key() -> QueryKey {
        QueryKey {
            daterange: DateRange::for_season(2021, Season::Summer).unwrap(),
            bounds: BoundingBox::new(-148.5, 60.8, -147.4, 61.2),
            max_cloud_cover: 15.0,
            assets: vec!["B04".into(), "B03".into(), "B02".into()],
            epsg: 4326,
        }
    }

    #[test]
    fn test_canonical_form_is_deterministic() {
        assert_eq!(base_key().canonical(), base_key().canonical());
    }

    #[test]
    fn test_every_parameter_changes_the_key() {
        let base = base_key().canonical();

        let mut k = base_key();
        k.daterange = DateRange::for_season(2021, Season::Fall).unwrap();
        assert_ne!(k.canonical(), base);

        let mut k = base_key();
        k.bounds.max_lat += 1e-9;
        assert_ne!(k.canonical(), base);

        let mut k = base_key();
        k.max_cloud_cover = 20.0;
        assert_ne!(k.canonical(), base);

        let mut k = base_key();
        k.assets = vec!["B08".into()];
        assert_ne!(k.canonical(), base);

        let mut k = base_key();
        k.epsg = 32633;
        assert_ne!(k.canonical(), base);
    }

    #[test]
    fn test_asset_order_is_significant() {
        let mut reordered = base_key();
        reordered.assets = vec!["B02".into(), "B03".into(), "B04".into()];
        assert_ne!(reordered.canonical(), base_key().canonical());
    }
}
