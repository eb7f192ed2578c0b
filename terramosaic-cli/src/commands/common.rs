//! Shared argument handling for the pipeline commands.

use std::path::PathBuf;

use clap::Args;
use terramosaic::daterange::Season;
use terramosaic::pipeline::{BatchReport, PipelineConfig, DEFAULT_MAX_CLOUD_COVER};

use crate::error::CliError;

/// Options common to every command that walks the data layout.
#[derive(Debug, Args)]
pub struct DataArgs {
    /// Root of the data layout (regions file, archive, outputs)
    #[arg(long, env = "TERRAMOSAIC_DATA_ROOT")]
    pub data_root: PathBuf,

    /// Years to process, comma separated
    #[arg(long, value_delimiter = ',', default_value = "2021")]
    pub years: Vec<i32>,

    /// Seasons to process (spring, summer, fall, winter), comma separated
    #[arg(long, value_delimiter = ',')]
    pub seasons: Vec<Season>,

    /// Maximum scene cloud cover accepted, in percent
    #[arg(long, default_value_t = DEFAULT_MAX_CLOUD_COVER)]
    pub max_cloud_cover: f64,

    /// STAC API endpoint
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// STAC collection searched
    #[arg(long)]
    pub collection: Option<String>,

    /// Ignore cached query results and search the catalog again
    #[arg(long)]
    pub force: bool,

    /// Worker threads (default: half the logical CPUs)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
}

impl DataArgs {
    /// Builds the pipeline configuration from the parsed arguments.
    pub fn to_config(&self) -> Result<PipelineConfig, CliError> {
        if self.max_cloud_cover < 0.0 || self.max_cloud_cover > 100.0 {
            return Err(CliError::Config(format!(
                "max cloud cover must be within 0..=100, got {}",
                self.max_cloud_cover
            )));
        }

        let mut config = PipelineConfig::new(&self.data_root)
            .with_years(self.years.clone())
            .with_max_cloud_cover(self.max_cloud_cover)
            .with_force_refresh(self.force);
        if !self.seasons.is_empty() {
            config = config.with_seasons(self.seasons.clone());
        }
        if let Some(jobs) = self.jobs {
            config = config.with_pool_size(jobs);
        }
        if let Some(url) = &self.catalog_url {
            config.catalog_url = url.clone();
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        tracing::debug!(?config, "Resolved pipeline configuration");
        Ok(config)
    }
}

/// Prints a batch report and converts failures into an exit status.
pub fn finish(report: BatchReport) -> Result<(), CliError> {
    print!("{report}");
    let failed = report.failed().count();
    if failed > 0 {
        Err(CliError::UnitsFailed(failed))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        data: DataArgs,
    }

    #[test]
    fn test_years_and_seasons_parse_from_comma_lists() {
        let harness = Harness::parse_from([
            "terramosaic",
            "--data-root",
            "/data",
            "--years",
            "2020,2021",
            "--seasons",
            "summer,winter",
        ]);
        let config = harness.data.to_config().unwrap();
        assert_eq!(config.years, vec![2020, 2021]);
        assert_eq!(config.seasons, vec![Season::Summer, Season::Winter]);
    }

    #[test]
    fn test_default_seasons_cover_the_whole_year() {
        let harness = Harness::parse_from(["terramosaic", "--data-root", "/data"]);
        let config = harness.data.to_config().unwrap();
        assert_eq!(config.seasons.len(), 4);
    }

    #[test]
    fn test_out_of_range_cloud_cover_rejected() {
        let harness = Harness::parse_from([
            "terramosaic",
            "--data-root",
            "/data",
            "--max-cloud-cover",
            "150",
        ]);
        assert!(harness.data.to_config().is_err());
    }
}
