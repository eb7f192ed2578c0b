//! Regions command - inspect the configured region list.

use std::path::Path;

use terramosaic::pipeline::DataLayout;
use terramosaic::regions::load_regions;

use crate::error::CliError;

pub fn run(data_root: &Path) -> Result<(), CliError> {
    let layout = DataLayout::new(data_root);
    let regions = load_regions(layout.regions_path()).map_err(terramosaic::pipeline::PipelineError::from)?;

    println!("{} regions in {}", regions.len(), layout.regions_path().display());
    for region in &regions {
        match region.bounds() {
            Some(bounds) => println!(
                "  {:>8}  {:<24} [{:.4}, {:.4}, {:.4}, {:.4}]",
                region.id,
                region.name,
                bounds.min_lon,
                bounds.min_lat,
                bounds.max_lon,
                bounds.max_lat
            ),
            None => println!("  {:>8}  {:<24} (empty footprint)", region.id, region.name),
        }
    }
    Ok(())
}
