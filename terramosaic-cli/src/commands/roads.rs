//! Roads command - rasterize road networks into aligned masks.

use terramosaic::pipeline::BatchDriver;

use super::common::{finish, DataArgs};
use super::mosaics::progress_spinner;
use crate::error::CliError;

pub fn run(args: &DataArgs) -> Result<(), CliError> {
    let config = args.to_config()?;
    let driver = BatchDriver::new(config)?;

    println!(
        "Rasterizing road masks for {} regions under {}",
        driver.regions().len(),
        args.data_root.display()
    );

    let spinner = progress_spinner("Burning road classes...");
    let report = driver.run_roads()?;
    spinner.finish_and_clear();

    finish(report)
}
