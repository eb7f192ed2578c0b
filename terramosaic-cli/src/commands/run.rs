//! Run command - mosaics first, then road masks.

use terramosaic::pipeline::BatchDriver;

use super::common::{finish, DataArgs};
use super::mosaics::progress_spinner;
use crate::error::CliError;

pub fn run(args: &DataArgs) -> Result<(), CliError> {
    let config = args.to_config()?;
    let driver = BatchDriver::new(config)?;

    println!(
        "Processing {} regions under {}",
        driver.regions().len(),
        args.data_root.display()
    );

    let spinner = progress_spinner("Mosaics, then road masks...");
    let report = driver.run()?;
    spinner.finish_and_clear();

    finish(report)
}
