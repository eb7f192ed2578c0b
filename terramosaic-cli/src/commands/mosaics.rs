//! Mosaics command - download and composite seasonal mosaics.

use indicatif::{ProgressBar, ProgressStyle};
use terramosaic::pipeline::BatchDriver;

use super::common::{finish, DataArgs};
use crate::error::CliError;

pub fn run(args: &DataArgs) -> Result<(), CliError> {
    let config = args.to_config()?;
    let driver = BatchDriver::new(config)?;

    println!(
        "Compositing mosaics for {} regions under {}",
        driver.regions().len(),
        args.data_root.display()
    );

    let spinner = progress_spinner("Searching, downloading, compositing...");
    let report = driver.run_mosaics()?;
    spinner.finish_and_clear();

    finish(report)
}

pub(super) fn progress_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner
}
