mod error;
mod io;
mod kernel;

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use io::Config;
use kernel::Driver;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let [config_path] = args.as_slice() else {
        println!("Error: Can only run exactly one file name passed as a command line parameter.");
        return Ok(());
    };

    let config = Config::load(Path::new(config_path))
        .with_context(|| format!("failed to load configuration from {config_path}"))?;
    let meta_data_path = config.meta_data_path.clone();

    let mut driver = Driver::new(config).context("failed to initialise the simulator")?;
    driver
        .load()
        .with_context(|| format!("failed to load meta-data from {}", meta_data_path.display()))?;
    driver.start().context("simulation aborted")?;

    Ok(())
}
