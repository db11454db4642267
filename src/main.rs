mod args;
mod tracker;

use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    // Credentials may live in a .env file next to the workbooks.
    if let Err(e) = dotenv::dotenv() {
        debug!("No .env file loaded: {}", e);
    }
    debug!("args: {:?}", args);

    if let Err(e) = tracker::run_tracker(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
