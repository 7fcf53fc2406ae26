use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

use std::process::exit;

mod args;
mod zc;

#[tokio::main]
async fn main() {
    let args = args::Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();
    debug!("args: {:?}", args);

    if let Err(e) = zc::run(&args).await {
        eprintln!("Error: {}", e);
        for cause in ErrorCompat::iter_chain(&e).skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        exit(1);
    }
}
