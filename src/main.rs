// fincache CLI entry point.
// Runs one command against a running finance API.

use std::process;

use clap::Parser;
use fincache::cli::{self, Cli};
use fincache::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
