// ========================================================================================
//
//                      Command-line entry point: CONCORD
//
// ========================================================================================
//
// Parses the positional file list, validates it into a run configuration and hands
// it to the library. All diagnostics go to stderr; the exit status is 0 only when the
// merged table was written completely.

use clap::Parser;
use concord::{RunConfig, run};
use log::info;
use std::path::PathBuf;
use std::process;

// ========================================================================================
//                         Command-line interface definition
// ========================================================================================

#[derive(Parser, Debug)]
#[clap(
    name = "concord",
    version,
    about = "Merges per-comparison association runs into one consensus table."
)]
struct Args {
    /// Association runs, then model-matrix files (names ending in `model_matrix`),
    /// then the output path. A `.gz` output is written compressed.
    #[clap(required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    )
    .target(env_logger::Target::Stderr)
    .init();

    let args = Args::parse();

    let config = match RunConfig::from_args(args.files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    match run(&config) {
        Ok(summary) => {
            if summary.variants_skipped > 0 {
                info!(
                    "{} variants were not aligned across runs and were skipped",
                    summary.variants_skipped
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
