// ========================================================================================
//
//                             Run configuration and driver
//
// ========================================================================================

use crate::combine::{CombineSummary, combine};
use crate::consensus::ConsensusMap;
use crate::error::MergeError;
use crate::naming::{is_model_matrix, sort_by_comparison};
use crate::sample_size::{SubsetSampleIndex, TrackedDatasets};
use crate::shared::files::create_text_sink;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

const USAGE: &str = "usage: concord <input files...> <model-matrix files...> <output file>";

/// Everything one merge needs, validated before any file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Association runs, ordered by comparison index.
    pub inputs: Vec<PathBuf>,
    pub model_matrices: Vec<PathBuf>,
    pub output: PathBuf,
}

impl RunConfig {
    /// Splits the positional arguments: the last is the output, the rest are runs
    /// or model matrices according to their suffix.
    pub fn from_args(mut args: Vec<PathBuf>) -> Result<Self, MergeError> {
        match args.len() {
            0..=2 => return Err(MergeError::Usage(USAGE.to_string())),
            3 => {
                return Err(MergeError::Usage(
                    "concord is supposed to be used with more than one input file".to_string(),
                ));
            }
            n if n % 2 == 0 => {
                return Err(MergeError::Usage(format!(
                    "an odd number of file arguments is expected, got {n}\n{USAGE}"
                )));
            }
            _ => {}
        }

        let output = args.pop().ok_or_else(|| MergeError::Usage(USAGE.to_string()))?;
        let (model_matrices, inputs): (Vec<PathBuf>, Vec<PathBuf>) =
            args.into_iter().partition(|path| is_model_matrix(path));
        if inputs.len() < 2 {
            return Err(MergeError::Usage(format!(
                "at least two association runs are required, got {}\n{USAGE}",
                inputs.len()
            )));
        }

        Ok(Self {
            inputs: sort_by_comparison(inputs)?,
            model_matrices,
            output,
        })
    }
}

/// Counters reported once a merge completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub consensus_variants: usize,
    pub rows_written: u64,
    pub variants_skipped: u64,
}

/// Runs both passes and writes the merged table to `config.output`.
pub fn run(config: &RunConfig) -> Result<RunSummary, MergeError> {
    let start = Instant::now();

    info!(
        "Computing combinatorial unique sample counts from {} model matrices",
        config.model_matrices.len()
    );
    let index = SubsetSampleIndex::resolve(&config.model_matrices)?;

    info!(
        "Scanning {} association runs for shared variants",
        config.inputs.len()
    );
    let consensus = ConsensusMap::discover(&config.inputs)?;
    let consensus_variants = consensus.consensus_len();
    info!("Found {consensus_variants} variants present in all files");

    info!("Beginning streamed processing");
    let mut sink = create_text_sink(&config.output)?;
    let mut tracked = TrackedDatasets::new();
    let CombineSummary {
        rows_written,
        variants_skipped,
    } = combine(
        &config.inputs,
        &consensus,
        &index,
        &mut tracked,
        sink.as_mut(),
    )?;
    sink.finish()?;

    if tracked.is_empty() {
        warn!("No variant was present in every run; the output holds only the header");
    }
    info!(
        "All done: {rows_written} rows written to {} in {:.2?} ({} cohort files counted)",
        config.output.display(),
        start.elapsed(),
        tracked.len()
    );

    Ok(RunSummary {
        consensus_variants,
        rows_written,
        variants_skipped,
    })
}
