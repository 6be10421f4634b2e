// ========================================================================================
//
//                    Second pass: lock-step streaming over every run
//
// ========================================================================================

use crate::consensus::ConsensusMap;
use crate::error::MergeError;
use crate::naming::comparison_index;
use crate::output::{header_line, render_row};
use crate::precision::consensus_p_value;
use crate::sample_size::{SubsetSampleIndex, TrackedDatasets};
use crate::shared::files::{TextSink, TextSource, next_data_line, open_text_source};
use crate::types::{ComparisonIndex, ConsensusRow, VariantKey, VariantRecord};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, warn};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// What a cursor currently holds.
#[derive(Debug)]
enum CursorState {
    Buffered(VariantRecord),
    Empty,
    Exhausted,
}

/// One open input run and its read-ahead slot.
struct RunCursor {
    source: Box<dyn TextSource>,
    comparison: ComparisonIndex,
    state: CursorState,
}

impl RunCursor {
    fn open(path: &Path) -> Result<Self, MergeError> {
        let comparison = comparison_index(path)?;
        let mut source = open_text_source(path)?;
        // Header.
        let state = match source.next_line()? {
            Some(_) => CursorState::Empty,
            None => CursorState::Exhausted,
        };
        Ok(Self {
            source,
            comparison,
            state,
        })
    }

    /// Reads ahead until a consensus line is buffered or the file ends.
    fn refill(&mut self, consensus: &ConsensusMap) -> Result<(), MergeError> {
        if !matches!(self.state, CursorState::Empty) {
            return Ok(());
        }
        while let Some(line) = next_data_line(self.source.as_mut())? {
            let key = VariantKey::from_line(&line).ok_or_else(|| MergeError::Parse {
                path: self.source.path().to_path_buf(),
                line_number: self.source.line_number(),
                line: line.clone(),
                reason: "cannot extract ID and alleles from the first five columns".to_string(),
            })?;
            if !consensus.is_consensus(&key) {
                continue;
            }
            let record =
                VariantRecord::parse(&line, self.source.path(), self.source.line_number())?;
            self.state = CursorState::Buffered(record);
            return Ok(());
        }
        debug!("{}: exhausted", self.source.path().display());
        self.state = CursorState::Exhausted;
        Ok(())
    }

    fn buffered_key(&self) -> Option<&VariantKey> {
        match &self.state {
            CursorState::Buffered(record) => Some(&record.key),
            CursorState::Empty | CursorState::Exhausted => None,
        }
    }

    /// Hands out the buffered record if it carries `key`, leaving the cursor empty.
    fn take_if(&mut self, key: &VariantKey) -> Option<VariantRecord> {
        if self.buffered_key() != Some(key) {
            return None;
        }
        match std::mem::replace(&mut self.state, CursorState::Empty) {
            CursorState::Buffered(record) => Some(record),
            other => {
                self.state = other;
                None
            }
        }
    }
}

/// Counters of one completed second pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineSummary {
    pub rows_written: u64,
    /// Variants seen in fewer than all cursors at the time they were the target.
    pub variants_skipped: u64,
}

/// Streams `inputs` in lock-step and writes one row per variant that every run
/// carries. Rows are written as they are produced; a failure leaves the rows
/// already written in `sink`.
pub fn combine(
    inputs: &[PathBuf],
    consensus: &ConsensusMap,
    index: &SubsetSampleIndex,
    tracked: &mut TrackedDatasets,
    sink: &mut dyn TextSink,
) -> Result<CombineSummary, MergeError> {
    let mut cursors = inputs
        .iter()
        .map(|path| RunCursor::open(path))
        .collect::<Result<Vec<_>, _>>()?;
    let input_count = cursors.len();

    sink.write_line(&header_line(input_count))?;

    let pb = create_progress_bar(consensus.consensus_len() as u64, "Merging variants...");
    let mut summary = CombineSummary::default();

    loop {
        for cursor in cursors.iter_mut() {
            cursor.refill(consensus)?;
        }

        let Some(target) = cursors.iter().filter_map(RunCursor::buffered_key).min().cloned()
        else {
            break;
        };

        let contributors: Vec<(ComparisonIndex, VariantRecord)> = cursors
            .iter_mut()
            .filter_map(|cursor| {
                let comparison = cursor.comparison;
                cursor.take_if(&target).map(|record| (comparison, record))
            })
            .collect();

        if contributors.len() != input_count {
            warn!(
                "Skipping {target}: found in {} of {input_count} runs at this position",
                contributors.len()
            );
            summary.variants_skipped += 1;
            continue;
        }

        let row = build_row(contributors, index, tracked)?;
        sink.write_line(&render_row(&row))?;
        summary.rows_written += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

/// Combines the records of one variant, given in input order.
fn build_row(
    contributors: Vec<(ComparisonIndex, VariantRecord)>,
    index: &SubsetSampleIndex,
    tracked: &mut TrackedDatasets,
) -> Result<ConsensusRow, MergeError> {
    let n = contributors.len();
    let mut betas = Vec::with_capacity(n);
    let mut p_values = Vec::with_capacity(n);
    let mut sample_size = 0u64;
    let mut annotation = None;

    for (comparison, record) in contributors {
        let members = index.lookup(comparison, record.reported_counts)?;
        sample_size += tracked.accumulate(members);
        betas.push(record.beta);
        p_values.push(record.p_value);
        annotation.get_or_insert(record.annotation);
    }

    let min_p = p_values.iter().copied().fold(f64::INFINITY, f64::min);

    Ok(ConsensusRow {
        annotation: annotation.unwrap_or_default(),
        betas,
        p_values,
        consensus_p: consensus_p_value(min_p, n as u32),
        sample_size,
    })
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());

    pb
}
