// ========================================================================================
//
//                       First pass: variants present in every run
//
// ========================================================================================

use crate::error::MergeError;
use crate::shared::files::{TextSource, next_data_line, open_text_source};
use crate::types::VariantKey;
use ahash::AHashMap;
use log::debug;
use std::path::{Path, PathBuf};

/// Tally of how many input files contain each variant key.
///
/// Consensus means present in *every* file. A majority is not enough: the
/// downstream consumers of the merged table expect each row to carry one
/// estimate per comparison.
#[derive(Debug, Default)]
pub struct ConsensusMap {
    counts: AHashMap<VariantKey, u32>,
    files_seen: u32,
}

impl ConsensusMap {
    /// Runs the first pass over `paths`. Each file is read to the end and closed
    /// before the next one is opened.
    pub fn discover(paths: &[PathBuf]) -> Result<Self, MergeError> {
        let mut map = Self::default();
        for path in paths {
            map.add_file(path)?;
        }
        Ok(map)
    }

    pub fn add_file(&mut self, path: &Path) -> Result<(), MergeError> {
        let mut source = open_text_source(path)?;
        let added = self.add_source(source.as_mut())?;
        debug!("{}: {added} variant lines tallied", path.display());
        Ok(())
    }

    fn add_source(&mut self, source: &mut dyn TextSource) -> Result<usize, MergeError> {
        let mut lines = 0usize;
        // Header.
        if source.next_line()?.is_none() {
            self.files_seen += 1;
            return Ok(0);
        }
        while let Some(line) = next_data_line(source)? {
            let key = VariantKey::from_line(&line).ok_or_else(|| MergeError::Parse {
                path: source.path().to_path_buf(),
                line_number: source.line_number(),
                line: line.clone(),
                reason: "cannot extract ID and alleles from the first five columns".to_string(),
            })?;
            *self.counts.entry(key).or_insert(0) += 1;
            lines += 1;
        }
        self.files_seen += 1;
        Ok(lines)
    }

    pub fn files_seen(&self) -> u32 {
        self.files_seen
    }

    pub fn count(&self, key: &VariantKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_consensus(&self, key: &VariantKey) -> bool {
        self.files_seen > 0 && self.count(key) == self.files_seen
    }

    /// Number of keys present in every file.
    pub fn consensus_len(&self) -> usize {
        self.counts
            .values()
            .filter(|&&count| count == self.files_seen)
            .count()
    }
}
