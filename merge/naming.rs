//! Pipeline file-naming conventions.
//!
//! Association runs live under a `comparisonNNN/` directory and the matching
//! phenotype tables end in `model_matrix`. Nothing else about a path is interpreted.

use crate::error::MergeError;
use crate::types::ComparisonIndex;
use natord::compare;
use std::path::{Path, PathBuf};

const COMPARISON_MARKER: &str = "comparison";
const MODEL_MATRIX_SUFFIX: &str = "model_matrix";

/// Decodes the comparison index from the last `comparison` segment of a path.
///
/// The text after the marker, up to the next `/`, is read as its leading decimal
/// digits, so `run/comparison12/out.txt` and `comparison3.model_matrix` yield 12 and 3.
pub fn comparison_index(path: &Path) -> Result<ComparisonIndex, MergeError> {
    let text = path.to_string_lossy();
    let convention_error = |reason: &str| MergeError::FormatConvention {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let start = text
        .rfind(COMPARISON_MARKER)
        .ok_or_else(|| convention_error("comparison directory format not recognized"))?;
    let truncated = &text[start + COMPARISON_MARKER.len()..];
    let segment = truncated.split('/').next().unwrap_or("");
    let digits: &str = {
        let end = segment
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(segment.len());
        &segment[..end]
    };
    if digits.is_empty() {
        return Err(convention_error(
            "no comparison number follows the 'comparison' marker",
        ));
    }
    digits
        .parse::<u32>()
        .map(ComparisonIndex)
        .map_err(|e| convention_error(&format!("comparison number '{digits}' is invalid: {e}")))
}

pub fn is_model_matrix(path: &Path) -> bool {
    path.to_string_lossy().ends_with(MODEL_MATRIX_SUFFIX)
}

/// Orders association runs by comparison index. Runs of the same comparison keep
/// natural path order.
pub fn sort_by_comparison(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, MergeError> {
    let mut keyed = paths
        .into_iter()
        .map(|path| comparison_index(&path).map(|index| (index, path)))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|(ia, pa), (ib, pb)| {
        ia.cmp(ib)
            .then_with(|| compare(&pa.to_string_lossy(), &pb.to_string_lossy()))
    });
    Ok(keyed.into_iter().map(|(_, path)| path).collect())
}
