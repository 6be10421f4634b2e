// ========================================================================================
//                             High-level data contracts
// ========================================================================================

// Types passed between the passes and the output writer.

use crate::error::MergeError;
use std::fmt;
use std::path::Path;

/// Column layout of an association-run line. Positions are 0-based.
const ID_COLUMN: usize = 2;
const ALLELE1_COLUMN: usize = 3;
const ALLELE2_COLUMN: usize = 4;
const FREQUENCY_COLUMN: usize = 5;
const BETA_COLUMN: usize = 6;
const P_COLUMN: usize = 8;
const COUNT_FIRST_COLUMN: usize = 11;
const COUNT_SECOND_COLUMN: usize = 12;

/// Number of leading columns needed to build a variant key.
pub const KEY_FIELD_COUNT: usize = ALLELE2_COLUMN + 1;
/// Number of columns a fully parsed association-run line must carry.
pub const RECORD_FIELD_COUNT: usize = COUNT_SECOND_COLUMN + 1;

/// Canonical identity of a variant: `ID:min(A1,A2):max(A1,A2)`.
///
/// Ordering is byte-wise on the joined text, which is the order the streaming
/// merge uses to pick its next target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey(String);

impl VariantKey {
    pub fn normalize(id: &str, allele1: &str, allele2: &str) -> Self {
        let (low, high) = if allele1 < allele2 {
            (allele1, allele2)
        } else {
            (allele2, allele1)
        };
        VariantKey(format!("{id}:{low}:{high}"))
    }

    /// Builds the key from the leading columns of a whitespace-delimited line.
    /// Returns `None` if the line has fewer than [`KEY_FIELD_COUNT`] fields.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace().skip(ID_COLUMN);
        let id = fields.next()?;
        let allele1 = fields.next()?;
        let allele2 = fields.next()?;
        Some(Self::normalize(id, allele1, allele2))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The sub-analysis a file belongs to, decoded from its `comparisonNNN` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparisonIndex(pub u32);

impl fmt::Display for ComparisonIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subjects attributed to one model-matrix file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubjectCount {
    pub total: u32,
    /// Subjects whose phenotype flag is 1.
    pub alt: u32,
}

impl SubjectCount {
    pub fn controls(&self) -> u32 {
        self.total - self.alt
    }
}

/// Aggregate `(cases, controls)` pair that identifies one subset of a comparison's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsetKey {
    pub cases: u32,
    pub controls: u32,
}

impl SubsetKey {
    pub fn new(cases: u32, controls: u32) -> Self {
        Self { cases, controls }
    }
}

impl fmt::Display for SubsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cases, self.controls)
    }
}

/// One fully parsed line of an association run.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub key: VariantKey,
    /// `CHR POS ID A1 A2 FREQ`, verbatim from the line.
    pub annotation: [String; 6],
    pub beta: f64,
    pub p_value: f64,
    /// The two trailing count columns, matched verbatim against the subset index.
    pub reported_counts: SubsetKey,
}

impl VariantRecord {
    /// Parses a data line. `path` and `line_number` only feed the diagnostic.
    pub fn parse(line: &str, path: &Path, line_number: usize) -> Result<Self, MergeError> {
        let parse_error = |reason: String| MergeError::Parse {
            path: path.to_path_buf(),
            line_number,
            line: line.to_string(),
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < RECORD_FIELD_COUNT {
            return Err(parse_error(format!(
                "insufficient entries: expected at least {RECORD_FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }

        let key = VariantKey::normalize(
            fields[ID_COLUMN],
            fields[ALLELE1_COLUMN],
            fields[ALLELE2_COLUMN],
        );

        let beta: f64 = fields[BETA_COLUMN]
            .parse()
            .map_err(|_| parse_error(format!("invalid beta '{}'", fields[BETA_COLUMN])))?;

        let p_value: f64 = fields[P_COLUMN]
            .parse()
            .map_err(|_| parse_error(format!("invalid p-value '{}'", fields[P_COLUMN])))?;
        if !p_value.is_finite() || !(0.0..=1.0).contains(&p_value) {
            return Err(parse_error(format!(
                "p-value '{}' is outside [0, 1]",
                fields[P_COLUMN]
            )));
        }

        let parse_count = |column: usize| -> Result<u32, MergeError> {
            fields[column].parse().map_err(|_| {
                parse_error(format!(
                    "invalid subject count '{}' in column {}",
                    fields[column],
                    column + 1
                ))
            })
        };
        let reported_counts = SubsetKey::new(
            parse_count(COUNT_FIRST_COLUMN)?,
            parse_count(COUNT_SECOND_COLUMN)?,
        );

        let annotation = [
            fields[0].to_string(),
            fields[1].to_string(),
            fields[ID_COLUMN].to_string(),
            fields[ALLELE1_COLUMN].to_string(),
            fields[ALLELE2_COLUMN].to_string(),
            fields[FREQUENCY_COLUMN].to_string(),
        ];

        Ok(Self {
            key,
            annotation,
            beta,
            p_value,
            reported_counts,
        })
    }
}

/// One emitted output row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusRow {
    pub annotation: [String; 6],
    /// One per input file, in input order.
    pub betas: Vec<f64>,
    /// One per input file, in input order.
    pub p_values: Vec<f64>,
    pub consensus_p: f64,
    pub sample_size: u64,
}
