// ========================================================================================
//
//                 Combinatorial sample-size resolution and de-duplication
//
// ========================================================================================
//
// An association run only reports aggregate subject counts, not which cohort files
// were pooled to produce them. For every comparison we therefore enumerate every
// non-empty subset of its model matrices and remember the aggregate `(cases, controls)`
// of each. At merge time the aggregate reported on a line is mapped back to the exact
// set of cohort files, so a cohort that appears under several comparisons is counted
// in full only once.
//
// The mapping is only sound if no two subsets share an aggregate. That is checked
// while building the index and reported as a hard error.

use crate::error::MergeError;
use crate::naming::comparison_index;
use crate::shared::files::{TextSource, next_data_line, open_text_source};
use crate::types::{ComparisonIndex, SubjectCount, SubsetKey};
use ahash::AHashSet;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Subsets are enumerated with a `u32` mask.
const MAX_GROUP_MEMBERS: usize = 31;

/// Per-file subject counts of one subset, keyed by base file name.
pub type SubsetMembers = BTreeMap<String, SubjectCount>;

/// Reads a model matrix (`FID IID PHENO` rows after a header) and counts its
/// subjects and the subjects whose phenotype flag is 1.
pub fn count_subjects(path: &Path) -> Result<SubjectCount, MergeError> {
    let mut source = open_text_source(path)?;
    count_subjects_in(source.as_mut())
}

fn count_subjects_in(source: &mut dyn TextSource) -> Result<SubjectCount, MergeError> {
    let mut counts = SubjectCount::default();
    if source.next_line()?.is_none() {
        return Ok(counts);
    }
    while let Some(line) = next_data_line(source)? {
        let mut fields = line.split_whitespace();
        let pheno = match (fields.next(), fields.next(), fields.next()) {
            (Some(_), Some(_), Some(pheno)) => pheno,
            _ => {
                return Err(MergeError::Parse {
                    path: source.path().to_path_buf(),
                    line_number: source.line_number(),
                    line: line.clone(),
                    reason: "expected FID, IID and PHENO columns".to_string(),
                });
            }
        };
        // Missing-phenotype codes such as -9 still count toward the total.
        let flag: i64 = pheno.parse().map_err(|_| MergeError::Parse {
            path: source.path().to_path_buf(),
            line_number: source.line_number(),
            line: line.clone(),
            reason: format!("phenotype '{pheno}' is not an integer"),
        })?;
        if flag == 1 {
            counts.alt += 1;
        }
        counts.total += 1;
    }
    Ok(counts)
}

fn base_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    match text.rfind('/') {
        Some(idx) => text[idx + 1..].to_string(),
        None => text.into_owned(),
    }
}

/// The model matrices of one comparison, ordered by full path.
#[derive(Debug, Default, Clone)]
pub struct ComparisonGroup {
    members: BTreeMap<PathBuf, SubjectCount>,
}

impl ComparisonGroup {
    pub fn insert(&mut self, path: PathBuf, counts: SubjectCount) {
        self.members.insert(path, counts);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Lookup table from the aggregate counts of every subset of one comparison to
/// the files of that subset.
#[derive(Debug, Default, Clone)]
pub struct SubsetTable {
    subsets: BTreeMap<SubsetKey, SubsetMembers>,
}

impl SubsetTable {
    /// Enumerates all `2^k - 1` non-empty subsets of `group`.
    pub fn build(comparison: ComparisonIndex, group: &ComparisonGroup) -> Result<Self, MergeError> {
        if group.len() > MAX_GROUP_MEMBERS {
            return Err(MergeError::Usage(format!(
                "comparison {comparison} has {} model matrices; at most {MAX_GROUP_MEMBERS} can be resolved",
                group.len()
            )));
        }

        let members: Vec<(&PathBuf, &SubjectCount)> = group.members.iter().collect();
        let subset_count: u32 = (1u32 << members.len()) - 1;
        let mut table = Self::default();

        for mask in 1..=subset_count {
            let mut key = SubsetKey::new(0, 0);
            let mut subset = SubsetMembers::new();
            for (bit, (path, counts)) in members.iter().enumerate() {
                if mask & (1 << bit) == 0 {
                    continue;
                }
                key.cases += counts.alt;
                key.controls += counts.controls();
                subset.insert(base_name(path), **counts);
            }

            if let Some(existing) = table.subsets.get(&key) {
                return Err(MergeError::Collision {
                    comparison,
                    key,
                    first_members: existing.keys().cloned().collect(),
                    second_members: subset.keys().cloned().collect(),
                    known: table.subsets.keys().copied().collect(),
                });
            }
            table.subsets.insert(key, subset);
        }

        Ok(table)
    }

    pub fn get(&self, key: &SubsetKey) -> Option<&SubsetMembers> {
        self.subsets.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubsetKey> {
        self.subsets.keys()
    }

    pub(crate) fn len(&self) -> usize {
        self.subsets.len()
    }
}

/// Subset tables for every comparison that has model matrices.
#[derive(Debug, Default, Clone)]
pub struct SubsetSampleIndex {
    tables: BTreeMap<ComparisonIndex, SubsetTable>,
}

impl SubsetSampleIndex {
    /// Counts every model matrix, groups them by comparison and builds the subset tables.
    pub fn resolve(model_matrix_paths: &[PathBuf]) -> Result<Self, MergeError> {
        let mut groups: BTreeMap<ComparisonIndex, ComparisonGroup> = BTreeMap::new();
        for path in model_matrix_paths {
            let comparison = comparison_index(path)?;
            let counts = count_subjects(path)?;
            debug!(
                "{}: comparison {comparison}, {} subjects ({} alternate)",
                path.display(),
                counts.total,
                counts.alt
            );
            groups
                .entry(comparison)
                .or_default()
                .insert(path.clone(), counts);
        }
        Self::from_groups(&groups)
    }

    pub fn from_groups(
        groups: &BTreeMap<ComparisonIndex, ComparisonGroup>,
    ) -> Result<Self, MergeError> {
        let mut tables = BTreeMap::new();
        for (&comparison, group) in groups {
            if group.is_empty() {
                debug!("Comparison {comparison}: no model matrices, nothing to index");
                continue;
            }
            let table = SubsetTable::build(comparison, group)?;
            info!(
                "Comparison {comparison}: {} model matrices, {} subsets indexed",
                group.len(),
                table.len()
            );
            tables.insert(comparison, table);
        }
        Ok(Self { tables })
    }

    pub fn table(&self, comparison: ComparisonIndex) -> Option<&SubsetTable> {
        self.tables.get(&comparison)
    }

    /// Maps the aggregate reported by a run of `comparison` back to its files.
    pub fn lookup(
        &self,
        comparison: ComparisonIndex,
        reported: SubsetKey,
    ) -> Result<&SubsetMembers, MergeError> {
        let table = self.tables.get(&comparison);
        table
            .and_then(|table| table.get(&reported))
            .ok_or_else(|| MergeError::SampleSizeResolution {
                comparison,
                observed: reported,
                known: table
                    .map(|table| table.keys().copied().collect())
                    .unwrap_or_default(),
            })
    }
}

/// Cohort files already counted in full. Lives for one whole merge run and is
/// never reset between variants.
#[derive(Debug, Default)]
pub struct TrackedDatasets {
    seen: AHashSet<String>,
}

impl TrackedDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one subset's contribution: the full total for cohorts not yet seen,
    /// only the alternate count for cohorts already counted.
    pub fn accumulate(&mut self, subset: &SubsetMembers) -> u64 {
        let mut added = 0u64;
        for (name, counts) in subset {
            if self.seen.contains(name) {
                added += u64::from(counts.alt);
            } else {
                self.seen.insert(name.clone());
                added += u64::from(counts.total);
            }
        }
        added
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
