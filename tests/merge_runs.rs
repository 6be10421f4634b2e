use concord::shared::files::create_text_sink;
use concord::{MergeError, RunConfig, run};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

const RUN_HEADER: &str = "CHR POS ID A1 A2 FREQ BETA SE P TEST STAT N_CASES N_CONTROLS";

fn run_line(id: &str, beta: f64, p: f64, cases: u32, controls: u32) -> String {
    format!("1 1000 {id} A G 0.12 {beta} 0.05 {p} ADD 2.0 {cases} {controls}")
}

fn write_run(root: &Path, comparison: u32, lines: &[String]) -> PathBuf {
    let dir = root.join(format!("comparison{comparison}"));
    fs::create_dir_all(&dir).expect("create comparison dir");
    let path = dir.join("assoc.txt");
    fs::write(&path, format!("{RUN_HEADER}\n{}\n", lines.join("\n"))).expect("write run");
    path
}

/// A model matrix of `total` subjects, the first `alt` of them with phenotype 1.
fn write_matrix(root: &Path, comparison: u32, name: &str, total: u32, alt: u32) -> PathBuf {
    let dir = root.join(format!("comparison{comparison}"));
    fs::create_dir_all(&dir).expect("create comparison dir");
    let path = dir.join(name);
    let mut text = String::from("FID IID PHENO\n");
    for i in 0..total {
        let pheno = if i < alt { 1 } else { 0 };
        text.push_str(&format!("f{i} i{i} {pheno}\n"));
    }
    fs::write(&path, text).expect("write model matrix");
    path
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

fn args(paths: &[&PathBuf], output: &Path) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| path.to_path_buf())
        .chain(std::iter::once(output.to_path_buf()))
        .collect()
}

#[test]
fn two_comparisons_merge_into_one_consensus_row() {
    let tmp = tempdir().expect("temporary directory");
    let root = tmp.path();
    let second = write_run(root, 2, &[run_line("rs10", -0.2, 0.02, 30, 50)]);
    let first = write_run(
        root,
        1,
        &[
            run_line("rs10", 0.1, 0.04, 40, 60),
            run_line("rs20", 0.3, 0.5, 40, 60),
        ],
    );
    let matrix_a = write_matrix(root, 1, "cohort_a.model_matrix", 100, 40);
    let matrix_b = write_matrix(root, 2, "cohort_b.model_matrix", 80, 30);
    let output = root.join("merged.tsv");

    let config =
        RunConfig::from_args(args(&[&second, &first, &matrix_a, &matrix_b], &output)).unwrap();
    assert_eq!(config.inputs, vec![first, second]);

    let summary = run(&config).unwrap();
    assert_eq!(summary.consensus_variants, 1);
    assert_eq!(summary.rows_written, 1);

    let rows = read_rows(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        [
            "CHR",
            "POS",
            "SNP",
            "Tested_Allele",
            "Other_Allele",
            "Freq_Tested_Allele_in_TOPMed",
            "BETA_COMP1",
            "BETA_COMP2",
            "P_COMP1",
            "P_COMP2",
            "P_CONSENSUS",
            "N",
        ]
    );
    assert_eq!(
        rows[1],
        ["1", "1000", "rs10", "A", "G", "0.12", "0.1", "-0.2", "0.04", "0.02", "0.0396", "180"]
    );
}

#[test]
fn cohort_shared_between_comparisons_is_counted_in_full_once() {
    let tmp = tempdir().expect("temporary directory");
    let root = tmp.path();
    let first = write_run(root, 1, &[run_line("rs1", 0.1, 0.3, 40, 60)]);
    // Comparison 2 pools the shared cohort with a second one: 40 + 10 cases, 60 + 40 controls.
    let second = write_run(root, 2, &[run_line("rs1", 0.2, 0.1, 50, 100)]);
    let shared_1 = write_matrix(root, 1, "shared.model_matrix", 100, 40);
    let unused_1 = write_matrix(root, 1, "unused.model_matrix", 7, 3);
    let shared_2 = write_matrix(root, 2, "shared.model_matrix", 100, 40);
    let extra_2 = write_matrix(root, 2, "extra.model_matrix", 50, 10);
    let output = root.join("merged.tsv");

    let config = RunConfig::from_args(args(
        &[&first, &second, &shared_1, &unused_1, &shared_2, &extra_2],
        &output,
    ))
    .unwrap();
    run(&config).unwrap();

    let rows = read_rows(&output);
    let row = &rows[1];
    // shared: 100 through comparison 1, then only its 40 cases; extra: 50.
    assert_eq!(row[row.len() - 1], "190");
    assert_eq!(row[row.len() - 2], "0.19");
}

#[test]
fn ambiguous_subset_totals_abort_before_output_is_created() {
    let tmp = tempdir().expect("temporary directory");
    let root = tmp.path();
    let first = write_run(root, 1, &[run_line("rs1", 0.1, 0.3, 5, 10)]);
    let second = write_run(root, 2, &[run_line("rs1", 0.1, 0.3, 5, 10)]);
    // {a} and {b, c} both aggregate to 5 cases and 10 controls.
    let a = write_matrix(root, 1, "a.model_matrix", 15, 5);
    let b = write_matrix(root, 1, "b.model_matrix", 5, 2);
    let c = write_matrix(root, 1, "c.model_matrix", 10, 3);
    let d = write_matrix(root, 2, "d.model_matrix", 15, 5);
    let output = root.join("merged.tsv");

    let config =
        RunConfig::from_args(args(&[&first, &second, &a, &b, &c, &d], &output)).unwrap();
    match run(&config) {
        Err(MergeError::Collision { key, .. }) => {
            assert_eq!((key.cases, key.controls), (5, 10));
        }
        other => panic!("expected collision, got {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn comparison_without_matrices_fails_the_lookup() {
    let tmp = tempdir().expect("temporary directory");
    let root = tmp.path();
    let first = write_run(root, 1, &[run_line("rs1", 0.1, 0.3, 40, 60)]);
    let second = write_run(root, 2, &[run_line("rs1", 0.1, 0.3, 30, 50)]);
    let matrix_a = write_matrix(root, 1, "a.model_matrix", 100, 40);
    let matrix_b = write_matrix(root, 1, "b.model_matrix", 10, 3);
    let output = root.join("merged.tsv");

    let config =
        RunConfig::from_args(args(&[&first, &second, &matrix_a, &matrix_b], &output)).unwrap();
    match run(&config) {
        Err(MergeError::SampleSizeResolution {
            comparison, known, ..
        }) => {
            assert_eq!(comparison.0, 2);
            assert!(known.is_empty());
        }
        other => panic!("expected lookup failure, got {other:?}"),
    }
}

#[test]
fn gzip_inputs_and_output_are_handled_transparently() {
    let tmp = tempdir().expect("temporary directory");
    let root = tmp.path();
    let mut runs = Vec::new();
    for (comparison, p) in [(1u32, 2e-9), (2, 0.7)] {
        let dir = root.join(format!("comparison{comparison}"));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("assoc.txt.gz");
        let mut sink = create_text_sink(&path).unwrap();
        sink.write_line(RUN_HEADER).unwrap();
        sink.write_line(&run_line("rs7", 0.5, p, 40, 60)).unwrap();
        sink.finish().unwrap();
        runs.push(path);
    }
    let matrix_1 = write_matrix(root, 1, "a.model_matrix", 100, 40);
    let matrix_2 = write_matrix(root, 2, "b.model_matrix", 100, 40);
    let output = root.join("merged.tsv.gz");

    let config = RunConfig::from_args(args(
        &[&runs[0], &runs[1], &matrix_1, &matrix_2],
        &output,
    ))
    .unwrap();
    let summary = run(&config).unwrap();
    assert_eq!(summary.rows_written, 1);

    let mut source = concord::shared::files::open_text_source(&output).unwrap();
    assert!(source.next_line().unwrap().is_some_and(|line| line.starts_with("CHR\t")));
    let row: Vec<String> = source
        .next_line()
        .unwrap()
        .expect("data row")
        .split('\t')
        .map(str::to_string)
        .collect();
    assert_eq!(row[row.len() - 2], "4e-09");
    // Both comparisons name different files of identical size.
    assert_eq!(row[row.len() - 1], "200");
}
