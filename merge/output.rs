//! Rendering of the merged table.

use crate::types::ConsensusRow;
use itertools::Itertools;

const ANNOTATION_HEADER: [&str; 6] = [
    "CHR",
    "POS",
    "SNP",
    "Tested_Allele",
    "Other_Allele",
    "Freq_Tested_Allele_in_TOPMed",
];

/// Significant digits of every rendered floating-point value.
const SIGNIFICANT_DIGITS: i32 = 6;

/// Header line for a merge of `input_count` runs.
pub fn header_line(input_count: usize) -> String {
    let betas = (1..=input_count).map(|i| format!("BETA_COMP{i}"));
    let p_values = (1..=input_count).map(|i| format!("P_COMP{i}"));
    ANNOTATION_HEADER
        .iter()
        .map(|label| label.to_string())
        .chain(betas)
        .chain(p_values)
        .chain(["P_CONSENSUS".to_string(), "N".to_string()])
        .join("\t")
}

pub fn render_row(row: &ConsensusRow) -> String {
    row.annotation
        .iter()
        .cloned()
        .chain(row.betas.iter().map(|&beta| format_general(beta)))
        .chain(row.p_values.iter().map(|&p| format_general(p)))
        .chain([format_general(row.consensus_p), row.sample_size.to_string()])
        .join("\t")
}

/// `%g`-style rendering with six significant digits: fixed notation for decimal
/// exponents in `[-4, 6)`, scientific otherwise, trailing zeros removed and at
/// least two exponent digits.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Scientific rendering rounds to the target digits and gives the decimal exponent.
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..SIGNIFICANT_DIGITS).contains(&exponent) {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lists_per_run_columns_in_order() {
        assert_eq!(
            header_line(2),
            "CHR\tPOS\tSNP\tTested_Allele\tOther_Allele\tFreq_Tested_Allele_in_TOPMed\t\
             BETA_COMP1\tBETA_COMP2\tP_COMP1\tP_COMP2\tP_CONSENSUS\tN"
        );
    }

    #[test]
    fn general_format_matches_stream_defaults() {
        let cases = [
            (0.0396, "0.0396"),
            (1.0 - 0.98f64 * 0.98, "0.0396"),
            (0.125, "0.125"),
            (-0.5, "-0.5"),
            (1.0, "1"),
            (100.0, "100"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (5e-8, "5e-08"),
            (2.9999999999e-10, "3e-10"),
            (1e-300, "1e-300"),
            (0.0, "0"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_general(value), expected, "value {value:e}");
        }
    }

    #[test]
    fn row_renders_annotation_then_betas_then_p_values() {
        let row = ConsensusRow {
            annotation: ["1", "100", "rs1", "A", "G", "0.3"].map(String::from),
            betas: vec![0.1, -0.2],
            p_values: vec![0.04, 0.02],
            consensus_p: 0.0396,
            sample_size: 180,
        };
        assert_eq!(
            render_row(&row),
            "1\t100\trs1\tA\tG\t0.3\t0.1\t-0.2\t0.04\t0.02\t0.0396\t180"
        );
    }
}
