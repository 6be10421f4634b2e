use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Source trees held to the lint rules below. The vendored reference material and
// build output are never scanned.
const SCANNED_ROOTS: [&str; 4] = ["merge", "shared", "src", "tests"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED", "CORRECTED", "FIX", "FIXES", "NEW", "CHANGED", "CHANGES", "CHANGE", "MODIFIED",
    "MODIFIES", "MODIFY", "UPDATED", "UPDATES", "UPDATE",
];

/// One source-text rule: a line regex plus a filter deciding whether a matched
/// line really violates it.
struct Rule {
    name: &'static str,
    pattern: String,
    advice: &'static str,
    is_violation: fn(&str) -> bool,
}

/// Gathers the violating lines of one file.
struct RuleCollector {
    is_violation: fn(&str) -> bool,
    violations: Vec<String>,
}

impl Sink for RuleCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

/// Underscore-prefixed identifiers in code, outside comments and string literals.
fn underscore_in_code(line: &str) -> bool {
    if is_comment_line(line) {
        return false;
    }
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !in_string
}

fn forbidden_word_in_comment(line: &str) -> bool {
    is_comment_line(line)
}

fn stars_in_plain_comment(line: &str) -> bool {
    is_comment_line(line) && !is_doc_comment(line)
}

/// Comments whose alphabetic characters are all uppercase.
fn shouting_comment(line: &str) -> bool {
    if !is_comment_line(line) {
        return false;
    }
    let text = line.trim_start().trim_start_matches(['/', '*', '!']);
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "underscore-prefixed identifiers",
            pattern: r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            advice: "Use the binding under its real name or remove it.",
            is_violation: underscore_in_code,
        },
        Rule {
            name: "change-log words in comments",
            pattern: format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            advice: "Comments describe the code as it is, not its history.",
            is_violation: forbidden_word_in_comment,
        },
        Rule {
            name: "'**' in non-doc comments",
            pattern: r"(//|/\*).*\*\*".to_string(),
            advice: "Emphasis markers belong in doc comments only.",
            is_violation: stars_in_plain_comment,
        },
        Rule {
            name: "all-uppercase comments",
            pattern: r"(//|/\*).*".to_string(),
            advice: "Rewrite the comment in sentence case or delete it.",
            is_violation: shouting_comment,
        },
        Rule {
            name: "#[allow(dead_code)] attributes",
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
            advice: "Use the code or remove it.",
            is_violation: |_| true,
        },
    ]
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SCANNED_ROOTS
        .into_iter()
        .filter(|root| Path::new(root).is_dir())
        .flat_map(|root| {
            WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
                .map(|e| e.into_path())
        })
}

fn check_rule(rule: &Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = RuleCollector {
            is_violation: rule.is_violation,
            violations: Vec::new(),
        };
        searcher.search_path(&matcher, path, &mut collector)?;
        if !collector.violations.is_empty() {
            let mut message = format!(
                "\n❌ ERROR: Found {} {} in {}:\n",
                collector.violations.len(),
                rule.name,
                path.display()
            );
            for violation in &collector.violations {
                message.push_str(&format!("   {violation}\n"));
            }
            message.push_str(&format!("\n⚠️ {}\n", rule.advice));
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SCANNED_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let files: Vec<PathBuf> = rust_sources().collect();
    for rule in rules() {
        if let Err(e) = check_rule(&rule, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
