//! Best-effort parsing of test-tool output.
//!
//! Two isolated concerns, both resilient to format drift:
//!
//! - pass/fail counts from the tool's summary line, using a
//!   numeric-token-before-keyword heuristic; a parser miss degrades to zero
//!   rather than failing verification
//! - import-error classification, the signal that separates blocking
//!   failures (artifacts cannot even be collected) from quality failures
//!   (tests run but some fail)
//!
//! Keeping this behind its own seam means the parsing strategy can change
//! with the tool's output format without touching the orchestrator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static MODULE_NOT_FOUND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ModuleNotFoundError: No module named '([^']+)'").unwrap());

static IMPORT_ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ImportError: (.+)").unwrap());

/// Module-name prefixes that indicate a standard-library import rather than a
/// project-local one. Fix suggestions are only synthesized for local modules.
const STDLIB_PREFIXES: [&str; 5] = ["sys", "os", "json", "typing", "pathlib"];

/// Parse `(passed, failed)` from tool output.
///
/// The count is the whitespace-separated token immediately preceding a token
/// containing the literal word `passed` or `failed`, as in
/// `2 failed, 3 passed in 0.41s`. When several candidate lines exist the
/// last one wins (the summary line is printed last). Unparseable tokens are
/// treated as zero.
pub fn parse_summary_counts(output: &str) -> (u32, u32) {
    let mut passed = 0;
    let mut failed = 0;

    for line in output.lines() {
        if !line.contains("passed") && !line.contains("failed") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        for (i, part) in parts.iter().enumerate() {
            if i == 0 {
                continue;
            }
            if part.contains("passed") {
                if let Ok(n) = parts[i - 1].parse::<u32>() {
                    passed = n;
                }
            }
            if part.contains("failed") {
                if let Ok(n) = parts[i - 1].parse::<u32>() {
                    failed = n;
                }
            }
        }
    }

    (passed, failed)
}

/// An advisory repair suggestion synthesized from import diagnostics.
///
/// Consumed by routing rationales as human-readable instructions for the
/// next dispatched worker; never executed by the verifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub issue: String,
    pub action: String,
}

impl FixSuggestion {
    pub fn new(issue: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
            action: action.into(),
        }
    }
}

/// Classification of import-level failures in tool output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDiagnostics {
    /// True when any import-error signature matched. Orthogonal to timeouts
    /// and missing tools, which are execution failures, not blocking ones.
    pub has_blocking_errors: bool,
    /// Unique missing module names, in first-seen order.
    pub missing_modules: Vec<String>,
    /// Human-readable detail per missing module.
    pub error_details: Vec<String>,
    /// Advisory fixes for the routing rationale.
    pub suggested_fixes: Vec<FixSuggestion>,
}

impl ImportDiagnostics {
    /// Scan raw tool output for the two import-error signatures:
    /// `ModuleNotFoundError` (capturing the module name) and a generic
    /// `ImportError`. Either one marks the artifacts as blocked.
    pub fn from_output(output: &str) -> Self {
        let mut diagnostics = Self::default();

        let mut missing: Vec<String> = Vec::new();
        for cap in MODULE_NOT_FOUND_REGEX.captures_iter(output) {
            if let Some(name) = cap.get(1) {
                let name = name.as_str().to_string();
                if !missing.contains(&name) {
                    missing.push(name);
                }
            }
        }
        let generic_import_failure = IMPORT_ERROR_REGEX.is_match(output);

        if missing.is_empty() && !generic_import_failure {
            return diagnostics;
        }

        diagnostics.has_blocking_errors = true;
        diagnostics.missing_modules = missing.clone();

        for module in &missing {
            diagnostics.error_details.push(format!(
                "module '{module}' not found - tests cannot import it"
            ));
        }
        if generic_import_failure && missing.is_empty() {
            diagnostics
                .error_details
                .push("import failure prevented test collection".to_string());
        }

        let local_modules: Vec<&String> = missing
            .iter()
            .filter(|m| !STDLIB_PREFIXES.iter().any(|p| m.starts_with(p)))
            .collect();

        if !local_modules.is_empty() {
            let names = local_modules
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.suggested_fixes.push(FixSuggestion::new(
                format!("tests cannot import local modules: {names}"),
                "inject a dependency search path pointing at the source root at the top of each failing test file",
            ));
            diagnostics.suggested_fixes.push(FixSuggestion::new(
                "source tree location unconfirmed",
                "confirm the path to the code under test before the next attempt",
            ));
            if local_modules.iter().any(|m| m.contains('_') || m.contains('-')) {
                diagnostics.suggested_fixes.push(FixSuggestion::new(
                    "module names contain separators and may be misspelled",
                    "verify the import names against the actual file names in the source tree",
                ));
            }
        } else if generic_import_failure {
            diagnostics.suggested_fixes.push(FixSuggestion::new(
                "import failure without a missing-module name",
                "inspect the raw tool output and repair the failing import statements",
            ));
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // Summary count parsing
    // =========================================

    #[test]
    fn test_parse_passed_only() {
        let (passed, failed) = parse_summary_counts("===== 5 passed in 0.12s =====");
        assert_eq!(passed, 5);
        assert_eq!(failed, 0);
    }

    #[test]
    fn test_parse_passed_and_failed() {
        let (passed, failed) = parse_summary_counts("== 2 failed, 3 passed in 0.41s ==");
        assert_eq!(passed, 3);
        assert_eq!(failed, 2);
    }

    #[test]
    fn test_parse_last_summary_line_wins() {
        let output = "1 passed in 0.1s\ncollected again\n4 passed, 1 failed in 0.3s";
        let (passed, failed) = parse_summary_counts(output);
        assert_eq!(passed, 4);
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_parse_garbage_degrades_to_zero() {
        assert_eq!(parse_summary_counts("no summary here"), (0, 0));
        assert_eq!(parse_summary_counts(""), (0, 0));
        assert_eq!(parse_summary_counts("tests passed somehow"), (0, 0));
    }

    #[test]
    fn test_parse_keyword_with_punctuation() {
        // "failed," still contains the keyword
        let (passed, failed) = parse_summary_counts("7 failed, 12 passed, 2 warnings in 1.2s");
        assert_eq!(passed, 12);
        assert_eq!(failed, 7);
    }

    #[test]
    fn test_parse_keyword_first_token_is_ignored() {
        // A keyword in the first position has no preceding token
        assert_eq!(parse_summary_counts("passed 5"), (0, 0));
    }

    // =========================================
    // Import diagnostics
    // =========================================

    #[test]
    fn test_no_import_errors() {
        let d = ImportDiagnostics::from_output("5 passed in 0.2s");
        assert!(!d.has_blocking_errors);
        assert!(d.missing_modules.is_empty());
        assert!(d.suggested_fixes.is_empty());
    }

    #[test]
    fn test_module_not_found_captures_name() {
        let output = "E   ModuleNotFoundError: No module named 'taskapp'";
        let d = ImportDiagnostics::from_output(output);
        assert!(d.has_blocking_errors);
        assert_eq!(d.missing_modules, vec!["taskapp"]);
        assert!(!d.suggested_fixes.is_empty());
        assert!(d.suggested_fixes[0].issue.contains("taskapp"));
    }

    #[test]
    fn test_duplicate_modules_deduplicated_in_order() {
        let output = "\
ModuleNotFoundError: No module named 'beta'
ModuleNotFoundError: No module named 'alpha'
ModuleNotFoundError: No module named 'beta'";
        let d = ImportDiagnostics::from_output(output);
        assert_eq!(d.missing_modules, vec!["beta", "alpha"]);
    }

    #[test]
    fn test_generic_import_error_is_blocking() {
        let d = ImportDiagnostics::from_output("ImportError: cannot import name 'Widget'");
        assert!(d.has_blocking_errors);
        assert!(d.missing_modules.is_empty());
        assert!(!d.error_details.is_empty());
        assert!(!d.suggested_fixes.is_empty());
    }

    #[test]
    fn test_stdlib_modules_get_no_path_fix() {
        let d = ImportDiagnostics::from_output("ModuleNotFoundError: No module named 'os.weird'");
        assert!(d.has_blocking_errors);
        // stdlib-prefixed name: no search-path suggestion is synthesized
        assert!(
            d.suggested_fixes
                .iter()
                .all(|f| !f.action.contains("search path"))
        );
    }

    #[test]
    fn test_underscored_module_adds_naming_check() {
        let d =
            ImportDiagnostics::from_output("ModuleNotFoundError: No module named 'task_service'");
        assert!(
            d.suggested_fixes
                .iter()
                .any(|f| f.action.contains("import names"))
        );
    }

    #[test]
    fn test_timeout_text_is_not_blocking() {
        // Execution failures must not be classified as import errors
        let d = ImportDiagnostics::from_output("test execution timed out after 30s");
        assert!(!d.has_blocking_errors);
    }
}
