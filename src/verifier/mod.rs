//! Ground-truth verification of produced artifacts.
//!
//! The verifier is the one component that keeps the engine honest: instead of
//! trusting worker self-reports it discovers artifacts on disk, executes them
//! with the external test tool, and classifies what actually happened. A
//! fresh [`VerificationReport`] is built on every call; artifacts change
//! between iterations, so nothing is cached.
//!
//! Verification never fails as a whole. Tool-missing and timeout conditions
//! degrade into recorded errors with `execution_succeeded=false`; only an
//! import-error signature in the raw output marks artifacts as blocked.

pub mod parser;

pub use parser::{FixSuggestion, ImportDiagnostics};

use crate::capability::TestRunner;
use crate::category::Category;
use crate::verifier::parser::parse_summary_counts;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default per-invocation ceiling for the external test tool.
const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Per-category verification evidence.
///
/// Counts are only set together so `tests_total` always equals
/// `tests_passed + tests_failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEvidence {
    exists: bool,
    files_found: Vec<PathBuf>,
    tests_passed: u32,
    tests_failed: u32,
}

impl CategoryEvidence {
    /// Evidence for a discovered category.
    pub fn discovered(files: Vec<PathBuf>) -> Self {
        Self {
            exists: !files.is_empty(),
            files_found: files,
            tests_passed: 0,
            tests_failed: 0,
        }
    }

    /// Record execution counts for this category.
    pub fn with_counts(mut self, passed: u32, failed: u32) -> Self {
        self.tests_passed = passed;
        self.tests_failed = failed;
        self
    }

    /// Whether any artifacts exist for the category. `false` is a coverage
    /// gap, not an error.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn files_found(&self) -> &[PathBuf] {
        &self.files_found
    }

    pub fn tests_passed(&self) -> u32 {
        self.tests_passed
    }

    pub fn tests_failed(&self) -> u32 {
        self.tests_failed
    }

    pub fn tests_total(&self) -> u32 {
        self.tests_passed + self.tests_failed
    }
}

/// The ground truth about artifact state for one iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    per_category: BTreeMap<Category, CategoryEvidence>,
    tests_passed: u32,
    tests_failed: u32,
    execution_succeeded: bool,
    errors: Vec<String>,
    imports: ImportDiagnostics,
    /// Tail of the aggregate run's raw output, kept for the decision summary.
    raw_output: String,
}

impl VerificationReport {
    /// A report with every category absent and nothing executed.
    pub fn empty() -> Self {
        let per_category = Category::ALL
            .iter()
            .map(|c| (*c, CategoryEvidence::default()))
            .collect();
        Self {
            per_category,
            tests_passed: 0,
            tests_failed: 0,
            execution_succeeded: false,
            errors: Vec::new(),
            imports: ImportDiagnostics::default(),
            raw_output: String::new(),
        }
    }

    /// Evidence for one category. Every category has an entry from
    /// construction; a missing one reads as absent evidence.
    pub fn category(&self, category: Category) -> &CategoryEvidence {
        static ABSENT: std::sync::LazyLock<CategoryEvidence> =
            std::sync::LazyLock::new(CategoryEvidence::default);
        self.per_category.get(&category).unwrap_or(&ABSENT)
    }

    /// Replace one category's evidence.
    pub fn set_category(&mut self, category: Category, evidence: CategoryEvidence) {
        self.per_category.insert(category, evidence);
    }

    /// Record aggregate execution counts together, preserving the total
    /// invariant.
    pub fn set_aggregate_counts(&mut self, passed: u32, failed: u32) {
        self.tests_passed = passed;
        self.tests_failed = failed;
    }

    pub fn set_execution_succeeded(&mut self, ok: bool) {
        self.execution_succeeded = ok;
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn set_imports(&mut self, imports: ImportDiagnostics) {
        self.imports = imports;
    }

    pub fn set_raw_output(&mut self, output: impl Into<String>) {
        self.raw_output = output.into();
    }

    pub fn tests_passed(&self) -> u32 {
        self.tests_passed
    }

    pub fn tests_failed(&self) -> u32 {
        self.tests_failed
    }

    pub fn tests_total(&self) -> u32 {
        self.tests_passed + self.tests_failed
    }

    pub fn execution_succeeded(&self) -> bool {
        self.execution_succeeded
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn imports(&self) -> &ImportDiagnostics {
        &self.imports
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    /// All discovered artifact files across categories, in category order.
    pub fn files_found(&self) -> Vec<&PathBuf> {
        Category::ALL
            .iter()
            .flat_map(|c| self.category(*c).files_found().iter())
            .collect()
    }

    /// Artifacts are judged executable when the tool ran them and no
    /// import-level signature blocked collection.
    pub fn artifacts_executable(&self) -> bool {
        self.execution_succeeded && !self.imports.has_blocking_errors
    }

    /// Render the report as the text summary handed to the decision
    /// capability, per-category breakdown included.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("VERIFICATION RESULTS\n");
        out.push_str(&format!(
            "overall: {} | {} tests ({} passed, {} failed)\n",
            if self.execution_succeeded {
                "SUCCESS"
            } else {
                "FAILED"
            },
            self.tests_total(),
            self.tests_passed,
            self.tests_failed,
        ));
        out.push_str("by category:\n");
        for category in Category::ALL {
            let ev = self.category(category);
            if ev.exists() {
                out.push_str(&format!(
                    "  {}: {} tests ({} passed, {} failed) in {} file(s)\n",
                    category,
                    ev.tests_total(),
                    ev.tests_passed(),
                    ev.tests_failed(),
                    ev.files_found().len(),
                ));
            } else {
                out.push_str(&format!("  {category}: missing\n"));
            }
        }
        if !self.errors.is_empty() {
            out.push_str("errors:\n");
            for error in &self.errors {
                out.push_str(&format!("  - {error}\n"));
            }
        }
        if self.imports.has_blocking_errors {
            out.push_str(&format!(
                "import errors blocking collection; missing modules: {}\n",
                self.imports.missing_modules.join(", ")
            ));
            for fix in &self.imports.suggested_fixes {
                out.push_str(&format!("  fix: {} -> {}\n", fix.issue, fix.action));
            }
        }
        if !self.raw_output.is_empty() {
            let tail: String = self
                .raw_output
                .chars()
                .rev()
                .take(500)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            out.push_str(&format!("tool output tail:\n{tail}\n"));
        }
        out
    }
}

/// Executes and classifies artifacts under an explicit root directory.
pub struct Verifier {
    artifact_root: PathBuf,
    runner: Arc<dyn TestRunner>,
    exec_timeout: Duration,
}

impl Verifier {
    pub fn new(artifact_root: impl Into<PathBuf>, runner: Arc<dyn TestRunner>) -> Self {
        Self {
            artifact_root: artifact_root.into(),
            runner,
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
        }
    }

    /// Override the per-invocation execution timeout.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Build a fresh report from live discovery and execution.
    pub async fn verify(&self) -> VerificationReport {
        let mut report = VerificationReport::empty();

        for category in Category::ALL {
            let dir = self.artifact_root.join(category.dir_name());
            let files = self.discover(&dir);
            debug!(category = %category, files = files.len(), "artifact discovery");
            report.set_category(category, CategoryEvidence::discovered(files));
        }

        if report.files_found().is_empty() {
            report.push_error("no test artifacts found");
            return report;
        }

        // Per-category runs first, then one aggregate run over the full
        // root. The scoped runs are independent, so they fan out; join_all
        // keeps the outcomes in category order.
        let scoped_runs = Category::ALL
            .iter()
            .filter(|c| report.category(**c).exists())
            .map(|category| {
                let dir = self.artifact_root.join(category.dir_name());
                async move { (*category, self.runner.run(&dir, self.exec_timeout).await) }
            });
        for (category, outcome) in join_all(scoped_runs).await {
            match outcome {
                Ok(output) => {
                    let (passed, failed) = parse_summary_counts(&output.combined());
                    let evidence = report.category(category).clone().with_counts(passed, failed);
                    report.set_category(category, evidence);
                }
                Err(err) => {
                    report.push_error(format!("{} tests: {err}", category.display_name()));
                }
            }
        }

        match self.runner.run(&self.artifact_root, self.exec_timeout).await {
            Ok(output) => {
                let combined = output.combined();
                report.set_execution_succeeded(output.exit_code == 0);

                let imports = ImportDiagnostics::from_output(&combined);
                if imports.has_blocking_errors {
                    for detail in &imports.error_details {
                        report.push_error(detail.clone());
                    }
                }
                report.set_imports(imports);

                let (passed, failed) = parse_summary_counts(&combined);
                report.set_aggregate_counts(passed, failed);
                report.set_raw_output(combined);
            }
            Err(err) => {
                report.set_execution_succeeded(false);
                report.push_error(err.to_string());
            }
        }

        report
    }

    /// Files matching the artifact naming convention in one category
    /// directory, as paths relative to the artifact root, sorted for
    /// determinism. An absent directory yields an empty list.
    fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        let pattern = dir.join("test_*.py");
        let Some(pattern) = pattern.to_str() else {
            return Vec::new();
        };
        let Ok(paths) = glob::glob(pattern) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = paths
            .filter_map(Result::ok)
            .filter_map(|p| {
                p.strip_prefix(&self.artifact_root)
                    .map(Path::to_path_buf)
                    .ok()
            })
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ExecOutput;
    use crate::errors::ExecError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Runner that replays canned output keyed by the final path component,
    /// with "<root>" as the aggregate-run key.
    struct CannedRunner {
        by_dir: HashMap<String, Result<ExecOutput, ExecError>>,
    }

    impl CannedRunner {
        fn new() -> Self {
            Self {
                by_dir: HashMap::new(),
            }
        }

        fn ok(mut self, key: &str, stdout: &str, exit_code: i32) -> Self {
            self.by_dir.insert(
                key.to_string(),
                Ok(ExecOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code,
                }),
            );
            self
        }

        fn err(mut self, key: &str, err: ExecError) -> Self {
            self.by_dir.insert(key.to_string(), Err(err));
            self
        }
    }

    #[async_trait]
    impl TestRunner for CannedRunner {
        async fn run(&self, dir: &Path, _timeout: Duration) -> Result<ExecOutput, ExecError> {
            let key = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let lookup = if self.by_dir.contains_key(&key) {
                key
            } else {
                "<root>".to_string()
            };
            match self.by_dir.get(&lookup) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(ExecError::Timeout { seconds })) => {
                    Err(ExecError::Timeout { seconds: *seconds })
                }
                Some(Err(ExecError::ToolMissing { cmd })) => {
                    Err(ExecError::ToolMissing { cmd: cmd.clone() })
                }
                Some(Err(ExecError::Io(_))) | None => Err(ExecError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "no canned output",
                ))),
            }
        }
    }

    fn write_artifact(root: &Path, category: Category, name: &str) {
        let dir = root.join(category.dir_name());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), "def test_ok():\n    assert True\n").unwrap();
    }

    #[tokio::test]
    async fn test_empty_root_reports_coverage_gap_without_execution() {
        let tmp = TempDir::new().unwrap();
        // Runner with no canned entries would error loudly if consulted.
        let verifier = Verifier::new(tmp.path(), Arc::new(CannedRunner::new()));
        let report = verifier.verify().await;

        for category in Category::ALL {
            assert!(!report.category(category).exists());
        }
        assert!(!report.execution_succeeded());
        assert!(report.errors().iter().any(|e| e.contains("no test artifacts")));
        assert!(!report.imports().has_blocking_errors);
    }

    #[tokio::test]
    async fn test_counts_per_category_and_aggregate() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_models.py");
        write_artifact(tmp.path(), Category::Functional, "test_flows.py");

        let runner = CannedRunner::new()
            .ok("unit_tests", "3 passed in 0.1s", 0)
            .ok("functional_tests", "1 failed, 1 passed in 0.2s", 1)
            .ok("<root>", "1 failed, 4 passed in 0.3s", 1);
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        let unit = report.category(Category::Unit);
        assert!(unit.exists());
        assert_eq!(unit.tests_passed(), 3);
        assert_eq!(unit.tests_total(), 3);

        let functional = report.category(Category::Functional);
        assert_eq!(functional.tests_failed(), 1);
        assert_eq!(functional.tests_total(), 2);

        assert!(!report.category(Category::Integration).exists());

        assert_eq!(report.tests_passed(), 4);
        assert_eq!(report.tests_failed(), 1);
        assert_eq!(report.tests_total(), 5);
        assert!(!report.execution_succeeded());
    }

    #[tokio::test]
    async fn test_count_invariant_holds_everywhere() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_a.py");
        let runner = CannedRunner::new()
            .ok("unit_tests", "2 failed, 5 passed in 0.4s", 1)
            .ok("<root>", "2 failed, 5 passed in 0.4s", 1);
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        assert_eq!(
            report.tests_total(),
            report.tests_passed() + report.tests_failed()
        );
        for category in Category::ALL {
            let ev = report.category(category);
            assert_eq!(ev.tests_total(), ev.tests_passed() + ev.tests_failed());
        }
    }

    #[tokio::test]
    async fn test_import_errors_classified_as_blocking() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_a.py");
        let blocked = "ERROR collecting test_a.py\nModuleNotFoundError: No module named 'taskapp'\n0 tests ran";
        let runner = CannedRunner::new()
            .ok("unit_tests", blocked, 2)
            .ok("<root>", blocked, 2);
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        assert!(report.imports().has_blocking_errors);
        assert_eq!(report.imports().missing_modules, vec!["taskapp"]);
        assert_eq!(report.tests_total(), 0);
        assert!(!report.artifacts_executable());
        assert!(report.errors().iter().any(|e| e.contains("taskapp")));
    }

    #[tokio::test]
    async fn test_timeout_is_execution_failure_not_blocking() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_a.py");
        let runner = CannedRunner::new()
            .err("unit_tests", ExecError::Timeout { seconds: 30 })
            .err("<root>", ExecError::Timeout { seconds: 30 });
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        assert!(!report.execution_succeeded());
        assert!(report.errors().iter().any(|e| e.contains("timed out")));
        // Timeouts and blocking classification are orthogonal.
        assert!(!report.imports().has_blocking_errors);
    }

    #[tokio::test]
    async fn test_missing_tool_degrades_gracefully() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Integration, "test_api.py");
        let runner = CannedRunner::new()
            .err(
                "integration_tests",
                ExecError::ToolMissing {
                    cmd: "pytest".into(),
                },
            )
            .err(
                "<root>",
                ExecError::ToolMissing {
                    cmd: "pytest".into(),
                },
            );
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        assert!(!report.execution_succeeded());
        assert!(report.errors().iter().any(|e| e.contains("pytest")));
        assert!(!report.imports().has_blocking_errors);
    }

    #[tokio::test]
    async fn test_summary_mentions_each_category() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_a.py");
        let runner = CannedRunner::new()
            .ok("unit_tests", "5 passed in 0.1s", 0)
            .ok("<root>", "5 passed in 0.1s", 0);
        let verifier = Verifier::new(tmp.path(), Arc::new(runner));
        let report = verifier.verify().await;

        let summary = report.summary();
        assert!(summary.contains("Unit"));
        assert!(summary.contains("Functional: missing"));
        assert!(summary.contains("Integration: missing"));
        assert!(summary.contains("5 passed"));
    }

    #[test]
    fn test_discovery_is_sorted_and_relative() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), Category::Unit, "test_b.py");
        write_artifact(tmp.path(), Category::Unit, "test_a.py");
        fs::write(
            tmp.path().join("unit_tests").join("helper.py"),
            "# not an artifact\n",
        )
        .unwrap();

        let verifier = Verifier::new(tmp.path(), Arc::new(CannedRunner::new()));
        let files = verifier.discover(&tmp.path().join("unit_tests"));
        assert_eq!(
            files,
            vec![
                PathBuf::from("unit_tests/test_a.py"),
                PathBuf::from("unit_tests/test_b.py"),
            ]
        );
    }
}
