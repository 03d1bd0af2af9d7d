//! Production implementations of the capability traits.
//!
//! Specialists and the decision maker shell out to an agent CLI (`claude` by
//! default) with a piped prompt; the test runner shells out to pytest. The
//! engine consumes all of this only through the traits in `capability`, so
//! swapping the agent command or the test tool touches nothing else.
//!
//! Decision output is parsed from a JSON object extracted out of free-form
//! text (fenced block first, then the first balanced object); a parse miss
//! falls back to a conservative default rather than failing the session.

use crate::capability::{
    CategoryDecision, DecisionMaker, ExecOutput, ReviewDecision, ReviewVerdict, Specialist,
    SpecialistOutput, TestRunner,
};
use crate::category::Category;
use crate::errors::ExecError;
use crate::transcript::Transcript;
use crate::worker::WorkerTask;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default agent CLI command.
const DEFAULT_AGENT_CMD: &str = "claude";

/// Default timeout for one agent invocation.
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;

/// Default test tool command.
const DEFAULT_TEST_CMD: &str = "pytest";

/// Configuration shared by the CLI-backed capabilities.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent CLI command (default: "claude").
    pub agent_cmd: String,
    /// Working directory for agent processes.
    pub working_dir: Option<PathBuf>,
    /// Timeout for one agent invocation.
    pub timeout: Duration,
    /// Skip permission prompts in the agent CLI.
    pub skip_permissions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_cmd: DEFAULT_AGENT_CMD.to_string(),
            working_dir: None,
            timeout: Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS),
            skip_permissions: true,
        }
    }
}

impl AgentConfig {
    pub fn with_agent_cmd(mut self, cmd: &str) -> Self {
        self.agent_cmd = cmd.to_string();
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run the agent CLI once with the prompt on stdin, returning its stdout.
async fn run_agent(config: &AgentConfig, prompt: &str) -> Result<String> {
    let mut cmd = Command::new(&config.agent_cmd);
    cmd.arg("--print");
    if config.skip_permissions {
        cmd.arg("--dangerously-skip-permissions");
    }
    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn agent process")?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .await
            .context("failed to write prompt to agent stdin")?;
        stdin.shutdown().await.context("failed to close stdin")?;
    }

    let output = tokio::time::timeout(config.timeout, child.wait_with_output())
        .await
        .map_err(|_| anyhow::anyhow!("agent timed out after {}s", config.timeout.as_secs()))?
        .context("failed to collect agent output")?;

    if !output.status.success() {
        anyhow::bail!(
            "agent exited with code {}",
            output.status.code().unwrap_or(-1)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract a JSON object from free-form agent output.
///
/// Tries a json-tagged fenced block first, then any fenced block containing
/// an object, then the first balanced `{...}` in the raw text.
fn extract_json(output: &str) -> Option<String> {
    if let Some(start) = output.find("```json") {
        let rest = &output[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }
    if let Some(start) = output.find("```") {
        let rest = &output[start + 3..];
        if let Some(end) = rest.find("```") {
            if let Some(obj_start) = rest[..end].find('{') {
                return Some(rest[obj_start..end].trim().to_string());
            }
        }
    }
    let start = output.find('{')?;
    let mut depth = 0usize;
    for (i, c) in output[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(output[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// A specialist that delegates artifact generation to the agent CLI.
pub struct CliSpecialist {
    category: Category,
    artifact_root: PathBuf,
    source_root: Option<PathBuf>,
    config: AgentConfig,
}

impl CliSpecialist {
    pub fn new(category: Category, artifact_root: impl Into<PathBuf>, config: AgentConfig) -> Self {
        Self {
            category,
            artifact_root: artifact_root.into(),
            source_root: None,
            config,
        }
    }

    /// Tell the specialist where the code under test lives.
    pub fn with_source_root(mut self, dir: PathBuf) -> Self {
        self.source_root = Some(dir);
        self
    }

    /// Build the full roster: one CLI specialist per category.
    pub fn roster(
        artifact_root: &Path,
        source_root: Option<&Path>,
        config: &AgentConfig,
    ) -> Vec<std::sync::Arc<dyn Specialist>> {
        Category::ALL
            .iter()
            .map(|category| {
                let mut specialist =
                    CliSpecialist::new(*category, artifact_root, config.clone());
                if let Some(src) = source_root {
                    specialist = specialist.with_source_root(src.to_path_buf());
                }
                std::sync::Arc::new(specialist) as std::sync::Arc<dyn Specialist>
            })
            .collect()
    }

    fn prompt(&self, transcript: &Transcript) -> String {
        let source_section = self
            .source_root
            .as_ref()
            .map(|p| format!("The code under test lives at: {}\n", p.display()))
            .unwrap_or_default();

        format!(
            r#"You are an expert {name} generating pytest tests.

Focus: {focus}.
{source_section}
Write test files matching `test_*.py` into `{dir}` under {root}.
If the conversation below contains repair instructions from a validator or
supervisor, apply exactly those fixes to the existing files instead of
rewriting everything.

## Conversation so far

{transcript}

## When done

Reply with a JSON object:

```json
{{"summary": "what you wrote or fixed", "files": ["{dir}/test_example.py"]}}
```
"#,
            name = self.category.worker_name(),
            focus = self.category.focus(),
            source_section = source_section,
            dir = self.category.dir_name(),
            root = self.artifact_root.display(),
            transcript = transcript.render(),
        )
    }
}

#[async_trait]
impl Specialist for CliSpecialist {
    fn category(&self) -> Category {
        self.category
    }

    async fn run(&self, task: &WorkerTask) -> Result<SpecialistOutput> {
        let prompt = self.prompt(&task.transcript);
        debug!(category = %self.category, prompt_len = prompt.len(), "invoking specialist agent");
        let output = run_agent(&self.config, &prompt).await?;

        if let Some(json) = extract_json(&output) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&json) {
                let summary = value
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&output)
                    .to_string();
                let files = value
                    .get("files")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|f| f.as_str())
                            .map(PathBuf::from)
                            .collect()
                    })
                    .unwrap_or_default();
                return Ok(SpecialistOutput::new(summary, files));
            }
        }
        // No structured tail: the raw text is still a usable summary.
        Ok(SpecialistOutput::new(output, vec![]))
    }
}

/// A decision maker that delegates both calls to the agent CLI.
pub struct CliDecisionMaker {
    config: AgentConfig,
}

impl CliDecisionMaker {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DecisionMaker for CliDecisionMaker {
    async fn review(
        &self,
        transcript: &Transcript,
        report_summary: &str,
    ) -> Result<ReviewDecision> {
        let prompt = format!(
            r#"You are a test quality validator. Below are the worker claims and the
ACTUAL verification results from running the tests.

Decide: is the suite adequate (all categories present, tests pass, no import
errors), or does it need more work?

## Verification

{report_summary}

## Conversation so far

{transcript}

Reply with a JSON object:

```json
{{"next": "finish", "reason": "why"}}
```

where "next" is "finish" or "continue".
"#,
            report_summary = report_summary,
            transcript = transcript.render(),
        );

        let output = run_agent(&self.config, &prompt).await?;
        let parsed = extract_json(&output)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok());

        match parsed {
            Some(value) => {
                let next = value.get("next").and_then(|v| v.as_str()).unwrap_or("");
                let reason = value
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let verdict = if next.eq_ignore_ascii_case("finish") {
                    ReviewVerdict::Finish
                } else {
                    ReviewVerdict::Continue
                };
                Ok(ReviewDecision { verdict, rationale: reason })
            }
            None => {
                warn!("review decision output had no parseable JSON; continuing");
                Ok(ReviewDecision {
                    verdict: ReviewVerdict::Continue,
                    rationale: "decision output could not be parsed; another pass is needed"
                        .to_string(),
                })
            }
        }
    }

    async fn route(&self, transcript: &Transcript) -> Result<CategoryDecision> {
        let prompt = format!(
            r#"You are a workflow supervisor managing unit, functional and integration
test writers.

On a first pass (no validator feedback yet) pick "unit_tester" and put
detailed briefings for ALL THREE categories in your reason: files to test,
focus areas, and output locations; every parallel worker will read it.

On later passes, pick the single category the validator's feedback points at
and spell out the exact fix in your reason, including any dependency search
path the tests must add.

## Conversation so far

{transcript}

Reply with a JSON object:

```json
{{"next": "unit_tester", "reason": "briefing or fix instructions"}}
```

where "next" is "unit_tester", "functional_tester" or "integration_tester".
"#,
            transcript = transcript.render(),
        );

        let output = run_agent(&self.config, &prompt).await?;
        let parsed = extract_json(&output)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok());

        match parsed {
            Some(value) => {
                let next = value.get("next").and_then(|v| v.as_str()).unwrap_or("");
                let reason = value
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let category = Category::from_str(next).unwrap_or(Category::Unit);
                Ok(CategoryDecision {
                    category,
                    rationale: reason,
                })
            }
            None => {
                warn!("routing decision output had no parseable JSON; defaulting to unit");
                Ok(CategoryDecision {
                    category: Category::Unit,
                    rationale: "routing output could not be parsed; retrying unit tests"
                        .to_string(),
                })
            }
        }
    }
}

/// Runs pytest scoped to a directory, mapping a missing binary and timeouts
/// to their typed errors.
pub struct PytestRunner {
    cmd: String,
}

impl Default for PytestRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_CMD)
    }
}

impl PytestRunner {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

#[async_trait]
impl TestRunner for PytestRunner {
    async fn run(&self, dir: &Path, timeout: Duration) -> Result<ExecOutput, ExecError> {
        let mut cmd = Command::new(&self.cmd);
        cmd.arg(dir)
            .arg("-v")
            .arg("--tb=short")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExecError::ToolMissing {
                    cmd: self.cmd.clone(),
                }
            } else {
                ExecError::Io(e)
            }
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout {
                seconds: timeout.as_secs(),
            })?
            .map_err(ExecError::Io)?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
