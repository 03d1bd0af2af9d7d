use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use testsmith::aggregator::Aggregator;
use testsmith::agents::{AgentConfig, CliDecisionMaker, CliSpecialist, PytestRunner};
use testsmith::config::Config;
use testsmith::dispatcher::Dispatcher;
use testsmith::orchestrator::Orchestrator;
use testsmith::report::render_markdown;
use testsmith::verifier::Verifier;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testsmith")]
#[command(version, about = "AI-powered test suite orchestrator")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory; defaults to the current directory.
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full test-generation session until convergence or budget
    /// exhaustion
    Run {
        /// Free-form request describing what to cover
        request: String,

        /// Iteration budget (default from config, 5)
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Directory the workers write artifacts into
        #[arg(long)]
        artifact_root: Option<PathBuf>,

        /// Location of the code under test
        #[arg(long)]
        source_root: Option<PathBuf>,

        /// Agent CLI command (default: claude)
        #[arg(long)]
        agent_cmd: Option<String>,

        /// Test tool command (default: pytest)
        #[arg(long)]
        test_cmd: Option<String>,
    },
    /// Verify existing artifacts once and print the findings
    Verify {
        /// Directory holding the artifacts
        #[arg(long)]
        artifact_root: Option<PathBuf>,

        /// Test tool command (default: pytest)
        #[arg(long)]
        test_cmd: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("testsmith=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("testsmith=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let mut config = Config::load(&project_dir)?.with_verbose(cli.verbose);

    match cli.command {
        Commands::Run {
            request,
            max_iterations,
            artifact_root,
            source_root,
            agent_cmd,
            test_cmd,
        } => {
            if let Some(dir) = artifact_root {
                config = config.with_artifact_root(dir);
            }
            if let Some(dir) = source_root {
                config = config.with_source_root(dir);
            }
            if let Some(n) = max_iterations {
                config = config.with_max_iterations(n);
            }
            if let Some(cmd) = agent_cmd {
                config = config.with_agent_cmd(&cmd);
            }
            if let Some(cmd) = test_cmd {
                config = config.with_test_cmd(&cmd);
            }
            run(&config, &request).await
        }
        Commands::Verify {
            artifact_root,
            test_cmd,
        } => {
            if let Some(dir) = artifact_root {
                config = config.with_artifact_root(dir);
            }
            if let Some(cmd) = test_cmd {
                config = config.with_test_cmd(&cmd);
            }
            verify(&config).await
        }
    }
}

async fn run(config: &Config, request: &str) -> Result<()> {
    std::fs::create_dir_all(&config.artifact_root).with_context(|| {
        format!(
            "failed to create artifact root {}",
            config.artifact_root.display()
        )
    })?;

    let agent_config = AgentConfig::default().with_agent_cmd(&config.agent_cmd);
    let specialists = CliSpecialist::roster(
        &config.artifact_root,
        config.source_root.as_deref(),
        &agent_config,
    );
    let decider = Arc::new(CliDecisionMaker::new(agent_config));
    let runner = Arc::new(PytestRunner::new(&config.test_cmd));
    let verifier =
        Verifier::new(&config.artifact_root, runner).with_exec_timeout(config.exec_timeout());

    let orchestrator = Orchestrator::new(specialists, decider, verifier)?
        .with_dispatcher(Dispatcher::new().with_timeout(config.dispatch_timeout()));

    println!(
        "{} {}",
        style("session:").bold(),
        style(request).cyan()
    );

    let result = orchestrator
        .run_session(request, config.max_iterations)
        .await?;
    let summary = Aggregator::summarize(&result);

    println!();
    println!("{}", render_markdown(&summary, result.history()));

    if result.converged() {
        println!("{}", style("converged").green().bold());
        Ok(())
    } else {
        println!(
            "{}",
            style(format!("{} after {} iteration(s)", summary.status, summary.iterations_run))
                .yellow()
                .bold()
        );
        std::process::exit(1);
    }
}

async fn verify(config: &Config) -> Result<()> {
    let runner = Arc::new(PytestRunner::new(&config.test_cmd));
    let verifier =
        Verifier::new(&config.artifact_root, runner).with_exec_timeout(config.exec_timeout());

    let report = verifier.verify().await;
    println!("{}", report.summary());

    if report.artifacts_executable() && report.tests_failed() == 0 && report.tests_total() > 0 {
        println!("{}", style("artifacts verified").green().bold());
        Ok(())
    } else {
        println!("{}", style("artifacts need work").yellow().bold());
        std::process::exit(1);
    }
}
