//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use reviewforge_citation::{apa_citation, bibtex_entry, normalize};
use reviewforge_core::{
    Collaborators, LlmCollaborators, OpenRouterClient, Orchestrator, ProgressReporter,
    ReviewOutcome,
};
use reviewforge_evaluator::{PASS_THRESHOLD, evaluate};
use reviewforge_shared::{
    AppConfig, EvaluationReport, Phase, PipelineConfig, RunRequest, init_config, load_config,
};

use crate::output;

/// Exit status when a repeated Ctrl-C abandons in-flight work.
const FORCED_EXIT_CODE: i32 = 130;

/// Crates whose spans and events are shown at the chosen verbosity.
const LOG_TARGETS: [&str; 6] = [
    "reviewforge",
    "reviewforge_core",
    "reviewforge_discovery",
    "reviewforge_citation",
    "reviewforge_evaluator",
    "reviewforge_shared",
];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// reviewforge: automated literature reviews with a quality gate.
#[derive(Parser)]
#[command(
    name = "reviewforge",
    version,
    about = "Discover, analyse, synthesize, and refine a literature review on any topic.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full review pipeline for a topic.
    Review(ReviewArgs),

    /// Score an existing draft with the quality evaluator.
    Evaluate {
        /// Markdown or text file to score.
        file: PathBuf,

        /// Expected source title for the coverage check (repeatable).
        #[arg(long = "title")]
        titles: Vec<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Normalize citation metadata and print the formatted reference.
    Cite {
        #[arg(long)]
        title: Option<String>,

        /// Author name (repeatable, in order).
        #[arg(long = "author")]
        authors: Vec<String>,

        #[arg(long, allow_hyphen_values = true)]
        year: Option<i32>,

        #[arg(long)]
        venue: Option<String>,

        /// Print a BibTeX entry instead of APA.
        #[arg(long)]
        bibtex: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `review`.
#[derive(Args, Debug)]
pub(crate) struct ReviewArgs {
    /// Research topic (prompted for when omitted).
    pub topic: Option<String>,

    /// Number of papers to discover.
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,

    /// Output directory for the review files.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Concurrent analysis workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Refinement iteration budget.
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Review(args) => cmd_review(args).await,
        Command::Evaluate { file, titles, json } => cmd_evaluate(&file, &titles, json),
        Command::Cite {
            title,
            authors,
            year,
            venue,
            bibtex,
        } => cmd_cite(title.as_deref(), &authors, year, venue.as_deref(), bibtex),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// review
// ---------------------------------------------------------------------------

/// Merge config file values with CLI overrides.
fn pipeline_config(config: &AppConfig, args: &ReviewArgs) -> Result<PipelineConfig> {
    let mut pipeline = PipelineConfig::from(config);
    if let Some(workers) = args.workers {
        pipeline.analysis_workers = workers;
    }
    if let Some(max_iterations) = args.max_iterations {
        pipeline.max_iterations = max_iterations;
    }
    pipeline.validate()?;
    Ok(pipeline)
}

fn prompt_topic() -> Result<String> {
    print!("Research topic: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .wrap_err("failed to read topic from stdin")?;

    let topic = line.trim();
    if topic.is_empty() {
        return Err(eyre!("a research topic is required"));
    }
    Ok(topic.to_string())
}

/// The first interrupt cancels the run; any later one asks for a hard exit.
fn interrupt_forces_exit(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    warn!("interrupt received, cancelling run (press Ctrl-C again to quit)");
    cancel.cancel();
    false
}

async fn cmd_review(args: ReviewArgs) -> Result<()> {
    let config = load_config()?;
    let pipeline = pipeline_config(&config, &args)?;

    // Fail on a missing key before prompting for anything
    let client = OpenRouterClient::from_app_config(&config)?;

    let topic = match args.topic.clone() {
        Some(topic) => topic,
        None => prompt_topic()?,
    };
    let max_items = args.max_items.unwrap_or(config.defaults.max_items);
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));

    info!(
        topic = %topic,
        max_items,
        model = client.model(),
        workers = pipeline.analysis_workers,
        "starting literature review"
    );

    let collaborators = Collaborators::from_shared(Arc::new(LlmCollaborators::new(client)));
    let orchestrator = Orchestrator::new(pipeline, collaborators);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_forces_exit(&on_interrupt) {
                warn!("second interrupt received, exiting");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    let reporter = CliProgress::new();
    let result = orchestrator
        .run(&RunRequest::new(topic, max_items), &reporter, &cancel)
        .await;
    reporter.spinner.finish_and_clear();
    let outcome = result?;

    let written = output::write_review(&outcome, &out_dir)?;
    print_summary(&outcome);
    println!("  Review: {}", written.markdown.display());
    println!("  BibTeX: {}", written.bibtex.display());
    println!();

    Ok(())
}

fn print_summary(outcome: &ReviewOutcome) {
    let tombstoned = outcome.analyses.iter().filter(|a| !a.is_success()).count();

    println!();
    if outcome.passed() {
        println!("  Literature review complete!");
    } else {
        println!("  Literature review complete (quality gate not reached, best draft kept).");
    }
    println!("  Run:         {}", outcome.run_id);
    println!("  Papers:      {}", outcome.items.len());
    if tombstoned > 0 {
        println!("  Failed:      {tombstoned}");
    }
    if outcome.degraded_discovery {
        println!("  Discovery:   fallback sample used");
    }
    println!(
        "  Score:       {:.1}/10 after {} evaluation(s)",
        outcome.report.total, outcome.evaluations
    );
    println!("  Words:       {}", outcome.draft.word_count());
    println!("  Time:        {:.1}s", outcome.elapsed.as_secs_f64());
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: Phase) {
        let message = match phase {
            Phase::Discovering => "Discovering papers",
            Phase::Analyzing => "Analyzing papers",
            Phase::Synthesizing => "Synthesizing review",
            Phase::Refining => "Refining draft",
            Phase::Idle | Phase::Completed | Phase::Failed => return,
        };
        self.spinner.set_message(message);
    }

    fn item_analyzed(&self, title: &str, succeeded: bool, current: usize, total: usize) {
        let status = if succeeded { "Analyzed" } else { "Skipped" };
        self.spinner
            .set_message(format!("{status} [{current}/{total}] {title}"));
    }

    fn iteration_scored(&self, iteration: u32, report: &EvaluationReport) {
        self.spinner.println(format!(
            "  Iteration {iteration}: score {:.1}/10",
            report.total
        ));
    }

    fn done(&self, _outcome: &ReviewOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// evaluate / cite
// ---------------------------------------------------------------------------

fn cmd_evaluate(file: &Path, titles: &[String], json: bool) -> Result<()> {
    let draft = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;

    let expected = (!titles.is_empty()).then_some(titles);
    let report = evaluate(&draft, expected);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.scores;
    let f = &report.feedback;
    println!();
    println!("  Structure: {:.1}/2  {}", s.structure, f.structure);
    println!("  Length:    {:.1}/2  {}", s.length, f.length);
    println!("  Citations: {:.1}/2  {}", s.citations, f.citations);
    println!("  Coverage:  {:.1}/2  {}", s.coverage, f.coverage);
    println!("  Clarity:   {:.1}/2  {}", s.clarity, f.clarity);
    println!();
    let verdict = if report.passed { "PASS" } else { "FAIL" };
    println!("  Total:     {:.1}/10 ({verdict}, threshold {PASS_THRESHOLD})", report.total);

    if !report.directives.is_empty() {
        println!();
        println!("  Improvements:");
        for directive in &report.directives {
            println!("  - {directive}");
        }
    }
    println!();
    Ok(())
}

fn cmd_cite(
    title: Option<&str>,
    authors: &[String],
    year: Option<i32>,
    venue: Option<&str>,
    bibtex: bool,
) -> Result<()> {
    let citation = normalize(title, authors, year, venue);

    if bibtex {
        println!("{}", bibtex_entry(&citation));
    } else {
        println!("{}", apa_citation(&citation));
    }
    for issue in &citation.issues {
        eprintln!("  repaired: {issue}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
