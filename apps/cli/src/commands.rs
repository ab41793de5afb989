//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sourcescout_core::{
    Pipeline, ProgressReporter, RenderOptions, RunLock, RunSummary, render_stored,
};
use sourcescout_shared::{
    AppConfig, Industry, init_config, init_config_at, load_config, load_config_from,
    validate_api_key,
};
use sourcescout_storage::{Storage, industry_db_path};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SourceScout: find the information sources worth following for an industry.
#[derive(Parser)]
#[command(
    name = "sourcescout",
    version,
    about = "Search, summarize, and score information sources for an industry.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.sourcescout/sourcescout.toml.
    #[arg(long, global = true, env = "SOURCESCOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for per-industry stores (overrides config).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

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
    /// Run the full pipeline for an industry and write its report.
    Run {
        /// Industry identifier, e.g. smart_manufacturing.
        industry: Industry,
    },

    /// Score and render from the persisted summaries only.
    Report {
        industry: Industry,

        /// Clear existing report entries and score everything again.
        #[arg(long)]
        fresh: bool,

        /// Append a table of discarded sources.
        #[arg(long)]
        include_discarded: bool,
    },

    /// Re-render the stored report without scoring anything.
    Render {
        industry: Industry,

        /// Append a table of discarded sources.
        #[arg(long)]
        include_discarded: bool,

        /// Write the document here instead of printing it.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show stored counts for an industry.
    Status { industry: Industry },

    /// Remove a stale run lock left by a crashed run.
    Unlock { industry: Industry },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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

    let filter = match cli.verbose {
        0 => "sourcescout=info",
        1 => "sourcescout=debug",
        _ => "sourcescout=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.clone();

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()).await,
            ConfigAction::Show => {
                let config = resolve_config(config_path.as_deref(), cli.data_dir.as_deref())?;
                cmd_config_show(&config).await
            }
        };
    }

    let config = resolve_config(config_path.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Command::Run { industry } => cmd_run(&config, &industry).await,
        Command::Report {
            industry,
            fresh,
            include_discarded,
        } => cmd_report(&config, &industry, fresh, include_discarded).await,
        Command::Render {
            industry,
            include_discarded,
            out,
        } => cmd_render(&config, &industry, include_discarded, out.as_deref()).await,
        Command::Status { industry } => cmd_status(&config, &industry).await,
        Command::Unlock { industry } => cmd_unlock(&config, &industry).await,
        Command::Config { .. } => Ok(()),
    }
}

/// Load the config file (or defaults) and apply flag overrides.
fn resolve_config(path: Option<&Path>, data_dir: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    if let Some(dir) = data_dir {
        config.defaults.data_dir = dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

fn data_dir(config: &AppConfig) -> PathBuf {
    PathBuf::from(&config.defaults.data_dir)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, industry: &Industry) -> Result<()> {
    // Validate API key before doing anything
    validate_api_key(config)?;

    let pipeline = Pipeline::from_config(config)?;
    info!(%industry, data_dir = %pipeline.data_dir().display(), "starting run");

    let reporter = CliProgress::new();
    let summary = pipeline.run(industry, &reporter).await?;

    print_summary(&summary);
    Ok(())
}

async fn cmd_report(
    config: &AppConfig,
    industry: &Industry,
    fresh: bool,
    include_discarded: bool,
) -> Result<()> {
    validate_api_key(config)?;

    let mut config = config.clone();
    config.report.include_discarded |= include_discarded;

    let pipeline = Pipeline::from_config(&config)?;
    info!(%industry, fresh, data_dir = %pipeline.data_dir().display(), "starting report run");

    let reporter = CliProgress::new();
    let summary = pipeline.run_report(industry, fresh, &reporter).await?;

    print_summary(&summary);
    Ok(())
}

async fn cmd_render(
    config: &AppConfig,
    industry: &Industry,
    include_discarded: bool,
    out: Option<&Path>,
) -> Result<()> {
    let options = RenderOptions {
        include_discarded: include_discarded || config.report.include_discarded,
    };
    let doc = render_stored(&data_dir(config), industry, options).await?;

    match out {
        Some(path) => {
            std::fs::write(path, &doc.markdown)
                .map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
            println!("Report written to: {}", path.display());
        }
        None => print!("{}", doc.markdown),
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig, industry: &Industry) -> Result<()> {
    let dir = data_dir(config);
    let db_path = industry_db_path(&dir, industry);

    println!();
    println!("  Industry: {industry}");

    if !db_path.exists() {
        println!("  No data yet (expected store at {}).", db_path.display());
        println!();
        return Ok(());
    }

    let storage = Storage::open_readonly(&db_path).await?;
    let stats = storage.stats(industry).await?;
    let runs = storage.count_runs(industry).await?;

    println!("  Store:          {}", db_path.display());
    println!("  Runs:           {runs}");
    println!("  Manifest:       {}", stats.manifest);
    println!("  Fetch failures: {}", stats.fetch_failures);
    println!("  Summaries:      {}", stats.summaries);
    println!("  Kept:           {}", stats.kept);
    println!("  Discarded:      {}", stats.discarded);

    match RunLock::inspect(&dir, industry) {
        Some(contents) => {
            println!("  Lock:           held");
            for line in contents.lines() {
                println!("                  {line}");
            }
        }
        None => println!("  Lock:           free"),
    }

    let failures = storage.list_fetch_failures(industry).await?;
    if !failures.is_empty() {
        println!();
        println!("  Recent fetch failures:");
        for (url, reason) in failures.iter().take(10) {
            println!("    {reason:<28} {url}");
        }
        if failures.len() > 10 {
            println!("    ... and {} more", failures.len() - 10);
        }
    }
    println!();

    Ok(())
}

async fn cmd_unlock(config: &AppConfig, industry: &Industry) -> Result<()> {
    let dir = data_dir(config);
    if let Some(contents) = RunLock::inspect(&dir, industry) {
        info!(%industry, lock = %contents.replace('\n', " "), "removing run lock");
    }

    if RunLock::clear(&dir, industry)? {
        println!("Removed run lock for '{industry}'.");
    } else {
        println!("No run lock held for '{industry}'.");
    }
    Ok(())
}

async fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(p) => init_config_at(p)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Report written for '{}'", summary.industry);
    if let Some(search) = &summary.search {
        println!(
            "  Search:     {} queries ({} failed), {} new sources",
            search.queries_attempted, search.queries_failed, search.new_entries
        );
    }
    if let Some(fetch) = &summary.fetch {
        println!(
            "  Fetch:      {} of {} pages fetched",
            fetch.succeeded, fetch.attempted
        );
    }
    if let Some(summarize) = &summary.summarize {
        println!(
            "  Summaries:  {} new ({} failed)",
            summarize.summarized, summarize.failed
        );
    }
    if summary.cleared > 0 {
        println!("  Cleared:    {} previous entries", summary.cleared);
    }
    println!(
        "  Scored:     {} new ({} scoring failures, {} already scored)",
        summary.generate.scored, summary.generate.scoring_failed, summary.generate.skipped_existing
    );
    println!("  Kept:       {}", summary.kept);
    println!("  Discarded:  {}", summary.discarded);
    println!("  Document:   {}", summary.document.display());
    println!(
        "  Time:       {:.1}s",
        summary.elapsed_ms as f64 / 1000.0
    );
    println!();
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, stage: &str, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("{stage} [{current}/{total}] {url}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
