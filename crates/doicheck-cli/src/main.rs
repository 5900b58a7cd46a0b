use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use doicheck_core::config_file::{self, ConfigFile};
use doicheck_core::db::CrossRef;
use doicheck_core::{Config, DEFAULT_API_BASE, ProgressEvent, ProgressStore, RunMode};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Verify the DOIs in a .bib file against the CrossRef API
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the .bib file
    bibfile: PathBuf,

    /// Seconds between API requests (default: 2.0)
    #[arg(long)]
    delay: Option<f64>,

    /// Email for CrossRef polite pool (faster rate limits)
    #[arg(long)]
    email: Option<String>,

    /// Resume from last saved progress
    #[arg(long)]
    resume: bool,

    /// Only regenerate report from existing progress (no API calls)
    #[arg(long)]
    report: bool,

    /// Output directory for reports (default: same as bib file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.report {
            RunMode::ReportOnly
        } else if self.resume {
            RunMode::Resume
        } else {
            RunMode::Fresh
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.bibfile.exists() {
        anyhow::bail!("File not found: {}", cli.bibfile.display());
    }

    let file_config = config_file::load_config();
    let config = resolve_config(&cli, &file_config)?;
    tracing::debug!(?config, "resolved configuration");

    let output_dir = match cli
        .output_dir
        .clone()
        .or_else(|| file_config.output_dir().map(PathBuf::from))
    {
        Some(dir) => dir,
        None => default_output_dir(&cli.bibfile)?,
    };
    std::fs::create_dir_all(&output_dir)?;

    let store = ProgressStore::in_dir(&output_dir);
    let registry = CrossRef::new(&config)?;
    let mode = cli.mode();
    let color = ColorMode(!cli.no_color && std::io::stdout().is_terminal());

    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
    )?);

    let printer = EventPrinter {
        bar: bar.clone(),
        color,
        show_bar: std::io::stderr().is_terminal(),
        bib_path: &cli.bibfile,
        config: &config,
        progress_path: store.path(),
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let outcome = doicheck_core::run(
        &cli.bibfile,
        &store,
        mode,
        &config,
        &registry,
        |event| printer.handle(event),
        &cancel,
    )
    .await?;
    bar.finish_and_clear();

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout)?;
    if mode == RunMode::ReportOnly {
        writeln!(
            stdout,
            "Regenerating report from {} saved results...",
            outcome.progress.len()
        )?;
    } else {
        writeln!(stdout, "Generating report...")?;
    }

    let paths =
        doicheck_reporting::write_reports(&outcome.entries, &outcome.progress, &output_dir)?;
    output::print_report_paths(&mut stdout, &paths, color)?;
    writeln!(stdout, "Done!")?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,doicheck=debug,doicheck_core=debug,doicheck_reporting=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve configuration: CLI flags > env vars > config files > defaults
fn resolve_config(cli: &Cli, file: &ConfigFile) -> anyhow::Result<Config> {
    let mailto = cli
        .email
        .clone()
        .or_else(|| std::env::var("CROSSREF_MAILTO").ok())
        .or_else(|| file.mailto().map(String::from))
        .filter(|m| !m.trim().is_empty());
    let delay_secs = cli
        .delay
        .or_else(|| env_parse("DOICHECK_DELAY"))
        .or(file.delay_secs())
        .unwrap_or(2.0);
    let timeout_secs: u64 = env_parse("DOICHECK_TIMEOUT")
        .or(file.timeout_secs())
        .unwrap_or(30);

    let delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
        anyhow::anyhow!(
            "Invalid delay: {} (must be a non-negative number of seconds)",
            delay_secs
        )
    })?;

    Ok(Config {
        delay,
        mailto,
        timeout: Duration::from_secs(timeout_secs),
        api_base: file.api_base().unwrap_or(DEFAULT_API_BASE).to_string(),
        ..Config::default()
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// The directory containing the .bib file.
fn default_output_dir(bib_path: &Path) -> anyhow::Result<PathBuf> {
    let absolute = std::path::absolute(bib_path)?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Turns orchestrator events into terminal output.
struct EventPrinter<'a> {
    bar: ProgressBar,
    color: ColorMode,
    show_bar: bool,
    bib_path: &'a Path,
    config: &'a Config,
    progress_path: &'a Path,
}

impl EventPrinter<'_> {
    fn handle(&self, event: ProgressEvent) {
        if let Err(e) = self.bar.suspend(|| self.print(&event)) {
            tracing::debug!(error = %e, "failed to write progress");
        }

        match event {
            ProgressEvent::Planned { remaining, .. } if remaining > 0 => {
                self.bar.set_length(remaining as u64);
                if self.show_bar {
                    self.bar.set_draw_target(ProgressDrawTarget::stderr());
                }
            }
            ProgressEvent::Checking { key, .. } => self.bar.set_message(key),
            ProgressEvent::Result { .. } => self.bar.inc(1),
            _ => {}
        }
    }

    fn print(&self, event: &ProgressEvent) -> std::io::Result<()> {
        let mut w = std::io::stdout().lock();
        match event {
            ProgressEvent::Parsed { total, with_doi } => {
                let name = self.bib_path.display().to_string();
                output::print_parse_summary(&mut w, &name, *total, *with_doi, self.color)?;
            }
            ProgressEvent::Planned {
                already_done,
                remaining,
            } => {
                let plan = output::Plan {
                    already_done: *already_done,
                    remaining: *remaining,
                    delay: self.config.delay,
                    mailto: self.config.mailto.as_deref(),
                    progress_path: self.progress_path,
                };
                output::print_plan(&mut w, &plan, self.color)?;
            }
            ProgressEvent::Checking { .. } => {}
            ProgressEvent::Result {
                position,
                total,
                key,
                result,
            } => {
                output::print_result(&mut w, *position, *total, key, result, self.color)?;
            }
            ProgressEvent::Interrupted { saved } => {
                output::print_interrupted(&mut w, *saved, self.bib_path, self.color)?;
            }
        }
        w.flush()
    }
}
