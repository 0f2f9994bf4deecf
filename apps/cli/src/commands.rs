//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sn2n_core::{
    BatchSummary, CommitOutcome, CommitPolicy, DirectorySink, PageConversion, PageInput,
    PipelineConfig, ProgressReporter, commit, convert_batch, convert_page, queue_for_reprocess,
};
use sn2n_shared::{AppConfig, AuditReport, Recommendation, init_config, load_config, load_config_from};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sn2n: convert ServiceNow documentation pages into Notion blocks.
#[derive(Parser)]
#[command(
    name = "sn2n",
    version,
    about = "Convert ServiceNow documentation HTML into Notion block trees and audit the result.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the default location.
    #[arg(long, global = true, env = "SN2N_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Convert HTML pages and write them through the two-phase commit.
    Convert {
        /// HTML files to convert.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory for committed pages.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print each conversion as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Address the pages were fetched from, for relative links and images.
        #[arg(long)]
        base_url: Option<String>,

        /// Do not write pages whose audit failed.
        #[arg(long)]
        require_pass: bool,

        /// Pages converted concurrently (defaults to the configured value).
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Audit a single page and print the report with recommendations.
    Audit {
        /// HTML file to audit.
        file: PathBuf,

        /// Address the page was fetched from.
        #[arg(long)]
        base_url: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

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

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = ["sn2n", "sn2n_core", "sn2n_blocks", "sn2n_audit", "sn2n_shared"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("warn,{filter}")));

    // Logs go to stderr so JSON output on stdout stays parseable.
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
    match cli.command {
        Command::Convert {
            files,
            out,
            json,
            base_url,
            require_pass,
            concurrency,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let opts = ConvertOptions {
                out,
                json,
                base_url: parse_base_url(base_url.as_deref())?,
                policy: if require_pass {
                    CommitPolicy::RequirePassingAudit
                } else {
                    CommitPolicy::Always
                },
                concurrency: concurrency.unwrap_or(config.batch.concurrency),
            };
            cmd_convert(&config, files, opts).await
        }
        Command::Audit {
            file,
            base_url,
            json,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_audit(&config, &file, parse_base_url(base_url.as_deref())?, json).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn parse_base_url(raw: Option<&str>) -> Result<Option<Url>> {
    raw.map(|url| Url::parse(url).map_err(|e| eyre!("invalid base URL '{url}': {e}")))
        .transpose()
}

/// Page address for `file`: its name joined onto the base URL.
fn source_url_for(base: Option<&Url>, file: &Path) -> Option<Url> {
    let base = base?;
    let name = file.file_name()?.to_string_lossy();
    base.join(&name).ok().or_else(|| Some(base.clone()))
}

fn read_input(file: &Path, base: Option<&Url>) -> Result<PageInput> {
    let html = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let mut input = PageInput::new(html);
    input.source_url = source_url_for(base, file);
    Ok(input)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct ConvertOptions {
    out: Option<PathBuf>,
    json: bool,
    base_url: Option<Url>,
    policy: CommitPolicy,
    concurrency: usize,
}

async fn cmd_convert(config: &AppConfig, files: Vec<PathBuf>, opts: ConvertOptions) -> Result<()> {
    let pipeline = PipelineConfig::from(config);
    pipeline.validate()?;

    let inputs = files
        .iter()
        .map(|file| read_input(file, opts.base_url.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    info!(
        pages = inputs.len(),
        concurrency = opts.concurrency,
        "converting pages"
    );

    let images = Arc::new(pipeline.image_resolver());
    let reporter: Arc<dyn ProgressReporter> = if opts.json {
        Arc::new(sn2n_core::SilentProgress)
    } else {
        Arc::new(CliProgress::new(inputs.len()))
    };
    let start = Instant::now();
    let results = convert_batch(
        inputs,
        Arc::new(pipeline),
        images,
        opts.concurrency,
        reporter,
    )
    .await;

    let mut sink = opts.out.as_ref().map(DirectorySink::new).transpose()?;
    let reprocess_dir = config.batch.reprocess_dir.as_deref().map(PathBuf::from);
    let summary = BatchSummary::from_results(&results, start.elapsed());

    for (file, result) in files.iter().zip(&results) {
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                eprintln!("  error  {}: {e}", file.display());
                continue;
            }
        };

        if !page.passed() {
            if let Some(dir) = &reprocess_dir {
                let target = queue_for_reprocess(file, dir)?;
                info!(file = %file.display(), to = %target.display(), "queued for reprocessing");
            }
        }

        if opts.json {
            println!("{}", serde_json::to_string(page)?);
        } else {
            print_page_line(file, page);
        }

        if let Some(sink) = sink.as_mut() {
            match commit(sink, page, opts.policy)? {
                CommitOutcome::Committed { page: id, appends } => {
                    if !opts.json {
                        println!(
                            "         committed {} ({appends} appends)",
                            sink.page_dir(&id).display()
                        );
                    }
                }
                CommitOutcome::Skipped { reason } => {
                    warn!(file = %file.display(), %reason, "page skipped");
                }
            }
        }
    }

    if !opts.json {
        println!();
        println!("{}", summary_line(&summary));
        println!();
    }

    if summary.all_passed() {
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} pages did not pass",
            summary.pages - summary.passed,
            summary.pages
        ))
    }
}

async fn cmd_audit(config: &AppConfig, file: &Path, base_url: Option<Url>, json: bool) -> Result<()> {
    let pipeline = PipelineConfig::from(config);
    let input = read_input(file, base_url.as_ref())?;
    let images = pipeline.image_resolver();
    let page = convert_page(&input, &pipeline, &images)?;

    if json {
        let out = serde_json::json!({
            "report": page.audit,
            "recommendations": page.recommendations,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(page.display_title(), &page.audit, &page.recommendations);
    }

    if page.passed() {
        Ok(())
    } else {
        Err(eyre!("audit failed for {}", file.display()))
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn summary_line(summary: &BatchSummary) -> String {
    format!(
        "  Pages: {}  Passed: {}  Failed audit: {}  Errors: {}  Time: {:.1}s",
        summary.pages,
        summary.passed,
        summary.failed_audit,
        summary.errors,
        summary.elapsed.as_secs_f64()
    )
}

fn print_page_line(file: &Path, page: &PageConversion) {
    let status = if page.passed() { "pass" } else { "FAIL" };
    println!(
        "  {status}   {} \"{}\" coverage {:.1}%, {} blocks, {} deferred",
        file.display(),
        page.display_title(),
        page.audit.coverage_percent(),
        page.audit.produced_block_count,
        page.deferred.len()
    );
    for rec in &page.recommendations {
        println!("         [{}] {}", rec.priority, rec.action);
    }
}

fn print_report(title: &str, report: &AuditReport, recommendations: &[Recommendation]) {
    println!();
    println!("  {title}");
    println!(
        "  Result:   {}",
        if report.passed { "passed" } else { "failed" }
    );
    println!(
        "  Coverage: {:.1}% ({} of {} chars)",
        report.coverage_percent(),
        report.produced_chars,
        report.source_chars
    );
    for m in &report.mismatches {
        println!(
            "  {:<9} source {} output {}{}",
            m.kind.to_string(),
            m.source,
            m.produced,
            if m.critical { " (critical)" } else { "" }
        );
    }
    for span in &report.missing_spans {
        println!("  missing  {} \"{}\"", span.path, span.text);
    }
    for span in &report.extra_spans {
        println!("  extra    {} \"{}\"", span.path, span.text);
    }
    if !recommendations.is_empty() {
        println!();
        for rec in recommendations {
            println!("  [{}] {}", rec.priority, rec.action);
            println!("         {}", rec.reason);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn page_converted(&self, label: &str, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
        self.bar.set_message(format!("Converted {label}"));
    }

    fn done(&self, _summary: &BatchSummary) {
        self.bar.finish_and_clear();
    }
}
