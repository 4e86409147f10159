use std::{
    io::Read,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use faultline_core::{
    BrowserReport, CaptureContext, CaptureOutcome, CapturedException, Dsn, Reporter, Settings,
    format_duration,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Deliver captured error events to a Sentry-compatible store API")]
struct Cli {
    /// DSN of the ingestion project
    #[arg(long, env = "FAULTLINE_DSN", global = true, hide_env_values = true)]
    dsn: Option<String>,

    /// Environment label merged into every event
    #[arg(long, env = "FAULTLINE_ENV", global = true)]
    environment: Option<String>,

    /// Directory holding pending events
    #[arg(long, env = "FAULTLINE_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Delivery timeout in seconds
    #[arg(long, env = "FAULTLINE_TIMEOUT_SECS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retry delivery of every pending event
    Flush,
    /// List the ids of pending events
    Pending,
    /// Submit a browser error report
    CaptureJs {
        /// Error name, e.g. TypeError
        #[arg(long)]
        name: String,
        /// Error message
        #[arg(long)]
        message: String,
        /// File containing the `Error.stack` text. Read from stdin when omitted.
        #[arg(long)]
        stack_file: Option<PathBuf>,
        /// Extra event fields as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    /// Send a test event to verify the DSN
    Test,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        if let Some(dsn) = &self.dsn {
            settings.dsn = Some(dsn.clone());
        }
        if let Some(env) = &self.environment {
            settings.environment = Some(env.clone());
        }
        settings.cache_dir = self.cache_dir.clone().unwrap_or(settings.cache_dir);
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        settings
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn print_outcome(outcome: CaptureOutcome) {
    match outcome {
        CaptureOutcome::Delivered => println!("{} Event delivered", style("✓").green().bold()),
        CaptureOutcome::Queued => println!(
            "{} Delivery failed, event queued for retry",
            style("!").yellow().bold()
        ),
        CaptureOutcome::Lost => println!(
            "{} Delivery failed and the event could not be queued",
            style("✗").red().bold()
        ),
    }
}

fn read_stack(stack_file: Option<&PathBuf>) -> Result<String> {
    match stack_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading stack from {}", path.display())),
        None => {
            let mut stack = String::new();
            std::io::stdin()
                .read_to_string(&mut stack)
                .context("reading stack from stdin")?;
            Ok(stack)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    let reporter = Reporter::new(settings.clone())?;
    let ctx = CaptureContext {
        environment: settings.environment.clone(),
        platform: Some("javascript".to_string()),
        ..Default::default()
    };

    match cli.command {
        Command::Flush => {
            let dsn_error = match settings.dsn.as_deref() {
                Some(raw) => Dsn::parse(raw).err().map(|e| e.to_string()),
                None => Some("no DSN configured (set FAULTLINE_DSN or pass --dsn)".to_string()),
            };

            let start = Instant::now();
            let spinner = create_spinner("Retrying pending events...");
            let summary = reporter.retry_pending().await?;
            spinner.finish_and_clear();
            tracing::info!(
                attempted = summary.attempted,
                delivered = summary.delivered,
                missing = summary.missing,
                failed = summary.failed,
                elapsed = %format_duration(start.elapsed()),
                "flush finished"
            );

            if let Some(reason) = dsn_error {
                if summary.failed > 0 {
                    println!(
                        "{} {} still pending in {}",
                        style("!").yellow().bold(),
                        summary.failed,
                        reporter.queue().dir().display()
                    );
                }
                eprintln!("{} {}", style("Error:").red().bold(), reason);
                std::process::exit(1);
            }

            if summary.attempted == 0 {
                println!("{} Nothing pending", style("✓").green().bold());
                return Ok(());
            }
            println!(
                "{} Delivered {}/{} {}",
                style("✓").green().bold(),
                summary.delivered,
                summary.attempted,
                style(format!("({})", format_duration(start.elapsed()))).dim()
            );
            if summary.failed > 0 {
                println!(
                    "{} {} still pending in {}",
                    style("!").yellow().bold(),
                    summary.failed,
                    reporter.queue().dir().display()
                );
            }
        }
        Command::Pending => {
            let ids = reporter.queue().list_pending().await?;
            if ids.is_empty() {
                println!("{}", style("No pending events").dim());
            }
            for id in ids {
                println!("{id}");
            }
        }
        Command::CaptureJs {
            name,
            message,
            stack_file,
            data,
        } => {
            let stack = read_stack(stack_file.as_ref())?;
            let additional_data = match data {
                Some(raw) => serde_json::from_str(&raw).context("--data must be a JSON object")?,
                None => Default::default(),
            };
            let report = BrowserReport {
                name,
                message,
                stack,
                additional_data,
            };
            print_outcome(reporter.capture_browser_error(&ctx, report).await);
        }
        Command::Test => {
            if !settings.is_enabled() {
                bail!("no DSN configured (set FAULTLINE_DSN or pass --dsn)");
            }
            let raw = settings.dsn.as_deref().unwrap_or_default();
            if let Err(e) = Dsn::parse(raw) {
                eprintln!("{} {}", style("Error:").red().bold(), e);
                std::process::exit(1);
            }

            let ctx = CaptureContext {
                platform: None,
                ..ctx
            };
            let err = CapturedException::new("TestEvent", "faultline test event");
            print_outcome(reporter.capture_exception(&ctx, &err).await);
        }
    }

    Ok(())
}
