//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use eventfinder_core::{EventFinder, ProgressReporter, WorkflowConfig, WorkflowReport};
use eventfinder_shared::{AppConfig, Event, EventTypeFilter, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EventFinder: find upcoming events where a person is speaking.
#[derive(Parser)]
#[command(
    name = "eventfinder",
    version,
    about = "Find upcoming conferences, meetups and webinars featuring a given speaker.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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

/// Attendance mode accepted by `--event-type`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum EventTypeArg {
    #[value(name = "in_person")]
    InPerson,
    Online,
}

impl From<EventTypeArg> for EventTypeFilter {
    fn from(arg: EventTypeArg) -> Self {
        match arg {
            EventTypeArg::InPerson => Self::InPerson,
            EventTypeArg::Online => Self::Online,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search the web for a speaker's upcoming events.
    Find {
        /// Speaker name, e.g. "Jane Doe".
        name: String,

        /// Only keep in-person or online events.
        #[arg(short, long)]
        event_type: Option<EventTypeArg>,

        /// Print the response as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Maximum number of source pages to extract from.
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Serve `GET /events` over HTTP.
    Serve {
        /// Bind address (defaults to the configured host).
        #[arg(long)]
        host: Option<String>,

        /// Port (defaults to the configured port).
        #[arg(short, long)]
        port: Option<u16>,

        /// Maximum number of source pages to extract from per request.
        #[arg(long)]
        top_n: Option<usize>,
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

    let filter = match cli.verbose {
        0 => "eventfinder=info,tower_http=info",
        1 => "eventfinder=debug,tower_http=debug",
        _ => "eventfinder=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Find {
            name,
            event_type,
            json,
            top_n,
        } => cmd_find(&name, event_type.map(Into::into), json, top_n).await,
        Command::Serve { host, port, top_n } => cmd_serve(host, port, top_n).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load config, apply flag overrides and wire the collaborators.
fn build_finder(config: &mut AppConfig, top_n: Option<usize>) -> Result<EventFinder> {
    if let Some(top_n) = top_n {
        config.workflow.top_n = top_n;
    }

    let search = eventfinder_search::provider_from_config(&config.search)
        .wrap_err("failed to build search provider")?;
    let extractor = eventfinder_extraction::extractor_from_config(&config.extraction, &config.llm)
        .wrap_err("failed to build extractor")?;

    info!(
        search = search.name(),
        extractor = extractor.name(),
        top_n = config.workflow.top_n,
        "collaborators ready"
    );

    Ok(EventFinder::new(
        search,
        extractor,
        WorkflowConfig::from_app_config(config),
    ))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_find(
    name: &str,
    filter: Option<EventTypeFilter>,
    json: bool,
    top_n: Option<usize>,
) -> Result<()> {
    let mut config = load_config()?;
    let finder = build_finder(&mut config, top_n)?;

    let reporter = CliProgress::new()?;
    let report = finder.run_with_report(name, filter, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.response)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn cmd_serve(host: Option<String>, port: Option<u16>, top_n: Option<usize>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let finder = Arc::new(build_finder(&mut config, top_n)?);
    eventfinder_server::serve(&config.server, finder)
        .await
        .wrap_err_with(|| {
            format!(
                "server failed on {}:{}",
                config.server.host, config.server.port
            )
        })
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(report: &WorkflowReport) {
    let response = &report.response;

    println!();
    println!(
        "  Upcoming events for {} ({})",
        response.speaker(),
        response.count()
    );
    println!();

    if response.events().is_empty() {
        println!("  No upcoming events found.");
    }
    for event in response.events() {
        print_event(event);
    }

    println!("  Sources:  {}", report.selected_urls.len());
    let failed = report.failed_batches().count();
    if failed > 0 {
        println!("  Failed:   {failed} of {} batches", report.batches.len());
    }
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn print_event(event: &Event) {
    let date = event
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M %:z").to_string())
        .unwrap_or_else(|| "date TBA".to_string());

    println!("  {}", event.event_name);
    println!("    When:     {date}");
    if let Some(place) = describe_location(event) {
        println!("    Where:    {place}");
    }
    println!("    Type:     {}", event.event_type);
    if !event.speakers.is_empty() {
        println!("    Speakers: {}", event.speakers.join(", "));
    }
    if !event.url.is_empty() {
        println!("    Link:     {}", event.url);
    }
    println!();
}

fn describe_location(event: &Event) -> Option<String> {
    let location = &event.location;
    let parts: Vec<&str> = [&location.name, &location.city, &location.country]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _report: &WorkflowReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    // A failed run never reaches `done`; keep the terminal clean anyway.
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
