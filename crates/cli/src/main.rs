mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fieldkit_storage::{Coords, LocalStore};
use fieldkit_visit::FixedLocation;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Field-visit client for agronomists.
#[derive(Parser)]
#[command(name = "fieldkit", version, about = "Field-visit client for agronomists")]
struct Cli {
    /// Path to the configuration file (default: ./fieldkit.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Current latitude (overrides FIELDKIT_LAT)
    #[arg(long, global = true, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Current longitude (overrides FIELDKIT_LON)
    #[arg(long, global = true, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a location fragment to the section it shows
    Route {
        /// Fragment such as "#/task/42"
        #[arg(default_value = "", allow_hyphen_values = true)]
        fragment: String,
    },

    /// Start, annotate and finish field visits
    Visit {
        #[command(subcommand)]
        command: VisitCommands,
    },

    /// List the plots of a property
    Plots {
        /// Property id
        property: String,
    },

    /// Schedule and list field tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Record field activities against a plot's active crop cycle
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum VisitCommands {
    /// Check in to a client property
    Start(StartArgs),
    /// Attach an observation to the visit in progress
    Observe {
        /// Observation text
        #[arg(long)]
        text: Option<String>,
        /// Reference to an uploaded image
        #[arg(long)]
        image: Option<String>,
    },
    /// Check out of the visit in progress
    End,
    /// Show the visit in progress and its observations
    Status,
    /// Re-read the visit in progress from the store
    Recover,
}

#[derive(Args)]
pub(crate) struct StartArgs {
    /// Client id
    #[arg(long)]
    pub client: String,
    /// Property id
    #[arg(long)]
    pub property: String,
    /// Client display name (defaults to the id)
    #[arg(long)]
    pub client_name: Option<String>,
    /// Property display name (defaults to the id)
    #[arg(long)]
    pub property_name: Option<String>,
    /// Check in at "LAT,LON" (e.g. a map marker) instead of the current position
    #[arg(long, value_parser = parse_coords, allow_hyphen_values = true)]
    pub at: Option<Coords>,
}

#[derive(Subcommand)]
pub(crate) enum TaskCommands {
    /// Schedule a task
    Schedule {
        #[arg(long)]
        title: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: String,
        #[arg(long)]
        property: String,
        #[arg(long)]
        plot: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List your tasks, soonest due first
    List,
}

#[derive(Subcommand)]
pub(crate) enum ActivityCommands {
    /// Register an activity (spraying, fertilising, harvest, ...)
    Register {
        #[arg(long)]
        plot: String,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Shared state for a single command invocation.
pub(crate) struct Context {
    pub config: Config,
    pub output: OutputFormat,
    pub quiet: bool,
    location: FixedLocation,
}

impl Context {
    pub fn open_store(&self) -> Result<LocalStore, String> {
        LocalStore::open(&self.config.store_path).map_err(|e| e.to_string())
    }

    pub fn location(&self) -> FixedLocation {
        self.location.clone()
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let location = match (cli.lat, cli.lon) {
        (Some(lat), Some(lon)) => FixedLocation::new(Coords::new(lat, lon)),
        _ => FixedLocation::from_env(),
    };
    let ctx = Context {
        config,
        output: cli.output,
        quiet: cli.quiet,
        location,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let result = rt.block_on(async {
        match cli.command {
            Commands::Route { fragment } => commands::route::cmd_route(&ctx, &fragment),
            Commands::Visit { command } => commands::visit::cmd_visit(&ctx, command).await,
            Commands::Plots { property } => commands::plots::cmd_plots(&ctx, &property).await,
            Commands::Task { command } => commands::task::cmd_task(&ctx, command).await,
            Commands::Activity { command } => {
                commands::activity::cmd_activity(&ctx, command).await
            }
        }
    });

    if let Err(e) = result {
        tracing::debug!(error = %e, "command failed");
        report_error(&e, cli.output, cli.quiet);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `"-15.8,-47.9"` → `Coords`.
fn parse_coords(raw: &str) -> Result<Coords, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON but got '{}'", raw))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{}': {}", s.trim(), e))
    };
    Ok(Coords::new(parse(lat)?, parse(lon)?))
}

/// Print `value` as pretty JSON, or the text rendering, unless quiet.
pub(crate) fn emit<T: serde::Serialize>(ctx: &Context, value: &T, text: impl FnOnce() -> String) {
    if ctx.quiet {
        return;
    }
    match ctx.output {
        OutputFormat::Text => println!("{}", text()),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("serialization error: {}", e),
        },
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": msg });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| msg.to_string())
            );
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", msg);
            }
        }
    }
}
