mod doctor_commands;
mod extract_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    scrapbook_config::ScrapbookConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::extract_commands::Format;

#[derive(Parser)]
#[command(name = "scrapbook", about = "Scrapbook: archive the media in chat messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./scrapbook.toml and the user
    /// config dir).
    #[arg(long, global = true, env = "SCRAPBOOK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every media reference in a message and print its manifest.
    Extract {
        /// JSON file holding one message or an array of messages.
        #[arg(short, long)]
        input: PathBuf,
        /// Message id; defaults to the first message in the file.
        #[arg(long)]
        id: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print the references found in a message without resolving them.
    Classify {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Config validation and environment audit.
    Doctor {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
    },
}

/// Initialise tracing. `RUST_LOG` takes precedence over `--log-level`.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ScrapbookConfig> {
    match &cli.config {
        Some(path) => scrapbook_config::load_config(path),
        None => Ok(scrapbook_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "scrapbook starting");

    match &cli.command {
        Commands::Extract { input, id, format } => {
            let config = load_config(&cli)?;
            extract_commands::handle_extract(&config, input, id.as_deref(), *format).await
        },
        Commands::Classify { input, id } => {
            let config = load_config(&cli)?;
            extract_commands::handle_classify(&config, input, id.as_deref()).await
        },
        Commands::Doctor { verbose } => {
            let config = load_config(&cli)?;
            doctor_commands::handle_doctor(cli.config.as_deref(), &config, *verbose)
        },
    }
}
