mod config_commands;
mod service_commands;

use std::{net::SocketAddr, path::PathBuf};

use {
    clap::{Parser, Subcommand},
    subgate_config::DEFAULT_CONFIG_FILE,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "subgate", about = "subgate: channel-subscription gate for a Telegram bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the JSON configuration document.
    #[arg(long, global = true, env = "SUBGATE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise the bot and the config editor (default when no subcommand is provided).
    Run {
        /// Address the config editor binds to.
        #[arg(long, default_value = subgate_web::DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Run the Telegram bot.
    Bot,
    /// Serve the config editor web form.
    Editor {
        /// Address to bind to.
        #[arg(long, default_value = subgate_web::DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Validate the configuration document and report errors/warnings.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "subgate starting");

    let default_run = Commands::Run {
        bind: subgate_web::DEFAULT_BIND.parse()?,
    };
    match cli.command.as_ref().unwrap_or(&default_run) {
        Commands::Run { bind } => {
            let flags = service_commands::ChildFlags {
                config: &cli.config,
                log_level: &cli.log_level,
                json_logs: cli.json_logs,
            };
            service_commands::run(&flags, *bind).await
        },
        Commands::Bot => service_commands::bot(&cli.config).await,
        Commands::Editor { bind } => service_commands::editor(cli.config.clone(), *bind).await,
        Commands::Check => {
            if !config_commands::check(&cli.config)? {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}
