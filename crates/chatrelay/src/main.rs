use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::config::{self, AppConfig};
use chatrelay::upstream::{MODEL, OpenAiClient};
use chatrelay::{AppState, create_router};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(config: AppConfig, cmd: ServeCommand) -> Result<()> {
    handle_serve(config, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.common.config.as_deref())?;
    init_logging(&cli.common, &config);
    debug!("resolved configuration: {:#?}", config.server);

    match cli.command {
        Command::Serve(cmd) => async_main(config, cmd),
        Command::Config { command } => handle_config(&cli.common, &config, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Chatrelay - streaming relay between chat clients and an LLM provider.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", env = "CHATRELAY_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Emit JSON log lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP relay server
    Serve(ServeCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,
    /// Print the config file path in use
    Path,
}

fn init_logging(common: &CommonOpts, config: &AppConfig) {
    let level = if common.quiet {
        "error"
    } else {
        match common.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatrelay={level},tower_http={level}")));

    if common.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(io::stderr().is_terminal()))
            .try_init()
            .ok();
    }
}

async fn handle_serve(config: AppConfig, cmd: ServeCommand) -> Result<()> {
    let api_key = config.upstream.resolve_api_key();
    if api_key.is_none() {
        warn!(
            "No upstream API key configured (upstream.api_key or {}); relay calls will fail until one is set",
            config::FALLBACK_API_KEY_VAR
        );
    }

    let upstream = OpenAiClient::new(
        config.upstream.base_url.clone(),
        api_key,
        Duration::from_secs(config.upstream.connect_timeout_secs),
    )
    .context("building upstream HTTP client")?;

    let state = AppState::new(Arc::new(upstream));
    let app = create_router(state);

    let host = cmd.host.unwrap_or(config.server.host);
    let port = cmd.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!(
        upstream = %config.upstream.base_url,
        model = MODEL,
        "Starting chat relay on {}",
        addr
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

fn handle_config(common: &CommonOpts, config: &AppConfig, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            print!("{}", config.to_redacted_toml()?);
        }
        ConfigCommand::Path => {
            let path = match &common.config {
                Some(path) => path.clone(),
                None => config::default_config_file()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}
