use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chamie::api::{AppState, create_router};
use chamie::config::ServerConfig;
use chamie::gemini::GeminiClient;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common)?;

    let config = ServerConfig::load(cli.common.config.as_deref())?;

    match cli.command {
        Command::Serve(cmd) => async_serve(config, cmd),
    }
}

#[tokio::main]
async fn async_serve(config: ServerConfig, cmd: ServeCommand) -> Result<()> {
    handle_serve(config, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Chamie - AI chat server streaming Gemini answers.",
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
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Override the bind host
    #[arg(long)]
    host: Option<String>,
    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging(opts: &CommonOpts) -> Result<()> {
    let default_level = if opts.quiet {
        "error"
    } else {
        match opts.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chamie={default_level},tower_http=info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}

async fn handle_serve(mut config: ServerConfig, cmd: ServeCommand) -> Result<()> {
    if let Some(host) = cmd.host {
        config.host = host;
    }
    if let Some(port) = cmd.port {
        config.port = port;
    }

    // A missing key must stop the server here, not fail every chat later.
    let api_key = config.resolve_api_key()?;
    let backend = GeminiClient::new(&config.gemini, api_key)
        .context("failed to build the Gemini client")?;

    let state = AppState::new(Arc::new(backend), config.allowed_origins.clone());
    let router = create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, model = %config.gemini.model, "chamie listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;
    Ok(())
}
