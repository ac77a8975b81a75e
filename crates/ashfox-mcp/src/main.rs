//! ashfox MCP server - entry point.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ashfox_mcp::{config::Config, server::McpServer};

#[derive(Parser, Debug)]
#[command(name = "ashfox-mcp")]
#[command(about = "MCP server for a block-model editor")]
#[command(version)]
struct Cli {
    /// Bind host
    #[arg(long, default_value = "127.0.0.1", env = "ASHFOX_HOST")]
    host: String,

    /// Bind port
    #[arg(long, default_value = "8787", env = "ASHFOX_PORT")]
    port: u16,

    /// Base path the MCP endpoint is served under
    #[arg(long, default_value = "/mcp", env = "ASHFOX_PATH")]
    path: String,

    /// Bearer token required on every request when set
    #[arg(long)]
    token: Option<String>,

    /// Transport mode: http or stdio
    #[arg(long, default_value = "http")]
    transport: Transport,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ASHFOX_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// HTTP with Server-Sent Events
    #[default]
    Http,
    /// Standard input/output
    Stdio,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::registry().with(filter);
    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let config = match Config::new(cli.host, cli.port, &cli.path, cli.token) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        "starting ashfox MCP server"
    );

    let server = McpServer::new(config);
    match cli.transport {
        Transport::Http => server.run_http().await?,
        Transport::Stdio => server.run_stdio().await?,
    }
    Ok(())
}
