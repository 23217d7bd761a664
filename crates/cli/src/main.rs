use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hypergate_admission::{AdmissionControl, AdmissionPolicy};
use hypergate_brokers_hyperliquid::HyperliquidService;
use hypergate_core::{parse_flag, TradingCredentials, DEFAULT_CONFIG_FILE, ENV_CONFIG_FILE};
use hypergate_mcp::TradingTools;
use rmcp::{transport::stdio, ServiceExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "hypergate")]
#[command(about = "Hyperliquid trading tools over MCP, behind API-key auth and a rate limit")]
#[command(version)]
struct Cli {
    /// Transport to serve MCP over
    #[arg(value_enum, default_value_t = Mode::Http)]
    mode: Mode,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file, written alongside the console output
    #[arg(long, env = "LOG_FILE", default_value = "hyperliquid_mcp.log")]
    log_file: PathBuf,

    /// Credentials file (JSON, or TOML with a .toml extension)
    #[arg(long, env = ENV_CONFIG_FILE, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Shared secret callers must present
    #[arg(long, env = "API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Enforce API-key auth and rate limiting ("true" to enable)
    #[arg(long, env = "REQUIRE_AUTH", value_name = "BOOL")]
    require_auth: Option<String>,

    /// Requests admitted per window
    #[arg(long, env = "RATE_LIMIT", default_value = "60")]
    rate_limit: u32,

    /// Rate limit window length in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    rate_window: u64,

    /// Bind host for HTTP mode
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port for HTTP mode
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// MCP over stdin/stdout
    Stdio,
    /// HTTP server with /health, / and /mcp
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    if let Err(e) = run(cli).await {
        error!(error = %format!("{:#}", e), "Failed to start server");
        return Err(e);
    }
    Ok(())
}

/// Console logs go to stderr so stdout stays free for the stdio transport.
fn init_logging(cli: &Cli) -> Result<WorkerGuard> {
    let directory = cli
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = cli
        .log_file
        .file_name()
        .with_context(|| format!("log file {} has no file name", cli.log_file.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<()> {
    let credentials = TradingCredentials::load(&cli.config_file, |key| std::env::var(key).ok())
        .context("loading trading credentials")?;
    info!(
        source = ?credentials.source,
        testnet = credentials.testnet,
        "Loaded trading credentials"
    );

    let policy = AdmissionPolicy::new(
        parse_flag(cli.require_auth.as_deref()),
        cli.api_key.clone(),
        cli.rate_limit,
    )
    .with_window(Duration::from_secs(cli.rate_window));
    let admission = AdmissionControl::new(policy).context("invalid admission settings")?;

    let service =
        HyperliquidService::new(&credentials).context("initializing Hyperliquid service")?;
    info!("HyperLiquid service initialized successfully");

    let tools = TradingTools::new(Arc::new(service), admission.limiter().clone());
    let sweeper = admission.limiter().spawn_sweeper();

    let result = match cli.mode {
        Mode::Stdio => serve_stdio(tools).await,
        Mode::Http => serve_http(&cli, admission, tools).await,
    };

    sweeper.abort();
    result
}

async fn serve_stdio(tools: TradingTools) -> Result<()> {
    info!("Running in stdio mode");
    let server = tools
        .serve(stdio())
        .await
        .context("starting MCP stdio server")?;
    let reason = server.waiting().await?;
    info!(?reason, "MCP stdio session ended");
    Ok(())
}

async fn serve_http(cli: &Cli, admission: AdmissionControl, tools: TradingTools) -> Result<()> {
    let bind = format!("{}:{}", cli.host, cli.port);
    info!(bind = %bind, "Starting HTTP server");

    let policy = admission.policy();
    if policy.require_auth {
        info!("API authentication is ENABLED");
        info!(
            rate_limit = %policy.rate_limit_description(),
            "Rate limiting enabled"
        );
    } else {
        warn!("API authentication is DISABLED (not recommended for production)");
    }

    let app = hypergate_api::build_router(admission, tools);
    hypergate_api::start_server(app, &bind).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["hypergate"]).unwrap();
        assert_eq!(cli.mode, Mode::Http);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_stdio_mode_and_flags() {
        let cli = Cli::try_parse_from([
            "hypergate",
            "stdio",
            "--require-auth",
            "TRUE",
            "--api-key",
            "secret",
            "--rate-limit",
            "10",
            "--rate-window",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Stdio);
        assert!(parse_flag(cli.require_auth.as_deref()));
        assert_eq!(cli.api_key, "secret");
        assert_eq!(cli.rate_limit, 10);
        assert_eq!(cli.rate_window, 30);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["hypergate", "websocket"]).is_err());
    }
}
