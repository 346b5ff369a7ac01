// # ifsyncd - interface IP configurator daemon
//
// This daemon is a thin integration layer: it reads configuration from
// environment variables, initializes the runtime, wires the transport to the
// engine, and runs the event loop. All reconciliation logic lives in
// ifsync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Telemetry session
// - `IFSYNC_ADDR`: Address of the telemetry/config endpoint (required)
// - `IFSYNC_USERNAME`: Username to authenticate with
// - `IFSYNC_PASSWORD`: Password to authenticate with
// - `IFSYNC_TLS`: Enable TLS ("1"/"true"; rejected by the json transport)
// - `IFSYNC_CA_FILE`: Path to server CA certificate file
// - `IFSYNC_CERT_FILE`: Path to client TLS certificate file
// - `IFSYNC_KEY_FILE`: Path to client TLS private key file
//
// ### Address pool
// - `IFSYNC_POOL_SIZE`: Number of synthetic addresses (default 200)
// - `IFSYNC_PREFIX_LEN`: Prefix length for all allocations (default 24)
//
// ### Engine
// - `IFSYNC_GRACE_PERIOD_MS`: Fragment wait window in ms (default 20000)
//
// ### Logging
// - `IFSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export IFSYNC_ADDR=switch1:6030
// export IFSYNC_USERNAME=admin
// export IFSYNC_POOL_SIZE=200
// export IFSYNC_PREFIX_LEN=24
//
// ifsyncd
// ```

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use ifsync_core::{Engine, IfsyncConfig, SessionConfig};
use ifsync_session_json::{JsonConfigPusher, JsonTelemetrySession};

/// Exit codes following systemd conventions
#[derive(Debug, Clone, Copy)]
enum IfsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (session failure)
    RuntimeError = 2,
}

impl From<IfsyncExitCode> for ExitCode {
    fn from(code: IfsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

struct DaemonConfig {
    ifsync: IfsyncConfig,
    log_level: String,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let session = SessionConfig {
            addr: env::var("IFSYNC_ADDR")
                .context("IFSYNC_ADDR is required (telemetry endpoint, host:port)")?,
            username: env::var("IFSYNC_USERNAME").ok(),
            password: env::var("IFSYNC_PASSWORD").ok(),
            tls: env::var("IFSYNC_TLS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ca_file: env::var("IFSYNC_CA_FILE").ok(),
            cert_file: env::var("IFSYNC_CERT_FILE").ok(),
            key_file: env::var("IFSYNC_KEY_FILE").ok(),
        };

        let mut ifsync = IfsyncConfig::new(session);

        if let Ok(size) = env::var("IFSYNC_POOL_SIZE") {
            ifsync.pool.size = size
                .parse()
                .with_context(|| format!("IFSYNC_POOL_SIZE is not a number: {size}"))?;
        }
        if let Ok(len) = env::var("IFSYNC_PREFIX_LEN") {
            ifsync.pool.prefix_len = len
                .parse()
                .with_context(|| format!("IFSYNC_PREFIX_LEN is not a number: {len}"))?;
        }
        if let Ok(ms) = env::var("IFSYNC_GRACE_PERIOD_MS") {
            ifsync.engine.grace_period_ms = ms
                .parse()
                .with_context(|| format!("IFSYNC_GRACE_PERIOD_MS is not a number: {ms}"))?;
        }

        Ok(Self {
            ifsync,
            log_level: env::var("IFSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        self.ifsync.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => anyhow::bail!(
                "IFSYNC_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }
}

fn main() -> ExitCode {
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return IfsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e:#}");
        return IfsyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return IfsyncExitCode::ConfigError.into();
    }

    info!("starting ifsyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {e}");
            return IfsyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => IfsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("daemon error: {e:#}");
                IfsyncExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Wire the transport to the engine and run until shutdown or session failure
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let session = JsonTelemetrySession::new(config.ifsync.session.clone())?;
    let pusher = JsonConfigPusher::new(config.ifsync.session.clone())?;

    let (mut engine, mut events) = Engine::new(Box::new(session), Box::new(pusher), config.ifsync)?;

    // Surface engine events in the logs; the channel otherwise backs up and
    // drops.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "engine event");
        }
    });

    engine.run().await?;
    info!("ifsyncd stopped");
    Ok(())
}
