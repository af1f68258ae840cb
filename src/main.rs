// Main entrypoint for the keyscope side-car.

use keyscope::app::App;
use keyscope::config::{Config, ConfigTrait};
use keyscope::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const CONFIG_PATH: &str = "cfg/keyscope.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/keyscope.cfg.local.yaml";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// keyscope - key index side-car for Redis admin tooling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// Refresh every server once, print a JSON summary and exit
    #[arg(long)]
    once: bool,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, String)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path.display().to_string()));
    }

    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => Ok((cfg, CONFIG_PATH_LOCAL.to_string())),
        Err(_) => {
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            Ok((cfg, CONFIG_PATH.to_string()))
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // stdout carries the --once summary
    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let (cfg, path) = load_cfg(args.cfg)?;

    // Logger needs the config
    configure_logger(&cfg);
    info!(component = "config", event = "load_success", path = %path, "config loaded");

    let warm_up = cfg.warm_up();
    let app = App::with_redis(shutdown_token.clone(), cfg)?;

    if args.once {
        let results = app.warm_up().await;
        let summary: Vec<_> = results.iter().map(|r| r.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        shutdown_token.cancel();
        return Ok(());
    }

    if warm_up {
        app.warm_up().await;
    }

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone(), SHUTDOWN_TIMEOUT);
    if let Some(refresher) = app.serve() {
        graceful_shutdown.spawn(async move {
            if let Err(e) = refresher.await {
                error!(component = "main", event = "refresher_failed", error = %e, "refresher task failed");
            }
        });
    }

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
