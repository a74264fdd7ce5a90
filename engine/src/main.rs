use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use conductor_observability::{
    canonical_logs_dir_from_root, emit_event, init_process_logging, ObservabilityEvent, ProcessKind,
};
use conductor_server::{serve, AppState, ConductorConfig};
use conductor_types::Priority;

#[derive(Parser, Debug)]
#[command(name = "conductor-engine")]
#[command(about = "Headless Conductor orchestration engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP polling API.
    Serve {
        #[arg(long, alias = "host")]
        hostname: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        config: Option<String>,
    },
    /// Submit one objective, poll it to a terminal state, print the session.
    Run {
        objective: String,
        #[arg(long)]
        config: Option<String>,
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            hostname,
            port,
            config,
        } => {
            let mut config = load_config(config)?;
            if let Some(hostname) = hostname {
                config.hostname = hostname;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let logs_dir = config
                .logs_dir
                .clone()
                .unwrap_or_else(|| canonical_logs_dir_from_root(Path::new(".")));
            let (_log_guard, log_info) =
                init_process_logging(ProcessKind::Engine, &logs_dir, config.log_retention_days)?;
            emit_event(
                tracing::Level::INFO,
                ProcessKind::Engine,
                ObservabilityEvent {
                    event: "logging.initialized",
                    component: "engine.main",
                    status: Some("ok"),
                    detail: Some("engine jsonl logging initialized"),
                    ..Default::default()
                },
            );
            info!("engine logging initialized: {:?}", log_info);

            let addr: SocketAddr = format!("{}:{}", config.hostname, config.port)
                .parse()
                .context("invalid hostname or port")?;
            let state = AppState::new(config);
            serve(addr, state).await?;
        }
        Command::Run {
            objective,
            config,
            timeout_secs,
        } => {
            let config = load_config(config)?;
            let logs_dir = config
                .logs_dir
                .clone()
                .unwrap_or_else(|| canonical_logs_dir_from_root(Path::new(".")));
            let (_log_guard, _) =
                init_process_logging(ProcessKind::Engine, &logs_dir, config.log_retention_days)?;

            let state = AppState::new(config);
            let session_id = state.registry.submit(objective, Priority::Normal).await;
            info!(session = %session_id, "objective submitted, polling to completion");

            let deadline = Instant::now() + Duration::from_secs(timeout_secs);
            loop {
                let session = state.registry.snapshot(&session_id).await?;
                if session.status.is_terminal() {
                    println!("{}", serde_json::to_string_pretty(&session)?);
                    break;
                }
                if Instant::now() > deadline {
                    anyhow::bail!(
                        "session {session_id} did not reach a terminal state within {timeout_secs}s"
                    );
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<String>) -> anyhow::Result<ConductorConfig> {
    let path = path.map(PathBuf::from);
    ConductorConfig::load(path.as_deref())
}
