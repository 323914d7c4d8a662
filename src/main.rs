use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use botfleet::BotfleetError;
use botfleet::config::Config;
use botfleet::control::{ControlMessage, ControlWriter};
use botfleet::db::{GAMEBOT_TENANT, TenantDataClient, TenantRegistry, VerifiedDatabases};
use botfleet::signals::ShutdownSignals;
use botfleet::supervisor::{
    EXIT_FATAL, ProcessLauncher, RestartPolicy, SupervisorHandle, SupervisorOptions, WorkerState,
    load_roster, startup_exit_code,
};
use mimalloc::MiMalloc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("botfleet: invalid configuration: {e}");
            return exit_code(EXIT_FATAL);
        }
    };
    botfleet::logging::init_tracing(&cfg.basic.loglevel, false);

    match supervise(&cfg).await {
        Ok(()) => {
            info!("Supervisor has shut down gracefully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = startup_exit_code(&e);
            error!(error = %e, code, "Supervisor could not start");
            exit_code(code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

async fn supervise(cfg: &Config) -> Result<(), BotfleetError> {
    let passthrough: Vec<String> = std::env::args().skip(1).collect();
    let localhost = passthrough.iter().any(|a| a == "--localhost");

    info!(
        database_host = %cfg.database.host,
        database_port = cfg.database.port,
        catalog = %cfg.database.gamebot_database,
        worker_program = %cfg.supervisor.worker_program.display(),
        max_restarts = cfg.supervisor.max_restarts,
        restart_delay_ms = cfg.supervisor.restart_delay_ms,
        localhost,
        "Supervisor configuration loaded"
    );

    let mut signals = ShutdownSignals::install()?;

    let registry = TenantRegistry::from_config(cfg);
    let catalog = TenantDataClient::new(GAMEBOT_TENANT, registry, VerifiedDatabases::new());
    let roster = load_roster(&catalog, &cfg.supervisor.default_project).await?;

    let (operator_tx, operator_rx) = mpsc::channel(cfg.supervisor.control_buffer.max(1));
    tokio::spawn(echo_operator_messages(operator_rx));

    let launcher = ProcessLauncher::new(
        cfg.supervisor.worker_program.clone(),
        cfg.supervisor.control_buffer,
    );
    let supervisor = SupervisorHandle::spawn(
        Arc::new(launcher),
        SupervisorOptions {
            policy: RestartPolicy::from_config(&cfg.supervisor),
            localhost,
            passthrough,
            operator: Some(operator_tx),
        },
    )
    .await?;

    for launch in &roster {
        if let Err(e) = supervisor.start(&launch.tenant, &launch.project).await {
            error!(tenant = %launch.tenant, error = %e, "Worker could not be started");
        }
    }
    info!(tenants = roster.len(), "All workers launched");

    let signal = signals.recv().await;
    info!(signal = %signal, "Shutdown requested; stopping workers");
    stop_workers(&supervisor).await;
    supervisor.shutdown();
    Ok(())
}

/// Prints operator-facing worker messages on stdout, one JSON line each.
async fn echo_operator_messages(mut rx: mpsc::Receiver<ControlMessage>) {
    let mut out = ControlWriter::new(tokio::io::stdout());
    while let Some(message) = rx.recv().await {
        if let Err(e) = out.send(&message).await {
            warn!(error = %e, "Operator output failed");
            break;
        }
    }
}

async fn stop_workers(supervisor: &SupervisorHandle) {
    match supervisor.broadcast("stop", json!({})).await {
        Ok(reached) => info!(reached, "Stop broadcast sent"),
        Err(e) => {
            warn!(error = %e, "Stop broadcast failed");
            return;
        }
    }

    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while tokio::time::Instant::now() < deadline {
        let live = match supervisor.records().await {
            Ok(records) => records
                .iter()
                .filter(|r| matches!(r.state, WorkerState::Running | WorkerState::Spawning))
                .count(),
            Err(_) => 0,
        };
        if live == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    warn!("Workers still running after the grace period");
}
