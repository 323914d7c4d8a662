//! Worker-process runtime: one tenant, one session, one control channel.

pub mod args;
pub mod commands;
pub mod session;
pub mod status;

pub use args::WorkerArgs;
pub use commands::{Command, CommandContext, CommandRegistry, CommandScope};
pub use session::{GroupEventKind, IdleSession, SessionEvent, SessionHooks, SessionRuntime};
pub use status::StatusRecorder;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::control::{ControlMessage, ControlReader, ControlWriter};
use crate::db::{GAMEBOT_TENANT, TenantDataClient, TenantRegistry, TenantStatus, VerifiedDatabases};
use crate::signals::ShutdownSignals;
use crate::supervisor::{EXIT_CRASH, EXIT_FATAL, EXIT_RESTART, EXIT_STOP, startup_exit_code};

/// What a supervisor message asks of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Restart,
    Stop,
    Deliver,
}

impl ControlVerb {
    pub fn of(message: &ControlMessage) -> Self {
        match message.message.trim().to_ascii_lowercase().as_str() {
            "restart" => Self::Restart,
            "stop" => Self::Stop,
            _ => Self::Deliver,
        }
    }
}

/// Runs the worker until it has to exit and returns the process exit code.
pub async fn run(args: WorkerArgs, cfg: &Config, runtime: Box<dyn SessionRuntime>) -> i32 {
    run_with(
        args,
        TenantRegistry::from_config(cfg),
        cfg.basic.backup_dir.clone(),
        runtime,
    )
    .await
}

/// [`run`] against an explicit registry. Startup failures map to
/// [`startup_exit_code`]: 51 when the datastore is unreachable or the tenant is unknown,
/// 5 otherwise.
pub async fn run_with(
    args: WorkerArgs,
    registry: TenantRegistry,
    backup_dir: PathBuf,
    runtime: Box<dyn SessionRuntime>,
) -> i32 {
    let verified = VerifiedDatabases::new();

    let client = Arc::new(TenantDataClient::new(
        &args.tenant,
        registry.clone(),
        verified.clone(),
    ));
    if let Err(e) = client.connect().await {
        let code = startup_exit_code(&e);
        error!(tenant = %args.tenant, error = %e, code, "Worker initialization failed");
        return code;
    }

    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!(tenant = %args.tenant, error = %e, "Signal handlers unavailable");
            return EXIT_FATAL;
        }
    };

    let catalog = Arc::new(
        TenantDataClient::new(GAMEBOT_TENANT, registry, verified).without_convergence(),
    );
    let status = StatusRecorder::new(catalog, &args.tenant);
    status.record(TenantStatus::Login).await;

    let mut control_out = ControlWriter::new(tokio::io::stdout());
    if let Err(e) = control_out
        .send(&ControlMessage::starting(&args.tenant, &args.project))
        .await
    {
        error!(tenant = %args.tenant, error = %e, "Could not reach the supervisor");
        return EXIT_FATAL;
    }

    let control_in = ControlReader::new(BufReader::new(tokio::io::stdin()));
    let scope = CommandScope {
        tenant: args.tenant.clone(),
        project: args.project.clone(),
        db: client,
        backup_dir,
    };
    let ctx = WorkerContext {
        args,
        status,
        commands: CommandRegistry::with_builtins(),
        scope,
    };
    ctx.serve(runtime, signals, control_in, control_out).await
}

struct WorkerContext {
    args: WorkerArgs,
    status: StatusRecorder,
    commands: CommandRegistry,
    scope: CommandScope,
}

impl WorkerContext {
    async fn serve<R, W>(
        self,
        runtime: Box<dyn SessionRuntime>,
        mut signals: ShutdownSignals,
        mut control_in: ControlReader<R>,
        mut control_out: ControlWriter<W>,
    ) -> i32
    where
        R: tokio::io::AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (events_tx, mut events) = mpsc::channel(64);
        let hooks = SessionHooks::new(&self.args.tenant, &self.args.project, events_tx);
        let mut session = tokio::spawn(runtime.run(hooks));

        info!(tenant = %self.args.tenant, project = %self.args.project, "Worker running");
        let code = loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    self.on_event(event, &mut control_out).await;
                }

                control = control_in.next_message() => match control {
                    Ok(Some(message)) => match ControlVerb::of(&message) {
                        ControlVerb::Restart => {
                            info!(tenant = %self.args.tenant, "Restart requested by supervisor");
                            break EXIT_RESTART;
                        }
                        ControlVerb::Stop => {
                            info!(tenant = %self.args.tenant, "Stop requested by supervisor");
                            self.status.record(TenantStatus::Stopped).await;
                            break EXIT_STOP;
                        }
                        ControlVerb::Deliver => {
                            info!(
                                tenant = %self.args.tenant,
                                from = %message.from,
                                message = %message.message,
                                data = %message.data,
                                "Control message received"
                            );
                        }
                    },
                    Ok(None) => {
                        warn!(tenant = %self.args.tenant, "Control channel closed; stopping");
                        self.status.record(TenantStatus::Stopped).await;
                        break EXIT_STOP;
                    }
                    Err(e) => {
                        error!(tenant = %self.args.tenant, error = %e, "Control channel failed");
                        break EXIT_CRASH;
                    }
                },

                joined = &mut session => {
                    break match joined {
                        Ok(Ok(())) => {
                            info!(tenant = %self.args.tenant, "Session ended");
                            self.status.record(TenantStatus::Stopped).await;
                            EXIT_STOP
                        }
                        Ok(Err(e)) => {
                            error!(tenant = %self.args.tenant, error = %e, "Session failed");
                            EXIT_CRASH
                        }
                        Err(e) => {
                            error!(tenant = %self.args.tenant, error = %e, "Session task aborted");
                            EXIT_CRASH
                        }
                    };
                }

                signal = signals.recv() => {
                    info!(tenant = %self.args.tenant, signal = %signal, "Shutdown signal received");
                    self.status.record(TenantStatus::Stopped).await;
                    break EXIT_STOP;
                }
            }
        };

        session.abort();
        code
    }

    async fn on_event<W>(&self, event: SessionEvent, control_out: &mut ControlWriter<W>)
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(status) = event.status() {
            self.status.record(status).await;
        }

        match event {
            SessionEvent::Message { from, body } => {
                match self
                    .commands
                    .dispatch(&body, &from, &self.scope)
                    .await
                {
                    Ok(Some(reply)) => debug!(tenant = %self.args.tenant, to = %from, reply = %reply, "Command replied"),
                    Ok(None) => {}
                    Err(e) => warn!(tenant = %self.args.tenant, error = %e, "Command failed"),
                }
            }
            SessionEvent::Challenge { payload } => {
                let message = ControlMessage::new(
                    &self.args.tenant,
                    crate::control::SUPERVISOR_NAME,
                    "challenge",
                    serde_json::json!({ "payload": payload }),
                );
                if let Err(e) = control_out.send(&message).await {
                    warn!(tenant = %self.args.tenant, error = %e, "Could not forward login challenge");
                }
            }
            SessionEvent::Group { kind, chat } => {
                debug!(tenant = %self.args.tenant, kind = ?kind, chat = %chat, "Group event");
            }
            other => {
                info!(tenant = %self.args.tenant, event = ?other, "Session event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_verbs() {
        let msg = |text: &str| ControlMessage::new("gamebot", "acme", text, json!({}));
        assert_eq!(ControlVerb::of(&msg("restart")), ControlVerb::Restart);
        assert_eq!(ControlVerb::of(&msg(" STOP ")), ControlVerb::Stop);
        assert_eq!(ControlVerb::of(&msg("hello")), ControlVerb::Deliver);
    }
}
