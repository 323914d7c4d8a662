use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::control::{ControlMessage, ControlReader, ControlWriter};
use crate::error::BotfleetError;

/// Everything needed to start one worker incarnation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub tenant: String,
    pub project: String,
    pub localhost: bool,
    pub passthrough: Vec<String>,
}

impl WorkerSpec {
    /// `[tenant, project, localhost, ...passthrough]`
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.tenant.clone(),
            self.project.clone(),
            self.localhost.to_string(),
        ];
        args.extend(self.passthrough.iter().cloned());
        args
    }
}

/// Reported by a running worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Message(ControlMessage),
    /// The process ended. `None` when it was killed by a signal.
    Exited(Option<i32>),
}

/// Channels attached to one live worker. The event stream ends with exactly one
/// [`WorkerEvent::Exited`].
#[derive(Debug)]
pub struct WorkerLink {
    pub pid: Option<u32>,
    pub outbound: mpsc::Sender<ControlMessage>,
    pub events: mpsc::Receiver<WorkerEvent>,
}

/// Starts worker processes. Swapped for scripted launchers in tests.
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerLink, BotfleetError>;
}

/// Spawns the worker binary as a child process with the control channel on stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    buffer: usize,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, buffer: usize) -> Self {
        Self {
            program: program.into(),
            buffer: buffer.max(1),
        }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerLink, BotfleetError> {
        let mut child = Command::new(&self.program)
            .args(spec.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BotfleetError::Process(format!(
                    "failed to spawn {} for {}: {e}",
                    self.program.display(),
                    spec.tenant
                ))
            })?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BotfleetError::Process("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BotfleetError::Process("worker stdout not captured".to_string()))?;

        let (outbound, mut outbound_rx) = mpsc::channel::<ControlMessage>(self.buffer);
        let (events_tx, events) = mpsc::channel(self.buffer);

        let tenant = spec.tenant.clone();
        tokio::spawn(async move {
            let mut writer = ControlWriter::new(stdin);
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = writer.send(&message).await {
                    warn!(tenant = %tenant, error = %e, "control write failed; worker stdin closed");
                    break;
                }
            }
        });

        let tenant = spec.tenant.clone();
        tokio::spawn(async move {
            let mut reader = ControlReader::new(BufReader::new(stdout));
            loop {
                match reader.next_message().await {
                    Ok(Some(message)) => {
                        if events_tx.send(WorkerEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(tenant = %tenant, error = %e, "control read failed");
                        break;
                    }
                }
            }

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "waiting for worker failed");
                    None
                }
            };
            debug!(tenant = %tenant, code = ?code, "worker process exited");
            let _ = events_tx.send(WorkerEvent::Exited(code)).await;
        });

        Ok(WorkerLink {
            pid,
            outbound,
            events,
        })
    }
}
