use std::sync::Arc;

use ahash::AHashMap;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::launcher::{WorkerEvent, WorkerLauncher, WorkerSpec};
use super::policy::{ExitAction, RestartPolicy, WorkerExit};
use super::record::{ProcessRecord, WorkerState};
use crate::control::{BROADCAST, ControlMessage, SUPERVISOR_NAME};
use crate::error::BotfleetError;

/// Messages handled by the supervisor actor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Start supervising `tenant` with `project`. Fails if it is already live.
    Start(String, String, RpcReplyPort<Result<(), BotfleetError>>),

    /// Deliver a message to one worker.
    SendTo(String, String, Value, RpcReplyPort<Result<(), BotfleetError>>),

    /// Deliver a message to every live worker; replies with the number reached.
    Broadcast(String, Value, RpcReplyPort<usize>),

    /// Snapshot of every record, sorted by tenant.
    Records(RpcReplyPort<Vec<ProcessRecord>>),

    Record(String, RpcReplyPort<Option<ProcessRecord>>),

    // Internal messages (sent by worker pumps and timers)
    WorkerMessage {
        tenant: String,
        message: ControlMessage,
    },
    WorkerExited {
        tenant: String,
        generation: u64,
        code: Option<i32>,
    },
    Respawn {
        tenant: String,
        generation: u64,
    },
}

/// Supervisor settings that are not part of the launcher.
#[derive(Debug, Clone, Default)]
pub struct SupervisorOptions {
    pub policy: RestartPolicy,
    /// Forwarded to workers as their localhost flag.
    pub localhost: bool,
    /// Extra arguments appended to every worker's argument vector.
    pub passthrough: Vec<String>,
    /// Receives worker messages that are not liveness signals.
    pub operator: Option<mpsc::Sender<ControlMessage>>,
}

/// Handle for interacting with the supervisor actor.
#[derive(Clone)]
pub struct SupervisorHandle {
    actor: ActorRef<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Spawns an unnamed supervisor, so independent instances can coexist.
    pub async fn spawn(
        launcher: Arc<dyn WorkerLauncher>,
        options: SupervisorOptions,
    ) -> Result<Self, BotfleetError> {
        let (actor, _jh) = Actor::spawn(None, SupervisorActor, (launcher, options))
            .await
            .map_err(|e| BotfleetError::RactorError(format!("Supervisor spawn failed: {e}")))?;
        Ok(Self { actor })
    }

    pub async fn start(
        &self,
        tenant: impl Into<String>,
        project: impl Into<String>,
    ) -> Result<(), BotfleetError> {
        ractor::call!(
            self.actor,
            SupervisorMessage::Start,
            tenant.into(),
            project.into()
        )
        .map_err(|e| BotfleetError::RactorError(format!("Supervisor Start RPC failed: {e}")))?
    }

    pub async fn send_to(
        &self,
        tenant: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Result<(), BotfleetError> {
        ractor::call!(
            self.actor,
            SupervisorMessage::SendTo,
            tenant.into(),
            message.into(),
            data
        )
        .map_err(|e| BotfleetError::RactorError(format!("Supervisor SendTo RPC failed: {e}")))?
    }

    pub async fn broadcast(
        &self,
        message: impl Into<String>,
        data: Value,
    ) -> Result<usize, BotfleetError> {
        ractor::call!(self.actor, SupervisorMessage::Broadcast, message.into(), data)
            .map_err(|e| BotfleetError::RactorError(format!("Supervisor Broadcast RPC failed: {e}")))
    }

    pub async fn records(&self) -> Result<Vec<ProcessRecord>, BotfleetError> {
        ractor::call!(self.actor, SupervisorMessage::Records)
            .map_err(|e| BotfleetError::RactorError(format!("Supervisor Records RPC failed: {e}")))
    }

    pub async fn record(&self, tenant: &str) -> Result<Option<ProcessRecord>, BotfleetError> {
        ractor::call!(self.actor, SupervisorMessage::Record, tenant.to_string())
            .map_err(|e| BotfleetError::RactorError(format!("Supervisor Record RPC failed: {e}")))
    }

    /// Stops the actor. Worker stdin pipes close once their queues drain.
    pub fn shutdown(&self) {
        self.actor.stop(None);
    }
}

struct WorkerSlot {
    record: ProcessRecord,
    outbound: Option<mpsc::Sender<ControlMessage>>,
}

struct SupervisorState {
    launcher: Arc<dyn WorkerLauncher>,
    options: SupervisorOptions,
    workers: AHashMap<String, WorkerSlot>,
}

struct SupervisorActor;

#[ractor::async_trait]
impl Actor for SupervisorActor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = (Arc<dyn WorkerLauncher>, SupervisorOptions);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (launcher, options): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            max_restarts = options.policy.max_restarts,
            restart_delay_ms = options.policy.delay.as_millis(),
            localhost = options.localhost,
            "Supervisor started"
        );
        Ok(SupervisorState {
            launcher,
            options,
            workers: AHashMap::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Start(tenant, project, rp) => {
                let result = self.handle_start(myself, state, tenant, project).await;
                let _ = rp.send(result);
            }

            SupervisorMessage::SendTo(tenant, text, data, rp) => {
                let _ = rp.send(Self::handle_send_to(state, &tenant, text, data));
            }

            SupervisorMessage::Broadcast(text, data, rp) => {
                let _ = rp.send(Self::handle_broadcast(state, &text, &data));
            }

            SupervisorMessage::Records(rp) => {
                let mut records: Vec<ProcessRecord> =
                    state.workers.values().map(|w| w.record.clone()).collect();
                records.sort_by(|a, b| a.tenant.cmp(&b.tenant));
                let _ = rp.send(records);
            }

            SupervisorMessage::Record(tenant, rp) => {
                let _ = rp.send(state.workers.get(&tenant).map(|w| w.record.clone()));
            }

            SupervisorMessage::WorkerMessage { tenant, message } => {
                Self::handle_worker_message(state, &tenant, message);
            }

            SupervisorMessage::WorkerExited {
                tenant,
                generation,
                code,
            } => {
                self.handle_exit(myself, state, tenant, generation, code)
                    .await;
            }

            SupervisorMessage::Respawn { tenant, generation } => {
                let due = state.workers.get(&tenant).is_some_and(|w| {
                    w.record.generation == generation && w.record.state == WorkerState::Restarting
                });
                if due {
                    let _ = self.spawn_worker(myself, state, &tenant).await;
                }
            }
        }
        Ok(())
    }
}

impl SupervisorActor {
    async fn handle_start(
        &self,
        myself: ActorRef<SupervisorMessage>,
        state: &mut SupervisorState,
        tenant: String,
        project: String,
    ) -> Result<(), BotfleetError> {
        if let Some(slot) = state.workers.get(&tenant)
            && !slot.record.state.is_terminal()
        {
            return Err(BotfleetError::InvalidRequest(format!(
                "tenant {tenant} is already supervised"
            )));
        }

        info!(tenant = %tenant, project = %project, "Starting worker");
        let record = ProcessRecord::new(&tenant, project, state.options.policy.max_restarts);
        state.workers.insert(
            tenant.clone(),
            WorkerSlot {
                record,
                outbound: None,
            },
        );
        self.spawn_worker(myself, state, &tenant).await
    }

    /// Launches a new incarnation and pumps its events back into the actor.
    async fn spawn_worker(
        &self,
        myself: ActorRef<SupervisorMessage>,
        state: &mut SupervisorState,
        tenant: &str,
    ) -> Result<(), BotfleetError> {
        let Some(slot) = state.workers.get_mut(tenant) else {
            return Err(BotfleetError::NotFound(tenant.to_string()));
        };
        slot.record.generation += 1;
        slot.record.state = WorkerState::Spawning;
        let generation = slot.record.generation;

        let spec = WorkerSpec {
            tenant: tenant.to_string(),
            project: slot.record.project.clone(),
            localhost: state.options.localhost,
            passthrough: state.options.passthrough.clone(),
        };

        let mut link = match state.launcher.launch(&spec).await {
            Ok(link) => link,
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Worker spawn failed");
                slot.record.state = WorkerState::Failed;
                slot.outbound = None;
                return Err(e);
            }
        };

        slot.record.pid = link.pid;
        slot.record.state = WorkerState::Running;
        slot.outbound = Some(link.outbound.clone());
        debug!(tenant = %tenant, pid = ?link.pid, generation, "Worker running");

        let tenant = tenant.to_string();
        tokio::spawn(async move {
            while let Some(event) = link.events.recv().await {
                let msg = match event {
                    WorkerEvent::Message(message) => SupervisorMessage::WorkerMessage {
                        tenant: tenant.clone(),
                        message,
                    },
                    WorkerEvent::Exited(code) => SupervisorMessage::WorkerExited {
                        tenant: tenant.clone(),
                        generation,
                        code,
                    },
                };
                if myself.cast(msg).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn handle_exit(
        &self,
        myself: ActorRef<SupervisorMessage>,
        state: &mut SupervisorState,
        tenant: String,
        generation: u64,
        code: Option<i32>,
    ) {
        let policy = state.options.policy;
        let Some(slot) = state.workers.get_mut(&tenant) else {
            return;
        };
        if slot.record.generation != generation {
            debug!(tenant = %tenant, generation, "Ignoring exit of a stale incarnation");
            return;
        }

        slot.record.last_exit_code = code;
        slot.record.pid = None;
        slot.outbound = None;

        let exit = WorkerExit::from_code(code);
        if exit == WorkerExit::Crash {
            slot.record.restart_count += 1;
        }

        match policy.decide(exit, slot.record.restart_count) {
            ExitAction::RestartAfter(delay) => {
                slot.record.state = WorkerState::Restarting;
                info!(
                    tenant = %tenant,
                    attempt = slot.record.restart_count,
                    max = slot.record.max_restarts,
                    delay_ms = delay.as_millis(),
                    "Worker crashed; restarting after delay"
                );
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = myself.cast(SupervisorMessage::Respawn { tenant, generation });
                });
            }
            ExitAction::RestartNow => {
                info!(tenant = %tenant, "Worker requested a restart");
                let _ = self.spawn_worker(myself, state, &tenant).await;
            }
            ExitAction::GiveUp => {
                slot.record.state = WorkerState::Failed;
                error!(
                    tenant = %tenant,
                    attempts = slot.record.restart_count,
                    "Worker could not be kept running; giving up"
                );
            }
            ExitAction::Stop => {
                slot.record.state = WorkerState::Stopped;
                match exit {
                    WorkerExit::Stopped => info!(tenant = %tenant, "Worker stopped on request"),
                    WorkerExit::Fatal => error!(tenant = %tenant, "Worker stopped by a fatal error"),
                    WorkerExit::DatastoreFailure => {
                        error!(tenant = %tenant, "Worker lost its datastore; not restarting");
                    }
                    _ => warn!(tenant = %tenant, code = ?code, "Worker exited with an unrecognized code"),
                }
            }
        }
    }

    fn handle_worker_message(state: &SupervisorState, tenant: &str, message: ControlMessage) {
        if message.is_starting() {
            info!(tenant = %tenant, "{}", message.message);
            return;
        }

        info!(
            tenant = %tenant,
            message = %message.message,
            data = %message.data,
            "Message from worker"
        );
        if let Some(operator) = &state.options.operator
            && let Err(e) = operator.try_send(message)
        {
            warn!(tenant = %tenant, error = %e, "Operator channel rejected worker message");
        }
    }

    fn handle_send_to(
        state: &SupervisorState,
        tenant: &str,
        text: String,
        data: Value,
    ) -> Result<(), BotfleetError> {
        let slot = state
            .workers
            .get(tenant)
            .ok_or_else(|| BotfleetError::NotFound(tenant.to_string()))?;
        let outbound = slot.outbound.as_ref().ok_or_else(|| {
            BotfleetError::Process(format!("worker for {tenant} is not running"))
        })?;
        outbound
            .try_send(ControlMessage::new(SUPERVISOR_NAME, tenant, text, data))
            .map_err(|e| BotfleetError::Process(format!("control send to {tenant} failed: {e}")))
    }

    fn handle_broadcast(state: &SupervisorState, text: &str, data: &Value) -> usize {
        let message = ControlMessage::new(SUPERVISOR_NAME, BROADCAST, text, data.clone());
        state
            .workers
            .iter()
            .filter_map(|(tenant, slot)| slot.outbound.as_ref().map(|tx| (tenant, tx)))
            .filter(|(tenant, tx)| match tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "Broadcast delivery failed");
                    false
                }
            })
            .count()
    }
}
