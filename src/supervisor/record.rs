use serde::Serialize;

/// Lifecycle of one tenant's worker.
///
/// `Spawning -> Running -> (exit) -> Restarting -> Spawning`, or a terminal
/// `Stopped` / `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Spawning,
    Running,
    Restarting,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// Observable state of one supervised tenant. Kept after terminal stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub tenant: String,
    pub project: String,
    pub state: WorkerState,
    pub pid: Option<u32>,
    /// Code-1 exits since `start`; never reset by restarts.
    pub restart_count: u32,
    pub max_restarts: u32,
    pub last_exit_code: Option<i32>,
    /// Incremented on every spawn; events from older incarnations are ignored.
    pub generation: u64,
}

impl ProcessRecord {
    pub fn new(tenant: impl Into<String>, project: impl Into<String>, max_restarts: u32) -> Self {
        Self {
            tenant: tenant.into(),
            project: project.into(),
            state: WorkerState::Spawning,
            pid: None,
            restart_count: 0,
            max_restarts,
            last_exit_code: None,
            generation: 0,
        }
    }
}
