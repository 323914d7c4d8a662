use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Worker lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// Executable started once per tenant.
    /// TOML: `supervisor.worker_program`. Default: `botfleet-worker`.
    #[serde(default = "default_worker_program")]
    pub worker_program: PathBuf,

    /// Fixed delay before restarting a crashed worker.
    /// TOML: `supervisor.restart_delay_ms`. Default: `5000`.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Crash budget per tenant, counted over every code-1 exit since the tenant was started.
    /// Restart requests (code 10) neither consume nor refill it.
    /// TOML: `supervisor.max_restarts`. Default: `5`.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Project name passed to workers whose catalog row has none.
    /// TOML: `supervisor.default_project`. Default: `Gamebot`.
    #[serde(default = "default_project")]
    pub default_project: String,

    /// Capacity of each worker's outbound control queue.
    /// TOML: `supervisor.control_buffer`. Default: `64`.
    #[serde(default = "default_control_buffer")]
    pub control_buffer: usize,
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_program: default_worker_program(),
            restart_delay_ms: default_restart_delay_ms(),
            max_restarts: default_max_restarts(),
            default_project: default_project(),
            control_buffer: default_control_buffer(),
        }
    }
}

fn default_worker_program() -> PathBuf {
    PathBuf::from("botfleet-worker")
}

const fn default_restart_delay_ms() -> u64 {
    5000
}

const fn default_max_restarts() -> u32 {
    5
}

fn default_project() -> String {
    "Gamebot".to_string()
}

const fn default_control_buffer() -> usize {
    64
}
