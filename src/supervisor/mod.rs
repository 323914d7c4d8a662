//! Worker-process supervision: one actor owns every tenant's process record, applies the
//! exit-code policy and routes control messages.

mod actor;
pub mod launcher;
pub mod policy;
pub mod record;
pub mod roster;

pub use actor::{SupervisorHandle, SupervisorMessage, SupervisorOptions};
pub use launcher::{ProcessLauncher, WorkerEvent, WorkerLauncher, WorkerLink, WorkerSpec};
pub use policy::{
    EXIT_CRASH, EXIT_DATASTORE, EXIT_FATAL, EXIT_RESTART, EXIT_STOP, ExitAction, RestartPolicy,
    WorkerExit, startup_exit_code,
};
pub use record::{ProcessRecord, WorkerState};
pub use roster::{TenantLaunch, launches_from_rows, load_roster};
