//! Exit-code contract between supervisor and workers.

use std::fmt;
use std::time::Duration;

use crate::config::SupervisorConfig;
use crate::error::BotfleetError;

pub const EXIT_CRASH: i32 = 1;
pub const EXIT_FATAL: i32 = 5;
pub const EXIT_RESTART: i32 = 10;
pub const EXIT_STOP: i32 = 30;
pub const EXIT_DATASTORE: i32 = 51;

/// Exit code for a process that could not finish starting up. Datastore failures get the
/// connectivity code so no supervisor retries them; everything else is fatal.
pub fn startup_exit_code(error: &BotfleetError) -> i32 {
    if error.is_datastore_failure() {
        EXIT_DATASTORE
    } else {
        EXIT_FATAL
    }
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// 1: transient crash.
    Crash,
    /// 5: fatal local error.
    Fatal,
    /// 10: the worker asked to be restarted.
    RestartRequested,
    /// 30: deliberate stop.
    Stopped,
    /// 51: datastore unreachable.
    DatastoreFailure,
    /// Any other code, or none at all (terminated by a signal).
    Unrecognized(Option<i32>),
}

impl WorkerExit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(EXIT_CRASH) => Self::Crash,
            Some(EXIT_FATAL) => Self::Fatal,
            Some(EXIT_RESTART) => Self::RestartRequested,
            Some(EXIT_STOP) => Self::Stopped,
            Some(EXIT_DATASTORE) => Self::DatastoreFailure,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> Option<i32> {
        match self {
            Self::Crash => Some(EXIT_CRASH),
            Self::Fatal => Some(EXIT_FATAL),
            Self::RestartRequested => Some(EXIT_RESTART),
            Self::Stopped => Some(EXIT_STOP),
            Self::DatastoreFailure => Some(EXIT_DATASTORE),
            Self::Unrecognized(code) => code,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crash => f.write_str("transient crash"),
            Self::Fatal => f.write_str("fatal error"),
            Self::RestartRequested => f.write_str("restart requested"),
            Self::Stopped => f.write_str("stopped"),
            Self::DatastoreFailure => f.write_str("datastore connectivity failure"),
            Self::Unrecognized(Some(code)) => write!(f, "unrecognized exit code {code}"),
            Self::Unrecognized(None) => f.write_str("terminated without exit code"),
        }
    }
}

/// What the supervisor does after an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    RestartAfter(Duration),
    RestartNow,
    Stop,
    /// Retry budget exhausted.
    GiveUp,
}

/// Fixed-delay restart policy capped by attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub delay: Duration,
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_restarts: 5,
        }
    }
}

impl RestartPolicy {
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self {
            delay: cfg.restart_delay(),
            max_restarts: cfg.max_restarts,
        }
    }

    /// `crashes` is the number of transient crashes including the one being decided.
    pub fn decide(&self, exit: WorkerExit, crashes: u32) -> ExitAction {
        match exit {
            WorkerExit::Crash if crashes >= self.max_restarts => ExitAction::GiveUp,
            WorkerExit::Crash => ExitAction::RestartAfter(self.delay),
            WorkerExit::RestartRequested => ExitAction::RestartNow,
            WorkerExit::Fatal
            | WorkerExit::Stopped
            | WorkerExit::DatastoreFailure
            | WorkerExit::Unrecognized(_) => ExitAction::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_contract_code() {
        assert_eq!(WorkerExit::from_code(Some(1)), WorkerExit::Crash);
        assert_eq!(WorkerExit::from_code(Some(5)), WorkerExit::Fatal);
        assert_eq!(WorkerExit::from_code(Some(10)), WorkerExit::RestartRequested);
        assert_eq!(WorkerExit::from_code(Some(30)), WorkerExit::Stopped);
        assert_eq!(WorkerExit::from_code(Some(51)), WorkerExit::DatastoreFailure);
        assert_eq!(
            WorkerExit::from_code(Some(0)),
            WorkerExit::Unrecognized(Some(0))
        );
        assert_eq!(WorkerExit::from_code(None), WorkerExit::Unrecognized(None));
        assert_eq!(WorkerExit::from_code(Some(51)).code(), Some(51));
    }

    #[test]
    fn startup_failures_split_datastore_from_fatal() {
        assert_eq!(
            startup_exit_code(&BotfleetError::NotFound("acme".into())),
            EXIT_DATASTORE
        );
        assert_eq!(
            startup_exit_code(&BotfleetError::Database(sqlx::Error::RowNotFound)),
            EXIT_DATASTORE
        );
        assert_eq!(
            startup_exit_code(&BotfleetError::InvalidRequest("no tenant".into())),
            EXIT_FATAL
        );
        assert_eq!(
            startup_exit_code(&BotfleetError::Process("spawn".into())),
            EXIT_FATAL
        );
    }

    #[test]
    fn crash_restarts_until_budget_is_spent() {
        let policy = RestartPolicy::default();
        for crashes in 1..5 {
            assert_eq!(
                policy.decide(WorkerExit::Crash, crashes),
                ExitAction::RestartAfter(Duration::from_secs(5))
            );
        }
        assert_eq!(policy.decide(WorkerExit::Crash, 5), ExitAction::GiveUp);
    }

    #[test]
    fn only_crash_and_restart_request_restart() {
        let policy = RestartPolicy::default();
        assert_eq!(
            policy.decide(WorkerExit::RestartRequested, 99),
            ExitAction::RestartNow
        );
        for exit in [
            WorkerExit::Fatal,
            WorkerExit::Stopped,
            WorkerExit::DatastoreFailure,
            WorkerExit::Unrecognized(Some(2)),
            WorkerExit::Unrecognized(None),
        ] {
            assert_eq!(policy.decide(exit, 0), ExitAction::Stop, "{exit}");
        }
    }
}
