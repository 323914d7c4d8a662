//! Boundary to the external bot-session runtime.
//!
//! The runtime drives the messaging protocol and reports lifecycle events through
//! [`SessionHooks`]; the worker persists status transitions and dispatches commands.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::db::TenantStatus;
use crate::error::BotfleetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEventKind {
    Join,
    Leave,
    Update,
    AdminChanged,
}

/// Lifecycle callbacks a session runtime can raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Interactive login challenge (e.g. a pairing code) is pending.
    Challenge { payload: String },
    Ready,
    Authenticated,
    AuthFailure { reason: String },
    Disconnected { reason: String },
    Message { from: String, body: String },
    Group { kind: GroupEventKind, chat: String },
}

impl SessionEvent {
    /// Status persisted on the catalog row for this event, if any.
    pub fn status(&self) -> Option<TenantStatus> {
        match self {
            Self::Challenge { .. } | Self::AuthFailure { .. } | Self::Disconnected { .. } => {
                Some(TenantStatus::Error)
            }
            Self::Ready | Self::Authenticated => Some(TenantStatus::Authenticated),
            Self::Message { .. } | Self::Group { .. } => None,
        }
    }
}

/// Registration point handed to the session runtime.
#[derive(Debug, Clone)]
pub struct SessionHooks {
    tenant: String,
    project: String,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHooks {
    pub fn new(
        tenant: impl Into<String>,
        project: impl Into<String>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            project: project.into(),
            events,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub async fn emit(&self, event: SessionEvent) -> Result<(), BotfleetError> {
        self.events
            .send(event)
            .await
            .map_err(|_| BotfleetError::Process("worker stopped listening to session events".to_string()))
    }
}

/// The protocol runtime driving one tenant's session. Returning ends the worker: `Ok` as a
/// deliberate stop, `Err` as a transient crash.
#[async_trait]
pub trait SessionRuntime: Send + 'static {
    async fn run(self: Box<Self>, hooks: SessionHooks) -> Result<(), BotfleetError>;
}

/// Runtime that speaks no protocol: it reports readiness and then idles until the worker
/// is shut down.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSession;

#[async_trait]
impl SessionRuntime for IdleSession {
    async fn run(self: Box<Self>, hooks: SessionHooks) -> Result<(), BotfleetError> {
        hooks.emit(SessionEvent::Ready).await?;
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            SessionEvent::Challenge { payload: "qr".into() }.status(),
            Some(TenantStatus::Error)
        );
        assert_eq!(SessionEvent::Ready.status(), Some(TenantStatus::Authenticated));
        assert_eq!(
            SessionEvent::Authenticated.status(),
            Some(TenantStatus::Authenticated)
        );
        assert_eq!(
            SessionEvent::Disconnected { reason: "x".into() }.status(),
            Some(TenantStatus::Error)
        );
        assert_eq!(
            SessionEvent::Message {
                from: "u".into(),
                body: "!ping".into()
            }
            .status(),
            None
        );
    }

    #[tokio::test]
    async fn idle_session_reports_ready() {
        let (tx, mut rx) = mpsc::channel(4);
        let hooks = SessionHooks::new("acme", "Gamebot", tx);
        let task = tokio::spawn(Box::new(IdleSession).run(hooks));
        assert_eq!(rx.recv().await, Some(SessionEvent::Ready));
        task.abort();
    }
}
