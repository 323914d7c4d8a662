//! Static command table. Commands are registered explicitly at startup.

use std::path::PathBuf;
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use tracing::info;

use crate::db::TenantDataClient;
use crate::error::BotfleetError;

/// What every command of one worker can reach.
#[derive(Clone)]
pub struct CommandScope {
    pub tenant: String,
    pub project: String,
    pub db: Arc<TenantDataClient>,
    /// Root under which `backup` writes `<database>/<table>.json`.
    pub backup_dir: PathBuf,
}

/// Invocation context for one command.
#[derive(Clone)]
pub struct CommandContext {
    pub scope: CommandScope,
    /// Sender of the triggering message.
    pub from: String,
    /// Words following the command name.
    pub args: Vec<String>,
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Returns an optional reply for the session runtime to deliver.
    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, BotfleetError>;
}

/// Maps lowercased names and aliases to commands.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: AHashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the commands every worker ships with.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Ping));
        registry.register(Arc::new(Status));
        registry.register(Arc::new(Backup));
        registry
    }

    /// Later registrations win on name or alias clashes.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        for key in std::iter::once(command.name()).chain(command.aliases().iter().copied()) {
            self.commands.insert(key.to_ascii_lowercase(), command.clone());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Runs the command named by the first word of `body`. `Ok(None)` when nothing matched
    /// or the command had no reply.
    pub async fn dispatch(
        &self,
        body: &str,
        from: &str,
        scope: &CommandScope,
    ) -> Result<Option<String>, BotfleetError> {
        let mut words = body.split_whitespace();
        let Some(command) = words.next().and_then(|name| self.lookup(name)) else {
            return Ok(None);
        };
        let ctx = CommandContext {
            scope: scope.clone(),
            from: from.to_string(),
            args: words.map(str::to_string).collect(),
        };
        command.execute(ctx).await
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

struct Ping;

#[async_trait]
impl Command for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["p"]
    }

    async fn execute(&self, _ctx: CommandContext) -> Result<Option<String>, BotfleetError> {
        Ok(Some("pong".to_string()))
    }
}

struct Status;

#[async_trait]
impl Command for Status {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, BotfleetError> {
        let scope = &ctx.scope;
        let database = scope.db.database_name().await?;
        Ok(Some(format!(
            "{} is running project {} on database {database}",
            scope.tenant, scope.project
        )))
    }
}

struct Backup;

#[async_trait]
impl Command for Backup {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, BotfleetError> {
        let scope = &ctx.scope;
        let summary = scope.db.backup_database(&scope.backup_dir).await?;
        info!(
            tenant = %scope.tenant,
            requested_by = %ctx.from,
            directory = %summary.directory.display(),
            "Backup written"
        );
        Ok(Some(format!(
            "backed up {} tables to {}",
            summary.tables.len(),
            summary.directory.display()
        )))
    }
}
