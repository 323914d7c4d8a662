use crate::error::BotfleetError;

pub const DEFAULT_PROJECT: &str = "Gamebot";

/// Worker launch arguments: `[tenant, project, localhost, ...passthrough]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub tenant: String,
    pub project: String,
    pub localhost: bool,
    pub passthrough: Vec<String>,
}

impl WorkerArgs {
    /// Parses arguments without the program name. Only the tenant is mandatory.
    pub fn parse<I, S>(args: I) -> Result<Self, BotfleetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);

        let tenant = args
            .next()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BotfleetError::InvalidRequest("missing tenant argument".to_string()))?;
        let project = args
            .next()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        let localhost = args.next().is_some_and(|flag| is_truthy(&flag));
        let passthrough = args.collect();

        Ok(Self {
            tenant,
            project,
            localhost,
            passthrough,
        })
    }
}

fn is_truthy(flag: &str) -> bool {
    matches!(
        flag.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "--localhost"
    )
}
