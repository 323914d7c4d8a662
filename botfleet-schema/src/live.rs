use crate::column::normalize_type_token;
use serde::Serialize;

/// One introspected column, already normalized from the driver's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    /// Full column type as reported, e.g. `varchar(100)` or `int unsigned`.
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            auto_increment: false,
        }
    }

    pub fn type_token(&self) -> String {
        normalize_type_token(&self.column_type)
    }

    pub fn is_protected(&self) -> bool {
        self.primary_key || self.unique || self.auto_increment
    }
}

/// Columns of one live table in ordinal order. Produced fresh on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveColumnSet {
    columns: Vec<LiveColumn>,
}

impl LiveColumnSet {
    pub fn new(columns: Vec<LiveColumn>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveColumn> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<LiveColumn> for LiveColumnSet {
    fn from_iter<I: IntoIterator<Item = LiveColumn>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
