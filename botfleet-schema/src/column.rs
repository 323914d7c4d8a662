use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared shape of one column: base type plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Base SQL type including any length, e.g. `VARCHAR(255)` or `INT`.
    pub base_type: String,
    #[serde(default)]
    pub not_null: bool,
    /// Raw SQL default expression (`CURRENT_TIMESTAMP`, `false`, `'x'`).
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnSpec {
    pub fn new(base_type: impl Into<String>) -> Self {
        Self {
            base_type: base_type.into(),
            not_null: false,
            default: None,
            primary_key: false,
            unique: false,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Key, unique and auto-increment columns are never re-typed or moved by convergence.
    pub fn is_protected(&self) -> bool {
        self.primary_key || self.unique || self.auto_increment
    }

    /// Normalized leading type token used for live/declared comparison.
    pub fn type_token(&self) -> String {
        normalize_type_token(&self.base_type)
    }

    /// Renders the column definition as it appears after the column name in MySQL DDL.
    pub fn to_sql(&self) -> String {
        let mut out = self.base_type.clone();
        if self.not_null {
            out.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            out.push_str(" DEFAULT ");
            out.push_str(default);
        }
        if self.auto_increment {
            out.push_str(" AUTO_INCREMENT");
        }
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        if self.unique {
            out.push_str(" UNIQUE");
        }
        out
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

const INTEGER_TYPES: [&str; 5] = ["tinyint", "smallint", "mediumint", "int", "bigint"];

/// Reduces a column type (declared or introspected) to a comparable token.
///
/// Only the leading token is considered: `int unsigned` and `varchar(64) character set utf8mb4`
/// compare as `int` and `varchar(64)`. Aliases are folded (`boolean` → `tinyint(1)`,
/// `integer` → `int`) and integer display widths are dropped, because MySQL reports them
/// inconsistently across versions.
pub fn normalize_type_token(raw: &str) -> String {
    let token = leading_token(raw.trim()).to_ascii_lowercase();
    let token = collapse_list_spacing(&token);

    let (name, args) = match token.find('(') {
        Some(idx) => (&token[..idx], Some(&token[idx..])),
        None => (token.as_str(), None),
    };

    match (name, args) {
        ("boolean" | "bool", _) => "tinyint(1)".to_string(),
        ("tinyint", Some("(1)")) => "tinyint(1)".to_string(),
        ("integer", _) => "int".to_string(),
        (name, Some(_)) if INTEGER_TYPES.contains(&name) => name.to_string(),
        _ => token.clone(),
    }
}

/// `decimal(10, 2)` → `decimal(10,2)`; MySQL reports type arguments without spaces.
fn collapse_list_spacing(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut after_comma = false;
    for ch in token.chars() {
        if after_comma && ch.is_whitespace() {
            continue;
        }
        after_comma = ch == ',';
        out.push(ch);
    }
    out
}

/// Everything up to the first whitespace outside parentheses.
fn leading_token(raw: &str) -> &str {
    let mut depth = 0usize;
    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => return &raw[..idx],
            _ => {}
        }
    }
    raw
}
