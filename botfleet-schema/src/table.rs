use crate::column::ColumnSpec;
use serde::Serialize;

/// Ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    name: String,
    columns: Vec<(String, ColumnSpec)>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column; declaring the same name twice replaces the earlier spec in place.
    pub fn column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.columns.push((name, spec)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[(String, ColumnSpec)] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|(n, _)| n == column)
            .map(|(_, spec)| spec)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

/// Ordered set of tables a database is converged towards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDefinition {
    tables: Vec<TableDefinition>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableDefinition) -> Self {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
        self
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn get(&self, table: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let table = TableDefinition::new("t")
            .column("b", ColumnSpec::new("INT"))
            .column("a", ColumnSpec::new("INT"))
            .column("c", ColumnSpec::new("INT"));
        assert_eq!(table.column_names().collect::<Vec<_>>(), ["b", "a", "c"]);
    }

    #[test]
    fn redeclaring_a_column_replaces_in_place() {
        let table = TableDefinition::new("t")
            .column("a", ColumnSpec::new("INT"))
            .column("b", ColumnSpec::new("INT"))
            .column("a", ColumnSpec::new("BIGINT"));
        assert_eq!(table.column_names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(table.get("a").map(|s| s.base_type.as_str()), Some("BIGINT"));
    }
}
