//! Declarative schema vocabulary for tenant databases.
//!
//! Everything in this crate is pure data: no IO, no driver types. The `botfleet`
//! crate introspects live databases into [`LiveColumnSet`]s and converges them
//! towards a [`SchemaDefinition`] by issuing [`DdlStatement`]s.

pub mod column;
pub mod ddl;
pub mod ident;
pub mod layouts;
pub mod live;
pub mod table;

pub use column::{ColumnSpec, normalize_type_token};
pub use ddl::{ColumnPosition, DdlStatement};
pub use ident::{is_valid_ident, quote_ident};
pub use layouts::SchemaClass;
pub use live::{LiveColumn, LiveColumnSet};
pub use table::{SchemaDefinition, TableDefinition};
