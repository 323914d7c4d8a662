//! Conversion between JSON entries and MySQL parameters/rows.

use botfleet_schema::{is_valid_ident, quote_ident};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};

use crate::error::BotfleetError;

/// One row, keyed by column name in column order.
pub type Entry = Map<String, Value>;

pub type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Validates and backtick-quotes a caller-supplied identifier.
pub fn checked_ident(name: &str) -> Result<String, BotfleetError> {
    if is_valid_ident(name) {
        Ok(quote_ident(name))
    } else {
        Err(BotfleetError::InvalidIdentifier(name.to_string()))
    }
}

/// `a <=> ? AND b <=> ?`; null-safe so `{"x": null}` matches NULL columns.
pub fn where_clause(criteria: &Entry) -> Result<String, BotfleetError> {
    let parts = criteria
        .keys()
        .map(|k| checked_ident(k).map(|col| format!("{col} <=> ?")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(" AND "))
}

/// `a = ?, b = ?`
pub fn set_clause(updates: &Entry) -> Result<String, BotfleetError> {
    let parts = updates
        .keys()
        .map(|k| checked_ident(k).map(|col| format!("{col} = ?")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(", "))
}

pub fn bind_value<'q>(query: MySqlQuery<'q>, value: &Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => bind_number(query, n),
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn bind_number<'q>(query: MySqlQuery<'q>, n: &Number) -> MySqlQuery<'q> {
    if let Some(i) = n.as_i64() {
        query.bind(i)
    } else if let Some(u) = n.as_u64() {
        query.bind(u)
    } else {
        query.bind(n.as_f64().unwrap_or_default())
    }
}

pub fn bind_all<'q, 'v>(
    mut query: MySqlQuery<'q>,
    values: impl IntoIterator<Item = &'v Value>,
) -> MySqlQuery<'q> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}

/// Decodes every column of `row` into JSON, keyed by the driver's type name.
pub fn row_to_entry(row: &MySqlRow) -> Result<Entry, BotfleetError> {
    let mut entry = Entry::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = decode_column(row, idx, type_name)?;
        entry.insert(column.name().to_string(), value);
    }
    Ok(entry)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value, BotfleetError> {
    let value = match type_name {
        "NULL" => Value::Null,
        "BOOLEAN" => opt(row.try_get::<Option<bool>, _>(idx)?, Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            opt(row.try_get_unchecked::<Option<i64>, _>(idx)?, Value::from)
        }
        t if t.ends_with("UNSIGNED") => {
            opt(row.try_get_unchecked::<Option<u64>, _>(idx)?, Value::from)
        }
        "FLOAT" | "DOUBLE" => opt(row.try_get_unchecked::<Option<f64>, _>(idx)?, Value::from),
        "TIMESTAMP" => opt(row.try_get::<Option<DateTime<Utc>>, _>(idx)?, |t| {
            Value::String(t.to_rfc3339())
        }),
        "DATETIME" => opt(row.try_get::<Option<NaiveDateTime>, _>(idx)?, |t| {
            Value::String(t.to_string())
        }),
        "DATE" => opt(row.try_get::<Option<NaiveDate>, _>(idx)?, |d| {
            Value::String(d.to_string())
        }),
        "TIME" => opt(row.try_get::<Option<NaiveTime>, _>(idx)?, |t| {
            Value::String(t.to_string())
        }),
        "JSON" => row.try_get::<Option<Value>, _>(idx)?.unwrap_or(Value::Null),
        t if is_binary(t) => opt(row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)?, |b| {
            match String::from_utf8(b) {
                Ok(s) => Value::String(s),
                Err(e) => Value::String(hex::encode(e.into_bytes())),
            }
        }),
        _ => opt(row.try_get_unchecked::<Option<String>, _>(idx)?, Value::String),
    };
    Ok(value)
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, f)
}

fn is_binary(type_name: &str) -> bool {
    matches!(
        type_name,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> Entry {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn where_clause_is_null_safe_and_ordered() {
        let criteria = entry(json!({ "name": "acme", "status": null }));
        assert_eq!(
            where_clause(&criteria).unwrap(),
            "`name` <=> ? AND `status` <=> ?"
        );
    }

    #[test]
    fn set_clause_lists_updates() {
        let updates = entry(json!({ "status": "login", "projectName": "Shop" }));
        assert_eq!(set_clause(&updates).unwrap(), "`status` = ?, `projectName` = ?");
    }

    #[test]
    fn rejects_injected_identifiers() {
        let criteria = entry(json!({ "name; DROP TABLE bots": 1 }));
        assert!(matches!(
            where_clause(&criteria),
            Err(BotfleetError::InvalidIdentifier(_))
        ));
        assert!(checked_ident("bots").is_ok());
        assert!(checked_ident("").is_err());
    }
}
