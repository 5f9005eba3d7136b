//! Statement building and value conversion for SQLite.

use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde_json::{Number, Value};

use crate::error::{StorageResult, ValidationError};
use crate::types::{ID_COLUMN, Query, Row, SqlValue, expand_placeholders, validate_identifier};

use super::schema::{ColumnKind, ColumnKinds};

/// Quotes a validated identifier.
pub(crate) fn quote(name: &str) -> StorageResult<String> {
    Ok(format!("\"{}\"", validate_identifier(name)?))
}

/// The model of a declarative query, validated.
pub(crate) fn require_model<'q>(query: &'q Query, operation: &str) -> StorageResult<&'q str> {
    let model = query.model().ok_or_else(|| ValidationError::MissingModel {
        operation: operation.to_string(),
    })?;
    validate_identifier(model)
}

/// Builds the `SELECT` for a query, or passes a raw statement through.
pub(crate) fn select(query: &Query) -> StorageResult<(String, Vec<SqlValue>)> {
    if let Some(raw) = query.raw() {
        return expand_placeholders(raw, query.args());
    }

    let model = require_model(query, "find")?;
    let mut sql = format!(
        "SELECT {} FROM {}",
        query.select().unwrap_or("*"),
        quote(model)?
    );
    if let Some(filter) = query.filter() {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if let Some(sort) = query.sort() {
        sql.push_str(" ORDER BY ");
        sql.push_str(sort);
    }
    match (query.limit(), query.offset()) {
        (Some(limit), 0) => sql.push_str(&format!(" LIMIT {limit}")),
        (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (None, 0) => {}
        (None, offset) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
    }
    expand_placeholders(&sql, query.args())
}

/// Builds a `SELECT COUNT(*)` over the rows a query matches, ignoring paging.
pub(crate) fn count(query: &Query) -> StorageResult<(String, Vec<SqlValue>)> {
    if let Some(raw) = query.raw() {
        return expand_placeholders(&format!("SELECT COUNT(*) FROM ({raw})"), query.args());
    }

    let model = require_model(query, "count")?;
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote(model)?);
    if let Some(filter) = query.filter() {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    expand_placeholders(&sql, query.args())
}

/// Builds a filtered `DELETE`. An unfiltered delete is rejected.
pub(crate) fn delete(query: &Query) -> StorageResult<(String, Vec<SqlValue>)> {
    let model = require_model(query, "delete")?;
    let filter = query.filter().ok_or_else(|| ValidationError::MissingFilter {
        operation: "delete".to_string(),
    })?;
    expand_placeholders(
        &format!("DELETE FROM {} WHERE {}", quote(model)?, filter),
        query.args(),
    )
}

/// Builds an `INSERT` for the columns of one row, optionally as an upsert
/// keyed on the id column.
pub(crate) fn insert(model: &str, columns: &[&String], upsert: bool) -> StorageResult<String> {
    let names = columns
        .iter()
        .map(|c| quote(c))
        .collect::<StorageResult<Vec<_>>>()?;
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(model)?,
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    );
    if upsert {
        let assignments: Vec<String> = columns
            .iter()
            .zip(&names)
            .filter(|(c, _)| c.as_str() != ID_COLUMN)
            .map(|(_, q)| format!("{q} = excluded.{q}"))
            .collect();
        if assignments.is_empty() {
            sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", quote(ID_COLUMN)?));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                quote(ID_COLUMN)?,
                assignments.join(", ")
            ));
        }
    }
    Ok(sql)
}

/// Builds `UPDATE model SET c1 = ?, ... WHERE id = ?`.
pub(crate) fn update_by_id(model: &str, columns: &[&String]) -> StorageResult<String> {
    let assignments = columns
        .iter()
        .map(|c| Ok(format!("{} = ?", quote(c)?)))
        .collect::<StorageResult<Vec<_>>>()?;
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote(model)?,
        assignments.join(", "),
        quote(ID_COLUMN)?
    ))
}

/// Builds `SELECT COUNT(*) FROM model WHERE id = ?`.
pub(crate) fn count_by_id(model: &str) -> StorageResult<String> {
    Ok(format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        quote(model)?,
        quote(ID_COLUMN)?
    ))
}

/// The id column of a row, which must be a non-empty string.
pub(crate) fn row_id(row: &Row) -> StorageResult<&str> {
    match row.get(ID_COLUMN) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        _ => Err(ValidationError::MissingRequiredField {
            field: ID_COLUMN.to_string(),
        }
        .into()),
    }
}

/// Converts a column value for storage. Booleans become integers, arrays
/// and objects become JSON text.
pub(crate) fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqliteValue::Integer(i),
            None => SqliteValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqliteValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqliteValue::Text(value.to_string()),
    }
}

/// Converts a positional argument.
pub(crate) fn arg_to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        SqlValue::Integer(i) => SqliteValue::Integer(*i),
        SqlValue::Real(f) => SqliteValue::Real(*f),
        SqlValue::Text(s) => SqliteValue::Text(s.clone()),
        SqlValue::List(items) => SqliteValue::Text(
            serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string()),
        ),
    }
}

/// Converts a stored value back, guided by the declared column kind.
pub(crate) fn from_sqlite(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), ColumnKind::Bool) => Value::Bool(i != 0),
        (ValueRef::Integer(i), _) => Value::Number(i.into()),
        (ValueRef::Real(f), _) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        (ValueRef::Text(t), ColumnKind::Json) | (ValueRef::Blob(t), ColumnKind::Json) => {
            let text = String::from_utf8_lossy(t);
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
        }
        (ValueRef::Text(t), _) | (ValueRef::Blob(t), _) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// Runs a query and collects its rows.
pub(crate) fn query_rows(
    conn: &Connection,
    sql: &str,
    args: &[SqlValue],
    kinds: &ColumnKinds,
) -> StorageResult<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(args.iter().map(arg_to_sqlite)))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in names.iter().enumerate() {
            let kind = kinds.get(name).copied().unwrap_or_default();
            record.insert(name.clone(), from_sqlite(row.get_ref(i)?, kind));
        }
        out.push(record);
    }
    Ok(out)
}

/// Runs a single-value integer query such as `COUNT(*)`.
pub(crate) fn query_count(conn: &Connection, sql: &str, args: &[SqlValue]) -> StorageResult<u64> {
    let n: i64 = conn.query_row(sql, params_from_iter(args.iter().map(arg_to_sqlite)), |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(n).unwrap_or_default())
}

/// Runs a statement with positional arguments and returns the rows changed.
pub(crate) fn execute(conn: &Connection, sql: &str, args: &[SqlValue]) -> StorageResult<u64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let changed = stmt.execute(params_from_iter(args.iter().map(arg_to_sqlite)))?;
    Ok(changed as u64)
}

/// Runs a statement with storage values and returns the rows changed.
pub(crate) fn execute_values(
    conn: &Connection,
    sql: &str,
    values: Vec<SqliteValue>,
) -> StorageResult<u64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let changed = stmt.execute(params_from_iter(values))?;
    Ok(changed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::types::Paging;

    #[test]
    fn test_select_with_everything() {
        let query = Query::for_model("users")
            .with_filter("age > ? AND id in (?)", args![18, vec!["a", "b"]])
            .with_sort("name ASC")
            .paginate(Paging::new(2, 10));
        let (sql, args) = select(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE age > ? AND id in (?, ?) ORDER BY name ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_select_offset_without_limit() {
        let (sql, _) = select(&Query::for_model("users").with_offset(5)).unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_select_requires_model() {
        assert!(select(&Query::new()).is_err());
        assert!(select(&Query::for_model("users; DROP TABLE x")).is_err());
    }

    #[test]
    fn test_delete_requires_filter() {
        let err = delete(&Query::for_model("users")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::StorageError::Validation(ValidationError::MissingFilter { .. })
        ));
    }

    #[test]
    fn test_upsert_statement() {
        let id = "id".to_string();
        let name = "name".to_string();
        let sql = insert("users", &[&id, &name], true).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES (?, ?) ON CONFLICT(\"id\") DO UPDATE SET \"name\" = excluded.\"name\""
        );
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(to_sqlite(&Value::Bool(true)), SqliteValue::Integer(1));
        assert_eq!(
            to_sqlite(&serde_json::json!(["a"])),
            SqliteValue::Text("[\"a\"]".to_string())
        );
        assert_eq!(
            from_sqlite(ValueRef::Integer(0), ColumnKind::Bool),
            Value::Bool(false)
        );
        assert_eq!(
            from_sqlite(ValueRef::Text(b"[1,2]"), ColumnKind::Json),
            serde_json::json!([1, 2])
        );
        assert_eq!(
            from_sqlite(ValueRef::Integer(7), ColumnKind::Other),
            serde_json::json!(7)
        );
    }
}
