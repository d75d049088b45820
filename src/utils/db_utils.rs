use serde_json::Value;
use chrono::{NaiveDate, NaiveDateTime};
use actix_web::error::ErrorBadRequest;
use sqlx::MySqlPool;


/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    U64(u64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}


/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}


/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only whitelisted JSON keys are accepted; each maps to its column, so
/// client payloads can never name a column directly.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&str, &str)],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = allowed
            .iter()
            .find(|(json_key, _)| json_key == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| ErrorBadRequest(format!("Unknown field: {}", key)))?;

        columns.push(format!("{} = ?", column));

        // Convert JSON value → SqlValue
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) =
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
        }
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}


/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    pool: &MySqlPool,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[(&str, &str)] = &[
        ("amount", "amount"),
        ("date", "date"),
        ("description", "description"),
        ("order", "sort_order"),
    ];

    #[test]
    fn maps_json_keys_to_columns() {
        let payload = json!({"amount": 1500.5, "order": 3});
        let update = build_update_sql("advances", &payload, ALLOWED, "id", 9).unwrap();

        assert_eq!(
            update.sql,
            "UPDATE advances SET amount = ?, sort_order = ? WHERE id = ?"
        );
        assert_eq!(update.values.len(), 3);
        assert!(matches!(update.values[0], SqlValue::F64(v) if v == 1500.5));
        assert!(matches!(update.values[1], SqlValue::I64(3)));
        assert!(matches!(update.values[2], SqlValue::U64(9)));
    }

    #[test]
    fn date_strings_bind_as_dates() {
        let payload = json!({"date": "2026-02-14"});
        let update = build_update_sql("fines", &payload, ALLOWED, "id", 1).unwrap();
        assert!(matches!(update.values[0], SqlValue::Date(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let payload = json!({"status": "Settled"});
        assert!(build_update_sql("advances", &payload, ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("advances", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("advances", &json!([1, 2]), ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn null_clears_a_column() {
        let payload = json!({"description": null});
        let update = build_update_sql("advances", &payload, ALLOWED, "id", 4).unwrap();
        assert!(matches!(update.values[0], SqlValue::Null));
    }
}
