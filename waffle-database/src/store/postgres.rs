use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, quote_identifier};
use crate::schema::{ID_FIELD, TableSchema};
use crate::store::Query;
use crate::value::{Record, Value};

type PgQuery<'q> = SqlxQuery<'q, Postgres, PgArguments>;

#[derive(Clone, Debug)]
pub(super) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(super) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(super) async fn ensure_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let statement = schema.create_statement();
        let mut conn = self.pool.acquire().await?;
        sqlx::query(&statement).execute(&mut *conn).await?;
        Ok(())
    }

    pub(super) async fn filter(
        &self,
        schema: &TableSchema,
        filter: &Filter,
        query: &Query,
    ) -> StoreResult<Vec<Record>> {
        let statement = select_statement(schema, filter, query)?;
        debug!(sql = %statement.sql, binds = statement.values.len(), "select");

        let prepared = bind_all(sqlx::query(&statement.sql), &statement.values)?;
        let mut conn = self.pool.acquire().await?;
        let rows = prepared.fetch_all(&mut *conn).await?;

        rows.iter().map(decode_row).collect()
    }

    pub(super) async fn insert(
        &self,
        schema: &TableSchema,
        record: &Record,
        returning_id: bool,
    ) -> StoreResult<Option<i64>> {
        let statement = insert_statement(schema, record, returning_id);
        debug!(sql = %statement.sql, "insert");

        let prepared = bind_all(sqlx::query(&statement.sql), &statement.values)?;
        let mut conn = self.pool.acquire().await?;

        if returning_id {
            let row = prepared.fetch_one(&mut *conn).await?;
            Ok(Some(row.try_get::<i64, _>(0)?))
        } else {
            prepared.execute(&mut *conn).await?;
            Ok(None)
        }
    }

    pub(super) async fn update(
        &self,
        schema: &TableSchema,
        filter: Option<&Filter>,
        changes: &Record,
    ) -> StoreResult<u64> {
        let statement = update_statement(schema, filter, changes)?;
        debug!(sql = %statement.sql, binds = statement.values.len(), "update");

        let prepared = bind_all(sqlx::query(&statement.sql), &statement.values)?;
        let mut conn = self.pool.acquire().await?;
        let result = prepared.execute(&mut *conn).await?;

        Ok(result.rows_affected())
    }

    pub(super) async fn delete(
        &self,
        schema: &TableSchema,
        filter: Option<&Filter>,
    ) -> StoreResult<u64> {
        let statement = delete_statement(schema, filter)?;
        debug!(sql = %statement.sql, binds = statement.values.len(), "delete");

        let prepared = bind_all(sqlx::query(&statement.sql), &statement.values)?;
        let mut conn = self.pool.acquire().await?;
        let result = prepared.execute(&mut *conn).await?;

        Ok(result.rows_affected())
    }
}

/// SQL text and the values for its `$n` placeholders, in order.
#[derive(Clone, Debug, PartialEq)]
struct Statement {
    sql: String,
    values: Vec<Value>,
}

fn select_statement(
    schema: &TableSchema,
    filter: &Filter,
    query: &Query,
) -> StoreResult<Statement> {
    let compiled = filter.compile(1)?;
    let mut sql = format!(
        "SELECT * FROM {} WHERE {}",
        quote_identifier(schema.name()),
        compiled.predicate
    );
    if let Some(field) = &query.order_by {
        sql.push_str(&format!(" ORDER BY {}", quote_identifier(field)));
        if query.descending {
            sql.push_str(" DESC");
        }
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(Statement {
        sql,
        values: compiled.values,
    })
}

fn insert_statement(schema: &TableSchema, record: &Record, returning_id: bool) -> Statement {
    let table = quote_identifier(schema.name());
    let mut sql = if record.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        let mut columns = Vec::with_capacity(record.len());
        let mut slots = Vec::with_capacity(record.len());
        let mut next = 1;
        for (field, value) in record.iter() {
            columns.push(quote_identifier(field));
            slots.push(slot(value, &mut next));
        }
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            slots.join(", ")
        )
    };
    if returning_id {
        sql.push_str(&format!(" RETURNING {}", quote_identifier(ID_FIELD)));
    }

    Statement {
        sql,
        values: non_null(record),
    }
}

fn update_statement(
    schema: &TableSchema,
    filter: Option<&Filter>,
    changes: &Record,
) -> StoreResult<Statement> {
    let mut next = 1;
    let assignments: Vec<String> = changes
        .iter()
        .map(|(field, value)| format!("{} = {}", quote_identifier(field), slot(value, &mut next)))
        .collect();
    let mut values = non_null(changes);

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(schema.name()),
        assignments.join(", ")
    );
    if let Some(filter) = filter {
        let compiled = filter.compile(next)?;
        sql.push_str(&format!(" WHERE {}", compiled.predicate));
        values.extend(compiled.values);
    }

    Ok(Statement { sql, values })
}

fn delete_statement(schema: &TableSchema, filter: Option<&Filter>) -> StoreResult<Statement> {
    let mut sql = format!("DELETE FROM {}", quote_identifier(schema.name()));
    let mut values = Vec::new();
    if let Some(filter) = filter {
        let compiled = filter.compile(1)?;
        sql.push_str(&format!(" WHERE {}", compiled.predicate));
        values = compiled.values;
    }

    Ok(Statement { sql, values })
}

/// NULL is written as a keyword so it never needs a typed parameter.
fn slot(value: &Value, next: &mut usize) -> String {
    if value.is_null() {
        "NULL".to_owned()
    } else {
        let slot = format!("${next}");
        *next += 1;
        slot
    }
}

fn non_null(record: &Record) -> Vec<Value> {
    record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(_, value)| value.clone())
        .collect()
}

fn bind_all<'q>(mut statement: PgQuery<'q>, values: &[Value]) -> StoreResult<PgQuery<'q>> {
    for value in values {
        statement = match value.clone() {
            Value::Null => statement.bind(Option::<i64>::None),
            Value::Bool(value) => statement.bind(value),
            Value::Int(value) => statement.bind(value),
            Value::Float(value) => statement.bind(value),
            Value::Text(value) => statement.bind(value),
            Value::Timestamp(value) => statement.bind(value),
            Value::List(_) => {
                return Err(StoreError::Usage(
                    "list values can only be used with `__in`".to_owned(),
                ));
            }
        };
    }
    Ok(statement)
}

fn decode_row(row: &PgRow) -> StoreResult<Record> {
    let mut record = Record::new();

    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name();

        if row.try_get_raw(index)?.is_null() {
            record.insert(name, Value::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "BOOL" => Value::Bool(row.try_get(index)?),
            "INT2" => Value::Int(row.try_get::<i16, _>(index)?.into()),
            "INT4" => Value::Int(row.try_get::<i32, _>(index)?.into()),
            "INT8" => Value::Int(row.try_get(index)?),
            "FLOAT4" => Value::Float(row.try_get::<f32, _>(index)?.into()),
            "FLOAT8" => Value::Float(row.try_get(index)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(index)?),
            "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
            "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc()),
            other => {
                return Err(StoreError::UnsupportedColumn {
                    column: name.to_owned(),
                    type_name: other.to_owned(),
                });
            }
        };
        record.insert(name, value);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::schema::{Field, FieldKind};

    fn infraction() -> TableSchema {
        TableSchema::new(
            "infraction",
            [
                Field::new("guild_id", FieldKind::BigInteger).not_null(),
                Field::new("member_id", FieldKind::BigInteger).not_null(),
                Field::new("reason", FieldKind::Text),
                Field::new("expiry_date", FieldKind::Timestamp),
                Field::new("completed", FieldKind::Boolean).default_value(false),
            ],
        )
    }

    #[test]
    fn selects_chain_order_and_limit_after_the_predicate() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let filter = Filter::new()
            .with("guild_id", 1_i64)
            .with("expiry_date", Value::Null)
            .with("expiry_date__gt", now);
        let query = Query::new().order_by_desc("id").limit(1);

        let statement = select_statement(&infraction(), &filter, &query).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT * FROM \"infraction\" WHERE \"guild_id\" = $1 AND \
             (\"expiry_date\" IS NULL OR \"expiry_date\" > $2) ORDER BY \"id\" DESC LIMIT 1"
        );
        assert_eq!(statement.values, vec![Value::Int(1), Value::Timestamp(now)]);
    }

    #[test]
    fn ascending_order_has_no_direction_keyword() {
        let filter = Filter::new().with("completed", false);
        let query = Query::new().order_by("id");
        let statement = select_statement(&infraction(), &filter, &query).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT * FROM \"infraction\" WHERE \"completed\" = $1 ORDER BY \"id\""
        );
    }

    #[test]
    fn inserts_list_columns_by_name_and_skip_null_placeholders() {
        let record = Record::new()
            .with("guild_id", 1_i64)
            .with("reason", Value::Null)
            .with("member_id", 2_i64);

        let statement = insert_statement(&infraction(), &record, true);

        assert_eq!(
            statement.sql,
            "INSERT INTO \"infraction\" (\"guild_id\", \"member_id\", \"reason\") \
             VALUES ($1, $2, NULL) RETURNING \"id\""
        );
        assert_eq!(statement.values, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn empty_inserts_use_default_values() {
        let statement = insert_statement(&infraction(), &Record::new(), false);

        assert_eq!(statement.sql, "INSERT INTO \"infraction\" DEFAULT VALUES");
        assert!(statement.values.is_empty());
    }

    #[test]
    fn update_predicates_continue_after_the_assignments() {
        let changes = Record::new()
            .with("completed", true)
            .with("reason", Value::Null);
        let filter = Filter::new().with("id", 7_i64);

        let statement = update_statement(&infraction(), Some(&filter), &changes).unwrap();

        assert_eq!(
            statement.sql,
            "UPDATE \"infraction\" SET \"completed\" = $1, \"reason\" = NULL WHERE \"id\" = $2"
        );
        assert_eq!(statement.values, vec![Value::Bool(true), Value::Int(7)]);
    }

    #[test]
    fn unscoped_updates_and_deletes_have_no_where_clause() {
        let changes = Record::new().with("completed", true);

        let update = update_statement(&infraction(), None, &changes).unwrap();
        assert_eq!(update.sql, "UPDATE \"infraction\" SET \"completed\" = $1");

        let delete = delete_statement(&infraction(), None).unwrap();
        assert_eq!(delete.sql, "DELETE FROM \"infraction\"");
        assert!(delete.values.is_empty());
    }

    #[test]
    fn deletes_expand_in_lists() {
        let filter = Filter::new().with("id__in", Value::list([3_i64, 4, 5]));

        let statement = delete_statement(&infraction(), Some(&filter)).unwrap();

        assert_eq!(
            statement.sql,
            "DELETE FROM \"infraction\" WHERE \"id\" IN ($1, $2, $3)"
        );
        assert_eq!(
            statement.values,
            vec![Value::Int(3), Value::Int(4), Value::Int(5)]
        );
    }

    #[test]
    fn invalid_filters_never_become_sql() {
        let filter = Filter::new().with("id; DROP TABLE infraction", 1_i64);

        assert!(select_statement(&infraction(), &filter, &Query::new()).is_err());
        assert!(delete_statement(&infraction(), Some(&filter)).is_err());
    }

    #[test]
    fn list_values_cannot_be_bound_directly() {
        let bound = bind_all(sqlx::query("SELECT 1"), &[Value::list([1_i64, 2])]);

        assert!(matches!(bound, Err(StoreError::Usage(_))));
    }
}
