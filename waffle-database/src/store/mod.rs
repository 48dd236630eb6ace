//! Generic record store over named tables.
//!
//! The store is stateless between calls: every operation takes its own
//! connection from the pool and gives it back before returning.

mod memory;
mod postgres;

use sqlx::PgPool;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::schema::{Table, TableSchema};
use crate::value::Record;

use memory::MemoryStore;
use postgres::PgStore;

/// Target of an update or delete.
#[derive(Clone, Debug, PartialEq)]
pub enum Scope {
    /// Rows matching a non-empty filter.
    Matching(Filter),
    /// Every row in the table.
    AllRows,
}

impl Scope {
    fn filter(&self) -> StoreResult<Option<&Filter>> {
        match self {
            Scope::Matching(filter) if filter.is_empty() => Err(StoreError::Usage(
                "an empty filter does not select rows; use Scope::AllRows".to_owned(),
            )),
            Scope::Matching(filter) => Ok(Some(filter)),
            Scope::AllRows => Ok(None),
        }
    }
}

impl From<Filter> for Scope {
    fn from(filter: Filter) -> Self {
        Scope::Matching(filter)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub limit: Option<u32>,
    pub order_by: Option<String>,
    pub descending: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self.descending = false;
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self.descending = true;
        self
    }
}

#[derive(Clone, Debug)]
enum StoreBackend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

#[derive(Clone, Debug)]
pub struct RecordStore {
    backend: StoreBackend,
}

impl RecordStore {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: StoreBackend::Postgres(PgStore::new(pool)),
        }
    }

    /// Process-local store. Nothing survives a restart.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory(MemoryStore::default()),
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self.backend, StoreBackend::Postgres(_))
    }

    /// Create the table if it does not exist yet and hand back a bound handle.
    pub async fn ensure_table(&self, schema: TableSchema) -> StoreResult<Table> {
        schema.validate()?;

        match &self.backend {
            StoreBackend::Postgres(store) => store.ensure_table(&schema).await?,
            StoreBackend::Memory(store) => store.ensure_table(&schema),
        }
        debug!(table = schema.name(), "table ensured");

        Ok(Table::new(self.clone(), schema))
    }

    pub async fn filter(
        &self,
        schema: &TableSchema,
        filter: &Filter,
        query: Query,
    ) -> StoreResult<Vec<Record>> {
        if let Some(field) = &query.order_by {
            ensure_field(schema, field)?;
        }

        match &self.backend {
            StoreBackend::Postgres(store) => store.filter(schema, filter, &query).await,
            StoreBackend::Memory(store) => store.filter(schema, filter, &query),
        }
    }

    pub async fn insert(&self, schema: &TableSchema, record: &Record) -> StoreResult<()> {
        ensure_fields(schema, record)?;

        match &self.backend {
            StoreBackend::Postgres(store) => store.insert(schema, record, false).await.map(|_| ()),
            StoreBackend::Memory(store) => store.insert(schema, record).map(|_| ()),
        }
    }

    pub async fn insert_returning_id(
        &self,
        schema: &TableSchema,
        record: &Record,
    ) -> StoreResult<i64> {
        if !schema.has_identifier() {
            return Err(StoreError::Usage(format!(
                "table `{}` has no identifier column",
                schema.name()
            )));
        }
        ensure_fields(schema, record)?;

        let id = match &self.backend {
            StoreBackend::Postgres(store) => store.insert(schema, record, true).await?,
            StoreBackend::Memory(store) => store.insert(schema, record)?,
        };

        id.ok_or_else(|| StoreError::Usage(format!("insert into `{}` returned no id", schema.name())))
    }

    /// Apply `changes` to the rows in `scope`. Returns the number of rows touched.
    pub async fn update(
        &self,
        schema: &TableSchema,
        scope: &Scope,
        changes: &Record,
    ) -> StoreResult<u64> {
        if changes.is_empty() {
            return Err(StoreError::Usage("update without changes".to_owned()));
        }
        ensure_fields(schema, changes)?;

        let filter = scope.filter()?;
        if filter.is_none() {
            warn!(table = schema.name(), "updating every row");
        }

        match &self.backend {
            StoreBackend::Postgres(store) => store.update(schema, filter, changes).await,
            StoreBackend::Memory(store) => store.update(schema, filter, changes),
        }
    }

    pub async fn delete(&self, schema: &TableSchema, scope: &Scope) -> StoreResult<u64> {
        let filter = scope.filter()?;
        if filter.is_none() {
            warn!(table = schema.name(), "deleting every row");
        }

        match &self.backend {
            StoreBackend::Postgres(store) => store.delete(schema, filter).await,
            StoreBackend::Memory(store) => store.delete(schema, filter),
        }
    }
}

fn ensure_field(schema: &TableSchema, field: &str) -> StoreResult<()> {
    match schema.field(field) {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownField {
            table: schema.name().to_owned(),
            field: field.to_owned(),
        }),
    }
}

fn ensure_fields(schema: &TableSchema, record: &Record) -> StoreResult<()> {
    record
        .iter()
        .try_for_each(|(field, _)| ensure_field(schema, field))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::schema::{Field, FieldKind};
    use crate::value::Value;

    fn infraction_schema() -> TableSchema {
        TableSchema::new(
            "infraction",
            [
                Field::new("guild_id", FieldKind::BigInteger).not_null(),
                Field::new("member_id", FieldKind::BigInteger).not_null(),
                Field::new("type", FieldKind::Varchar(16)).not_null(),
                Field::new("expiry_date", FieldKind::Timestamp),
                Field::new("completed", FieldKind::Boolean).default_value(false),
            ],
        )
    }

    async fn seeded() -> Table {
        let table = RecordStore::memory()
            .ensure_table(infraction_schema())
            .await
            .unwrap();
        let now = Utc::now();

        for (member, expiry) in [
            (1_i64, None),
            (2, Some(now + Duration::hours(1))),
            (3, Some(now - Duration::hours(1))),
        ] {
            table
                .insert(
                    &Record::new()
                        .with("guild_id", 10_i64)
                        .with("member_id", member)
                        .with("type", "mute")
                        .with("expiry_date", expiry),
                )
                .await
                .unwrap();
        }
        table
    }

    #[tokio::test]
    async fn filter_returns_matching_rows_with_defaults() {
        let table = seeded().await;
        let rows = table
            .filter(
                &Filter::new()
                    .with("completed", false)
                    .with("expiry_date__ne", Value::Null),
                Query::new().order_by("member_id"),
            )
            .await
            .unwrap();

        let members: Vec<i64> = rows.iter().map(|row| row.get_i64("member_id").unwrap()).collect();
        assert_eq!(members, vec![2, 3]);
        assert!(!rows[0].get_bool("completed").unwrap());
    }

    #[tokio::test]
    async fn no_match_is_an_empty_vec() {
        let table = seeded().await;
        let rows = table
            .filter(&Filter::new().with("member_id", 99_i64), Query::new())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn insert_returning_id_is_increasing() {
        let table = seeded().await;
        let first = table
            .insert_returning_id(
                &Record::new()
                    .with("guild_id", 10_i64)
                    .with("member_id", 4_i64)
                    .with("type", "ban"),
            )
            .await
            .unwrap();
        let second = table
            .insert_returning_id(
                &Record::new()
                    .with("guild_id", 10_i64)
                    .with("member_id", 5_i64)
                    .with("type", "ban"),
            )
            .await
            .unwrap();

        assert_eq!(first, 4);
        assert!(second > first);
    }

    #[tokio::test]
    async fn empty_scope_filters_are_rejected() {
        let table = seeded().await;
        let err = table
            .delete(&Scope::Matching(Filter::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Usage(_)));

        let rows = table.filter(&Filter::new(), Query::new()).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn all_rows_must_be_explicit() {
        let table = seeded().await;
        let touched = table
            .update(&Scope::AllRows, &Record::new().with("completed", true))
            .await
            .unwrap();
        assert_eq!(touched, 3);

        let deleted = table.delete(&Scope::AllRows).await.unwrap();
        assert_eq!(deleted, 3);
    }

    #[tokio::test]
    async fn update_targets_only_the_scope() {
        let table = seeded().await;
        let touched = table
            .update(
                &Filter::new().with("member_id", 2_i64).into(),
                &Record::new().with("completed", true),
            )
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let open = table
            .filter(&Filter::new().with("completed", false), Query::new())
            .await
            .unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn order_and_limit_pick_the_latest() {
        let table = seeded().await;
        let latest = table
            .filter(&Filter::new().with("guild_id", 10_i64), Query::new().order_by_desc("id").limit(1))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].get_i64("member_id").unwrap(), 3);
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let table = seeded().await;
        let err = table
            .insert(&Record::new().with("nope", 1_i64))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn identifierless_tables_cannot_return_ids() {
        let table = RecordStore::memory()
            .ensure_table(
                TableSchema::new("pairs", [Field::new("k", FieldKind::Text)]).without_identifier(),
            )
            .await
            .unwrap();
        let err = table
            .insert_returning_id(&Record::new().with("k", "v"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Usage(_)));
    }
}
