use std::sync::Arc;

use crate::error::StoreResult;
use crate::filter::{Filter, quote_identifier, validate_identifier};
use crate::store::{Query, RecordStore, Scope};
use crate::value::{Record, Value};

pub const ID_FIELD: &str = "id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Store-assigned auto-incrementing primary key.
    Identifier,
    Boolean,
    SmallInteger,
    Integer,
    BigInteger,
    Real,
    Text,
    Varchar(u16),
    Timestamp,
}

impl FieldKind {
    fn sql_type(self) -> String {
        match self {
            FieldKind::Identifier => "BIGSERIAL PRIMARY KEY".to_owned(),
            FieldKind::Boolean => "BOOLEAN".to_owned(),
            FieldKind::SmallInteger => "SMALLINT".to_owned(),
            FieldKind::Integer => "INTEGER".to_owned(),
            FieldKind::BigInteger => "BIGINT".to_owned(),
            FieldKind::Real => "DOUBLE PRECISION".to_owned(),
            FieldKind::Text => "TEXT".to_owned(),
            FieldKind::Varchar(length) => format!("VARCHAR({length})"),
            FieldKind::Timestamp => "TIMESTAMPTZ".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub default: Option<Value>,
    pub not_null: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            not_null: false,
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    fn column_definition(&self) -> String {
        let mut definition = format!("{} {}", quote_identifier(&self.name), self.kind.sql_type());
        if let Some(default) = &self.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default.to_sql_literal());
        }
        if self.not_null && self.kind != FieldKind::Identifier {
            definition.push_str(" NOT NULL");
        }
        definition
    }
}

/// Name and column list of a table managed by the record store.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    name: String,
    fields: Vec<Field>,
}

impl TableSchema {
    /// Declare a table. A `BIGSERIAL` `id` column is prepended.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut all = vec![Field::new(ID_FIELD, FieldKind::Identifier)];
        all.extend(fields);
        Self {
            name: name.into(),
            fields: all,
        }
    }

    /// Drop the store-managed identifier column.
    pub fn without_identifier(mut self) -> Self {
        self.fields.retain(|field| field.kind != FieldKind::Identifier);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_identifier(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.kind == FieldKind::Identifier)
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_identifier(&self.name)?;
        for field in &self.fields {
            validate_identifier(&field.name)?;
        }
        Ok(())
    }

    pub fn create_statement(&self) -> String {
        let columns: Vec<String> = self.fields.iter().map(Field::column_definition).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            columns.join(", ")
        )
    }
}

/// A table that has been ensured, bound to the store that holds it.
#[derive(Clone, Debug)]
pub struct Table {
    store: RecordStore,
    schema: Arc<TableSchema>,
}

impl Table {
    pub(crate) fn new(store: RecordStore, schema: TableSchema) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub async fn filter(&self, filter: &Filter, query: Query) -> StoreResult<Vec<Record>> {
        self.store.filter(&self.schema, filter, query).await
    }

    pub async fn insert(&self, record: &Record) -> StoreResult<()> {
        self.store.insert(&self.schema, record).await
    }

    pub async fn insert_returning_id(&self, record: &Record) -> StoreResult<i64> {
        self.store.insert_returning_id(&self.schema, record).await
    }

    pub async fn update(&self, scope: &Scope, changes: &Record) -> StoreResult<u64> {
        self.store.update(&self.schema, scope, changes).await
    }

    pub async fn delete(&self, scope: &Scope) -> StoreResult<u64> {
        self.store.delete(&self.schema, scope).await
    }
}
