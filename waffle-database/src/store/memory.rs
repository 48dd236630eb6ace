use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, Predicate};
use crate::schema::{FieldKind, ID_FIELD, TableSchema};
use crate::store::Query;
use crate::value::{Record, Value};

#[derive(Debug)]
struct MemoryTable {
    rows: Vec<Record>,
    next_id: i64,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(super) struct MemoryStore {
    tables: Arc<DashMap<String, MemoryTable>>,
}

impl MemoryStore {
    pub(super) fn ensure_table(&self, schema: &TableSchema) {
        self.tables.entry(schema.name().to_owned()).or_default();
    }

    pub(super) fn filter(
        &self,
        schema: &TableSchema,
        filter: &Filter,
        query: &Query,
    ) -> StoreResult<Vec<Record>> {
        let predicate = filter.predicate()?;
        let table = self
            .tables
            .get(schema.name())
            .ok_or_else(|| unknown_table(schema))?;

        let mut rows: Vec<Record> = table
            .rows
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect();
        drop(table);

        if let Some(field) = &query.order_by {
            rows.sort_by(|a, b| {
                let left = a.get(field).unwrap_or(&Value::Null);
                let right = b.get(field).unwrap_or(&Value::Null);
                let ordering = left.sort_cmp(right);
                if query.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }

        Ok(rows)
    }

    /// Returns the assigned id when the table has one.
    pub(super) fn insert(&self, schema: &TableSchema, record: &Record) -> StoreResult<Option<i64>> {
        let mut table = self
            .tables
            .get_mut(schema.name())
            .ok_or_else(|| unknown_table(schema))?;

        let mut row = Record::new();
        for field in schema.fields() {
            let value = match (record.get(&field.name), &field.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => Value::Null,
            };
            if field.not_null && field.kind != FieldKind::Identifier && value.is_null() {
                return Err(StoreError::Usage(format!(
                    "`{}.{}` may not be null",
                    schema.name(),
                    field.name
                )));
            }
            row.insert(field.name.clone(), value);
        }

        let id = if schema.has_identifier() {
            let id = match row.get(ID_FIELD) {
                Some(Value::Int(explicit)) => *explicit,
                _ => table.next_id,
            };
            table.next_id = table.next_id.max(id + 1);
            row.insert(ID_FIELD, id);
            Some(id)
        } else {
            None
        };

        table.rows.push(row);
        Ok(id)
    }

    pub(super) fn update(
        &self,
        schema: &TableSchema,
        filter: Option<&Filter>,
        changes: &Record,
    ) -> StoreResult<u64> {
        let predicate = compile(filter)?;
        let mut table = self
            .tables
            .get_mut(schema.name())
            .ok_or_else(|| unknown_table(schema))?;

        let mut touched = 0;
        for row in table.rows.iter_mut() {
            if predicate.as_ref().is_none_or(|predicate| predicate.matches(row)) {
                for (field, value) in changes.iter() {
                    row.insert(field, value.clone());
                }
                touched += 1;
            }
        }

        Ok(touched)
    }

    pub(super) fn delete(&self, schema: &TableSchema, filter: Option<&Filter>) -> StoreResult<u64> {
        let predicate = compile(filter)?;
        let mut table = self
            .tables
            .get_mut(schema.name())
            .ok_or_else(|| unknown_table(schema))?;

        let before = table.rows.len();
        table
            .rows
            .retain(|row| predicate.as_ref().is_some_and(|predicate| !predicate.matches(row)));

        Ok((before - table.rows.len()) as u64)
    }
}

fn compile(filter: Option<&Filter>) -> StoreResult<Option<Predicate>> {
    Ok(filter.map(Filter::predicate).transpose()?)
}

fn unknown_table(schema: &TableSchema) -> StoreError {
    StoreError::UnknownTable(schema.name().to_owned())
}
