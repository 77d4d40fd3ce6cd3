//! SQL synthesis from [`Record`] column mappings.
//!
//! Statement text is built at most once per entity kind per [`StatementCache`]
//! and reused for every batch.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::models::{Column, EntityKind, Record, SqlValue};

/// The upsert statements for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub table: &'static str,
    /// `INSERT` binding every column in mapping order
    pub insert: String,
    /// `UPDATE` binding value columns, then key columns; `None` when the table
    /// has no value columns or no key columns
    pub update: Option<String>,
    columns: &'static [Column],
}

impl Statements {
    pub fn build(table: &'static str, columns: &'static [Column]) -> Self {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(table)
        );

        let values: Vec<&Column> = columns.iter().filter(|c| !c.is_key()).collect();
        let keys: Vec<&Column> = columns.iter().filter(|c| c.is_key()).collect();
        let update = (!values.is_empty() && !keys.is_empty()).then(|| {
            let set = values
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ${}", quote_ident(c.name), i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let condition = keys
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ${}", quote_ident(c.name), values.len() + i + 1))
                .collect::<Vec<_>>()
                .join(" AND ");
            format!("UPDATE {} SET {set} WHERE {condition}", quote_ident(table))
        });

        Self {
            table,
            insert,
            update,
            columns,
        }
    }

    pub fn for_record<T: Record>() -> Self {
        Self::build(T::KIND.table_name(), T::columns())
    }

    /// Reorder a record's insert values (mapping order) into update bind order.
    pub fn update_values(&self, values: Vec<SqlValue>) -> Vec<SqlValue> {
        let (keys, mut set): (Vec<_>, Vec<_>) = self
            .columns
            .iter()
            .zip(values)
            .partition(|(column, _)| column.is_key());
        set.extend(keys);
        set.into_iter().map(|(_, value)| value).collect()
    }
}

/// Memoized [`Statements`] per entity kind.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: DashMap<EntityKind, Arc<Statements>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Record>(&self) -> Arc<Statements> {
        if let Some(existing) = self.entries.get(&T::KIND) {
            return Arc::clone(existing.value());
        }

        let entry = self.entries.entry(T::KIND).or_insert_with(|| {
            let statements = Statements::for_record::<T>();
            info!(
                table = statements.table,
                insert = %statements.insert,
                update = statements.update.as_deref().unwrap_or("<none>"),
                "Registering statements"
            );
            Arc::new(statements)
        });
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Double-quote an identifier; `user` and `groups` are reserved or near-reserved in PostgreSQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
