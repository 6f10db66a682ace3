// file: src/loader/sql.rs
// description: SQLite reader turning table schemas and rows into documents
// reference: https://docs.rs/rusqlite

use crate::error::{RagError, Result};
use crate::models::{Document, Metadata, SourceKind};
use crate::utils::Validator;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

impl TableSummary {
    /// Natural-language description of the table, indexed next to its rows.
    pub fn describe(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.declared_type.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} ({})", c.name, c.declared_type)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Table {} has columns: {}. It contains {} rows.",
            self.name, columns, self.row_count
        )
    }
}

pub struct SqlDatabaseReader {
    path: PathBuf,
    connection: Connection,
    max_rows_per_table: usize,
}

impl SqlDatabaseReader {
    pub fn open(path: &Path, max_rows_per_table: usize) -> Result<Self> {
        Validator::validate_file_path(path)?;
        Validator::validate_sqlite_header(path)?;

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        debug!("Opened SQLite database {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            connection,
            max_rows_per_table,
        })
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.connection.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(names)
    }

    pub fn preview(&self) -> Result<Vec<TableSummary>> {
        self.table_names()?
            .iter()
            .map(|name| self.summarize(name))
            .collect()
    }

    /// Every user table: one schema document followed by one document per row.
    pub fn load_data(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for table in self.table_names()? {
            documents.extend(self.load_table(&table)?);
        }

        info!(
            "Loaded {} documents from {}",
            documents.len(),
            self.path.display()
        );
        Ok(documents)
    }

    pub fn load_table(&self, table: &str) -> Result<Vec<Document>> {
        if !self.table_names()?.iter().any(|name| name == table) {
            return Err(RagError::Validation(format!(
                "Table '{}' not found in {}",
                table,
                self.path.display()
            )));
        }

        let summary = self.summarize(table)?;
        let mut documents = vec![
            Document::new(SourceKind::Sql, summary.describe(), Metadata::new())
                .with_metadata("table", table),
        ];

        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_identifier(table));
        let mut stmt = self.connection.prepare(&sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let limit = i64::try_from(self.max_rows_per_table).unwrap_or(i64::MAX);
        let mut rows = stmt.query([limit])?;
        let mut ordinal = 0usize;

        while let Some(row) = rows.next()? {
            ordinal += 1;

            let mut fields = Vec::with_capacity(column_names.len());
            for (idx, column) in column_names.iter().enumerate() {
                fields.push(format!("{}: {}", column, render_value(row.get_ref(idx)?)));
            }

            documents.push(
                Document::new(SourceKind::Sql, fields.join(", "), Metadata::new())
                    .with_metadata("table", table)
                    .with_metadata("row", ordinal.to_string()),
            );
        }

        if (ordinal as u64) < summary.row_count {
            debug!(
                "Table {} truncated to {} of {} rows",
                table, ordinal, summary.row_count
            );
        }

        Ok(documents)
    }

    fn summarize(&self, table: &str) -> Result<TableSummary> {
        let quoted = quote_identifier(table);

        let mut stmt = self
            .connection
            .prepare(&format!("PRAGMA table_info({})", quoted))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let row_count: i64 = self.connection.query_row(
            &format!("SELECT COUNT(*) FROM {}", quoted),
            [],
            |row| row.get(0),
        )?;

        Ok(TableSummary {
            name: table.to_string(),
            columns,
            row_count: row_count.max(0) as u64,
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
