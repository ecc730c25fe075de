//! SQLite access for the pipeline.
//!
//! This module wraps an sqlx connection pool. The loader writes through it
//! with per-table transactions; the query catalog reads whole result sets
//! back as [`Frame`]s.

use crate::error::{EltError, EltResult};
use crate::frame::{Cell, Frame};

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, Transaction, TypeInfo, ValueRef};
use std::str::FromStr;

/// A connection to the file-backed relational store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to a SQLite database, creating the file when missing.
    ///
    /// URL formats: `sqlite://path/to/olist.db` or `sqlite::memory:`.
    ///
    /// The pool is capped at one connection: the pipeline is a single
    /// sequential writer, and in-memory databases must not be split across
    /// connections.
    pub async fn connect(url: &str) -> EltResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| EltError::Connection(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| EltError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// An in-memory store, used by tests.
    pub async fn in_memory() -> EltResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction (one table replace each, at load).
    pub async fn begin(&self) -> EltResult<Transaction<'_, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Execute a statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> EltResult<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Fetch a full result set as a frame.
    ///
    /// An empty result yields an empty frame with no columns — SQLite does
    /// not report column names for zero rows through this path. Use
    /// [`Store::fetch_table`] where column names must survive an empty
    /// table.
    pub async fn fetch_frame(&self, sql: &str) -> EltResult<Frame> {
        let rows: Vec<SqliteRow> = sqlx::query(sql).fetch_all(&self.pool).await?;

        let Some(first) = rows.first() else {
            return Ok(Frame::new(Vec::new()));
        };

        let columns: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut frame = Frame::new(columns);
        for row in &rows {
            let cells: Vec<Cell> = row
                .columns()
                .iter()
                .enumerate()
                .map(|(i, column)| decode_cell(row, i, column.type_info().name()))
                .collect();
            frame.push_row(cells);
        }
        Ok(frame)
    }

    /// Fetch an entire table, preserving its column order.
    ///
    /// Unlike [`Store::fetch_frame`], a zero-row table keeps its column
    /// names, recovered from the schema, so callers can still resolve
    /// columns on valid-but-empty tables.
    pub async fn fetch_table(&self, table: &str) -> EltResult<Frame> {
        let frame = self
            .fetch_frame(&format!("SELECT * FROM \"{table}\""))
            .await?;
        if frame.columns().is_empty() {
            return Ok(Frame::new(self.table_columns(table).await?));
        }
        Ok(frame)
    }

    /// Column names from the table's schema, in declaration order.
    async fn table_columns(&self, table: &str) -> EltResult<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("name")?))
            .collect()
    }

    /// Row count of a table.
    pub async fn table_row_count(&self, table: &str) -> EltResult<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

/// Decode one column of one row into a cell, driven by the declared type.
///
/// SQLite reports no declared type for expression columns (aggregates,
/// `strftime`, casts); those fall back to the value's runtime storage
/// class, which avoids truncating REAL sums through an integer probe.
fn decode_cell(row: &SqliteRow, i: usize, declared: &str) -> Cell {
    let type_name = if declared.is_empty() || declared == "NULL" {
        match row.try_get_raw(i) {
            Ok(value) if !value.is_null() => value.type_info().name().to_string(),
            _ => return Cell::Null,
        }
    } else {
        declared.to_string()
    };

    match type_name.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Int)
            .unwrap_or(Cell::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Float)
            .unwrap_or(Cell::Null),
        "BOOLEAN" | "BOOL" => row
            .try_get::<Option<bool>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Bool)
            .unwrap_or(Cell::Null),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Date)
            .unwrap_or(Cell::Null),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(i)
            .ok()
            .flatten()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Null),
        "TEXT" | "VARCHAR" | "CHAR" => row
            .try_get::<Option<String>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Text)
            .unwrap_or(Cell::Null),
        _ => row
            .try_get::<Option<String>, _>(i)
            .ok()
            .flatten()
            .map(Cell::Text)
            .unwrap_or(Cell::Null),
    }
}

/// Bind a cell as the next query parameter.
pub fn bind_cell<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    cell: &Cell,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match cell {
        Cell::Null => query.bind(None::<String>),
        Cell::Bool(b) => query.bind(*b),
        Cell::Int(n) => query.bind(*n),
        Cell::Float(f) => query.bind(*f),
        Cell::Text(s) => query.bind(s.clone()),
        Cell::Date(d) => query.bind(*d),
        Cell::DateTime(dt) => query.bind(*dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fetch_frame_decodes_declared_types() {
        let store = Store::in_memory().await.expect("connect");
        store
            .execute("CREATE TABLE t (id INTEGER, price REAL, label TEXT, day DATE)")
            .await
            .expect("create");
        store
            .execute("INSERT INTO t VALUES (1, 19.9, 'x', '2017-01-01'), (2, NULL, NULL, NULL)")
            .await
            .expect("insert");

        let frame = store.fetch_table("t").await.expect("fetch");
        assert_eq!(frame.columns(), &["id", "price", "label", "day"]);
        assert_eq!(frame.cell(0, "id"), Some(&Cell::Int(1)));
        assert_eq!(frame.cell(0, "price"), Some(&Cell::Float(19.9)));
        assert_eq!(
            frame.cell(0, "day"),
            Some(&Cell::Date(
                chrono::NaiveDate::from_ymd_opt(2017, 1, 1).expect("date")
            ))
        );
        assert_eq!(frame.cell(1, "price"), Some(&Cell::Null));
    }

    #[tokio::test]
    async fn test_expression_columns_keep_runtime_types() {
        let store = Store::in_memory().await.expect("connect");
        store
            .execute("CREATE TABLE t (price REAL)")
            .await
            .expect("create");
        store
            .execute("INSERT INTO t VALUES (30.5), (39.5)")
            .await
            .expect("insert");

        let frame = store
            .fetch_frame("SELECT SUM(price) AS total, COUNT(*) AS n FROM t")
            .await
            .expect("fetch");
        assert_eq!(frame.cell(0, "total"), Some(&Cell::Float(70.0)));
        assert_eq!(frame.cell(0, "n"), Some(&Cell::Int(2)));
    }

    #[tokio::test]
    async fn test_fetch_frame_empty_result() {
        let store = Store::in_memory().await.expect("connect");
        store
            .execute("CREATE TABLE empty_t (id INTEGER)")
            .await
            .expect("create");
        let frame = store
            .fetch_frame("SELECT * FROM empty_t")
            .await
            .expect("fetch");
        assert!(frame.is_empty());
    }

    #[tokio::test]
    async fn test_empty_table_keeps_column_names() {
        let store = Store::in_memory().await.expect("connect");
        store
            .execute("CREATE TABLE empty_t (id INTEGER, label TEXT, day DATE)")
            .await
            .expect("create");

        let frame = store.fetch_table("empty_t").await.expect("fetch");
        assert!(frame.is_empty());
        assert_eq!(frame.columns(), &["id", "label", "day"]);
        assert!(frame.column_index("label").is_some());
    }
}
