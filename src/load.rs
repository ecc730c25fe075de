//! Load stage: destructive per-table replace into the store.
//!
//! Each table is replaced inside a single transaction — drop, recreate from
//! the frame's inferred column types, insert every row, commit — so a failed
//! load rolls back to the table's previous contents instead of leaving it
//! empty or partially written. Failures are isolated per table: one bad
//! table does not stop the rest of the batch.

use crate::error::EltResult;
use crate::extract::Dataset;
use crate::frame::{Cell, Frame};
use crate::store::{bind_cell, Store};

/// Outcome of one load batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Tables replaced, with their inserted row counts.
    pub loaded: Vec<(String, u64)>,
    /// Tables that failed, with the error text.
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Replace every table in the dataset, in dataset order.
pub async fn load(dataset: &Dataset, store: &Store) -> LoadReport {
    let mut report = LoadReport::default();
    for (table, frame) in dataset {
        match replace_table(store, table, frame).await {
            Ok(count) => report.loaded.push((table.clone(), count)),
            Err(e) => report.failed.push((table.clone(), e.to_string())),
        }
    }
    report
}

/// Atomically replace one table with the frame's contents.
pub async fn replace_table(store: &Store, table: &str, frame: &Frame) -> EltResult<u64> {
    let mut tx = store.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&create_table_sql(table, frame))
        .execute(&mut *tx)
        .await?;

    let insert_sql = insert_sql(table, frame);
    let mut inserted = 0u64;
    for row in frame.rows() {
        let mut query = sqlx::query(&insert_sql);
        for cell in row {
            query = bind_cell(query, cell);
        }
        query.execute(&mut *tx).await?;
        inserted += 1;
    }

    tx.commit().await?;
    Ok(inserted)
}

fn create_table_sql(table: &str, frame: &Frame) -> String {
    let columns: Vec<String> = frame
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| format!("\"{name}\" {}", column_sql_type(frame, i)))
        .collect();
    format!("CREATE TABLE \"{table}\" ({})", columns.join(", "))
}

fn insert_sql(table: &str, frame: &Frame) -> String {
    let placeholders = vec!["?"; frame.columns().len()].join(", ");
    format!("INSERT INTO \"{table}\" VALUES ({placeholders})")
}

/// Declared type for one column: the variant of its first non-null cell,
/// falling back to TEXT for all-null columns.
fn column_sql_type(frame: &Frame, column: usize) -> &'static str {
    for row in frame.rows() {
        match &row[column] {
            Cell::Null => continue,
            Cell::Bool(_) => return "BOOLEAN",
            Cell::Int(_) => return "INTEGER",
            Cell::Float(_) => return "REAL",
            Cell::Text(_) => return "TEXT",
            Cell::Date(_) => return "DATE",
            Cell::DateTime(_) => return "DATETIME",
        }
    }
    "TEXT"
}
