//! In-memory tabular data.
//!
//! A [`Frame`] is the unit of data moved between pipeline stages: extract
//! produces one per source file, load writes one per destination table, and
//! every catalog entry returns one. Cells are dynamically typed — the source
//! files carry no schema, so types are whatever inference finds.

use crate::error::{EltError, EltResult};

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;

/// Dynamic scalar value held in a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Infer a cell from one raw CSV field.
    ///
    /// Empty fields become `Null`; integers and floats are recognized,
    /// everything else stays text. Timestamps stay text here — they are
    /// parsed lazily where a query needs them.
    pub fn infer(field: &str) -> Cell {
        if field.is_empty() {
            return Cell::Null;
        }
        if let Ok(n) = field.parse::<i64>() {
            return Cell::Int(n);
        }
        if let Ok(f) = field.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(field.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view, for aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(n) => Some(*n as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Calendar-date view, truncating any time-of-day component.
    ///
    /// Text cells are parsed with the formats the dataset and the holiday
    /// feed actually use.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Text(s) => parse_datetime(s).map(|dt| dt.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Date(d) => d.and_hms_opt(0, 0, 0),
            Cell::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Key form used for joins and grouping. `None` for null cells, which
    /// drops the row under inner-join semantics.
    pub fn join_key(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            other => Some(other.to_json().to_string()),
        }
    }

    /// JSON view, used by the renderer and the CLI output formatter.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Int(n) => serde_json::Value::Number((*n).into()),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Cell::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// An ordered set of named columns and their rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Read a whole CSV file, inferring cell types per field.
    pub fn from_csv_path(path: &Path) -> EltResult<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut frame = Frame::new(columns);
        for record in reader.records() {
            let record = record?;
            frame.rows.push(record.iter().map(Cell::infer).collect());
        }
        Ok(frame)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column index, or a `MissingColumn` error naming `table`.
    pub fn require_column(&self, table: &str, name: &str) -> EltResult<usize> {
        self.column_index(name)
            .ok_or_else(|| EltError::missing_column(table, name))
    }

    /// Cell at (row, column name), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// One row as a JSON object, keyed by column name.
    pub fn row_object(&self, row: &[Cell]) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, cell) in self.columns.iter().zip(row) {
            map.insert(name.clone(), cell.to_json());
        }
        serde_json::Value::Object(map)
    }

    /// All rows as JSON objects, in row order.
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.rows.iter().map(|r| self.row_object(r)).collect()
    }

    /// Inner-join `self` to `other` on equal key columns.
    ///
    /// Output columns are `self`'s columns followed by `other`'s, minus the
    /// right key column and minus any right column whose name the left side
    /// already carries. Rows with a null key on either side are dropped.
    pub fn inner_join(&self, other: &Frame, left_key: &str, right_key: &str) -> EltResult<Frame> {
        let left_idx = self.require_column("left", left_key)?;
        let right_idx = other.require_column("right", right_key)?;

        // Right columns kept in the output, by index.
        let kept_right: Vec<usize> = other
            .columns
            .iter()
            .enumerate()
            .filter(|(i, name)| *i != right_idx && self.column_index(name).is_none())
            .map(|(i, _)| i)
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(kept_right.iter().map(|&i| other.columns[i].clone()));
        let mut out = Frame::new(columns);

        // Hash the right side by key.
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in other.rows.iter().enumerate() {
            if let Some(key) = row[right_idx].join_key() {
                index.entry(key).or_default().push(i);
            }
        }

        for row in &self.rows {
            let Some(key) = row[left_idx].join_key() else {
                continue;
            };
            let Some(matches) = index.get(&key) else {
                continue;
            };
            for &m in matches {
                let mut joined = row.clone();
                let right_row = &other.rows[m];
                joined.extend(kept_right.iter().map(|&i| right_row[i].clone()));
                out.rows.push(joined);
            }
        }
        Ok(out)
    }

    /// Group by `key`, summing each column in `sums` as a float.
    ///
    /// Null values do not contribute to a sum. Output rows are ordered by
    /// key; output columns are the key followed by the summed columns.
    pub fn group_sum(&self, key: &str, sums: &[&str]) -> EltResult<Frame> {
        let key_idx = self.require_column("group", key)?;
        let sum_idx: Vec<usize> = sums
            .iter()
            .map(|s| self.require_column("group", s))
            .collect::<EltResult<_>>()?;

        let mut groups: std::collections::BTreeMap<String, (Cell, Vec<f64>)> =
            std::collections::BTreeMap::new();
        for row in &self.rows {
            let Some(group_key) = row[key_idx].join_key() else {
                continue;
            };
            let entry = groups
                .entry(group_key)
                .or_insert_with(|| (row[key_idx].clone(), vec![0.0; sum_idx.len()]));
            for (slot, &idx) in entry.1.iter_mut().zip(&sum_idx) {
                if let Some(v) = row[idx].as_f64() {
                    *slot += v;
                }
            }
        }

        let mut columns = vec![key.to_string()];
        columns.extend(sums.iter().map(|s| s.to_string()));
        let mut out = Frame::new(columns);
        for (_, (key_cell, totals)) in groups {
            let mut row = vec![key_cell];
            row.extend(totals.into_iter().map(Cell::Float));
            out.rows.push(row);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(columns: &[&str], rows: Vec<Vec<Cell>>) -> Frame {
        let mut f = Frame::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            f.push_row(row);
        }
        f
    }

    #[test]
    fn test_cell_inference() {
        assert_eq!(Cell::infer(""), Cell::Null);
        assert_eq!(Cell::infer("42"), Cell::Int(42));
        assert_eq!(Cell::infer("19.9"), Cell::Float(19.9));
        assert_eq!(Cell::infer("delivered"), Cell::Text("delivered".into()));
    }

    #[test]
    fn test_text_cell_date_truncation() {
        let cell = Cell::Text("2017-11-24 16:07:10".into());
        assert_eq!(
            cell.as_date(),
            NaiveDate::from_ymd_opt(2017, 11, 24)
        );
    }

    #[test]
    fn test_inner_join_drops_null_keys() {
        let left = frame(
            &["order_id", "freight_value"],
            vec![
                vec![Cell::Text("a".into()), Cell::Float(6.0)],
                vec![Cell::Null, Cell::Float(9.9)],
            ],
        );
        let right = frame(
            &["order_id", "order_status"],
            vec![vec![Cell::Text("a".into()), Cell::Text("delivered".into())]],
        );
        let joined = left
            .inner_join(&right, "order_id", "order_id")
            .expect("join failed");
        assert_eq!(joined.len(), 1);
        assert_eq!(
            joined.columns(),
            &["order_id", "freight_value", "order_status"]
        );
    }

    #[test]
    fn test_group_sum() {
        let f = frame(
            &["order_id", "freight_value"],
            vec![
                vec![Cell::Text("a".into()), Cell::Float(6.0)],
                vec![Cell::Text("a".into()), Cell::Float(4.0)],
                vec![Cell::Text("b".into()), Cell::Float(5.0)],
            ],
        );
        let grouped = f.group_sum("order_id", &["freight_value"]).expect("group failed");
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.cell(0, "freight_value"), Some(&Cell::Float(10.0)));
        assert_eq!(grouped.cell(1, "freight_value"), Some(&Cell::Float(5.0)));
    }

    #[test]
    fn test_from_csv_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orders.csv");
        std::fs::write(&path, "order_id,total\na,10.5\nb,\n").expect("write csv");

        let f = Frame::from_csv_path(&path).expect("read csv");
        assert_eq!(f.columns(), &["order_id", "total"]);
        assert_eq!(f.len(), 2);
        assert_eq!(f.cell(0, "total"), Some(&Cell::Float(10.5)));
        assert_eq!(f.cell(1, "total"), Some(&Cell::Null));
    }
}
