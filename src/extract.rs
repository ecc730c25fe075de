//! Extract stage: source CSV files plus the public-holiday feed.
//!
//! Produces the dataset handed to the loader — one frame per destination
//! table, in the mapping's order, with the holiday feed appended under a
//! synthetic `public_holidays` entry.

use crate::config::{PipelineConfig, PUBLIC_HOLIDAYS_TABLE};
use crate::error::{EltError, EltResult};
use crate::frame::{Cell, Frame};

use chrono::NaiveDate;

/// Extracted tables, keyed by destination table name, in load order.
pub type Dataset = Vec<(String, Frame)>;

/// Read every mapped CSV file and fetch the holiday feed.
///
/// Any failure aborts the whole batch: the caller receives the cause and no
/// partial dataset. The pipeline degrades that to an empty dataset with a
/// logged warning, matching replace-load semantics downstream.
pub async fn extract(config: &PipelineConfig) -> EltResult<Dataset> {
    let mut dataset = Dataset::new();

    for (csv_file, table_name) in crate::config::csv_table_mapping() {
        let path = config.dataset_dir.join(csv_file);
        let frame = Frame::from_csv_path(&path)?;
        dataset.push((table_name.to_string(), frame));
    }

    let client = reqwest::Client::new();
    let holidays =
        fetch_public_holidays(&client, &config.holidays_url, config.holiday_year).await?;
    dataset.push((PUBLIC_HOLIDAYS_TABLE.to_string(), holidays));

    Ok(dataset)
}

/// Fetch Brazilian public holidays for one year.
///
/// One GET to `{base_url}/{year}/BR`; a non-2xx status is fatal for the
/// call. The `types` and `counties` columns are dropped and `date` becomes a
/// calendar-date value.
pub async fn fetch_public_holidays(
    client: &reqwest::Client,
    base_url: &str,
    year: i32,
) -> EltResult<Frame> {
    let url = format!("{base_url}/{year}/BR");
    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(EltError::Feed {
            status: status.as_u16(),
            url,
        });
    }

    let payload: serde_json::Value = response.json().await?;
    holidays_from_json(&payload)
}

/// Columns the feed carries that the pipeline does not persist.
const DROPPED_FEED_COLUMNS: [&str; 2] = ["types", "counties"];

/// Build the holiday frame from the feed's JSON payload.
///
/// Factored out of the fetch so the shape handling is testable without a
/// network. Column order follows the first record's keys; records missing a
/// key yield null cells.
pub fn holidays_from_json(payload: &serde_json::Value) -> EltResult<Frame> {
    let records = payload
        .as_array()
        .ok_or_else(|| EltError::FeedPayload("expected a JSON array of holidays".into()))?;

    let Some(first) = records.first() else {
        return Ok(Frame::new(Vec::new()));
    };
    let first = first
        .as_object()
        .ok_or_else(|| EltError::FeedPayload("expected holiday records to be objects".into()))?;

    let columns: Vec<String> = first
        .keys()
        .filter(|k| !DROPPED_FEED_COLUMNS.contains(&k.as_str()))
        .cloned()
        .collect();

    let mut frame = Frame::new(columns.clone());
    for record in records {
        let record = record
            .as_object()
            .ok_or_else(|| EltError::FeedPayload("expected holiday records to be objects".into()))?;
        let row: Vec<Cell> = columns
            .iter()
            .map(|name| {
                let value = record.get(name).unwrap_or(&serde_json::Value::Null);
                if name == "date" {
                    holiday_date_cell(value)
                } else {
                    json_cell(value)
                }
            })
            .collect::<EltResult<_>>()?;
        frame.push_row(row);
    }
    Ok(frame)
}

fn holiday_date_cell(value: &serde_json::Value) -> EltResult<Cell> {
    let text = value
        .as_str()
        .ok_or_else(|| EltError::FeedPayload(format!("holiday date is not a string: {value}")))?;
    // Feed dates are ISO `YYYY-MM-DD`; any time component is truncated.
    let day_part = text.get(..10).unwrap_or(text);
    let date = NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .map_err(|e| EltError::FeedPayload(format!("bad holiday date '{text}': {e}")))?;
    Ok(Cell::Date(date))
}

fn json_cell(value: &serde_json::Value) -> EltResult<Cell> {
    Ok(match value {
        serde_json::Value::Null => Cell::Null,
        serde_json::Value::Bool(b) => Cell::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Int(i)
            } else {
                Cell::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Cell::Text(s.clone()),
        other => {
            return Err(EltError::FeedPayload(format!(
                "unexpected nested value in holiday record: {other}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED_SAMPLE: &str = r#"[
        {
            "date": "2017-01-01",
            "localName": "Confraternização Universal",
            "name": "New Year's Day",
            "countryCode": "BR",
            "fixed": true,
            "global": true,
            "counties": null,
            "launchYear": null,
            "types": ["Public"]
        },
        {
            "date": "2017-09-07",
            "localName": "Dia da Independência",
            "name": "Independence Day",
            "countryCode": "BR",
            "fixed": true,
            "global": true,
            "counties": null,
            "launchYear": null,
            "types": ["Public"]
        }
    ]"#;

    #[test]
    fn test_holidays_drop_types_and_counties() {
        let payload: serde_json::Value = serde_json::from_str(FEED_SAMPLE).expect("parse feed");
        let frame = holidays_from_json(&payload).expect("build frame");

        assert!(frame.column_index("types").is_none());
        assert!(frame.column_index("counties").is_none());
        // serde_json objects iterate keys in sorted order.
        assert_eq!(
            frame.columns(),
            &["countryCode", "date", "fixed", "global", "launchYear", "localName", "name"]
        );
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_holiday_date_is_a_date_value() {
        let payload: serde_json::Value = serde_json::from_str(FEED_SAMPLE).expect("parse feed");
        let frame = holidays_from_json(&payload).expect("build frame");
        assert_eq!(
            frame.cell(0, "date"),
            Some(&Cell::Date(
                NaiveDate::from_ymd_opt(2017, 1, 1).expect("date")
            ))
        );
    }

    #[test]
    fn test_holidays_reject_non_array_payload() {
        let payload = serde_json::json!({"error": "not found"});
        assert!(holidays_from_json(&payload).is_err());
    }

    #[test]
    fn test_empty_feed_is_an_empty_frame() {
        let payload = serde_json::json!([]);
        let frame = holidays_from_json(&payload).expect("build frame");
        assert!(frame.is_empty());
    }
}
