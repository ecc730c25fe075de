//! Render stage: one declarative chart specification per query result.
//!
//! Each result frame becomes a Vega-Lite document written to
//! `{charts_dir}/{name}.vl.json`. The JSON is the artifact handed to the
//! external visualization facility; nothing is drawn here. Chart failures
//! are isolated per entry, like load and transform.

use crate::error::EltResult;
use crate::frame::Frame;
use crate::transform::{QueryName, TransformReport};

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Outcome of one render batch.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Charts written, with their paths.
    pub written: Vec<(QueryName, PathBuf)>,
    /// Charts that failed, with the error text.
    pub failed: Vec<(QueryName, String)>,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write one chart per transform result into `charts_dir`.
pub fn render_all(report: &TransformReport, charts_dir: &Path, year: i32) -> RenderReport {
    let mut out = RenderReport::default();
    for result in &report.results {
        match render_chart(result.name, &result.frame, charts_dir, year) {
            Ok(path) => out.written.push((result.name, path)),
            Err(e) => out.failed.push((result.name, e.to_string())),
        }
    }
    out
}

/// Build and write a single chart. Returns the written path.
pub fn render_chart(
    name: QueryName,
    frame: &Frame,
    charts_dir: &Path,
    year: i32,
) -> EltResult<PathBuf> {
    let spec = chart_spec(name, frame, year);
    std::fs::create_dir_all(charts_dir)?;
    let path = charts_dir.join(format!("{}.vl.json", name.as_str()));
    std::fs::write(&path, serde_json::to_string_pretty(&spec)?)?;
    Ok(path)
}

/// The Vega-Lite document for one named result.
pub fn chart_spec(name: QueryName, frame: &Frame, year: i32) -> Value {
    let values = frame.to_json_rows();
    match name {
        QueryName::RevenueByMonthYear => revenue_by_month_year(values, year),
        QueryName::RealVsEstimatedDeliveredTime => real_vs_estimated_delivered_time(values, year),
        QueryName::GlobalAmmountOrderStatus => pie(
            values,
            "Order Status Total",
            "Ammount",
            "order_status",
        ),
        QueryName::RevenuePerState => bar(
            values,
            "Revenue per State",
            "customer_state",
            "Revenue",
        ),
        QueryName::Top10LeastRevenueCategories => pie(
            values,
            "Top 10 Least Revenue Categories",
            "Revenue",
            "Category",
        ),
        QueryName::Top10RevenueCategories => bar(
            values,
            "Top 10 Revenue Categories",
            "Category",
            "Num_order",
        ),
        QueryName::DeliveryDateDifference => delivery_date_difference(values),
        QueryName::OrdersPerDayAndHolidays2017 => orders_per_day_with_holidays(values),
        QueryName::FreightValueWeightRelationship => freight_value_weight(values),
    }
}

fn revenue_by_month_year(values: Vec<Value>, year: i32) -> Value {
    let field = format!("Year{year}");
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": format!("Revenue by month in {year}"),
        "width": 720,
        "height": 360,
        "data": {"values": values},
        "encoding": {
            "x": {"field": "month", "type": "ordinal", "sort": null}
        },
        "layer": [
            {
                "mark": {"type": "bar", "opacity": 0.5},
                "encoding": {"y": {"field": field, "type": "quantitative", "title": "Revenue"}}
            },
            {
                "mark": {"type": "line", "point": true},
                "encoding": {"y": {"field": field, "type": "quantitative"}}
            }
        ]
    })
}

fn real_vs_estimated_delivered_time(values: Vec<Value>, year: i32) -> Value {
    let real = format!("Year{year}_real_time");
    let estimated = format!("Year{year}_estimated_time");
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": format!("Average days delivery time by month in {year}"),
        "width": 720,
        "height": 360,
        "data": {"values": values},
        "transform": [
            {"fold": [real, estimated], "as": ["series", "days"]}
        ],
        "mark": {"type": "line", "point": true},
        "encoding": {
            "x": {"field": "month", "type": "ordinal", "sort": null},
            "y": {"field": "days", "type": "quantitative", "title": "Average days delivery time"},
            "color": {"field": "series", "type": "nominal"}
        }
    })
}

fn pie(values: Vec<Value>, title: &str, theta: &str, color: &str) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": title,
        "data": {"values": values},
        "mark": {"type": "arc", "innerRadius": 50},
        "encoding": {
            "theta": {"field": theta, "type": "quantitative"},
            "color": {"field": color, "type": "nominal"}
        }
    })
}

fn bar(values: Vec<Value>, title: &str, x: &str, y: &str) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": title,
        "width": 720,
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": x, "type": "nominal", "sort": "-y"},
            "y": {"field": y, "type": "quantitative"}
        }
    })
}

fn delivery_date_difference(values: Vec<Value>) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": "Difference Between Delivery Estimate Date and Delivery Date",
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": "Delivery_Difference", "type": "quantitative"},
            "y": {"field": "State", "type": "nominal", "sort": "-x"}
        }
    })
}

fn freight_value_weight(values: Vec<Value>) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": "Freight Value vs Product Weight",
        "width": 600,
        "height": 450,
        "data": {"values": values},
        "mark": {"type": "point", "opacity": 0.7},
        "encoding": {
            "x": {"field": "product_weight_g", "type": "quantitative", "title": "Product Weight (g)"},
            "y": {"field": "freight_value", "type": "quantitative", "title": "Freight Value"}
        }
    })
}

fn orders_per_day_with_holidays(values: Vec<Value>) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": "Order Count per Day with Holidays",
        "width": 720,
        "height": 360,
        "data": {"values": values},
        "layer": [
            {
                "mark": {"type": "line", "color": "green"},
                "encoding": {
                    "x": {"field": "date", "type": "temporal"},
                    "y": {"field": "order_count", "type": "quantitative"}
                }
            },
            {
                "transform": [{"filter": "datum.holiday == true"}],
                "mark": {"type": "rule", "color": "blue", "strokeDash": [2, 2], "opacity": 0.7},
                "encoding": {
                    "x": {"field": "date", "type": "temporal"}
                }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Cell;
    use crate::transform::QueryResult;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn freight_frame() -> Frame {
        let mut f = Frame::new(vec![
            "order_id".into(),
            "freight_value".into(),
            "product_weight_g".into(),
        ]);
        f.push_row(vec![
            Cell::Text("A".into()),
            Cell::Float(10.0),
            Cell::Float(100.0),
        ]);
        f
    }

    #[test]
    fn test_scatter_spec_encodes_weight_against_freight() {
        let spec = chart_spec(QueryName::FreightValueWeightRelationship, &freight_frame(), 2017);
        assert_eq!(spec["mark"]["type"], "point");
        assert_eq!(spec["encoding"]["x"]["field"], "product_weight_g");
        assert_eq!(spec["encoding"]["y"]["field"], "freight_value");
        assert_eq!(spec["data"]["values"][0]["freight_value"], 10.0);
    }

    #[test]
    fn test_holiday_chart_has_rule_layer() {
        let mut f = Frame::new(vec!["order_count".into(), "date".into(), "holiday".into()]);
        f.push_row(vec![
            Cell::Int(2),
            Cell::Date(NaiveDate::from_ymd_opt(2017, 9, 7).expect("date")),
            Cell::Bool(true),
        ]);
        let spec = chart_spec(QueryName::OrdersPerDayAndHolidays2017, &f, 2017);
        assert_eq!(spec["layer"][1]["mark"]["type"], "rule");
        assert_eq!(spec["data"]["values"][0]["date"], "2017-09-07");
    }

    #[test]
    fn test_render_all_writes_one_file_per_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = TransformReport {
            results: vec![QueryResult {
                name: QueryName::FreightValueWeightRelationship,
                frame: freight_frame(),
            }],
            failed: Vec::new(),
        };

        let rendered = render_all(&report, dir.path(), 2017);
        assert!(rendered.is_complete());
        assert_eq!(rendered.written.len(), 1);
        let path = &rendered.written[0].1;
        assert!(path.ends_with("get_freight_value_weight_relationship.vl.json"));
        assert!(path.exists());
    }
}
