//! Transform stage: the fixed catalog of analytical queries.
//!
//! Nine named entries, run sequentially in a stable order against the loaded
//! store. Seven execute a `.sql` resource verbatim; two are computed
//! in-process where host-language joins read better than SQL. Entries never
//! mutate the store and are independent of one another.
//!
//! Failures are isolated per entry and aggregated into the report, matching
//! the loader's policy.

use crate::config::{PipelineConfig, PUBLIC_HOLIDAYS_TABLE};
use crate::error::{EltError, EltResult};
use crate::frame::{Cell, Frame};
use crate::store::Store;

use chrono::Datelike;
use std::collections::HashSet;
use std::path::Path;

/// The closed set of catalog entries, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryName {
    DeliveryDateDifference,
    GlobalAmmountOrderStatus,
    RevenueByMonthYear,
    RevenuePerState,
    Top10LeastRevenueCategories,
    Top10RevenueCategories,
    RealVsEstimatedDeliveredTime,
    OrdersPerDayAndHolidays2017,
    FreightValueWeightRelationship,
}

/// How a catalog entry executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Loads `{queries_dir}/{name}.sql` and runs it verbatim.
    Sql,
    /// Runs a typed in-process computation.
    Computed,
}

impl QueryName {
    pub const ALL: [QueryName; 9] = [
        QueryName::DeliveryDateDifference,
        QueryName::GlobalAmmountOrderStatus,
        QueryName::RevenueByMonthYear,
        QueryName::RevenuePerState,
        QueryName::Top10LeastRevenueCategories,
        QueryName::Top10RevenueCategories,
        QueryName::RealVsEstimatedDeliveredTime,
        QueryName::OrdersPerDayAndHolidays2017,
        QueryName::FreightValueWeightRelationship,
    ];

    /// The entry's catalog name, also its result key and `.sql` file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryName::DeliveryDateDifference => "delivery_date_difference",
            QueryName::GlobalAmmountOrderStatus => "global_ammount_order_status",
            QueryName::RevenueByMonthYear => "revenue_by_month_year",
            QueryName::RevenuePerState => "revenue_per_state",
            QueryName::Top10LeastRevenueCategories => "top_10_least_revenue_categories",
            QueryName::Top10RevenueCategories => "top_10_revenue_categories",
            QueryName::RealVsEstimatedDeliveredTime => "real_vs_estimated_delivered_time",
            QueryName::OrdersPerDayAndHolidays2017 => "orders_per_day_and_holidays_2017",
            QueryName::FreightValueWeightRelationship => "get_freight_value_weight_relationship",
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            QueryName::OrdersPerDayAndHolidays2017 | QueryName::FreightValueWeightRelationship => {
                QueryKind::Computed
            }
            _ => QueryKind::Sql,
        }
    }
}

impl std::fmt::Display for QueryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueryName {
    type Err = EltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| EltError::Config(format!("unknown query name '{s}'")))
    }
}

/// One named catalog result.
#[derive(Debug)]
pub struct QueryResult {
    pub name: QueryName,
    pub frame: Frame,
}

/// Outcome of one transform run.
#[derive(Debug, Default)]
pub struct TransformReport {
    /// Successful entries, in catalog order.
    pub results: Vec<QueryResult>,
    /// Failed entries with their error text, in catalog order.
    pub failed: Vec<(QueryName, String)>,
}

impl TransformReport {
    pub fn get(&self, name: QueryName) -> Option<&Frame> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.frame)
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read one entry's SQL text resource.
pub fn read_query(queries_dir: &Path, name: QueryName) -> EltResult<String> {
    let path = queries_dir.join(format!("{}.sql", name.as_str()));
    Ok(std::fs::read_to_string(path)?)
}

/// Run every catalog entry, isolating per-entry failures.
pub async fn run_queries(store: &Store, config: &PipelineConfig) -> TransformReport {
    let mut report = TransformReport::default();
    for name in QueryName::ALL {
        match run_query(store, config, name).await {
            Ok(frame) => report.results.push(QueryResult { name, frame }),
            Err(e) => report.failed.push((name, e.to_string())),
        }
    }
    report
}

/// Run one catalog entry.
pub async fn run_query(
    store: &Store,
    config: &PipelineConfig,
    name: QueryName,
) -> EltResult<Frame> {
    let result = match name {
        QueryName::FreightValueWeightRelationship => {
            freight_value_weight_relationship(store).await
        }
        QueryName::OrdersPerDayAndHolidays2017 => {
            orders_per_day_and_holidays(store, config.holiday_year).await
        }
        _ => match read_query(&config.queries_dir, name) {
            Ok(sql) => store.fetch_frame(&sql).await,
            Err(e) => Err(e),
        },
    };
    result.map_err(|e| EltError::query(name.as_str(), e))
}

/// Freight value vs product weight, per delivered order.
///
/// Inner-joins order items to orders and products on their natural keys,
/// keeps rows whose status is exactly `delivered`, and sums `freight_value`
/// and `product_weight_g` per order.
async fn freight_value_weight_relationship(store: &Store) -> EltResult<Frame> {
    let items = store.fetch_table("olist_order_items").await?;
    let orders = store.fetch_table("olist_orders").await?;
    let products = store.fetch_table("olist_products").await?;

    let joined = items
        .inner_join(&orders, "order_id", "order_id")?
        .inner_join(&products, "product_id", "product_id")?;

    let status_idx = joined.require_column("olist_orders", "order_status")?;
    let mut delivered = Frame::new(joined.columns().to_vec());
    for row in joined.rows() {
        if row[status_idx].as_str() == Some("delivered") {
            delivered.push_row(row.clone());
        }
    }

    delivered.group_sum("order_id", &["freight_value", "product_weight_g"])
}

/// Orders per purchase day for one year, flagged with public holidays.
///
/// Dates are compared at day granularity: any time-of-day component on a
/// holiday row is truncated before the lookup.
async fn orders_per_day_and_holidays(store: &Store, year: i32) -> EltResult<Frame> {
    let holidays = store.fetch_table(PUBLIC_HOLIDAYS_TABLE).await?;
    let date_idx = holidays.require_column(PUBLIC_HOLIDAYS_TABLE, "date")?;
    let holiday_dates: HashSet<chrono::NaiveDate> = holidays
        .rows()
        .iter()
        .filter_map(|row| row[date_idx].as_date())
        .collect();

    let orders = store.fetch_table("olist_orders").await?;
    let ts_idx = orders.require_column("olist_orders", "order_purchase_timestamp")?;

    let mut per_day: std::collections::BTreeMap<chrono::NaiveDate, i64> = Default::default();
    for row in orders.rows() {
        let Some(date) = row[ts_idx].as_date() else {
            continue;
        };
        if date.year() == year {
            *per_day.entry(date).or_insert(0) += 1;
        }
    }

    let mut out = Frame::new(vec![
        "order_count".to_string(),
        "date".to_string(),
        "holiday".to_string(),
    ]);
    for (date, count) in per_day {
        out.push_row(vec![
            Cell::Int(count),
            Cell::Date(date),
            Cell::Bool(holiday_dates.contains(&date)),
        ]);
    }
    Ok(out)
}
