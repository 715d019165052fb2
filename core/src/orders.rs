//! The cumulative-spend exercise over `customer_activity` and `orders`.
//!
//! The learner writes one query that joins the two tables and produces a
//! running total of spend per customer, ordered by date. Unlike the task
//! fixtures there is a single pair of tables and the verdict carries a
//! diagnostic message instead of a pass count.

use crate::columnar::{FromRecordBatch, RecordBatchBuilder, RecordBatchExtractor, ToRecordBatch};
use crate::compare::shape;
use crate::config::SessionOptions;
use crate::session::GradingSession;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use taskgrade_common::{CommonError, Result, TableStore};
use tracing::{debug, info};

pub const ORDERS_TABLE: &str = "orders";
pub const CUSTOMER_ACTIVITY_TABLE: &str = "customer_activity";

const ORDER_YEAR: i32 = 2023;
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const VALUE_TOLERANCE: f64 = 1e-9;

/// Links a customer to one of their orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerActivity {
    pub customer_id: i64,
    pub order_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: i64,
    /// ISO `YYYY-MM-DD`, so string order is date order.
    pub date: String,
    pub amount_spent: f64,
}

/// One row of the expected answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeSpend {
    pub customer_id: i64,
    pub date: String,
    pub cumulative_total: f64,
}

impl ToRecordBatch for CustomerActivity {
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatchBuilder::new(Self::to_schema())
            .add_column(rows.iter().map(|r| r.customer_id).collect())
            .add_column(rows.iter().map(|r| r.order_id).collect())
            .build()
    }

    fn to_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("order_id", DataType::Int64, false),
        ]))
    }
}

impl FromRecordBatch for CustomerActivity {
    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let extractor = RecordBatchExtractor::new(batch);
        let customers: Vec<i64> = extractor.extract_named("customer_id")?;
        let orders: Vec<i64> = extractor.extract_named("order_id")?;

        Ok(customers
            .into_iter()
            .zip(orders)
            .map(|(customer_id, order_id)| Self {
                customer_id,
                order_id,
            })
            .collect())
    }
}

impl ToRecordBatch for Order {
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatchBuilder::new(Self::to_schema())
            .add_column(rows.iter().map(|r| r.order_id).collect())
            .add_column(rows.iter().map(|r| r.date.clone()).collect())
            .add_column(rows.iter().map(|r| r.amount_spent).collect())
            .build()
    }

    fn to_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("order_id", DataType::Int64, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("amount_spent", DataType::Float64, false),
        ]))
    }
}

impl FromRecordBatch for Order {
    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let extractor = RecordBatchExtractor::new(batch);
        let ids: Vec<i64> = extractor.extract_named("order_id")?;
        let dates: Vec<String> = extractor.extract_named("date")?;
        let amounts: Vec<f64> = extractor.extract_named("amount_spent")?;

        Ok(ids
            .into_iter()
            .zip(dates)
            .zip(amounts)
            .map(|((order_id, date), amount_spent)| Self {
                order_id,
                date,
                amount_spent,
            })
            .collect())
    }
}

impl ToRecordBatch for CumulativeSpend {
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatchBuilder::new(Self::to_schema())
            .add_column(rows.iter().map(|r| r.customer_id).collect())
            .add_column(rows.iter().map(|r| r.date.clone()).collect())
            .add_column(rows.iter().map(|r| r.cumulative_total).collect())
            .build()
    }

    fn to_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("cumulative_total", DataType::Float64, false),
        ]))
    }
}

/// Round to cents, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// ISO date of the zero-based `day` of the order year; wraps past the last day.
pub fn order_date(day: u32) -> String {
    let mut remaining = day % DAYS_IN_MONTH.iter().sum::<u32>();
    for (month, days) in DAYS_IN_MONTH.iter().enumerate() {
        if remaining < *days {
            return format!("{ORDER_YEAR}-{:02}-{:02}", month + 1, remaining + 1);
        }
        remaining -= days;
    }
    format!("{ORDER_YEAR}-12-31")
}

/// Sample `order_count` orders spread over `customer_count` customers.
///
/// Customer and order ids start at 1. Activity rows come out in order id
/// order; orders are dated anywhere in the order year.
pub fn generate_orders_fixture<R: Rng + ?Sized>(
    rng: &mut R,
    customer_count: usize,
    order_count: usize,
) -> (Vec<CustomerActivity>, Vec<Order>) {
    let customers: Vec<i64> = (1..=customer_count as i64).collect();
    let mut activity = Vec::with_capacity(order_count);
    let mut orders = Vec::with_capacity(order_count);

    for order_id in 1..=order_count as i64 {
        if let Some(&customer_id) = customers.choose(rng) {
            activity.push(CustomerActivity {
                customer_id,
                order_id,
            });
        }
        orders.push(Order {
            order_id,
            date: order_date(rng.random_range(0..365)),
            amount_spent: round2(rng.random_range(5.0..500.0)),
        });
    }
    (activity, orders)
}

/// Write a sampled `orders` / `customer_activity` pair into the store.
pub async fn seed_orders_fixture(
    store: &dyn TableStore,
    seed: u64,
    customer_count: usize,
    order_count: usize,
) -> Result<()> {
    if customer_count == 0 || order_count == 0 {
        return Err(CommonError::configuration_error(format!(
            "orders fixture needs at least one customer and one order, got {customer_count} and {order_count}"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (activity, orders) = generate_orders_fixture(&mut rng, customer_count, order_count);

    store
        .write_table(
            CUSTOMER_ACTIVITY_TABLE,
            &CustomerActivity::to_record_batch(&activity)?,
        )
        .await?;
    store
        .write_table(ORDERS_TABLE, &Order::to_record_batch(&orders)?)
        .await?;
    info!(seed, customer_count, order_count, "seeded orders fixture");
    Ok(())
}

/// Running spend per customer in date order.
///
/// Activity rows are joined to their order, stably sorted by date, and each
/// customer's `amount_spent` is summed in that order. Activity rows whose
/// order is missing are dropped, as an inner join would.
///
/// The total advances one row at a time (a `ROWS` frame). Two orders of one
/// customer on the same date get successive totals in activity-row order,
/// which is order-id order for generated fixtures. A window ordered by date
/// alone uses the default `RANGE` frame and gives both rows the same-day
/// total, which is judged incorrect.
pub fn cumulative_spend(activity: &[CustomerActivity], orders: &[Order]) -> Vec<CumulativeSpend> {
    let by_id: HashMap<i64, &Order> = orders.iter().map(|o| (o.order_id, o)).collect();

    let mut joined: Vec<(i64, &Order)> = activity
        .iter()
        .filter_map(|a| by_id.get(&a.order_id).map(|order| (a.customer_id, *order)))
        .collect();
    joined.sort_by(|a, b| a.1.date.cmp(&b.1.date));

    let mut totals: HashMap<i64, f64> = HashMap::new();
    joined
        .into_iter()
        .map(|(customer_id, order)| {
            let total = totals.entry(customer_id).or_insert(0.0);
            *total += order.amount_spent;
            CumulativeSpend {
                customer_id,
                date: order.date.clone(),
                cumulative_total: round2(*total),
            }
        })
        .collect()
}

/// Result of checking one cumulative-spend query.
#[derive(Debug, Clone, PartialEq)]
pub enum SpendVerdict {
    Correct,
    /// Shapes as `(rows, columns)`.
    ShapeMismatch {
        actual: (usize, usize),
        expected: (usize, usize),
    },
    /// Right shape, but the rows are not in date order.
    Unsorted,
    Incorrect,
}

impl SpendVerdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, SpendVerdict::Correct)
    }

    /// The lines shown to the learner.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SpendVerdict::Correct => vec!["✅ Correct!".to_string()],
            SpendVerdict::ShapeMismatch { actual, expected } => vec![
                "❌ incorrect".to_string(),
                format!(
                    "Your query produced a table with the shape {actual:?} but should have produced a table with the shape {expected:?}"
                ),
            ],
            SpendVerdict::Unsorted => vec![
                "❌ incorrect".to_string(),
                "Be sure to sort your data!".to_string(),
            ],
            SpendVerdict::Incorrect => vec!["❌ incorrect".to_string()],
        }
    }

    pub fn print(&self) {
        for line in self.messages() {
            println!("{line}");
        }
    }
}

impl fmt::Display for SpendVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join(" "))
    }
}

/// Candidate rows decoded by position, or `None` when a column cannot be
/// read as the expected type.
fn decode_by_position(batch: &RecordBatch) -> Option<Vec<CumulativeSpend>> {
    let extractor = RecordBatchExtractor::new(batch);
    let customers: Vec<i64> = extractor.extract_column(0).ok()?;
    let dates: Vec<String> = extractor.extract_column(1).ok()?;
    let totals: Vec<f64> = extractor.extract_column(2).ok()?;

    Some(
        customers
            .into_iter()
            .zip(dates)
            .zip(totals)
            .map(|((customer_id, date), total)| CumulativeSpend {
                customer_id,
                date,
                cumulative_total: round2(total),
            })
            .collect(),
    )
}

fn rows_match(actual: &[CumulativeSpend], expected: &[CumulativeSpend]) -> bool {
    actual.len() == expected.len()
        && actual.iter().zip(expected).all(|(a, e)| {
            a.customer_id == e.customer_id
                && a.date == e.date
                && (a.cumulative_total - e.cumulative_total).abs() < VALUE_TOLERANCE
        })
}

fn dates_sorted(batch: &RecordBatch) -> bool {
    let extractor = RecordBatchExtractor::new(batch);
    match extractor.extract_column::<String>(1) {
        Ok(dates) => dates.windows(2).all(|pair| pair[0] <= pair[1]),
        Err(_) => false,
    }
}

/// Judge an already executed candidate result against the expected rows.
pub fn judge_spend(candidate: &RecordBatch, expected: &[CumulativeSpend]) -> SpendVerdict {
    let expected_shape = (expected.len(), 3);
    if let Some(rows) = decode_by_position(candidate) {
        if shape(candidate) == expected_shape && rows_match(&rows, expected) {
            return SpendVerdict::Correct;
        }
    }

    if shape(candidate) != expected_shape {
        SpendVerdict::ShapeMismatch {
            actual: shape(candidate),
            expected: expected_shape,
        }
    } else if !dates_sorted(candidate) {
        SpendVerdict::Unsorted
    } else {
        SpendVerdict::Incorrect
    }
}

/// Run `query` against the stored `orders` pair and judge its result.
///
/// Store and query errors propagate; only a query that runs gets a verdict.
pub async fn check_cumulative_spend(
    store: &dyn TableStore,
    options: &SessionOptions,
    query: &str,
) -> Result<SpendVerdict> {
    let activity_batch = store.read_table(CUSTOMER_ACTIVITY_TABLE).await?;
    let orders_batch = store.read_table(ORDERS_TABLE).await?;
    let expected = cumulative_spend(
        &CustomerActivity::from_record_batch(&activity_batch)?,
        &Order::from_record_batch(&orders_batch)?,
    );

    let session = GradingSession::new(options);
    session.register_batch(CUSTOMER_ACTIVITY_TABLE, activity_batch)?;
    session.register_batch(ORDERS_TABLE, orders_batch)?;
    let candidate = session.execute_sql(query).await?;

    let verdict = judge_spend(&candidate, &expected);
    debug!(%verdict, rows = candidate.num_rows(), "checked cumulative spend query");
    Ok(verdict)
}
