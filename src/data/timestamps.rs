//! Order timestamp coercion.
//! Text timestamps become millisecond datetimes; anything unparsable becomes null.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::warn;

pub const ORDER_APPROVED_AT: &str = "order_approved_at";

pub const ORDER_TIMESTAMP_COLUMNS: [&str; 6] = [
    ORDER_APPROVED_AT,
    "order_delivered_carrier_date",
    "order_delivered_customer_date",
    "order_estimated_delivery_date",
    "order_purchase_timestamp",
    "shipping_limit_date",
];

pub const TIME_UNIT: TimeUnit = TimeUnit::Milliseconds;

// `%.f` also accepts a missing fraction.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse one timestamp; `None` for empty or unrecognised text.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn to_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Convert one text column to a datetime column.
pub fn coerce_column(column: &Column) -> PolarsResult<Column> {
    let text = column.cast(&DataType::String)?;
    let millis: Int64Chunked = text
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_timestamp).map(to_millis))
        .collect();
    let datetimes = millis
        .with_name(column.name().clone())
        .into_datetime(TIME_UNIT, None);
    Ok(Column::from(datetimes.into_series()))
}

/// Coerce every known timestamp column present in the orders table.
///
/// Missing columns are logged and skipped.
pub fn coerce_order_timestamps(orders: &DataFrame) -> PolarsResult<DataFrame> {
    let mut df = orders.clone();
    for name in ORDER_TIMESTAMP_COLUMNS {
        let Ok(column) = orders.column(name) else {
            warn!("Column {} not found in orders dataset", name);
            continue;
        };
        let coerced = coerce_column(column)?;
        df.with_column(coerced)?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_published_formats() {
        let full = parse_timestamp("2017-10-02 11:07:15").unwrap();
        assert_eq!(full.to_string(), "2017-10-02 11:07:15");

        let iso = parse_timestamp("2017-10-02T11:07:15").unwrap();
        assert_eq!(iso, full);

        let date = parse_timestamp("2017-10-02").unwrap();
        assert_eq!(date.to_string(), "2017-10-02 00:00:00");
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let ts = parse_timestamp("2017-10-02 11:07:15.123").unwrap();
        assert_eq!(ts.to_string(), "2017-10-02 11:07:15.123");
        assert_eq!(to_millis(ts) % 1000, 123);

        let iso = parse_timestamp("2017-10-02T11:07:15.5").unwrap();
        assert_eq!(iso.to_string(), "2017-10-02 11:07:15.500");
    }

    #[test]
    fn garbage_becomes_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2017-13-45 99:00:00"), None);
    }

    #[test]
    fn millis_round_trip_through_chrono() {
        let ts = parse_timestamp("2018-08-29 15:00:37").unwrap();
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
    }

    #[test]
    fn coerces_present_columns_and_nulls_bad_values() {
        let orders = df!(
            "order_id" => ["a", "b", "c"],
            ORDER_APPROVED_AT => [Some("2017-01-01 10:00:00"), Some("bogus"), None],
        )
        .unwrap();

        let coerced = coerce_order_timestamps(&orders).unwrap();
        let approved = coerced.column(ORDER_APPROVED_AT).unwrap();

        assert_eq!(approved.dtype(), &DataType::Datetime(TIME_UNIT, None));
        assert_eq!(approved.null_count(), 2);
        assert_eq!(coerced.width(), 2);
    }
}
