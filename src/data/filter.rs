//! Date Filter Module
//! Restricts orders to an inclusive range on the approval timestamp.

use crate::data::timestamps::{from_millis, ORDER_APPROVED_AT, TIME_UNIT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Orders table has no '{0}' column")]
    MissingColumn(&'static str),
    #[error("Start {start} is after end {end}")]
    InvertedRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Inclusive timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Calendar dates, covering the whole of the end day.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self::new(start.and_time(NaiveTime::MIN), end.and_time(end_of_day))
    }

    /// Operator-chosen dates, each defaulting to the observed bound.
    ///
    /// A defaulted bound that would land on the wrong side of the chosen one
    /// collapses onto the chosen day, so a start past the data selects nothing
    /// instead of failing. Two chosen dates out of order are still rejected.
    pub fn select(
        observed: DateRange,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, FilterError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::from_dates(start, end),
            (Some(start), None) => {
                let day = Self::from_dates(start, start)?;
                Self::new(day.start, observed.end.max(day.end))
            }
            (None, Some(end)) => {
                let day = Self::from_dates(end, end)?;
                Self::new(observed.start.min(day.start), day.end)
            }
            (None, None) => Ok(observed),
        }
    }
}

fn approved_column(orders: &DataFrame) -> Result<&Column, FilterError> {
    orders
        .column(ORDER_APPROVED_AT)
        .map_err(|_| FilterError::MissingColumn(ORDER_APPROVED_AT))
}

/// Observed min/max approval timestamp, `None` when nothing parsed.
pub fn approved_range(orders: &DataFrame) -> Result<Option<DateRange>, FilterError> {
    let approved = approved_column(orders)?.as_materialized_series().datetime()?;
    let physical = approved.physical();
    let bounds = physical
        .min()
        .zip(physical.max())
        .and_then(|(lo, hi)| from_millis(lo).zip(from_millis(hi)));
    match bounds {
        Some((start, end)) => Ok(Some(DateRange::new(start, end)?)),
        None => Ok(None),
    }
}

/// Orders whose approval timestamp falls within `range`; nulls never match.
pub fn filter_orders(orders: &DataFrame, range: &DateRange) -> Result<DataFrame, FilterError> {
    approved_column(orders)?;

    let datetime = DataType::Datetime(TIME_UNIT, None);
    let start = lit(range.start).cast(datetime.clone());
    let end = lit(range.end).cast(datetime);

    let filtered = orders
        .clone()
        .lazy()
        .filter(
            col(ORDER_APPROVED_AT)
                .gt_eq(start)
                .and(col(ORDER_APPROVED_AT).lt_eq(end)),
        )
        .collect()?;
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timestamps::{coerce_order_timestamps, parse_timestamp};

    fn orders() -> DataFrame {
        let raw = df!(
            "order_id" => ["o1", "o2", "o3", "o4"],
            ORDER_APPROVED_AT => [
                Some("2017-01-01 08:00:00"),
                Some("2017-06-15 12:30:00"),
                None,
                Some("2018-03-01 23:10:00"),
            ],
        )
        .unwrap();
        coerce_order_timestamps(&raw).unwrap()
    }

    fn ts(text: &str) -> NaiveDateTime {
        parse_timestamp(text).unwrap()
    }

    #[test]
    fn observed_range_spans_parsed_values() {
        let range = approved_range(&orders()).unwrap().unwrap();
        assert_eq!(range.start, ts("2017-01-01 08:00:00"));
        assert_eq!(range.end, ts("2018-03-01 23:10:00"));
    }

    #[test]
    fn full_range_keeps_every_dated_order() {
        let orders = orders();
        let range = approved_range(&orders).unwrap().unwrap();
        let filtered = filter_orders(&orders, &range).unwrap();
        // the undated order never compares true
        assert_eq!(filtered.height(), 3);
    }

    #[test]
    fn start_after_everything_is_empty() {
        let range = DateRange::new(ts("2019-01-01 00:00:00"), ts("2019-12-31 00:00:00")).unwrap();
        let filtered = filter_orders(&orders(), &range).unwrap();
        assert_eq!(filtered.height(), 0);
    }

    #[test]
    fn calendar_end_date_includes_whole_day() {
        let range = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2017, 6, 15).unwrap(),
            NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(),
        )
        .unwrap();
        let filtered = filter_orders(&orders(), &range).unwrap();
        let ids: Vec<&str> = filtered
            .column("order_id")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(ids, vec!["o2", "o4"]);
    }

    #[test]
    fn select_defaults_to_observed_bounds() {
        let observed = DateRange::new(ts("2017-01-01 08:00:00"), ts("2018-03-01 23:10:00")).unwrap();
        let chosen = DateRange::select(observed, None, NaiveDate::from_ymd_opt(2017, 12, 31)).unwrap();
        assert_eq!(chosen.start, observed.start);
        assert_eq!(chosen.end, ts("2017-12-31 23:59:59") + chrono::Duration::milliseconds(999));
    }

    #[test]
    fn start_past_the_data_selects_nothing() {
        let orders = orders();
        let observed = approved_range(&orders).unwrap().unwrap();
        let chosen = DateRange::select(observed, NaiveDate::from_ymd_opt(2019, 1, 1), None).unwrap();
        assert_eq!(chosen.start, ts("2019-01-01 00:00:00"));
        assert!(chosen.end >= chosen.start);
        assert_eq!(filter_orders(&orders, &chosen).unwrap().height(), 0);
    }

    #[test]
    fn end_before_the_data_selects_nothing() {
        let orders = orders();
        let observed = approved_range(&orders).unwrap().unwrap();
        let chosen = DateRange::select(observed, None, NaiveDate::from_ymd_opt(2016, 6, 1)).unwrap();
        assert_eq!(chosen.start, ts("2016-06-01 00:00:00"));
        assert_eq!(filter_orders(&orders, &chosen).unwrap().height(), 0);
    }

    #[test]
    fn chosen_dates_out_of_order_are_rejected() {
        let observed = approved_range(&orders()).unwrap().unwrap();
        let err = DateRange::select(
            observed,
            NaiveDate::from_ymd_opt(2018, 1, 1),
            NaiveDate::from_ymd_opt(2017, 1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::InvertedRange { .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(ts("2018-01-01"), ts("2017-01-01")).unwrap_err();
        assert!(matches!(err, FilterError::InvertedRange { .. }));
    }

    #[test]
    fn missing_approved_column_is_an_error() {
        let orders = df!("order_id" => ["o1"]).unwrap();
        assert!(matches!(
            approved_range(&orders),
            Err(FilterError::MissingColumn(ORDER_APPROVED_AT))
        ));
    }
}
