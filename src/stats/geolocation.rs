//! Geolocation Resolver Module
//! Collapses raw geolocation samples into one record per zip prefix and
//! attaches it to customers.

use crate::config::StateSelection;
use crate::stats::AggregateError;
use polars::prelude::*;
use serde::Serialize;

const ZIP: &str = "geolocation_zip_code_prefix";
const CITY: &str = "geolocation_city";
const STATE: &str = "geolocation_state";
const LAT: &str = "geolocation_lat";
const LNG: &str = "geolocation_lng";

const CUSTOMER_ID: &str = "customer_id";
const CUSTOMER_UNIQUE_ID: &str = "customer_unique_id";
const CUSTOMER_ZIP: &str = "customer_zip_code_prefix";
const ROW_NR: &str = "__row_nr";

/// Representative location of a zip prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub zip_prefix: String,
    pub city: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
    /// Samples observed for (zip_prefix, state).
    pub samples: u32,
}

/// One plotted customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerLocation {
    pub customer_unique_id: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
}

pub struct GeolocationResolver;

impl GeolocationResolver {
    /// Pick one state per zip prefix; samples with a null prefix or state are skipped.
    ///
    /// Columns: zip prefix, state, count.
    pub fn select_states(geo: &DataFrame, selection: StateSelection) -> LazyFrame {
        let counts = geo
            .clone()
            .lazy()
            .filter(col(ZIP).is_not_null().and(col(STATE).is_not_null()))
            .group_by([col(ZIP), col(STATE)])
            .agg([len().cast(DataType::UInt32).alias("count")]);

        let ordered = match selection {
            StateSelection::FirstSorted => {
                counts.sort([ZIP, STATE], SortMultipleOptions::default())
            }
            StateSelection::MostFrequent => counts.sort(
                [ZIP, "count", STATE],
                SortMultipleOptions::default().with_order_descending_multi([false, true, false]),
            ),
        };

        ordered
            .group_by_stable([col(ZIP)])
            .agg([col(STATE).first(), col("count").first()])
    }

    /// Median coordinates per (zip prefix, city, state); null keys form no group.
    pub fn median_coordinates(geo: &DataFrame) -> LazyFrame {
        geo.clone()
            .lazy()
            .filter(
                col(ZIP)
                    .is_not_null()
                    .and(col(CITY).is_not_null())
                    .and(col(STATE).is_not_null()),
            )
            .group_by([col(ZIP), col(CITY), col(STATE)])
            .agg([
                col(LAT).cast(DataType::Float64).median(),
                col(LNG).cast(DataType::Float64).median(),
            ])
            .sort([ZIP, CITY, STATE], SortMultipleOptions::default())
    }

    /// Exactly one record per zip prefix with at least one sample.
    ///
    /// Columns: zip prefix, city, state, lat, lng, count; sorted by zip prefix.
    pub fn resolve_frame(
        geo: &DataFrame,
        selection: StateSelection,
    ) -> Result<DataFrame, AggregateError> {
        let states = Self::select_states(geo, selection);
        let df = Self::median_coordinates(geo)
            .join(
                states,
                [col(ZIP), col(STATE)],
                [col(ZIP), col(STATE)],
                JoinArgs::new(JoinType::Inner),
            )
            .sort([ZIP, CITY], SortMultipleOptions::default())
            .group_by_stable([col(ZIP)])
            .agg([
                col(CITY).first(),
                col(STATE).first(),
                col(LAT).first(),
                col(LNG).first(),
                col("count").first(),
            ])
            .collect()?;
        Ok(df)
    }

    pub fn resolve(
        geo: &DataFrame,
        selection: StateSelection,
    ) -> Result<Vec<ResolvedLocation>, AggregateError> {
        Self::locations(&Self::resolve_frame(geo, selection)?)
    }

    /// Rows of a frame produced by [`GeolocationResolver::resolve_frame`].
    pub fn locations(df: &DataFrame) -> Result<Vec<ResolvedLocation>, AggregateError> {
        let zip = df.column(ZIP)?.str()?;
        let city = df.column(CITY)?.cast(&DataType::String)?;
        let city = city.str()?;
        let state = df.column(STATE)?.cast(&DataType::String)?;
        let state = state.str()?;
        let lat = df.column(LAT)?.f64()?;
        let lng = df.column(LNG)?.f64()?;
        let count = df.column("count")?.u32()?;

        let rows = (0..df.height())
            .filter_map(|i| {
                Some(ResolvedLocation {
                    zip_prefix: zip.get(i)?.to_string(),
                    city: city.get(i).unwrap_or_default().to_string(),
                    state: state.get(i).unwrap_or_default().to_string(),
                    lat: lat.get(i)?,
                    lng: lng.get(i)?,
                    samples: count.get(i).unwrap_or(0),
                })
            })
            .collect();
        Ok(rows)
    }

    /// Customers joined with their resolved location, one row per unique customer.
    ///
    /// Customer input order is kept; duplicates of `customer_id` and then of
    /// `customer_unique_id` keep their first occurrence.
    pub fn customer_locations(
        customers: &DataFrame,
        resolved: &DataFrame,
    ) -> Result<Vec<CustomerLocation>, AggregateError> {
        let df = customers
            .clone()
            .lazy()
            .with_row_index(ROW_NR, None)
            .join(
                resolved.clone().lazy(),
                [col(CUSTOMER_ZIP)],
                [col(ZIP)],
                JoinArgs::new(JoinType::Inner),
            )
            .sort([ROW_NR], SortMultipleOptions::default())
            .group_by_stable([col(CUSTOMER_ID)])
            .agg([
                col(ROW_NR).first(),
                col(CUSTOMER_UNIQUE_ID).first(),
                col(STATE).first(),
                col(LAT).first(),
                col(LNG).first(),
            ])
            .sort([ROW_NR], SortMultipleOptions::default())
            .group_by_stable([col(CUSTOMER_UNIQUE_ID)])
            .agg([col(STATE).first(), col(LAT).first(), col(LNG).first()])
            .collect()?;

        let unique_id = df.column(CUSTOMER_UNIQUE_ID)?.str()?;
        let state = df.column(STATE)?.cast(&DataType::String)?;
        let state = state.str()?;
        let lat = df.column(LAT)?.f64()?;
        let lng = df.column(LNG)?.f64()?;

        let rows = (0..df.height())
            .filter_map(|i| {
                Some(CustomerLocation {
                    customer_unique_id: unique_id.get(i)?.to_string(),
                    state: state.get(i).unwrap_or_default().to_string(),
                    lat: lat.get(i)?,
                    lng: lng.get(i)?,
                })
            })
            .collect();
        Ok(rows)
    }
}
