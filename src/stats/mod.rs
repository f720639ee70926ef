//! Statistics module - revenue aggregation, geolocation and summaries

mod geolocation;
mod revenue;
mod summary;

pub use geolocation::{CustomerLocation, GeolocationResolver, ResolvedLocation};
pub use revenue::{AggregateError, ProductRevenue, RevenueAggregator};
pub use summary::{GeoSummary, RevenueSummary, StateCount};
