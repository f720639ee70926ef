//! Data module - dataset loading, timestamp coercion and date filtering

mod filter;
mod loader;
pub mod timestamps;

pub use filter::{approved_range, filter_orders, DateRange, FilterError};
pub use loader::{
    parse_csv, DataLoader, Dataset, DatasetSource, Datasets, DirSource, HttpSource, LoaderError,
};
