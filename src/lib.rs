//! Olist Dashboard - E-commerce order analysis
//!
//! Loads the published order, product, customer and geolocation tables, derives
//! per-product revenue and a representative location per customer, and renders
//! both as static chart panels.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod stats;

pub use config::{DashboardConfig, SellMeasure, StateSelection};
pub use dashboard::{Dashboard, DashboardReport, DateSelection, Derived};
