//! Descriptive summaries of the derived tables.

use crate::stats::{CustomerLocation, ProductRevenue, ResolvedLocation};
use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub products: usize,
    pub total_revenue: f64,
    pub mean_total: f64,
    pub median_total: f64,
    pub std_total: f64,
    pub mean_price: f64,
    pub top_products: Vec<ProductRevenue>,
}

impl RevenueSummary {
    /// `rows` must already be sorted by total, highest first.
    pub fn from_rows(rows: &[ProductRevenue], top_n: usize) -> Self {
        let totals: Vec<f64> = rows.iter().map(|r| r.total).filter(|v| !v.is_nan()).collect();
        let prices: Vec<f64> = rows.iter().map(|r| r.price).filter(|v| !v.is_nan()).collect();

        let median_total = if totals.is_empty() {
            f64::NAN
        } else {
            Data::new(totals.clone()).median()
        };

        Self {
            products: rows.len(),
            total_revenue: totals.iter().sum(),
            mean_total: totals.iter().mean(),
            median_total,
            std_total: totals.iter().std_dev(),
            mean_price: prices.iter().mean(),
            top_products: rows.iter().take(top_n).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCount {
    pub state: String,
    pub customers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoSummary {
    pub resolved_prefixes: usize,
    pub plotted_customers: usize,
    /// Highest count first, ties alphabetical.
    pub customers_by_state: Vec<StateCount>,
}

impl GeoSummary {
    pub fn new(resolved: &[ResolvedLocation], customers: &[CustomerLocation]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for customer in customers {
            *counts.entry(customer.state.as_str()).or_default() += 1;
        }

        let mut customers_by_state: Vec<StateCount> = counts
            .into_iter()
            .map(|(state, customers)| StateCount {
                state: state.to_string(),
                customers,
            })
            .collect();
        customers_by_state.sort_by(|a, b| {
            b.customers
                .cmp(&a.customers)
                .then_with(|| a.state.cmp(&b.state))
        });

        Self {
            resolved_prefixes: resolved.len(),
            plotted_customers: customers.len(),
            customers_by_state,
        }
    }
}
