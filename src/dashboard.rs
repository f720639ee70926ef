//! Dashboard session: load, derive, filter, render and report, in that order.

use crate::charts::StaticChartRenderer;
use crate::config::DashboardConfig;
use crate::data::timestamps::coerce_order_timestamps;
use crate::data::{
    approved_range, filter_orders, DataLoader, Datasets, DateRange, DirSource, HttpSource,
};
use crate::stats::{
    CustomerLocation, GeoSummary, GeolocationResolver, ProductRevenue, ResolvedLocation,
    RevenueAggregator, RevenueSummary,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use image::DynamicImage;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const PRODUCT_CHART_FILE: &str = "product_analysis.png";
pub const GEO_CHART_FILE: &str = "customer_geolocation.png";
pub const SUMMARY_FILE: &str = "summary.json";

/// Operator-selected date bounds; `None` means the observed bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateSelection {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub dataset_rows: BTreeMap<String, usize>,
    pub date_range: Option<DateRange>,
    pub filtered_orders: usize,
    pub revenue: RevenueSummary,
    pub geolocation: GeoSummary,
    pub product_chart: PathBuf,
    pub geo_chart: PathBuf,
}

/// Derived tables of one session.
pub struct Derived {
    pub revenue: Vec<ProductRevenue>,
    pub resolved: Vec<ResolvedLocation>,
    pub customers: Vec<CustomerLocation>,
    pub date_range: Option<DateRange>,
    pub filtered_orders: DataFrame,
}

pub struct Dashboard {
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    /// Run against the configured source: `data_dir` when set, HTTP otherwise.
    pub fn run(&self, dates: DateSelection) -> Result<DashboardReport> {
        let source = &self.config.source;
        let http = HttpSource::new(&source.base_url, source.timeout_secs.map(Duration::from_secs))
            .context("Failed to build HTTP client")?;

        let datasets = match &source.data_dir {
            Some(dir) => DataLoader::new(DirSource::new(dir)).load_all(),
            None => DataLoader::new(&http).load_all(),
        }
        .context("Failed to load datasets")?;

        let map = self.fetch_map(&http);
        self.run_with(&datasets, map.as_ref(), dates)
    }

    fn fetch_map(&self, http: &HttpSource) -> Option<DynamicImage> {
        let url = self.config.charts.map_url.as_deref()?;
        let decoded = http
            .fetch_url(url)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| image::load_from_memory(&bytes).map_err(anyhow::Error::from));
        match decoded {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(url, error = %e, "Map image unavailable, drawing on a blank background");
                None
            }
        }
    }

    /// Revenue, locations and the date-filtered orders, computed once.
    pub fn derive(&self, datasets: &Datasets, dates: DateSelection) -> Result<Derived> {
        let analysis = &self.config.analysis;

        let revenue = RevenueAggregator::product_revenue(
            &datasets.orders,
            &datasets.items,
            &datasets.products,
            analysis.sell_measure,
        )
        .context("Failed to aggregate product revenue")?;
        info!(products = revenue.len(), measure = ?analysis.sell_measure, "Product revenue computed");

        let resolved_frame =
            GeolocationResolver::resolve_frame(&datasets.geo, analysis.state_selection)
                .context("Failed to resolve geolocation")?;
        let resolved = GeolocationResolver::locations(&resolved_frame)
            .context("Failed to read resolved locations")?;
        let customers =
            GeolocationResolver::customer_locations(&datasets.customers, &resolved_frame)
                .context("Failed to locate customers")?;
        info!(
            prefixes = resolved.len(),
            customers = customers.len(),
            "Customer locations resolved"
        );

        let orders = coerce_order_timestamps(&datasets.orders)
            .context("Failed to parse order timestamps")?;
        let observed = approved_range(&orders).context("Failed to read approval range")?;
        let (date_range, filtered_orders) = match observed {
            Some(observed) => {
                let range = DateRange::select(observed, dates.start, dates.end)
                    .context("Invalid date selection")?;
                let filtered = filter_orders(&orders, &range).context("Failed to filter orders")?;
                (Some(range), filtered)
            }
            None => {
                warn!("No parsable approval timestamps, date filter skipped");
                (None, orders.head(Some(0)))
            }
        };
        info!(orders = filtered_orders.height(), range = ?date_range, "Orders filtered by approval date");

        Ok(Derived {
            revenue,
            resolved,
            customers,
            date_range,
            filtered_orders,
        })
    }

    /// Everything after loading: derivations, charts and the summary file.
    pub fn run_with(
        &self,
        datasets: &Datasets,
        map: Option<&DynamicImage>,
        dates: DateSelection,
    ) -> Result<DashboardReport> {
        let charts = &self.config.charts;
        let derived = self.derive(datasets, dates)?;

        let product_chart = charts.output_dir.join(PRODUCT_CHART_FILE);
        StaticChartRenderer::render_product_chart(
            &derived.revenue,
            charts.hexbin_gridsize,
            charts.product_chart_size,
            &product_chart,
        )
        .context("Failed to render product chart")?;

        let geo_chart = charts.output_dir.join(GEO_CHART_FILE);
        StaticChartRenderer::render_geo_chart(
            &derived.customers,
            map,
            charts.map_chart_size,
            &geo_chart,
        )
        .context("Failed to render geolocation chart")?;
        info!(product = %product_chart.display(), geo = %geo_chart.display(), "Charts rendered");

        let report = self.report(datasets, &derived, product_chart, geo_chart);

        let summary_path = charts.output_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&summary_path, json)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;
        info!(path = %summary_path.display(), "Summary written");

        Ok(report)
    }

    pub fn report(
        &self,
        datasets: &Datasets,
        derived: &Derived,
        product_chart: PathBuf,
        geo_chart: PathBuf,
    ) -> DashboardReport {
        DashboardReport {
            dataset_rows: datasets
                .row_counts()
                .into_iter()
                .map(|(d, rows)| (d.name().to_string(), rows))
                .collect(),
            date_range: derived.date_range,
            filtered_orders: derived.filtered_orders.height(),
            revenue: RevenueSummary::from_rows(&derived.revenue, self.config.analysis.top_products),
            geolocation: GeoSummary::new(&derived.resolved, &derived.customers),
            product_chart,
            geo_chart,
        }
    }
}
