//! Dataset Loader Module
//! Fetches the e-commerce CSV resources and parses them with Polars.

use polars::prelude::*;
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The nine published tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dataset {
    Orders,
    Items,
    Products,
    Payments,
    Reviews,
    Customers,
    Sellers,
    Geo,
    Category,
}

impl Dataset {
    pub const ALL: [Dataset; 9] = [
        Dataset::Orders,
        Dataset::Items,
        Dataset::Products,
        Dataset::Payments,
        Dataset::Reviews,
        Dataset::Customers,
        Dataset::Sellers,
        Dataset::Geo,
        Dataset::Category,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Orders => "orders",
            Dataset::Items => "items",
            Dataset::Products => "products",
            Dataset::Payments => "payments",
            Dataset::Reviews => "reviews",
            Dataset::Customers => "customers",
            Dataset::Sellers => "sellers",
            Dataset::Geo => "geo",
            Dataset::Category => "category",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::Orders => "orders_dataset.csv",
            Dataset::Items => "order_items_dataset.csv",
            Dataset::Products => "products_dataset.csv",
            Dataset::Payments => "order_payments_dataset.csv",
            Dataset::Reviews => "order_reviews_dataset.csv",
            Dataset::Customers => "customers_dataset.csv",
            Dataset::Sellers => "sellers_dataset.csv",
            Dataset::Geo => "geolocation_dataset.csv",
            Dataset::Category => "product_category_name_translation.csv",
        }
    }

    /// Key columns read as text; zip prefixes keep their leading zeros.
    fn text_columns(self) -> &'static [&'static str] {
        match self {
            Dataset::Orders => &["order_id", "customer_id"],
            Dataset::Items => &["order_id", "product_id", "seller_id"],
            Dataset::Products => &["product_id"],
            Dataset::Payments => &["order_id"],
            Dataset::Reviews => &["review_id", "order_id"],
            Dataset::Customers => &[
                "customer_id",
                "customer_unique_id",
                "customer_zip_code_prefix",
            ],
            Dataset::Sellers => &["seller_id", "seller_zip_code_prefix"],
            Dataset::Geo => &["geolocation_zip_code_prefix"],
            Dataset::Category => &[],
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where raw CSV bytes come from.
pub trait DatasetSource {
    /// Human-readable location, used in logs.
    fn location(&self, dataset: Dataset) -> String;

    fn fetch(&self, dataset: Dataset) -> Result<Vec<u8>, LoaderError>;
}

impl<S: DatasetSource + ?Sized> DatasetSource for &S {
    fn location(&self, dataset: Dataset) -> String {
        (**self).location(dataset)
    }

    fn fetch(&self, dataset: Dataset) -> Result<Vec<u8>, LoaderError> {
        (**self).fetch(dataset)
    }
}

/// Blocking HTTP source rooted at a base URL.
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, LoaderError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.to_string(),
            client: builder.build()?,
        })
    }

    /// GET an arbitrary resource; non-2xx responses are errors.
    pub fn fetch_url(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl DatasetSource for HttpSource {
    fn location(&self, dataset: Dataset) -> String {
        format!("{}{}", self.base_url, dataset.file_name())
    }

    fn fetch(&self, dataset: Dataset) -> Result<Vec<u8>, LoaderError> {
        self.fetch_url(&self.location(dataset))
    }
}

/// Local directory holding the CSV files under their published names.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DatasetSource for DirSource {
    fn location(&self, dataset: Dataset) -> String {
        self.dir.join(dataset.file_name()).display().to_string()
    }

    fn fetch(&self, dataset: Dataset) -> Result<Vec<u8>, LoaderError> {
        let path = self.dir.join(dataset.file_name());
        std::fs::read(&path).map_err(|source| LoaderError::Io { path, source })
    }
}

/// Parse CSV bytes, inferring column types except for the dataset's key columns.
pub fn parse_csv(dataset: Dataset, bytes: Vec<u8>) -> Result<DataFrame, LoaderError> {
    let header = header_names(&bytes);
    let overrides: Vec<Field> = dataset
        .text_columns()
        .iter()
        .filter(|name| header.iter().any(|h| h == *name))
        .map(|name| Field::new((*name).into(), DataType::String))
        .collect();

    let mut options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .with_ignore_errors(true);
    if !overrides.is_empty() {
        options = options.with_schema_overwrite(Some(Arc::new(Schema::from_iter(overrides))));
    }

    let df = options
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    Ok(df)
}

fn header_names(bytes: &[u8]) -> Vec<String> {
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
        .trim_start_matches('\u{feff}')
        .trim_end_matches('\r')
        .split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect()
}

/// All nine tables, loaded once per session.
pub struct Datasets {
    pub orders: DataFrame,
    pub items: DataFrame,
    pub products: DataFrame,
    pub payments: DataFrame,
    pub reviews: DataFrame,
    pub customers: DataFrame,
    pub sellers: DataFrame,
    pub geo: DataFrame,
    pub category: DataFrame,
}

impl Datasets {
    pub fn get(&self, dataset: Dataset) -> &DataFrame {
        match dataset {
            Dataset::Orders => &self.orders,
            Dataset::Items => &self.items,
            Dataset::Products => &self.products,
            Dataset::Payments => &self.payments,
            Dataset::Reviews => &self.reviews,
            Dataset::Customers => &self.customers,
            Dataset::Sellers => &self.sellers,
            Dataset::Geo => &self.geo,
            Dataset::Category => &self.category,
        }
    }

    pub fn row_counts(&self) -> Vec<(Dataset, usize)> {
        Dataset::ALL
            .iter()
            .map(|&d| (d, self.get(d).height()))
            .collect()
    }
}

/// Loads datasets one after another from a single source.
pub struct DataLoader<S: DatasetSource> {
    source: S,
}

impl<S: DatasetSource> DataLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Fetch and parse one dataset.
    pub fn load(&self, dataset: Dataset) -> Result<DataFrame, LoaderError> {
        info!(dataset = %dataset, location = %self.source.location(dataset), "Fetching dataset");
        let bytes = self.source.fetch(dataset)?;
        let df = parse_csv(dataset, bytes)?;
        info!(dataset = %dataset, rows = df.height(), columns = df.width(), "Loaded dataset");
        Ok(df)
    }

    /// Load every dataset in order; the first failure aborts.
    pub fn load_all(&self) -> Result<Datasets, LoaderError> {
        Ok(Datasets {
            orders: self.load(Dataset::Orders)?,
            items: self.load(Dataset::Items)?,
            products: self.load(Dataset::Products)?,
            payments: self.load(Dataset::Payments)?,
            reviews: self.load(Dataset::Reviews)?,
            customers: self.load(Dataset::Customers)?,
            sellers: self.load(Dataset::Sellers)?,
            geo: self.load(Dataset::Geo)?,
            category: self.load(Dataset::Category)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_prefix_keeps_leading_zeros() {
        let csv = "geolocation_zip_code_prefix,geolocation_lat,geolocation_lng,geolocation_city,geolocation_state\n\
                   01001,-23.55,-46.63,sao paulo,SP\n";
        let df = parse_csv(Dataset::Geo, csv.as_bytes().to_vec()).unwrap();

        let zip = df.column("geolocation_zip_code_prefix").unwrap();
        assert_eq!(zip.dtype(), &DataType::String);
        assert_eq!(zip.str().unwrap().get(0), Some("01001"));
        assert_eq!(df.column("geolocation_lat").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn missing_key_columns_are_not_forced() {
        let csv = "order_id,price\no1,10.5\n";
        let df = parse_csv(Dataset::Items, csv.as_bytes().to_vec()).unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn header_names_strip_quotes_and_bom() {
        let names = header_names(b"\xef\xbb\xbf\"a\",b\r\n1,2\n");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn dir_source_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DataLoader::new(DirSource::new(dir.path()));
        let err = loader.load(Dataset::Orders).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
    }

    #[test]
    fn http_location_joins_base_and_file_name() {
        let source = HttpSource::new("https://example.org/data/", None).unwrap();
        assert_eq!(
            source.location(Dataset::Geo),
            "https://example.org/data/geolocation_dataset.csv"
        );
    }
}
