//! Dashboard Configuration Module
//! Run settings loaded from an optional TOML file, every field defaulted.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location of the published e-commerce datasets.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/hafizhaqolby/analysis-data/main/data/";

/// Map of Brazil drawn under the customer scatter.
pub const DEFAULT_MAP_URL: &str =
    "https://i.pinimg.com/originals/3a/0c/e1/3a0ce18b3c842748c255bc0aa445ad41.jpg";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// How the per-product sell probability numerator is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SellMeasure {
    /// Sum of the item sequence numbers, divided by the number of products.
    #[default]
    SequenceSum,
    /// Number of item rows, divided by the total number of item rows.
    ItemCount,
}

/// Which state represents a zip prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum StateSelection {
    /// First state in (prefix, state) order.
    #[default]
    FirstSorted,
    /// State with the most samples; ties go to the alphabetically first.
    MostFrequent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Read CSVs from this directory instead of `base_url`.
    pub data_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sell_measure: SellMeasure,
    pub state_selection: StateSelection,
    /// Products listed in the summary report.
    pub top_products: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sell_measure: SellMeasure::default(),
            state_selection: StateSelection::default(),
            top_products: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub output_dir: PathBuf,
    pub hexbin_gridsize: usize,
    pub product_chart_size: (u32, u32),
    pub map_chart_size: (u32, u32),
    /// `None` draws the customer points on a blank background.
    pub map_url: Option<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            hexbin_gridsize: 14,
            product_chart_size: (800, 600),
            map_chart_size: (1000, 1000),
            map_url: Some(DEFAULT_MAP_URL.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: SourceConfig,
    pub analysis: AnalysisConfig,
    pub charts: ChartConfig,
}

impl DashboardConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
