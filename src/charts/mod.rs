//! Charts module - Hexagonal binning and static chart rendering

pub mod hexbin;
mod renderer;

pub use renderer::{
    product_points, RenderError, StaticChartRenderer, MAP_EXTENT_LAT, MAP_EXTENT_LNG,
};
