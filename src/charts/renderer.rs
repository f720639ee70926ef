//! Static Chart Renderer
//! Draws the two dashboard panels as PNG files.
//!
//! Panels:
//! 1. Product Price vs. Sell Probability: hexbin of log sell probability against
//!    log mean price, cells coloured by summed revenue, with a colour bar.
//! 2. Customer Geolocation: one translucent point per customer over a map of
//!    Brazil stretched to its geographic extent, axes hidden.

use crate::charts::hexbin::{cividis, HexGrid};
use crate::stats::{CustomerLocation, ProductRevenue};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Longitude span covered by the map image.
pub const MAP_EXTENT_LNG: (f64, f64) = (-73.98283055, -33.8);
/// Latitude span covered by the map image.
pub const MAP_EXTENT_LAT: (f64, f64) = (-33.75116944, 5.4);

const MAROON: RGBColor = RGBColor(128, 0, 0);
const POINT_ALPHA: f64 = 0.3;
const COLORBAR_WIDTH: u32 = 130;
const COLORBAR_STEPS: usize = 64;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Pixel buffer does not match {0}x{1}")]
    Buffer(u32, u32),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Byte length of an RGB8 buffer, computed in `usize`.
fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Points for the product chart: (ln sell probability, ln price, total).
pub fn product_points(rows: &[ProductRevenue]) -> Vec<(f64, f64, f64)> {
    let points: Vec<(f64, f64, f64)> = rows
        .iter()
        .map(|r| (r.sell_probability.ln(), r.price.ln(), r.total))
        .collect();
    let dropped = points
        .iter()
        .filter(|(x, y, _)| !x.is_finite() || !y.is_finite())
        .count();
    if dropped > 0 {
        debug!(dropped, "Skipping products with non-positive probability or price");
    }
    points
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    fn ensure_parent(path: &Path) -> Result<(), RenderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RenderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Hexbin of product price against sell probability.
    pub fn render_product_chart(
        rows: &[ProductRevenue],
        gridsize: usize,
        size: (u32, u32),
        path: &Path,
    ) -> Result<(), RenderError> {
        Self::ensure_parent(path)?;
        let grid = HexGrid::bin(&product_points(rows), gridsize);

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let (main, bar) = root.split_horizontally(size.0.saturating_sub(COLORBAR_WIDTH));

        let (x_range, y_range) = grid
            .as_ref()
            .map(|g| (g.x_range, g.y_range))
            .unwrap_or(((-1.0, 1.0), (-1.0, 1.0)));

        let mut chart = ChartBuilder::on(&main)
            .caption("Product Price vs. Sell Probability", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc("Log Sell Probability")
            .y_desc("Log Product Price")
            .axis_desc_style(("sans-serif", 16))
            .draw()
            .map_err(draw_err)?;

        let (lo, hi) = grid.as_ref().map(|g| g.value_range()).unwrap_or((0.0, 1.0));

        if let Some(grid) = &grid {
            chart
                .draw_series(grid.cells.iter().map(|cell| {
                    Polygon::new(grid.vertices(cell), cividis(cell.value, lo, hi).filled())
                }))
                .map_err(draw_err)?;
        }

        Self::draw_colorbar(&bar, lo, hi)?;
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_colorbar(
        area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
        lo: f64,
        hi: f64,
    ) -> Result<(), RenderError> {
        let hi = if hi > lo { hi } else { lo + 1.0 };
        let step = (hi - lo) / COLORBAR_STEPS as f64;

        let mut chart = ChartBuilder::on(area)
            .margin_top(55)
            .margin_bottom(60)
            .margin_right(55)
            .y_label_area_size(0)
            .right_y_label_area_size(60)
            .build_cartesian_2d(0.0..1.0, lo..hi)
            .map_err(draw_err)?
            .set_secondary_coord(0.0..1.0, lo..hi);

        chart
            .draw_series((0..COLORBAR_STEPS).map(|i| {
                let y0 = lo + i as f64 * step;
                Rectangle::new(
                    [(0.0, y0), (1.0, y0 + step)],
                    cividis(y0 + step / 2.0, lo, hi).filled(),
                )
            }))
            .map_err(draw_err)?;

        chart
            .configure_secondary_axes()
            .y_desc("Product Revenue (R$)")
            .y_labels(6)
            .axis_desc_style(("sans-serif", 14))
            .draw()
            .map_err(draw_err)?;
        Ok(())
    }

    /// Customer locations over the map image; white background without one.
    pub fn render_geo_chart(
        customers: &[CustomerLocation],
        map: Option<&DynamicImage>,
        size: (u32, u32),
        path: &Path,
    ) -> Result<(), RenderError> {
        Self::ensure_parent(path)?;
        let (width, height) = size;

        let mut buffer = match map {
            Some(map) => {
                image::imageops::resize(&map.to_rgb8(), width, height, FilterType::Triangle)
                    .into_raw()
            }
            None => vec![255u8; rgb_len(width, height)],
        };

        {
            let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
            let mut chart = ChartBuilder::on(&root)
                .build_cartesian_2d(
                    MAP_EXTENT_LNG.0..MAP_EXTENT_LNG.1,
                    MAP_EXTENT_LAT.0..MAP_EXTENT_LAT.1,
                )
                .map_err(draw_err)?;

            let style = MAROON.mix(POINT_ALPHA).filled();
            chart
                .draw_series(
                    customers
                        .iter()
                        .map(|c| Circle::new((c.lng, c.lat), 1, style)),
                )
                .map_err(draw_err)?;
            root.present().map_err(draw_err)?;
        }

        let img = RgbImage::from_raw(width, height, buffer).ok_or(RenderError::Buffer(width, height))?;
        img.save(path)?;
        Ok(())
    }
}
