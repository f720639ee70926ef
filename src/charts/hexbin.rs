//! Hexagonal binning and the colour map of the product chart.
//!
//! The lattice follows the matplotlib layout: `nx = gridsize` hexagons across,
//! `ny = floor(nx / sqrt(3))` down, with a second lattice offset by half a cell
//! in both directions. Each point goes to the nearer of the two candidate
//! centres (y distances weighted by 3).

use plotters::style::RGBColor;

/// A non-empty hexagon.
#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub center: (f64, f64),
    /// Sum of the weights of the points in the cell.
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct HexGrid {
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Cell width and height (centre spacing) in data units.
    pub cell_size: (f64, f64),
    pub cells: Vec<HexCell>,
}

impl HexGrid {
    /// Bin weighted points, summing weights per cell. Non-finite points are skipped.
    pub fn bin(points: &[(f64, f64, f64)], gridsize: usize) -> Option<Self> {
        let finite: Vec<(f64, f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y, w)| x.is_finite() && y.is_finite() && !w.is_nan())
            .collect();
        if finite.is_empty() || gridsize == 0 {
            return None;
        }

        let nx = gridsize;
        let ny = ((nx as f64) / 3f64.sqrt()).floor().max(1.0) as usize;

        let (mut xmin, mut xmax) = bounds(finite.iter().map(|p| p.0));
        let (mut ymin, mut ymax) = bounds(finite.iter().map(|p| p.1));
        widen(&mut xmin, &mut xmax);
        widen(&mut ymin, &mut ymax);

        let sx = (xmax - xmin) / nx as f64;
        let sy = (ymax - ymin) / ny as f64;

        let n1 = (nx + 1) * (ny + 1);
        let n2 = nx * ny;
        let mut sums = vec![0.0; n1 + n2];
        let mut counts = vec![0usize; n1 + n2];

        for &(x, y, w) in &finite {
            let ix = (x - xmin) / sx;
            let iy = (y - ymin) / sy;

            let ix1 = ix.round();
            let iy1 = iy.round();
            let ix2 = ix.floor();
            let iy2 = iy.floor();

            let d1 = (ix - ix1).powi(2) + 3.0 * (iy - iy1).powi(2);
            let d2 = (ix - ix2 - 0.5).powi(2) + 3.0 * (iy - iy2 - 0.5).powi(2);

            let slot = if d1 < d2 {
                let i = (ix1 as usize).min(nx);
                let j = (iy1 as usize).min(ny);
                i * (ny + 1) + j
            } else {
                let i = (ix2 as usize).min(nx - 1);
                let j = (iy2 as usize).min(ny - 1);
                n1 + i * ny + j
            };
            sums[slot] += w;
            counts[slot] += 1;
        }

        let cells = (0..n1 + n2)
            .filter(|&slot| counts[slot] > 0)
            .map(|slot| {
                let (cx, cy) = if slot < n1 {
                    ((slot / (ny + 1)) as f64, (slot % (ny + 1)) as f64)
                } else {
                    let k = slot - n1;
                    ((k / ny) as f64 + 0.5, (k % ny) as f64 + 0.5)
                };
                HexCell {
                    center: (xmin + cx * sx, ymin + cy * sy),
                    value: sums[slot],
                    count: counts[slot],
                }
            })
            .collect();

        Some(Self {
            x_range: (xmin, xmax),
            y_range: (ymin, ymax),
            cell_size: (sx, sy),
            cells,
        })
    }

    /// Corners of a cell's hexagon, pointy side up.
    pub fn vertices(&self, cell: &HexCell) -> Vec<(f64, f64)> {
        let (sx, sy) = self.cell_size;
        let (cx, cy) = cell.center;
        [
            (0.5, -0.5),
            (0.5, 0.5),
            (0.0, 1.0),
            (-0.5, 0.5),
            (-0.5, -0.5),
            (0.0, -1.0),
        ]
        .iter()
        .map(|(dx, dy)| (cx + dx * sx, cy + dy * sy / 3.0))
        .collect()
    }

    pub fn value_range(&self) -> (f64, f64) {
        bounds(self.cells.iter().map(|c| c.value))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn widen(lo: &mut f64, hi: &mut f64) {
    if lo == hi {
        *lo -= 1.0;
        *hi += 1.0;
    } else {
        let pad = 1e-9 * (*hi - *lo);
        *lo -= pad;
        *hi += pad;
    }
}

// Cividis anchor colours
const CIVIDIS: [(f64, RGBColor); 5] = [
    (0.00, RGBColor(0, 34, 78)),
    (0.25, RGBColor(65, 77, 107)),
    (0.50, RGBColor(124, 123, 120)),
    (0.75, RGBColor(188, 175, 111)),
    (1.00, RGBColor(254, 232, 56)),
];

/// Map `value` within `[lo, hi]` onto the cividis ramp.
pub fn cividis(value: f64, lo: f64, hi: f64) -> RGBColor {
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    for pair in CIVIDIS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = (t - t0) / (t1 - t0);
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
            return RGBColor(mix(c0.0, c1.0), mix(c0.1, c1.1), mix(c0.2, c1.2));
        }
    }
    CIVIDIS[CIVIDIS.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_finite_points_gives_no_grid() {
        assert!(HexGrid::bin(&[], 14).is_none());
        assert!(HexGrid::bin(&[(f64::NEG_INFINITY, 1.0, 1.0)], 14).is_none());
    }

    #[test]
    fn weights_are_summed_and_preserved() {
        let points = vec![
            (0.0, 0.0, 1.0),
            (0.01, 0.01, 2.0),
            (10.0, 10.0, 4.0),
            (5.0, 5.0, 8.0),
            (f64::NEG_INFINITY, 3.0, 100.0),
        ];
        let grid = HexGrid::bin(&points, 14).unwrap();

        let total: f64 = grid.cells.iter().map(|c| c.value).sum();
        assert_eq!(total, 15.0);
        let count: usize = grid.cells.iter().map(|c| c.count).sum();
        assert_eq!(count, 4);

        // the two points near the origin share a hexagon
        let origin = grid.cells.iter().find(|c| c.count == 2).unwrap();
        assert_eq!(origin.value, 3.0);
        assert_eq!(grid.value_range(), (3.0, 8.0));
    }

    #[test]
    fn single_point_grid_has_one_cell() {
        let grid = HexGrid::bin(&[(2.0, -1.0, 7.0)], 14).unwrap();
        assert_eq!(grid.cells.len(), 1);
        assert!(grid.x_range.0 < 2.0 && grid.x_range.1 > 2.0);
        assert_eq!(grid.vertices(&grid.cells[0]).len(), 6);
    }

    #[test]
    fn cell_centres_lie_near_their_points() {
        let points: Vec<(f64, f64, f64)> = (0..50)
            .map(|i| (i as f64 * 0.2, (i % 7) as f64, 1.0))
            .collect();
        let grid = HexGrid::bin(&points, 14).unwrap();
        let (sx, sy) = grid.cell_size;
        for &(x, y, _) in &points {
            let nearest = grid
                .cells
                .iter()
                .map(|c| ((c.center.0 - x) / sx).abs() + ((c.center.1 - y) / sy).abs())
                .fold(f64::INFINITY, f64::min);
            assert!(nearest <= 1.0);
        }
    }

    #[test]
    fn colour_ramp_endpoints() {
        assert_eq!(cividis(0.0, 0.0, 10.0), RGBColor(0, 34, 78));
        assert_eq!(cividis(10.0, 0.0, 10.0), RGBColor(254, 232, 56));
        assert_eq!(cividis(50.0, 0.0, 10.0), RGBColor(254, 232, 56));
        assert_eq!(cividis(3.0, 3.0, 3.0), RGBColor(124, 123, 120));
    }
}
