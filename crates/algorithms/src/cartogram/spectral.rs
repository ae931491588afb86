//! Diffused density in the cosine-transform domain
//!
//! The biased density grid is transformed once with a 2D DCT-II. The density
//! after diffusing for time `t` is the 2D DCT-III of the coefficients damped by
//!
//! ```text
//! exp(-((π·kx / W)² + (π·ky / H)²) · t)
//! ```
//!
//! Results land in one of [`SNAPSHOT_SLOTS`] buffers so the integrator can keep
//! the densities of a whole macro-step alive at once.

use crate::maybe_rayon::*;
use cartomorph_core::{Error, Raster, Result};
use ndarray::{Array2, Axis};
use rustdct::{DctPlanner, TransformType2And3};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Number of density snapshots kept alive at once
pub const SNAPSHOT_SLOTS: usize = 5;

/// Coefficients below this fraction of the mean term are round-off noise
const ROUNDOFF: f64 = 64.0 * f64::EPSILON;

type Transform = Arc<dyn TransformType2And3<f64>>;

/// Density grid plus its cosine transform and a ring of diffused snapshots.
///
/// Grids are indexed `(row, col)`, i.e. `(y, x)`.
pub struct SpectralDensity {
    /// DCT-II coefficients with the inverse normalization folded in
    coefficients: Array2<f64>,
    row_transform: Transform,
    col_transform: Transform,
    snapshots: [Array2<f64>; SNAPSHOT_SLOTS],
    times: [Option<f64>; SNAPSHOT_SLOTS],
    bias: f64,
    mean: f64,
}

impl fmt::Debug for SpectralDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralDensity")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bias", &self.bias)
            .field("mean", &self.mean)
            .field("times", &self.times)
            .finish()
    }
}

impl SpectralDensity {
    /// Load a density raster, adding `offset × mean` to every cell.
    ///
    /// No-data and NaN cells count as zero density. Negative or infinite
    /// values, an empty grid and a grid without any positive density are
    /// rejected.
    pub fn new(density: &Raster<f64>, offset: f64) -> Result<Self> {
        if !offset.is_finite() || offset < 0.0 {
            return Err(Error::InvalidParameter {
                name: "offset",
                value: offset.to_string(),
                reason: "must be a finite non-negative number".into(),
            });
        }
        if density.is_empty() {
            return Err(Error::Input("density raster is empty".into()));
        }

        let mut grid = Array2::zeros(density.shape());
        for ((row, col), &value) in density.data().indexed_iter() {
            if density.is_nodata(value) {
                continue;
            }
            if value < 0.0 || !value.is_finite() {
                return Err(Error::Input(format!(
                    "density must be finite and non-negative, found {} at row {}, col {}",
                    value, row, col
                )));
            }
            grid[[row, col]] = value;
        }

        let mean = grid.mean().unwrap_or(0.0);
        if mean <= 0.0 {
            return Err(Error::Input(
                "density raster has no positive values".into(),
            ));
        }

        let bias = offset * mean;
        grid.mapv_inplace(|v| v + bias);
        Ok(Self::from_biased(grid, bias))
    }

    fn from_biased(mut grid: Array2<f64>, bias: f64) -> Self {
        let (height, width) = grid.dim();
        let mut planner = DctPlanner::new();
        let row_transform = planner.plan_dct2(width);
        let col_transform = planner.plan_dct2(height);

        let mean = grid.mean().unwrap_or(0.0);

        transform_lines(&mut grid, Axis(0), |line| row_transform.process_dct2(line));
        transform_lines(&mut grid, Axis(1), |line| col_transform.process_dct2(line));

        // DCT-III(DCT-II(x)) = N/2 · x along each axis
        let scale = 4.0 / (width * height) as f64;
        grid.mapv_inplace(|c| c * scale);

        let noise = ROUNDOFF * grid[[0, 0]].abs();
        for c in grid.iter_mut().skip(1) {
            if c.abs() <= noise {
                *c = 0.0;
            }
        }

        let empty = || Array2::zeros((height, width));
        Self {
            coefficients: grid,
            row_transform,
            col_transform,
            snapshots: [empty(), empty(), empty(), empty(), empty()],
            times: [None; SNAPSHOT_SLOTS],
            bias,
            mean,
        }
    }

    /// Number of columns (W)
    pub fn width(&self) -> usize {
        self.coefficients.ncols()
    }

    /// Number of rows (H)
    pub fn height(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Bias added to every cell at load time
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Mean of the biased density; diffusion converges to it
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Diffuse the density to time `t` and store it in `slot`.
    ///
    /// A slot that already holds time `t` is returned as is.
    pub fn density_at(&mut self, t: f64, slot: usize) -> &Array2<f64> {
        let slot = slot % SNAPSHOT_SLOTS;
        if self.times[slot] == Some(t) {
            return &self.snapshots[slot];
        }

        let (height, width) = self.coefficients.dim();
        let damping = |k: usize, n: usize| {
            let freq = PI * k as f64 / n as f64;
            (-freq * freq * t).exp()
        };
        let exp_kx: Vec<f64> = (0..width).map(|kx| damping(kx, width)).collect();
        let exp_ky: Vec<f64> = (0..height).map(|ky| damping(ky, height)).collect();

        let mut damped = self.coefficients.clone();
        for ((ky, kx), c) in damped.indexed_iter_mut() {
            *c *= exp_ky[ky] * exp_kx[kx];
        }

        let noise = ROUNDOFF * damped[[0, 0]].abs();
        if damped.iter().skip(1).all(|c| c.abs() <= noise) {
            // Only the mean survives: the field is exactly uniform
            let uniform = damped[[0, 0]] / 4.0;
            self.snapshots[slot].fill(uniform);
        } else {
            let rows = &self.row_transform;
            let cols = &self.col_transform;
            transform_lines(&mut damped, Axis(0), |line| rows.process_dct3(line));
            transform_lines(&mut damped, Axis(1), |line| cols.process_dct3(line));
            self.snapshots[slot] = damped;
        }

        self.times[slot] = Some(t);
        &self.snapshots[slot]
    }

    /// Density currently held by `slot`
    pub fn snapshot(&self, slot: usize) -> &Array2<f64> {
        &self.snapshots[slot % SNAPSHOT_SLOTS]
    }

    /// Time of the density currently held by `slot`
    pub fn snapshot_time(&self, slot: usize) -> Option<f64> {
        self.times[slot % SNAPSHOT_SLOTS]
    }
}

/// Apply a 1D in-place transform to every lane of `grid` along `axis`.
///
/// `Axis(0)` iterates rows (transform along X), `Axis(1)` columns.
fn transform_lines<F>(grid: &mut Array2<f64>, axis: Axis, transform: F)
where
    F: Fn(&mut [f64]) + Sync + Send,
{
    grid.axis_iter_mut(axis)
        .into_par_iter()
        .for_each(|mut lane| {
            let mut buf = lane.to_vec();
            transform(&mut buf);
            for (dst, src) in lane.iter_mut().zip(buf) {
                *dst = src;
            }
        });
}

/// Population variance of a grid
pub fn variance(grid: &Array2<f64>) -> f64 {
    let mean = grid.mean().unwrap_or(0.0);
    grid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / grid.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raster(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)))
    }

    #[test]
    fn test_time_zero_reproduces_input() {
        let input = raster(6, 9, |r, c| 1.0 + (r * 9 + c) as f64 % 7.0);
        let mut field = SpectralDensity::new(&input, 0.001).unwrap();
        let bias = field.bias();

        let density = field.density_at(0.0, 0);
        for ((r, c), &v) in density.indexed_iter() {
            assert_relative_eq!(v, input.get(r, c).unwrap() + bias, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bias_is_offset_times_mean() {
        let input = raster(2, 2, |r, c| if r == 1 && c == 1 { 4.0 } else { 0.0 });
        let field = SpectralDensity::new(&input, 0.5).unwrap();
        assert_relative_eq!(field.bias(), 0.5);
        assert_relative_eq!(field.mean(), 1.5);
    }

    #[test]
    fn test_diffusion_conserves_mass_and_smooths() {
        let input = raster(8, 12, |r, c| if r < 3 && c < 4 { 50.0 } else { 1.0 });
        let mut field = SpectralDensity::new(&input, 0.001).unwrap();

        let initial = field.density_at(0.0, 0).clone();
        let total = initial.sum();

        let mut last_variance = variance(&initial);
        for (slot, t) in [0.1, 0.5, 2.0, 10.0].into_iter().enumerate() {
            let density = field.density_at(t, slot + 1);
            assert_relative_eq!(density.sum(), total, max_relative = 1e-9);
            let v = variance(density);
            assert!(v < last_variance, "variance {} did not drop below {}", v, last_variance);
            last_variance = v;
        }
    }

    #[test]
    fn test_uniform_input_stays_exactly_uniform() {
        let mut field = SpectralDensity::new(&raster(3, 7, |_, _| 5.0), 0.001).unwrap();
        let density = field.density_at(0.0, 0);
        let first = density[[0, 0]];
        assert!(density.iter().all(|&v| v == first));
        assert_relative_eq!(first, 5.005, max_relative = 1e-12);
    }

    #[test]
    fn test_fully_diffused_is_exactly_uniform() {
        let input = raster(4, 5, |r, c| (r + 2 * c) as f64);
        let mut field = SpectralDensity::new(&input, 0.001).unwrap();
        let mean = field.mean();

        let density = field.density_at(1e6, 3);
        let first = density[[0, 0]];
        assert!(density.iter().all(|&v| v == first));
        assert_relative_eq!(first, mean, max_relative = 1e-12);
    }

    #[test]
    fn test_slots_are_independent() {
        let input = raster(5, 5, |r, c| ((r * c) % 3) as f64 + 1.0);
        let mut field = SpectralDensity::new(&input, 0.001).unwrap();

        let early = field.density_at(0.0, 1).clone();
        field.density_at(3.0, 2);
        assert_eq!(field.snapshot(1), &early);
        assert_eq!(field.snapshot_time(2), Some(3.0));
        assert_eq!(field.snapshot_time(4), None);

        // Same time, same bits
        let again = field.density_at(0.0, 6).clone();
        assert_eq!(again, early);
    }

    #[test]
    fn test_single_row_grid() {
        let input = raster(1, 4, |_, c| (c + 1) as f64);
        let mut field = SpectralDensity::new(&input, 0.0).unwrap();
        let density = field.density_at(0.0, 0);
        for c in 0..4 {
            assert_relative_eq!(density[[0, c]], (c + 1) as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_nodata_counts_as_zero() {
        let mut input = raster(2, 2, |_, _| 2.0);
        input.set_nodata(Some(-9999.0));
        input.set(0, 0, -9999.0).unwrap();
        input.set(0, 1, f64::NAN).unwrap();

        let field = SpectralDensity::new(&input, 0.0).unwrap();
        assert_relative_eq!(field.mean(), 1.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            SpectralDensity::new(&Raster::new(0, 3), 0.001),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            SpectralDensity::new(&Raster::new(3, 3), 0.001),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            SpectralDensity::new(&raster(2, 2, |r, _| r as f64 - 0.5), 0.001),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            SpectralDensity::new(&raster(2, 2, |_, _| f64::INFINITY), 0.001),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            SpectralDensity::new(&raster(2, 2, |_, _| 1.0), -1.0),
            Err(Error::InvalidParameter { name: "offset", .. })
        ));
    }
}
