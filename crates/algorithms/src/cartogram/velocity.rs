//! Flow field derived from a density snapshot
//!
//! Velocities live on the (W+1)×(H+1) cell corners. Around vertex (i, j) the
//! four cell densities are
//!
//! ```text
//! r00 = ρ(i-1, j-1)   r10 = ρ(i, j-1)
//! r01 = ρ(i-1, j)     r11 = ρ(i, j)
//! ```
//!
//! Interior vertices use all four. Edge vertices only see the two cells on
//! the inside and move parallel to the edge; corner vertices never move.

use crate::maybe_rayon::*;
use geo::Coord;
use ndarray::Array2;

/// Where a lattice vertex sits relative to the grid boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexKind {
    Corner,
    Top,
    Bottom,
    Left,
    Right,
    Interior,
}

impl VertexKind {
    fn classify(ix: usize, iy: usize, width: usize, height: usize) -> Self {
        let at_x_edge = ix == 0 || ix == width;
        let at_y_edge = iy == 0 || iy == height;
        match (at_x_edge, at_y_edge) {
            (true, true) => VertexKind::Corner,
            (false, true) if iy == 0 => VertexKind::Top,
            (false, true) => VertexKind::Bottom,
            (true, false) if ix == 0 => VertexKind::Left,
            (true, false) => VertexKind::Right,
            (false, false) => VertexKind::Interior,
        }
    }
}

/// Velocity vectors on the grid vertices of one density snapshot.
///
/// Arrays have shape `(H + 1, W + 1)` and are indexed `(iy, ix)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityField {
    vx: Array2<f64>,
    vy: Array2<f64>,
}

impl VelocityField {
    /// Derive the vertex velocities of a `(H, W)` density grid
    pub fn from_density(density: &Array2<f64>) -> Self {
        let (height, width) = density.dim();
        let rho = |ix: usize, iy: usize| density[[iy, ix]];

        let velocities: Vec<(f64, f64)> = (0..=height)
            .into_par_iter()
            .flat_map(|iy| {
                (0..=width)
                    .map(|ix| match VertexKind::classify(ix, iy, width, height) {
                        VertexKind::Corner => (0.0, 0.0),
                        VertexKind::Top => {
                            let (r01, r11) = (rho(ix - 1, 0), rho(ix, 0));
                            (-2.0 * (r11 - r01) / (r11 + r01), 0.0)
                        }
                        VertexKind::Bottom => {
                            let (r00, r10) = (rho(ix - 1, height - 1), rho(ix, height - 1));
                            (-2.0 * (r10 - r00) / (r10 + r00), 0.0)
                        }
                        VertexKind::Left => {
                            let (r10, r11) = (rho(0, iy - 1), rho(0, iy));
                            (0.0, -2.0 * (r11 - r10) / (r11 + r10))
                        }
                        VertexKind::Right => {
                            let (r00, r01) = (rho(width - 1, iy - 1), rho(width - 1, iy));
                            (0.0, -2.0 * (r01 - r00) / (r01 + r00))
                        }
                        VertexKind::Interior => {
                            let r00 = rho(ix - 1, iy - 1);
                            let r10 = rho(ix, iy - 1);
                            let r01 = rho(ix - 1, iy);
                            let r11 = rho(ix, iy);
                            let mid = r00 + r10 + r01 + r11;
                            (
                                -2.0 * ((r10 - r00) + (r11 - r01)) / mid,
                                -2.0 * ((r01 - r00) + (r11 - r10)) / mid,
                            )
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let shape = (height + 1, width + 1);
        let vx = Array2::from_shape_fn(shape, |(iy, ix)| velocities[iy * (width + 1) + ix].0);
        let vy = Array2::from_shape_fn(shape, |(iy, ix)| velocities[iy * (width + 1) + ix].1);
        Self { vx, vy }
    }

    /// Number of cells along X
    pub fn width(&self) -> usize {
        self.vx.ncols() - 1
    }

    /// Number of cells along Y
    pub fn height(&self) -> usize {
        self.vx.nrows() - 1
    }

    /// Velocity at vertex (ix, iy)
    pub fn vertex(&self, ix: usize, iy: usize) -> Option<Coord<f64>> {
        Some(Coord {
            x: *self.vx.get((iy, ix))?,
            y: *self.vy.get((iy, ix))?,
        })
    }

    /// Bilinear interpolation of the vertex velocities at `p`.
    ///
    /// The cell index is clamped into the grid, so points outside extrapolate
    /// from the nearest cell.
    #[inline]
    pub fn velocity_at(&self, p: Coord<f64>) -> Coord<f64> {
        let (width, height) = (self.width(), self.height());
        let ix = (p.x.floor().max(0.0) as usize).min(width - 1);
        let iy = (p.y.floor().max(0.0) as usize).min(height - 1);

        let dx = p.x - ix as f64;
        let dy = p.y - iy as f64;
        let w00 = (1.0 - dx) * (1.0 - dy);
        let w10 = dx * (1.0 - dy);
        let w01 = (1.0 - dx) * dy;
        let w11 = dx * dy;

        let lerp = |v: &Array2<f64>| {
            w00 * v[[iy, ix]] + w10 * v[[iy, ix + 1]] + w01 * v[[iy + 1, ix]] + w11 * v[[iy + 1, ix + 1]]
        };
        Coord {
            x: lerp(&self.vx),
            y: lerp(&self.vy),
        }
    }
}
