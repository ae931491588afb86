//! Forward and backward mapping of coordinates through a morphing grid
//!
//! Forward mapping takes a map coordinate of the undeformed raster to the
//! cartogram: the point is located in its regular cell and carried along by
//! bilinear interpolation of the deformed cell corners. Backward mapping
//! finds the deformed cell containing the point and inverts the bilinear map.
//!
//! Points outside the grid are returned unchanged in both directions.

use super::quad::{bilinear, inverse_bilinear, point_in_quad};
use cartomorph_core::{Error, MorphGrid, Result};
use geo::Coord;
use tracing::{debug, warn};

/// Which way coordinates are mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Original map space to cartogram space
    #[default]
    Forward,
    /// Cartogram space back to original map space
    Backward,
}

/// Maps map coordinates through a [`MorphGrid`]
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper<'a> {
    grid: &'a MorphGrid,
}

impl<'a> CoordinateMapper<'a> {
    pub fn new(grid: &'a MorphGrid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &'a MorphGrid {
        self.grid
    }

    /// Map a coordinate in the given direction
    #[inline]
    pub fn project(&self, c: Coord<f64>, direction: Direction) -> Coord<f64> {
        match direction {
            Direction::Forward => self.forward(c),
            Direction::Backward => self.backward(c),
        }
    }

    /// Map an original coordinate onto the cartogram
    pub fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        let gt = self.grid.transform();
        let (px, py) = gt.geo_to_pixel(c.x, c.y);

        let inside = px >= 0.0
            && px < self.grid.xsize() as f64
            && py >= 0.0
            && py < self.grid.ysize() as f64;
        if !inside {
            return c;
        }

        let ix = px.floor() as usize;
        let iy = py.floor() as usize;
        let quad = self.grid.cell_corners(ix, iy);
        let moved = bilinear(&quad, px - ix as f64, py - iy as f64);

        let (x, y) = gt.pixel_to_geo(moved.x, moved.y);
        Coord { x, y }
    }

    /// Map a cartogram coordinate back to the original map.
    ///
    /// An ambiguous inverse is logged and leaves the coordinate unchanged.
    pub fn backward(&self, c: Coord<f64>) -> Coord<f64> {
        match self.try_backward(c) {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!("{}", e);
                c
            }
        }
    }

    /// Like [`CoordinateMapper::backward`], but reports an ambiguous inverse
    /// as [`Error::AmbiguousInverseMapping`]
    pub fn try_backward(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let gt = self.grid.transform();
        let (px, py) = gt.geo_to_pixel(c.x, c.y);
        let p = Coord { x: px, y: py };

        let Some((ix, iy)) = self.locate(p) else {
            return Ok(c);
        };

        let quad = self.grid.cell_corners(ix, iy);
        let inv = inverse_bilinear(p, &quad).map_err(|failure| Error::AmbiguousInverseMapping {
            x: c.x,
            y: c.y,
            cell_x: ix,
            cell_y: iy,
            reason: failure.reason().to_string(),
        })?;
        if inv.candidates > 1 {
            debug!(
                "({}, {}) in cell ({}, {}): picked u = {}, v = {} out of {} candidates",
                c.x, c.y, ix, iy, inv.u, inv.v, inv.candidates
            );
        }

        let (x, y) = gt.pixel_to_geo(ix as f64 + inv.u, iy as f64 + inv.v);
        Ok(Coord { x, y })
    }

    /// Cell whose deformed quad contains the pixel-space point `p`
    pub fn locate(&self, p: Coord<f64>) -> Option<(usize, usize)> {
        (0..self.grid.ysize())
            .flat_map(|iy| (0..self.grid.xsize()).map(move |ix| (ix, iy)))
            .find(|&(ix, iy)| point_in_quad(p, &self.grid.cell_corners(ix, iy)))
    }
}
