//! Morphing grid: the deformed lattice produced by density equalization
//!
//! A morphing grid of `xsize × ysize` cells stores one deformed position per
//! lattice vertex, `(xsize + 1) × (ysize + 1)` in total. Positions are kept in
//! the pixel space of the source raster; the georeference converts them to
//! map coordinates.

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use geo_types::Coord;
use ndarray::Array2;

/// Deformed coordinate lattice plus the georeference of the source raster.
///
/// Vertex `(ix, iy)` is stored at array index `[iy, ix]`; `iy` grows with
/// the raster row.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphGrid {
    xsize: usize,
    ysize: usize,
    transform: GeoTransform,
    x: Array2<f64>,
    y: Array2<f64>,
}

impl MorphGrid {
    /// Undeformed grid: every vertex sits on its lattice position
    pub fn regular(xsize: usize, ysize: usize, transform: GeoTransform) -> Result<Self> {
        check_size(xsize, ysize)?;
        let x = Array2::from_shape_fn((ysize + 1, xsize + 1), |(_, ix)| ix as f64);
        let y = Array2::from_shape_fn((ysize + 1, xsize + 1), |(iy, _)| iy as f64);
        Ok(Self {
            xsize,
            ysize,
            transform,
            x,
            y,
        })
    }

    /// Build a grid from deformed X and Y arrays of shape `(ysize + 1, xsize + 1)`
    pub fn from_arrays(
        xsize: usize,
        ysize: usize,
        transform: GeoTransform,
        x: Array2<f64>,
        y: Array2<f64>,
    ) -> Result<Self> {
        check_size(xsize, ysize)?;
        let expected = (ysize + 1, xsize + 1);
        if x.dim() != expected || y.dim() != expected {
            return Err(Error::InvalidDimensions {
                width: x.ncols().saturating_sub(1),
                height: x.nrows().saturating_sub(1),
            });
        }
        Ok(Self {
            xsize,
            ysize,
            transform,
            x,
            y,
        })
    }

    /// Build a grid from a row-major (y outer, x inner) sequence of vertex positions
    pub fn from_points(
        xsize: usize,
        ysize: usize,
        transform: GeoTransform,
        points: &[Coord<f64>],
    ) -> Result<Self> {
        check_size(xsize, ysize)?;
        let n = (xsize + 1) * (ysize + 1);
        if points.len() != n {
            return Err(Error::Algorithm(format!(
                "expected {} lattice points for a {}x{} grid, got {}",
                n,
                xsize,
                ysize,
                points.len()
            )));
        }
        let x = Array2::from_shape_fn((ysize + 1, xsize + 1), |(iy, ix)| {
            points[iy * (xsize + 1) + ix].x
        });
        let y = Array2::from_shape_fn((ysize + 1, xsize + 1), |(iy, ix)| {
            points[iy * (xsize + 1) + ix].y
        });
        Ok(Self {
            xsize,
            ysize,
            transform,
            x,
            y,
        })
    }

    /// Number of cells along X
    pub fn xsize(&self) -> usize {
        self.xsize
    }

    /// Number of cells along Y
    pub fn ysize(&self) -> usize {
        self.ysize
    }

    /// Georeference of the source raster
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Deformed pixel-space X of every vertex
    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Deformed pixel-space Y of every vertex
    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    /// Deformed pixel-space position of vertex (ix, iy)
    pub fn vertex(&self, ix: usize, iy: usize) -> Result<Coord<f64>> {
        match (self.x.get((iy, ix)), self.y.get((iy, ix))) {
            (Some(&x), Some(&y)) => Ok(Coord { x, y }),
            _ => Err(Error::IndexOutOfBounds {
                row: iy,
                col: ix,
                rows: self.ysize + 1,
                cols: self.xsize + 1,
            }),
        }
    }

    /// Move vertex (ix, iy) to a new pixel-space position
    pub fn set_vertex(&mut self, ix: usize, iy: usize, position: Coord<f64>) -> Result<()> {
        let (rows, cols) = (self.ysize + 1, self.xsize + 1);
        match (self.x.get_mut((iy, ix)), self.y.get_mut((iy, ix))) {
            (Some(x), Some(y)) => {
                *x = position.x;
                *y = position.y;
                Ok(())
            }
            _ => Err(Error::IndexOutOfBounds {
                row: iy,
                col: ix,
                rows,
                cols,
            }),
        }
    }

    /// Deformed corners of cell (ix, iy) in the order
    /// `(ix, iy), (ix+1, iy), (ix+1, iy+1), (ix, iy+1)`.
    ///
    /// Callers index cells in `0..xsize × 0..ysize`.
    #[inline]
    pub fn cell_corners(&self, ix: usize, iy: usize) -> [Coord<f64>; 4] {
        let at = |i: usize, j: usize| Coord {
            x: self.x[(j, i)],
            y: self.y[(j, i)],
        };
        [at(ix, iy), at(ix + 1, iy), at(ix + 1, iy + 1), at(ix, iy + 1)]
    }

    /// All vertices in row-major order (y outer, x inner)
    pub fn points(&self) -> Vec<Coord<f64>> {
        self.x
            .iter()
            .zip(self.y.iter())
            .map(|(&x, &y)| Coord { x, y })
            .collect()
    }

    /// Largest distance any vertex moved away from its lattice position
    pub fn max_displacement(&self) -> f64 {
        self.x
            .indexed_iter()
            .zip(self.y.iter())
            .map(|(((iy, ix), &x), &y)| {
                let dx = x - ix as f64;
                let dy = y - iy as f64;
                (dx * dx + dy * dy).sqrt()
            })
            .fold(0.0, f64::max)
    }
}

fn check_size(xsize: usize, ysize: usize) -> Result<()> {
    if xsize == 0 || ysize == 0 {
        return Err(Error::InvalidDimensions {
            width: xsize,
            height: ysize,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_grid() {
        let grid = MorphGrid::regular(3, 2, GeoTransform::identity()).unwrap();
        assert_eq!(grid.x().dim(), (3, 4));
        assert_eq!(grid.vertex(3, 2).unwrap(), Coord { x: 3.0, y: 2.0 });
        assert_eq!(grid.max_displacement(), 0.0);
        assert!(grid.vertex(4, 0).is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(MorphGrid::regular(0, 5, GeoTransform::identity()).is_err());
        assert!(MorphGrid::regular(5, 0, GeoTransform::identity()).is_err());
    }

    #[test]
    fn test_from_points_order() {
        let regular = MorphGrid::regular(2, 3, GeoTransform::default()).unwrap();
        let rebuilt =
            MorphGrid::from_points(2, 3, GeoTransform::default(), &regular.points()).unwrap();
        assert_eq!(regular, rebuilt);

        assert!(MorphGrid::from_points(2, 3, GeoTransform::default(), &[]).is_err());
    }

    #[test]
    fn test_cell_corners_and_displacement() {
        let mut grid = MorphGrid::regular(2, 2, GeoTransform::identity()).unwrap();
        grid.set_vertex(1, 1, Coord { x: 0.7, y: 1.4 }).unwrap();

        let corners = grid.cell_corners(0, 0);
        assert_eq!(corners[0], Coord { x: 0.0, y: 0.0 });
        assert_eq!(corners[1], Coord { x: 1.0, y: 0.0 });
        assert_eq!(corners[2], Coord { x: 0.7, y: 1.4 });
        assert_eq!(corners[3], Coord { x: 0.0, y: 1.0 });

        assert!((grid.max_displacement() - 0.5).abs() < 1e-12);
    }
}
