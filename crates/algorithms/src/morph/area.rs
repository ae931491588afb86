//! Area of every deformed cell of a morphing grid

use crate::maybe_rayon::*;
use cartomorph_core::raster::Raster;
use cartomorph_core::{Algorithm, Error, MorphGrid, Result};
use geo::{Area, LineString, Polygon};
use ndarray::Array2;

/// Raster of deformed cell areas in map units.
///
/// The result has one value per grid cell (`ysize` rows, `xsize` columns)
/// and carries the grid's georeference, so it overlays the original
/// density raster.
pub fn cell_areas(grid: &MorphGrid) -> Raster<f64> {
    let (xsize, ysize) = (grid.xsize(), grid.ysize());
    let scale = grid.transform().cell_area();

    let areas: Vec<f64> = (0..ysize)
        .into_par_iter()
        .flat_map(|iy| {
            (0..xsize)
                .map(|ix| quad_area(grid, ix, iy) * scale)
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_fn((ysize, xsize), |(row, col)| areas[row * xsize + col]);
    let mut raster = Raster::from_array(data);
    raster.set_transform(*grid.transform());
    raster
}

/// Pixel-space area of cell (ix, iy)
fn quad_area(grid: &MorphGrid, ix: usize, iy: usize) -> f64 {
    let corners = grid.cell_corners(ix, iy);
    let ring = LineString::from(corners.to_vec());
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Cell area raster as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct CellAreas;

impl Algorithm for CellAreas {
    type Input = MorphGrid;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "CellAreas"
    }

    fn description(&self) -> &'static str {
        "Area of every deformed cell of a morphing grid, in map units"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        Ok(cell_areas(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cartomorph_core::GeoTransform;
    use geo::Coord;

    #[test]
    fn test_regular_grid_has_cell_area() {
        let gt = GeoTransform::new(500.0, 900.0, 25.0, -25.0);
        let grid = MorphGrid::regular(4, 3, gt).unwrap();
        let areas = cell_areas(&grid);

        assert_eq!(areas.shape(), (3, 4));
        assert_eq!(areas.transform(), &gt);
        for &a in areas.data().iter() {
            assert_relative_eq!(a, 625.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_moved_vertex_trades_area() {
        let mut grid = MorphGrid::regular(2, 2, GeoTransform::identity()).unwrap();
        grid.set_vertex(1, 1, Coord { x: 1.5, y: 1.5 }).unwrap();
        let areas = cell_areas(&grid);

        // Top-left cell grows, bottom-right shrinks, total is unchanged
        assert_relative_eq!(areas.get(0, 0).unwrap(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(areas.get(1, 1).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(areas.get(0, 1).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(areas.data().sum(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_algorithm_trait() {
        let grid = MorphGrid::regular(3, 2, GeoTransform::identity()).unwrap();
        let out = CellAreas.execute_default(grid).unwrap();
        assert_relative_eq!(out.data().sum(), 6.0, epsilon = 1e-12);
    }
}
