//! Deformed lattice lines for visualizing a morphing grid

use cartomorph_core::vector::{Feature, FeatureCollection};
use cartomorph_core::{Algorithm, Error, MorphGrid, Result};
use geo::{Coord, Geometry, LineString};

/// Parameters for grid line extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLineParams {
    /// Approximate number of lines along the longer side (default 100)
    pub grid_size: usize,
}

impl Default for GridLineParams {
    fn default() -> Self {
        Self { grid_size: 100 }
    }
}

/// Lattice stride for `n` cells: `clamp(n / grid_size, 1, max(n / 2, 1))`
fn axis_step(n: usize, grid_size: usize) -> usize {
    (n / grid_size).clamp(1, (n / 2).max(1))
}

/// Lattice lines kept at `step`, always including the last one
fn kept_lines(n: usize, step: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = (0..=n).step_by(step).collect();
    if kept.last() != Some(&n) {
        kept.push(n);
    }
    kept
}

/// Extract horizontal then vertical lattice lines as LineStrings in map
/// coordinates.
///
/// Every feature carries `ID` (running from 1), `ROW` and `COL`. Horizontal
/// lines are numbered by `ROW` with `COL = 0`; vertical lines by `COL` with
/// `ROW = 0`.
pub fn grid_lines(grid: &MorphGrid, params: GridLineParams) -> Result<FeatureCollection> {
    if params.grid_size == 0 {
        return Err(Error::InvalidParameter {
            name: "grid_size",
            value: params.grid_size.to_string(),
            reason: "must be at least 1".into(),
        });
    }

    let (xsize, ysize) = (grid.xsize(), grid.ysize());
    let step = axis_step(xsize, params.grid_size).max(axis_step(ysize, params.grid_size));
    let gt = grid.transform();
    let to_map = |c: Coord<f64>| {
        let (x, y) = gt.pixel_to_geo(c.x, c.y);
        Coord { x, y }
    };

    let mut lines = FeatureCollection::new();
    let mut id: i64 = 0;
    let mut emit = |coords: Vec<Coord<f64>>, row: i64, col: i64| {
        id += 1;
        let mut feature = Feature::new(Geometry::LineString(LineString::new(coords)));
        feature.set_property("ID", id);
        feature.set_property("ROW", row);
        feature.set_property("COL", col);
        lines.push(feature);
    };

    for (n, iy) in kept_lines(ysize, step).into_iter().enumerate() {
        let coords = (0..=xsize)
            .map(|ix| grid.vertex(ix, iy).map(to_map))
            .collect::<Result<Vec<_>>>()?;
        emit(coords, n as i64 + 1, 0);
    }
    for (n, ix) in kept_lines(xsize, step).into_iter().enumerate() {
        let coords = (0..=ysize)
            .map(|iy| grid.vertex(ix, iy).map(to_map))
            .collect::<Result<Vec<_>>>()?;
        emit(coords, 0, n as i64 + 1);
    }

    Ok(lines)
}

/// Grid line extraction as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct GridLines;

impl Algorithm for GridLines {
    type Input = MorphGrid;
    type Output = FeatureCollection;
    type Params = GridLineParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "GridLines"
    }

    fn description(&self) -> &'static str {
        "Deformed lattice lines of a morphing grid as line features"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        grid_lines(&input, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartomorph_core::vector::AttributeValue;
    use cartomorph_core::GeoTransform;

    fn line(feature: &Feature) -> &LineString<f64> {
        match feature.geometry.as_ref() {
            Some(Geometry::LineString(ls)) => ls,
            other => panic!("expected a line string, got {:?}", other),
        }
    }

    #[test]
    fn test_axis_step() {
        assert_eq!(axis_step(1000, 100), 10);
        assert_eq!(axis_step(50, 100), 1);
        assert_eq!(axis_step(10, 1), 5);
        assert_eq!(axis_step(1, 1), 1);
    }

    #[test]
    fn test_kept_lines_include_last() {
        assert_eq!(kept_lines(4, 2), vec![0, 2, 4]);
        assert_eq!(kept_lines(5, 2), vec![0, 2, 4, 5]);
        assert_eq!(kept_lines(3, 1), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_every_lattice_line() {
        let grid = MorphGrid::regular(3, 2, GeoTransform::identity()).unwrap();
        let lines = grid_lines(&grid, GridLineParams::default()).unwrap();

        // 3 horizontal + 4 vertical
        assert_eq!(lines.len(), 7);

        let first = &lines.features[0];
        assert_eq!(first.get_property("ID"), Some(&AttributeValue::Int(1)));
        assert_eq!(first.get_property("ROW"), Some(&AttributeValue::Int(1)));
        assert_eq!(first.get_property("COL"), Some(&AttributeValue::Int(0)));
        assert_eq!(line(first).0.len(), 4);

        let last = &lines.features[6];
        assert_eq!(last.get_property("ID"), Some(&AttributeValue::Int(7)));
        assert_eq!(last.get_property("ROW"), Some(&AttributeValue::Int(0)));
        assert_eq!(last.get_property("COL"), Some(&AttributeValue::Int(4)));
        assert_eq!(line(last).0.len(), 3);
        assert_eq!(line(last).0[2], Coord { x: 3.0, y: 2.0 });
    }

    #[test]
    fn test_lines_are_in_map_coordinates() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let mut grid = MorphGrid::regular(2, 2, gt).unwrap();
        grid.set_vertex(1, 1, Coord { x: 1.5, y: 0.5 }).unwrap();
        let lines = grid_lines(&grid, GridLineParams { grid_size: 2 }).unwrap();

        let middle_row = line(&lines.features[1]);
        assert_eq!(middle_row.0[1], Coord { x: 115.0, y: 195.0 });
    }

    #[test]
    fn test_coarse_step() {
        let grid = MorphGrid::regular(10, 5, GeoTransform::identity()).unwrap();
        let lines = grid_lines(&grid, GridLineParams { grid_size: 2 }).unwrap();

        // step = max(5, 2) = 5: rows 0, 5 and columns 0, 5, 10
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_zero_grid_size_is_rejected() {
        let grid = MorphGrid::regular(2, 2, GeoTransform::identity()).unwrap();
        assert!(matches!(
            grid_lines(&grid, GridLineParams { grid_size: 0 }),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
