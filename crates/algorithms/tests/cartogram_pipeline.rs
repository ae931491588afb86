//! End-to-end tests: density raster → morphing grid → file → mapping.
//!
//! Small synthetic densities are equalized with the default parameters and
//! the resulting grids are checked for the geometric properties a cartogram
//! must have.

use approx::assert_relative_eq;
use cartomorph_algorithms::cartogram::{
    equalize_density, variance, AdaptiveIntegrator, EqualizeParams, IntegratorParams,
    IntegratorState, SpectralDensity, VelocityField,
};
use cartomorph_algorithms::morph::{
    cell_areas, grid_lines, project_geometry, CoordinateMapper, Direction, GridLineParams,
};
use cartomorph_core::io::{read_morph_grid, write_morph_grid};
use cartomorph_core::{GeoTransform, MorphGrid, Raster};
use geo::{Area, Coord, Geometry, LineString, Polygon};
use ndarray::Array2;

fn density(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut raster = Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)));
    raster.set_transform(GeoTransform::new(
        400_000.0,
        6_000_000.0,
        250.0,
        -250.0,
    ));
    raster
}

/// 8×8 density with a hot block in the lower right
fn hot_block() -> Raster<f64> {
    density(8, 8, |r, c| if r >= 5 && c >= 5 { 40.0 } else { 2.0 })
}

/// Coefficient of variation
fn spread(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() / mean
}

// ---------------------------------------------------------------------------
// Hot corner
// ---------------------------------------------------------------------------

#[test]
fn hot_corner_pushes_inner_vertex_away() {
    let raster = density(2, 2, |r, c| if r == 1 && c == 1 { 100.0 } else { 1.0 });
    let grid = equalize_density(&raster, EqualizeParams::default()).unwrap();

    let inner = grid.vertex(1, 1).unwrap();
    assert!(inner.x < 1.0, "inner vertex x = {}", inner.x);
    assert!(inner.y < 1.0, "inner vertex y = {}", inner.y);

    for (ix, iy) in [(0, 0), (2, 0), (0, 2), (2, 2)] {
        let corner = grid.vertex(ix, iy).unwrap();
        assert_eq!(corner, Coord { x: ix as f64, y: iy as f64 });
    }

    let areas = cell_areas(&grid);
    let hot = areas.get(1, 1).unwrap();
    for (row, col) in [(0, 0), (0, 1), (1, 0)] {
        assert!(hot > areas.get(row, col).unwrap());
    }
}

// ---------------------------------------------------------------------------
// Conservation and equalization
// ---------------------------------------------------------------------------

#[test]
fn total_area_is_conserved() {
    let raster = hot_block();
    let grid = equalize_density(&raster, EqualizeParams::default()).unwrap();
    let areas = cell_areas(&grid);

    let original = 8.0 * 8.0 * raster.transform().cell_area();
    assert_relative_eq!(areas.data().sum(), original, max_relative = 1e-9);
}

#[test]
fn density_per_area_becomes_more_uniform() {
    let raster = hot_block();
    let grid = equalize_density(&raster, EqualizeParams::default()).unwrap();
    let areas = cell_areas(&grid);

    let input: Vec<f64> = raster.data().iter().copied().collect();
    let equalized: Vec<f64> = raster
        .data()
        .iter()
        .zip(areas.data().iter())
        .map(|(rho, area)| rho / area)
        .collect();

    assert!(
        spread(&equalized) < spread(&input),
        "spread went from {} to {}",
        spread(&input),
        spread(&equalized)
    );
}

#[test]
fn boundary_vertices_stay_on_boundary() {
    let grid = equalize_density(&hot_block(), EqualizeParams::default()).unwrap();
    let (w, h) = (grid.xsize(), grid.ysize());

    for ix in 0..=w {
        assert_eq!(grid.vertex(ix, 0).unwrap().y, 0.0);
        assert_eq!(grid.vertex(ix, h).unwrap().y, h as f64);
    }
    for iy in 0..=h {
        assert_eq!(grid.vertex(0, iy).unwrap().x, 0.0);
        assert_eq!(grid.vertex(w, iy).unwrap().x, w as f64);
    }
}

// ---------------------------------------------------------------------------
// Diffusion
// ---------------------------------------------------------------------------

#[test]
fn variance_never_increases() {
    let field = SpectralDensity::new(&hot_block(), 0.001).unwrap();
    let mut integrator = AdaptiveIntegrator::new(field, IntegratorParams::default()).unwrap();

    let mut last = variance(integrator.current_density());
    while integrator.step().is_some() {
        let v = variance(integrator.current_density());
        assert!(v <= last * (1.0 + 1e-12) + 1e-24, "{} -> {}", last, v);
        last = v;
    }
    assert_eq!(integrator.state(), IntegratorState::Converged);
}

#[test]
fn velocity_boundary_conditions() {
    let mut field = SpectralDensity::new(&hot_block(), 0.001).unwrap();
    let velocities = VelocityField::from_density(field.density_at(0.0, 0));
    let (w, h) = (velocities.width(), velocities.height());

    for (ix, iy) in [(0, 0), (w, 0), (0, h), (w, h)] {
        assert_eq!(velocities.vertex(ix, iy), Some(Coord { x: 0.0, y: 0.0 }));
    }
    for ix in 1..w {
        assert_eq!(velocities.vertex(ix, 0).unwrap().y, 0.0);
        assert_eq!(velocities.vertex(ix, h).unwrap().y, 0.0);
    }
    for iy in 1..h {
        assert_eq!(velocities.vertex(0, iy).unwrap().x, 0.0);
        assert_eq!(velocities.vertex(w, iy).unwrap().x, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

#[test]
fn forward_then_backward_is_identity() {
    let raster = hot_block();
    let grid = equalize_density(&raster, EqualizeParams::default()).unwrap();
    let mapper = CoordinateMapper::new(&grid);
    let gt = raster.transform();

    for &(px, py) in &[(0.5, 0.5), (3.3, 4.1), (5.5, 5.5), (7.25, 6.75), (1.9, 7.6)] {
        let (x, y) = gt.pixel_to_geo(px, py);
        let c = Coord { x, y };
        let back = mapper.try_backward(mapper.forward(c)).unwrap();
        assert_relative_eq!(back.x, c.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, c.y, epsilon = 1e-5);
    }
}

#[test]
fn identity_grid_maps_to_itself() {
    let grid = MorphGrid::regular(8, 8, *hot_block().transform()).unwrap();
    let mapper = CoordinateMapper::new(&grid);

    let c = Coord { x: 400_321.5, y: 5_998_765.25 };
    let f = mapper.forward(c);
    let b = mapper.backward(c);
    assert_relative_eq!(f.x, c.x, epsilon = 1e-6);
    assert_relative_eq!(f.y, c.y, epsilon = 1e-6);
    assert_relative_eq!(b.x, c.x, epsilon = 1e-6);
    assert_relative_eq!(b.y, c.y, epsilon = 1e-6);
}

#[test]
fn outside_points_pass_through() {
    let grid = equalize_density(&hot_block(), EqualizeParams::default()).unwrap();
    let mapper = CoordinateMapper::new(&grid);

    let far = Coord { x: 0.0, y: 0.0 };
    assert_eq!(mapper.forward(far), far);
    assert_eq!(mapper.backward(far), far);
}

#[test]
fn projected_polygon_grows_over_hot_block() {
    let raster = hot_block();
    let grid = equalize_density(&raster, EqualizeParams::default()).unwrap();
    let mapper = CoordinateMapper::new(&grid);
    let gt = raster.transform();

    // Outline of the hot block, densified along its edges
    let mut ring = Vec::new();
    let edge = |a: (f64, f64), b: (f64, f64)| {
        (0..12).map(move |k| {
            let s = k as f64 / 12.0;
            (a.0 + s * (b.0 - a.0), a.1 + s * (b.1 - a.1))
        })
    };
    for (px, py) in edge((5.0, 5.0), (7.99, 5.0))
        .chain(edge((7.99, 5.0), (7.99, 7.99)))
        .chain(edge((7.99, 7.99), (5.0, 7.99)))
        .chain(edge((5.0, 7.99), (5.0, 5.0)))
    {
        let (x, y) = gt.pixel_to_geo(px, py);
        ring.push(Coord { x, y });
    }
    let mut geom = Geometry::Polygon(Polygon::new(LineString::new(ring), vec![]));

    let before = geom.unsigned_area();
    project_geometry(&mut geom, &mapper, Direction::Forward);
    assert!(geom.unsigned_area() > before * 1.5);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn morph_file_roundtrip_is_exact() {
    let grid = equalize_density(&hot_block(), EqualizeParams::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hot_block.morph");
    write_morph_grid(&grid, &path).unwrap();
    let loaded = read_morph_grid(&path).unwrap();

    assert_eq!(loaded, grid);
    for (a, b) in loaded.x().iter().zip(grid.x().iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn grid_lines_follow_the_deformation() {
    let grid = equalize_density(&hot_block(), EqualizeParams::default()).unwrap();
    let lines = grid_lines(&grid, GridLineParams::default()).unwrap();
    assert_eq!(lines.len(), 18);

    // Fifth horizontal line is lattice row 4
    let Some(Geometry::LineString(row)) = lines.features[4].geometry.as_ref() else {
        panic!("expected a line string");
    };
    let gt = grid.transform();
    let v = grid.vertex(3, 4).unwrap();
    let (x, y) = gt.pixel_to_geo(v.x, v.y);
    assert_eq!(row.0[3], Coord { x, y });
}
