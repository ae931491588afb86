//! Hot-spot demo: equalize a synthetic density and write every product
//!
//! Builds a 60x40 density with a uniform background (value 1) and two hot
//! spots (values 30 and 12), then writes:
//!   1. density.tif     : the synthetic input
//!   2. hot_spot.morph  : the morphing grid
//!   3. areas.tif       : deformed cell areas
//!   4. grid_lines.json : deformed lattice lines
//!   5. outline.json    : a square around the first hot spot, projected
//!
//! Run:
//!   cargo run -p cartomorph-algorithms --example hot_spot_demo

use std::fs;
use std::path::Path;

use cartomorph_algorithms::cartogram::{equalize_density_with_progress, EqualizeParams};
use cartomorph_algorithms::morph::{
    cell_areas, grid_lines, project_features, CoordinateMapper, Direction, GridLineParams,
};
use cartomorph_core::io::{write_geojson, write_geotiff, write_morph_grid};
use cartomorph_core::vector::{Feature, FeatureCollection};
use cartomorph_core::{GeoTransform, Raster};
use geo::{polygon, Area, Geometry};

const ROWS: usize = 40;
const COLS: usize = 60;

fn main() {
    let out_dir = Path::new("output/hot_spot_demo");
    fs::create_dir_all(out_dir).expect("Cannot create output directory");

    // --- 1. Build synthetic density ---
    let density = build_density();
    println!("Synthetic density: {}x{}", COLS, ROWS);
    write_geotiff(&density, out_dir.join("density.tif")).expect("write density");

    // --- 2. Equalize ---
    let (grid, summary) =
        equalize_density_with_progress(&density, EqualizeParams::default(), |report| {
            if report.step % 10 == 0 {
                println!(
                    "  step {:>4}  t = {:.3e}  displacement = {:.3e}  ({:.0}%)",
                    report.step, report.time, report.displacement, report.completion
                );
            }
        })
        .expect("equalization failed");
    println!(
        "\n{:?} after {} steps, max vertex displacement {:.3} cells",
        summary.state,
        summary.steps,
        grid.max_displacement()
    );
    write_morph_grid(&grid, out_dir.join("hot_spot.morph")).expect("write grid");

    // --- 3. Cell areas ---
    let areas = cell_areas(&grid);
    let stats = areas.statistics();
    println!(
        "Cell areas: min {:.1}, max {:.1}, total {:.1}",
        stats.min.unwrap_or(f64::NAN),
        stats.max.unwrap_or(f64::NAN),
        areas.data().sum()
    );
    write_geotiff(&areas, out_dir.join("areas.tif")).expect("write areas");

    // --- 4. Grid lines ---
    let lines = grid_lines(&grid, GridLineParams { grid_size: 20 }).expect("grid lines");
    println!("Grid lines: {}", lines.len());
    write_geojson(&lines, out_dir.join("grid_lines.json")).expect("write lines");

    // --- 5. Project an outline ---
    let mut outline = FeatureCollection::new();
    let mut square = Feature::new(Geometry::Polygon(polygon![
        (x: 1150.0, y: 4850.0),
        (x: 1250.0, y: 4850.0),
        (x: 1250.0, y: 4750.0),
        (x: 1150.0, y: 4750.0),
    ]));
    square.set_property("NAME", "hot spot");
    outline.push(square);

    let before = area_of(&outline);
    project_features(&mut outline, &CoordinateMapper::new(&grid), Direction::Forward);
    println!(
        "Hot spot outline area: {:.0} -> {:.0}",
        before,
        area_of(&outline)
    );
    write_geojson(&outline, out_dir.join("outline.json")).expect("write outline");

    println!("\nAll outputs written to {}", out_dir.display());
}

fn build_density() -> Raster<f64> {
    let mut density = Raster::filled(ROWS, COLS, 1.0);
    density.set_transform(GeoTransform::new(1000.0, 5000.0, 10.0, -10.0));

    for row in 0..ROWS {
        for col in 0..COLS {
            let d1 = ((row as f64 - 20.0).powi(2) + (col as f64 - 20.0).powi(2)).sqrt();
            let d2 = ((row as f64 - 30.0).powi(2) + (col as f64 - 45.0).powi(2)).sqrt();
            if d1 < 5.0 {
                density.set(row, col, 30.0).unwrap();
            } else if d2 < 4.0 {
                density.set(row, col, 12.0).unwrap();
            }
        }
    }
    density
}

fn area_of(features: &FeatureCollection) -> f64 {
    features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(|g| g.unsigned_area())
        .sum()
}
