//! CartoMorph CLI - density-equalizing cartograms

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geo::{Coord, Intersects, Rect};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cartomorph_algorithms::cartogram::{
    equalize_density_with_progress, EqualizeParams, IntegratorParams, IntegratorState,
};
use cartomorph_algorithms::morph::{
    cell_areas, grid_lines, project_features, CoordinateMapper, Direction, GridLineParams,
};
use cartomorph_core::io::{
    read_geojson, read_geotiff, read_morph_grid, write_geojson, write_geotiff, write_morph_grid,
};
use cartomorph_core::vector::FeatureCollection;
use cartomorph_core::{MorphGrid, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cartomorph")]
#[command(author, version, about = "Density-equalizing cartograms", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a morphing grid that equalizes a density raster
    Equalize {
        /// Input density raster (GeoTIFF)
        input: PathBuf,
        /// Output morphing grid file
        output: PathBuf,
        /// Fraction of the mean density added to every cell
        #[arg(long, default_value = "0.001")]
        offset: f64,
        /// Gaussian pre-blur width in pixels
        #[arg(long, default_value = "0.0")]
        blur: f64,
        /// Initial integration time step
        #[arg(long, default_value = "0.001")]
        initial_step: f64,
        /// Desired accuracy per step in pixels
        #[arg(long, default_value = "0.01")]
        target_error: f64,
        /// Largest factor by which the step may grow at once
        #[arg(long, default_value = "4.0")]
        max_ratio: f64,
        /// Stop once no vertex moves further than this in a step
        #[arg(long, default_value = "0.0")]
        min_displacement: f64,
        /// Upper bound on the number of integration steps
        #[arg(long, default_value = "10000")]
        max_steps: usize,
    },
    /// Map coordinates or GeoJSON features through a morphing grid
    Transform {
        /// Morphing grid file
        #[arg(short, long)]
        morph: PathBuf,
        /// Map from the cartogram back to the original map
        #[arg(short, long)]
        back: bool,
        /// Input GeoJSON file; reads `x y` pairs from stdin when omitted
        #[arg(requires = "output")]
        input: Option<PathBuf>,
        /// Output GeoJSON file
        output: Option<PathBuf>,
        /// Comma-separated attributes to copy (all when omitted, none when empty)
        #[arg(long)]
        attrs: Option<String>,
        /// Only transform features intersecting `xmin,ymin,xmax,ymax`
        #[arg(short, long, value_name = "XMIN,YMIN,XMAX,YMAX", allow_hyphen_values = true)]
        spatial_filter: Option<String>,
    },
    /// Write the area of every deformed cell as a raster
    AreaGrid {
        /// Morphing grid file
        input: PathBuf,
        /// Output raster (GeoTIFF)
        output: PathBuf,
    },
    /// Write the deformed lattice lines as GeoJSON
    GridLines {
        /// Morphing grid file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Approximate number of lines along the longer side
        #[arg(short, long, default_value = "100")]
        grid_size: usize,
    },
    /// Show information about a morphing grid file
    Info {
        /// Morphing grid file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn read_density(path: &PathBuf) -> Result<Raster<f64>> {
    let pb = spinner("Reading density raster...");
    let raster: Raster<f64> = read_geotiff(path).context("Failed to read density raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_grid(path: &PathBuf) -> Result<MorphGrid> {
    let pb = spinner("Reading morphing grid...");
    let grid = read_morph_grid(path)
        .with_context(|| format!("Failed to read morphing grid {}", path.display()))?;
    pb.finish_and_clear();
    Ok(grid)
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Split a coordinate line on any of `, ; space tab`.
///
/// Blank lines yield `None`.
fn parse_coordinate(line: &str) -> Result<Option<Coord<f64>>> {
    let fields: Vec<&str> = line
        .split(|c: char| matches!(c, ',' | ';' | ' ' | '\t'))
        .filter(|f| !f.is_empty())
        .collect();
    match fields.as_slice() {
        [] => Ok(None),
        [x, y] => {
            let x: f64 = x.parse().with_context(|| format!("Invalid x coordinate: {}", x))?;
            let y: f64 = y.parse().with_context(|| format!("Invalid y coordinate: {}", y))?;
            Ok(Some(Coord { x, y }))
        }
        _ => anyhow::bail!("Expected 'x y', got: {}", line.trim()),
    }
}

/// Parse `xmin,ymin,xmax,ymax` into a rectangle
fn parse_bbox(text: &str) -> Result<Rect<f64>> {
    let values = text
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid spatial filter value: {}", v.trim()))
        })
        .collect::<Result<Vec<f64>>>()?;
    match values.as_slice() {
        &[xmin, ymin, xmax, ymax] => Ok(Rect::new(
            Coord { x: xmin, y: ymin },
            Coord { x: xmax, y: ymax },
        )),
        _ => anyhow::bail!("Expected 'xmin,ymin,xmax,ymax', got: {}", text),
    }
}

/// Drop features that miss `bbox`, including those without geometry
fn apply_spatial_filter(features: &mut FeatureCollection, bbox: &Rect<f64>) {
    features
        .features
        .retain(|f| f.geometry.as_ref().is_some_and(|g| bbox.intersects(g)));
}

/// `None` keeps every attribute; an empty list keeps none
fn parse_attrs(attrs: Option<&str>) -> Option<Vec<String>> {
    attrs.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    })
}

fn transform_stream<R: BufRead, W: Write>(
    mapper: &CoordinateMapper<'_>,
    direction: Direction,
    input: R,
    mut output: W,
) -> Result<usize> {
    let mut count = 0;
    for (n, line) in input.lines().enumerate() {
        let line = line.context("Failed to read standard input")?;
        let Some(c) = parse_coordinate(&line).with_context(|| format!("Line {}", n + 1))? else {
            continue;
        };
        let mapped = mapper.project(c, direction);
        writeln!(output, "{}\t{}", mapped.x, mapped.y)?;
        count += 1;
    }
    output.flush()?;
    Ok(count)
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Equalize ─────────────────────────────────────────────────
        Commands::Equalize {
            input,
            output,
            offset,
            blur,
            initial_step,
            target_error,
            max_ratio,
            min_displacement,
            max_steps,
        } => {
            let density = read_density(&input)?;
            let params = EqualizeParams {
                offset,
                integrator: IntegratorParams {
                    initial_step,
                    target_error,
                    max_ratio,
                    blur,
                    min_displacement,
                    max_steps,
                },
            };

            let pb = progress_bar();
            let start = Instant::now();
            let (grid, summary) = equalize_density_with_progress(&density, params, |report| {
                pb.set_position(report.completion as u64);
                pb.set_message(format!(
                    "step {} (displacement {:.2e})",
                    report.step, report.displacement
                ));
            })
            .context("Failed to equalize density")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            match summary.state {
                IntegratorState::StepLimitReached => eprintln!(
                    "Warning: stopped after {} steps without converging",
                    summary.steps
                ),
                _ => info!("Converged after {} steps", summary.steps),
            }

            write_morph_grid(&grid, &output).context("Failed to write morphing grid")?;
            done("Morphing grid", &output, elapsed);
        }

        // ── Transform ────────────────────────────────────────────────
        Commands::Transform {
            morph,
            back,
            input,
            output,
            attrs,
            spatial_filter,
        } => {
            let bbox = spatial_filter.as_deref().map(parse_bbox).transpose()?;
            let grid = read_grid(&morph)?;
            let mapper = CoordinateMapper::new(&grid);
            let direction = if back {
                Direction::Backward
            } else {
                Direction::Forward
            };

            match (input, output) {
                (Some(input), Some(output)) => {
                    let mut features = read_geojson(&input)
                        .with_context(|| format!("Failed to read {}", input.display()))?;
                    if let Some(bbox) = &bbox {
                        let before = features.len();
                        apply_spatial_filter(&mut features, bbox);
                        info!("Spatial filter kept {} of {} features", features.len(), before);
                    }
                    if let Some(keep) = parse_attrs(attrs.as_deref()) {
                        features
                            .iter_mut()
                            .for_each(|f| f.retain_properties(keep.as_slice()));
                    }

                    let start = Instant::now();
                    project_features(&mut features, &mapper, direction);
                    let elapsed = start.elapsed();

                    write_geojson(&features, &output).context("Failed to write output")?;
                    info!("Transformed {} features", features.len());
                    done("Layer", &output, elapsed);
                }
                _ => {
                    if bbox.is_some() {
                        warn!("Spatial filter only applies to GeoJSON input");
                    }
                    let stdin = io::stdin();
                    let stdout = io::stdout();
                    let count = transform_stream(
                        &mapper,
                        direction,
                        stdin.lock(),
                        BufWriter::new(stdout.lock()),
                    )?;
                    info!("Transformed {} coordinates", count);
                }
            }
        }

        // ── Area grid ────────────────────────────────────────────────
        Commands::AreaGrid { input, output } => {
            let grid = read_grid(&input)?;
            let start = Instant::now();
            let areas = cell_areas(&grid);
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...");
            write_geotiff(&areas, &output).context("Failed to write output")?;
            pb.finish_and_clear();
            done("Cell areas", &output, elapsed);
        }

        // ── Grid lines ───────────────────────────────────────────────
        Commands::GridLines {
            input,
            output,
            grid_size,
        } => {
            let grid = read_grid(&input)?;
            let start = Instant::now();
            let lines = grid_lines(&grid, GridLineParams { grid_size })
                .context("Failed to build grid lines")?;
            let elapsed = start.elapsed();

            write_geojson(&lines, &output).context("Failed to write output")?;
            info!("{} lines", lines.len());
            done("Grid lines", &output, elapsed);
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let grid = read_grid(&input)?;
            let gt = grid.transform();
            let [topleftx, weres, rot1, toplefty, rot2, nsres] = gt.coefficients();
            let (xmin, ymin, xmax, ymax) = gt.bounds(grid.xsize(), grid.ysize());
            let total_area = cell_areas(&grid).data().sum();

            println!("File: {}", input.display());
            println!(
                "Grid: {} x {} cells ({} vertices)",
                grid.xsize(),
                grid.ysize(),
                (grid.xsize() + 1) * (grid.ysize() + 1)
            );
            println!("Georeference:");
            println!("  Top-left: ({}, {})", topleftx, toplefty);
            println!("  Resolution: {} x {}", weres, nsres);
            println!("  Rotation: {}, {}", rot1, rot2);
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                xmin, ymin, xmax, ymax
            );
            println!("Max vertex displacement: {:.4} cells", grid.max_displacement());
            println!(
                "Total deformed area: {:.4} (original {:.4})",
                total_area,
                (grid.xsize() * grid.ysize()) as f64 * gt.cell_area()
            );
        }
    }

    Ok(())
}
