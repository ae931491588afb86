//! Coordinate mapping through a morphing grid
//!
//! Consumers of a persisted [`MorphGrid`](cartomorph_core::MorphGrid):
//! - Mapper: forward/backward projection of single coordinates
//! - Project: in-place projection of geometries and feature layers
//! - Area: deformed cell areas as a raster
//! - Lines: deformed lattice lines as line features

mod area;
mod lines;
mod mapper;
mod project;
mod quad;

pub use area::{cell_areas, CellAreas};
pub use lines::{grid_lines, GridLineParams, GridLines};
pub use mapper::{CoordinateMapper, Direction};
pub use project::{project_features, project_geometry};
pub use quad::{bilinear, inverse_bilinear, point_in_quad, InverseBilinear, RootFailure};
