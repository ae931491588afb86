//! # CartoMorph Algorithms
//!
//! Density-equalizing cartograms and morphing-grid coordinate mapping.
//!
//! ## Modules
//!
//! - **cartogram**: spectral density diffusion, vertex velocities, adaptive
//!   RK4 integration producing a [`MorphGrid`](cartomorph_core::MorphGrid)
//! - **morph**: forward/backward coordinate mapping, geometry projection,
//!   deformed cell areas and grid lines

pub mod cartogram;
pub mod morph;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cartogram::{
        equalize_density, equalize_density_with_progress, AdaptiveIntegrator, EqualizeDensity,
        EqualizeParams, IntegrationSummary, IntegratorParams, IntegratorState, StepReport,
    };
    pub use crate::morph::{
        cell_areas, grid_lines, project_features, project_geometry, CellAreas,
        CoordinateMapper, Direction, GridLineParams, GridLines,
    };
    pub use cartomorph_core::prelude::*;
}
