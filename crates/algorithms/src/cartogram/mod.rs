//! Density-equalizing cartograms (Gastner–Newman diffusion method)
//!
//! A density raster is diffused in the cosine-transform domain while the
//! corners of its cells are carried along by the resulting flow. When the
//! density has become uniform, every deformed cell covers an area
//! proportional to its original density. The deformed lattice is returned as
//! a [`MorphGrid`].
//!
//! Reference:
//! Gastner, M.T. & Newman, M.E.J. (2004). Diffusion-based method for
//!   producing density-equalizing maps. PNAS 101(20), 7499–7504.

mod integrator;
mod spectral;
mod velocity;

pub use integrator::{
    completion, AdaptiveIntegrator, IntegrationSummary, IntegratorParams, IntegratorState,
    StepReport,
};
pub use spectral::{variance, SpectralDensity, SNAPSHOT_SLOTS};
pub use velocity::VelocityField;

use cartomorph_core::raster::Raster;
use cartomorph_core::{Algorithm, Error, MorphGrid, Result};
use tracing::info;

/// Parameters for density equalization
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizeParams {
    /// Fraction of the mean density added to every cell (default 0.001)
    pub offset: f64,
    /// Integrator settings
    pub integrator: IntegratorParams,
}

impl Default for EqualizeParams {
    fn default() -> Self {
        Self {
            offset: 0.001,
            integrator: IntegratorParams::default(),
        }
    }
}

/// Density equalization algorithm
#[derive(Debug, Clone, Default)]
pub struct EqualizeDensity;

impl Algorithm for EqualizeDensity {
    type Input = Raster<f64>;
    type Output = MorphGrid;
    type Params = EqualizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "EqualizeDensity"
    }

    fn description(&self) -> &'static str {
        "Compute a density-equalizing morphing grid from a density raster"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        equalize_density(&input, params)
    }
}

/// Compute the morphing grid that equalizes `density`.
///
/// The grid has one cell per raster cell and inherits the raster's
/// georeference.
pub fn equalize_density(density: &Raster<f64>, params: EqualizeParams) -> Result<MorphGrid> {
    equalize_density_with_progress(density, params, |_| {}).map(|(grid, _)| grid)
}

/// Like [`equalize_density`], reporting every macro-step to `observer`
pub fn equalize_density_with_progress<F>(
    density: &Raster<f64>,
    params: EqualizeParams,
    observer: F,
) -> Result<(MorphGrid, IntegrationSummary)>
where
    F: FnMut(&StepReport),
{
    params.integrator.validate()?;
    let (rows, cols) = density.shape();

    let field = SpectralDensity::new(density, params.offset)?;
    let mut integrator = AdaptiveIntegrator::new(field, params.integrator)?;
    let summary = integrator.run(observer);

    info!(
        "{}x{} grid {:?} after {} steps (t = {:.3e})",
        cols, rows, summary.state, summary.steps, summary.time
    );

    let grid = MorphGrid::from_points(cols, rows, *density.transform(), integrator.points())?;
    Ok((grid, summary))
}
