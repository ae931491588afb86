//! Adaptive step-doubling RK4 integration of points through the diffusion flow
//!
//! Each macro-step advances time by `2h` twice over: once with a single RK4
//! step of size `2h` and once with two chained steps of size `h`. The
//! difference estimates the local error, which drives the next step size,
//! and is added back as a fifth-order correction.
//!
//! Densities for `t + h/2, t + h, t + 3h/2, t + 2h` go into the four slots
//! after the current one, so a macro-step needs no density twice.

use super::spectral::{SpectralDensity, SNAPSHOT_SLOTS};
use super::velocity::VelocityField;
use crate::maybe_rayon::*;
use cartomorph_core::{Error, Result};
use geo::Coord;
use ndarray::Array2;
use tracing::{debug, warn};

/// Time by which diffusion is expected to have flattened any density
const EXPECTED_TIME: f64 = 1.0e8;

/// Parameters for the adaptive integrator
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorParams {
    /// Initial time step (default 0.001)
    pub initial_step: f64,
    /// Desired accuracy per step in pixels (default 0.01)
    pub target_error: f64,
    /// Largest factor by which the step may grow at once (default 4)
    pub max_ratio: f64,
    /// Gaussian pre-blur width in pixels; integration starts at `0.5 · blur²`
    pub blur: f64,
    /// Stop once no point moves further than this in a macro-step (default 0)
    pub min_displacement: f64,
    /// Safety valve on the number of macro-steps (default 10 000)
    pub max_steps: usize,
}

impl Default for IntegratorParams {
    fn default() -> Self {
        Self {
            initial_step: 0.001,
            target_error: 0.01,
            max_ratio: 4.0,
            blur: 0.0,
            min_displacement: 0.0,
            max_steps: 10_000,
        }
    }
}

impl IntegratorParams {
    /// Reject parameters the integrator cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be a finite positive number".into(),
                })
            }
        };
        let non_negative = |name: &'static str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be a finite non-negative number".into(),
                })
            }
        };

        positive("initial_step", self.initial_step)?;
        positive("target_error", self.target_error)?;
        non_negative("blur", self.blur)?;
        non_negative("min_displacement", self.min_displacement)?;
        if !(self.max_ratio.is_finite() && self.max_ratio >= 1.0) {
            return Err(Error::InvalidParameter {
                name: "max_ratio",
                value: self.max_ratio.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_steps == 0 {
            return Err(Error::InvalidParameter {
                name: "max_steps",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Integrator life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorState {
    Running,
    /// No point moved further than the displacement threshold
    Converged,
    /// `max_steps` macro-steps ran without convergence
    StepLimitReached,
}

impl IntegratorState {
    pub fn is_terminal(self) -> bool {
        self != IntegratorState::Running
    }
}

/// Outcome of one macro-step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based macro-step index
    pub step: usize,
    /// Time reached at the end of the step
    pub time: f64,
    /// Step size `h` used for this step
    pub step_size: f64,
    /// Largest per-point error estimate
    pub error: f64,
    /// Largest per-point displacement
    pub displacement: f64,
    /// Estimated completion in percent
    pub completion: f64,
}

/// Final state of an integration run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationSummary {
    pub state: IntegratorState,
    pub steps: usize,
    pub time: f64,
    pub last_error: f64,
    pub last_displacement: f64,
}

/// Estimated completion (0 to 100) of an integration that has reached time `t`
pub fn completion(t: f64, initial_step: f64) -> f64 {
    let pct = 100.0 * (t / initial_step).ln() / (EXPECTED_TIME / initial_step).ln();
    // ln(0) = -inf before the first step
    pct.max(0.0).min(100.0)
}

/// Moves tracked points through the time-varying flow of a diffusing density
#[derive(Debug)]
pub struct AdaptiveIntegrator {
    density: SpectralDensity,
    velocities: [VelocityField; SNAPSHOT_SLOTS],
    points: Vec<Coord<f64>>,
    params: IntegratorParams,
    slot: usize,
    time: f64,
    step_size: f64,
    steps: usize,
    state: IntegratorState,
    last_error: f64,
    last_displacement: f64,
}

impl AdaptiveIntegrator {
    /// Track the regular `(W+1)×(H+1)` lattice of cell corners
    pub fn new(density: SpectralDensity, params: IntegratorParams) -> Result<Self> {
        let (width, height) = (density.width(), density.height());
        let points = (0..=height)
            .flat_map(|iy| {
                (0..=width).map(move |ix| Coord {
                    x: ix as f64,
                    y: iy as f64,
                })
            })
            .collect();
        Self::with_points(density, points, params)
    }

    /// Track an arbitrary set of pixel-space points
    pub fn with_points(
        mut density: SpectralDensity,
        points: Vec<Coord<f64>>,
        params: IntegratorParams,
    ) -> Result<Self> {
        params.validate()?;

        let time = 0.5 * params.blur * params.blur;
        let initial = VelocityField::from_density(density.density_at(time, 0));
        let velocities = std::array::from_fn(|_| initial.clone());

        Ok(Self {
            density,
            velocities,
            points,
            step_size: params.initial_step,
            params,
            slot: 0,
            time,
            steps: 0,
            state: IntegratorState::Running,
            last_error: 0.0,
            last_displacement: f64::INFINITY,
        })
    }

    pub fn state(&self) -> IntegratorState {
        self.state
    }

    /// Current time
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Step size for the next macro-step
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Number of macro-steps done
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Current positions of the tracked points
    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coord<f64>> {
        self.points
    }

    /// Density snapshot at the current time
    pub fn current_density(&self) -> &Array2<f64> {
        self.density.snapshot(self.slot)
    }

    /// Run one macro-step. Returns `None` once the integrator is terminal.
    pub fn step(&mut self) -> Option<StepReport> {
        if self.state.is_terminal() {
            return None;
        }

        let (t, h) = (self.time, self.step_size);
        for k in 1..SNAPSHOT_SLOTS {
            let slot = (self.slot + k) % SNAPSHOT_SLOTS;
            let density = self.density.density_at(t + 0.5 * k as f64 * h, slot);
            self.velocities[slot] = VelocityField::from_density(density);
        }

        let width = self.density.width() as f64;
        let height = self.density.height() as f64;
        let velocities = &self.velocities;
        let slot = self.slot;
        let ring: [&VelocityField; SNAPSHOT_SLOTS] =
            std::array::from_fn(|k| &velocities[(slot + k) % SNAPSHOT_SLOTS]);

        let per_point: Vec<(f64, f64)> = self
            .points
            .par_iter_mut()
            .map(|p| {
                let (moved, error_sq, displacement_sq) = advance(*p, h, &ring);
                *p = Coord {
                    x: moved.x.max(0.0).min(width),
                    y: moved.y.max(0.0).min(height),
                };
                (error_sq, displacement_sq)
            })
            .collect();

        let (error_sq, displacement_sq) = per_point
            .iter()
            .fold((0.0f64, 0.0f64), |(e, d), &(pe, pd)| (e.max(pe), d.max(pd)));
        let error = error_sq.sqrt();
        let displacement = displacement_sq.sqrt();

        self.time = t + 2.0 * h;
        self.slot = (self.slot + SNAPSHOT_SLOTS - 1) % SNAPSHOT_SLOTS;
        self.steps += 1;
        self.step_size = h * (2.0 * self.params.target_error / error)
            .powf(0.2)
            .min(self.params.max_ratio);
        self.last_error = error;
        self.last_displacement = displacement;

        let report = StepReport {
            step: self.steps,
            time: self.time,
            step_size: h,
            error,
            displacement,
            completion: completion(self.time, self.params.initial_step),
        };
        debug!(
            "step {}: t = {:.6e}, h = {:.6e}, error = {:.3e}, displacement = {:.3e}",
            report.step, report.time, h, error, displacement
        );

        if displacement <= self.params.min_displacement {
            self.state = IntegratorState::Converged;
        } else if self.steps >= self.params.max_steps {
            warn!(
                "integration stopped after {} steps without converging (displacement {:.3e})",
                self.steps, displacement
            );
            self.state = IntegratorState::StepLimitReached;
        }

        Some(report)
    }

    /// Step until terminal, handing every report to `observer`
    pub fn run<F>(&mut self, mut observer: F) -> IntegrationSummary
    where
        F: FnMut(&StepReport),
    {
        while let Some(report) = self.step() {
            observer(&report);
        }
        self.summary()
    }

    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            state: self.state,
            steps: self.steps,
            time: self.time,
            last_error: self.last_error,
            last_displacement: self.last_displacement,
        }
    }
}

/// One RK4 step of size `h` from `p`, given the velocity at `p`
#[inline]
fn rk4(
    p: Coord<f64>,
    h: f64,
    v1: Coord<f64>,
    mid: &VelocityField,
    end: &VelocityField,
) -> Coord<f64> {
    let k1 = v1 * h;
    let k2 = mid.velocity_at(p + k1 * 0.5) * h;
    let k3 = mid.velocity_at(p + k2 * 0.5) * h;
    let k4 = end.velocity_at(p + k3) * h;
    (k1 + k4 + (k2 + k3) * 2.0) / 6.0
}

/// Step-doubled advance of one point over `2h`.
///
/// `ring[k]` holds the velocities at `t + k·h/2`. Returns the new (unclamped)
/// position with the squared error and squared displacement.
#[inline]
fn advance(p: Coord<f64>, h: f64, ring: &[&VelocityField; SNAPSHOT_SLOTS]) -> (Coord<f64>, f64, f64) {
    let v1 = ring[0].velocity_at(p);

    let big = rk4(p, 2.0 * h, v1, ring[2], ring[4]);

    let small1 = rk4(p, h, v1, ring[1], ring[2]);
    let p1 = p + small1;
    let small2 = rk4(p1, h, ring[2].velocity_at(p1), ring[3], ring[4]);

    let e = (small1 + small2 - big) / 15.0;
    let total = small1 + small2 + e;

    (p + total, e.x * e.x + e.y * e.y, total.x * total.x + total.y * total.y)
}
