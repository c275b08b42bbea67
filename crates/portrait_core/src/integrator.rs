//! The multi-chart adaptive orbit integrator.
//!
//! Drives the step primitive across a requested point budget, detecting
//! crossings between charts and between vector-field branches. A trial
//! step that lands under a different placement than it started from is
//! never accepted outright: the step is bisected from the same starting
//! point until the trial placement stabilizes at the expected neighbor,
//! or the step underflows its floor and the transition is forced. This is
//! the only mechanism preventing a single numerical step from silently
//! straddling two incompatible polynomial fields or two coordinate
//! systems whose derivative formulas disagree at the boundary; it trades
//! step-size degradation near seams for correctness.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::charts::{Chart, SpherePoint};
use crate::field::VectorFieldModel;
use crate::orbit::{
    Color, IntegrationState, Orbit, OrbitKind, OrbitPoint, OrbitStatus, TerminationReason,
};
use crate::solver::rkf78_step;
use crate::traits::Drawer;

/// Settings controlling adaptive orbit integration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub h_start: f64,
    pub h_min: f64,
    pub h_max: f64,
    pub tolerance: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            h_start: 1e-2,
            h_min: 1e-6,
            h_max: 1e-1,
            tolerance: 1e-8,
        }
    }
}

impl IntegrationSettings {
    fn validate(&self) -> Result<()> {
        if !(self.h_min > 0.0) {
            bail!("h_min must be positive, got {}", self.h_min);
        }
        if self.h_max < self.h_min {
            bail!("h_max {} must not be below h_min {}", self.h_max, self.h_min);
        }
        if !(self.tolerance > 0.0) {
            bail!("tolerance must be positive, got {}", self.tolerance);
        }
        Ok(())
    }
}

/// The pair that must stay consistent across one accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub branch: usize,
    pub chart: Chart,
}

/// The coordinate-and-field environment an orbit advances through.
///
/// The global compactified system and the blown-up local system near a
/// degenerate singularity both implement this; the seam machinery above
/// is shared between them.
pub trait OrbitDomain {
    /// Local right-hand side under the given placement.
    fn eval(&self, placement: Placement, x: f64, y: f64) -> (f64, f64);

    /// Compactified representation of a local point of `chart`.
    fn to_sphere(&self, chart: Chart, u: f64, v: f64) -> SpherePoint;

    /// Local coordinates of `p` in `chart`. Only called for the chart
    /// `resolve` selected for `p`.
    fn from_sphere(&self, chart: Chart, p: SpherePoint) -> (f64, f64);

    /// The placement governing dynamics at `p`, preferring continuity
    /// with `prior`. `local` holds `p`'s coordinates in `prior`'s chart
    /// when known; domains that resolve purely from the compactified
    /// point ignore it. `None` terminates the orbit.
    fn resolve(&self, p: SpherePoint, local: (f64, f64), prior: Placement) -> Option<Placement>;

    /// Whether local time under this placement runs against true orbit
    /// time.
    fn reverses_time(&self, placement: Placement) -> bool;

    /// Step floor adopted while resolving a crossing into `placement`.
    fn seam_floor(&self, placement: Placement) -> f64;
}

/// The ordinary five-chart system over a loaded vector-field model.
pub struct GlobalDomain<'a> {
    pub model: &'a VectorFieldModel,
}

impl<'a> GlobalDomain<'a> {
    pub fn new(model: &'a VectorFieldModel) -> Self {
        Self { model }
    }
}

impl OrbitDomain for GlobalDomain<'_> {
    fn eval(&self, placement: Placement, x: f64, y: f64) -> (f64, f64) {
        self.model.branches[placement.branch]
            .fields
            .get(placement.chart)
            .eval(x, y)
    }

    fn to_sphere(&self, chart: Chart, u: f64, v: f64) -> SpherePoint {
        self.model.geometry.to_sphere(chart, u, v)
    }

    fn from_sphere(&self, chart: Chart, p: SpherePoint) -> (f64, f64) {
        self.model.geometry.from_sphere(chart, p)
    }

    fn resolve(&self, p: SpherePoint, _local: (f64, f64), prior: Placement) -> Option<Placement> {
        let branch = self.model.resolve_branch(p, prior.branch)?;
        Some(Placement {
            branch,
            chart: self.model.geometry.chart_for(p),
        })
    }

    fn reverses_time(&self, placement: Placement) -> bool {
        self.model.branches[placement.branch]
            .fields
            .get(placement.chart)
            .reverses_time
    }

    fn seam_floor(&self, placement: Placement) -> f64 {
        self.model.branches[placement.branch].h_min_seam
    }
}

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Copy)]
pub struct AdvanceReport {
    pub appended: usize,
    pub status: OrbitStatus,
}

/// Creates an orbit ready to be advanced, resolving the placement and
/// local coordinates of its start point.
pub fn start_orbit<D: OrbitDomain>(
    domain: &D,
    settings: &IntegrationSettings,
    start: SpherePoint,
    color: Color,
    kind: OrbitKind,
    direction: i8,
) -> Result<Orbit> {
    settings.validate()?;
    if direction != 1 && direction != -1 {
        bail!("direction must be +1 or -1, got {}", direction);
    }
    let seed = Placement {
        branch: 0,
        chart: Chart::R2,
    };
    let Some(placement) = domain.resolve(start, (0.0, 0.0), seed) else {
        bail!("no region of the vector field contains the start point");
    };
    let local = domain.from_sphere(placement.chart, start);
    let state = IntegrationState {
        local,
        chart: placement.chart,
        branch: placement.branch,
        h: settings.h_start.clamp(settings.h_min, settings.h_max) * direction as f64,
        direction,
        kind,
        status: OrbitStatus::Active,
    };
    Ok(Orbit::new(start, color, state))
}

enum StepOutcome {
    Accepted {
        local: (f64, f64),
        sphere: SpherePoint,
        placement: Placement,
        seam: bool,
        reversed: bool,
        next_h: f64,
    },
    Terminated(TerminationReason),
}

/// One accepted point, resolving any seam by bisection.
///
/// The episode's ceiling halves on every retry while its floor only ever
/// tightens, so the loop runs at most ceil(log2(h_max/h_min)) + 1 times.
fn resolve_step<D: OrbitDomain>(
    domain: &D,
    settings: &IntegrationSettings,
    state: &IntegrationState,
    still_valid: &mut impl FnMut(SpherePoint, (f64, f64)) -> bool,
) -> StepOutcome {
    let here = Placement {
        branch: state.branch,
        chart: state.chart,
    };
    let eval = |x, y| domain.eval(here, x, y);
    let mut floor = settings.h_min;
    let mut ceiling = settings.h_max;
    let mut h = state.h;
    let mut expected: Option<Placement> = None;

    loop {
        let (trial, next_h) = rkf78_step(&eval, state.local, h, floor, ceiling, settings.tolerance);
        let sphere = domain.to_sphere(state.chart, trial.0, trial.1);
        if !still_valid(sphere, trial) {
            return StepOutcome::Terminated(TerminationReason::LeftRegionOfInterest);
        }
        let Some(placement) = domain.resolve(sphere, trial, here) else {
            return StepOutcome::Terminated(TerminationReason::UnresolvableRegion);
        };
        if placement == here {
            return StepOutcome::Accepted {
                local: trial,
                sphere,
                placement,
                seam: false,
                reversed: false,
                next_h,
            };
        }
        if expected == Some(placement) {
            // The trial placement survived a halving: a genuine crossing
            // into this neighbor.
            let reversed = domain.reverses_time(here) != domain.reverses_time(placement);
            return StepOutcome::Accepted {
                local: trial,
                sphere,
                placement,
                seam: true,
                reversed,
                next_h,
            };
        }
        expected = Some(placement);
        floor = floor.min(domain.seam_floor(placement));
        ceiling = (ceiling * 0.5).max(floor);
        h *= 0.5;
        if h.abs() < floor {
            // Step underflow at the seam: force one step at the clamped
            // floor and flag the transition the same way.
            let forced_h = if h < 0.0 { -floor } else { floor };
            let (forced, next_h) =
                rkf78_step(&eval, state.local, forced_h, floor, floor, settings.tolerance);
            let sphere = domain.to_sphere(state.chart, forced.0, forced.1);
            if !still_valid(sphere, forced) {
                return StepOutcome::Terminated(TerminationReason::LeftRegionOfInterest);
            }
            let Some(landed) = domain.resolve(sphere, forced, here) else {
                return StepOutcome::Terminated(TerminationReason::UnresolvableRegion);
            };
            let reversed = landed != here
                && domain.reverses_time(here) != domain.reverses_time(landed);
            return StepOutcome::Accepted {
                local: forced,
                sphere,
                placement: landed,
                seam: true,
                reversed,
                next_h,
            };
        }
    }
}

/// Advances `orbit` by up to `n_points` accepted points, resuming from
/// the state stored in the orbit.
///
/// Each accepted point is appended and emitted to `drawer`: a connecting
/// segment from its predecessor when `dashes` holds, an isolated dot at a
/// flagged discontinuity. Integration stops early, keeping the computed
/// prefix, when the domain fails to resolve a placement or the caller's
/// validity predicate goes false; the orbit's status records the reason
/// and later calls append nothing.
pub fn advance<D, W>(
    domain: &D,
    settings: &IntegrationSettings,
    orbit: &mut Orbit,
    drawer: &mut W,
    mut still_valid: impl FnMut(SpherePoint, (f64, f64)) -> bool,
    n_points: usize,
) -> Result<AdvanceReport>
where
    D: OrbitDomain,
    W: Drawer + ?Sized,
{
    settings.validate()?;
    let mut appended = 0;
    while appended < n_points && orbit.state.status.is_active() {
        match resolve_step(domain, settings, &orbit.state, &mut still_valid) {
            StepOutcome::Terminated(reason) => {
                debug!(?reason, points = orbit.points.len(), "orbit terminated");
                orbit.state.status = OrbitStatus::Terminated(reason);
            }
            StepOutcome::Accepted {
                local,
                sphere,
                placement,
                seam,
                reversed,
                next_h,
            } => {
                let state = &mut orbit.state;
                if seam {
                    debug!(
                        from_branch = state.branch,
                        from_chart = ?state.chart,
                        to_branch = placement.branch,
                        to_chart = ?placement.chart,
                        reversed,
                        "seam crossing"
                    );
                }
                // Direction and kind are recomputed at every seam, never
                // silently inherited.
                let mut h = next_h.signum()
                    * next_h.abs().clamp(settings.h_min, settings.h_max);
                if seam && reversed {
                    state.direction = -state.direction;
                    h = -h;
                }
                state.kind = state.kind.recompute(seam && reversed);
                state.local = if placement.chart != state.chart {
                    domain.from_sphere(placement.chart, sphere)
                } else {
                    local
                };
                state.chart = placement.chart;
                state.branch = placement.branch;
                state.h = h;

                let point = OrbitPoint {
                    point: sphere,
                    color: orbit.color,
                    dashes: !seam,
                    direction: state.direction,
                    kind: state.kind,
                };
                match orbit.points.last() {
                    Some(prev) if point.dashes => {
                        drawer.draw_line(prev.point, sphere, orbit.color)
                    }
                    _ => drawer.draw_point(sphere, orbit.color),
                }
                orbit.points.push(point);
                appended += 1;
            }
        }
    }
    Ok(AdvanceReport {
        appended,
        status: orbit.state.status,
    })
}

/// Re-seats an orbit in `domain` after a change of representation, e.g.
/// when blow-up continuation hands off to the global chart system. The
/// placement and local coordinates are recomputed from the last accepted
/// point and the orbit becomes active again.
pub fn reseat_orbit<D: OrbitDomain>(
    domain: &D,
    settings: &IntegrationSettings,
    orbit: &mut Orbit,
) -> Result<()> {
    settings.validate()?;
    let Some(last) = orbit.points.last() else {
        bail!("cannot re-seat an orbit with no points");
    };
    let seed = Placement {
        branch: orbit.state.branch,
        chart: orbit.state.chart,
    };
    let Some(placement) = domain.resolve(last.point, orbit.state.local, seed) else {
        bail!("no region of the vector field contains the orbit's last point");
    };
    let state = &mut orbit.state;
    state.local = domain.from_sphere(placement.chart, last.point);
    state.chart = placement.chart;
    state.branch = placement.branch;
    state.h = state.h.abs().clamp(settings.h_min, settings.h_max) * state.direction as f64;
    state.status = OrbitStatus::Active;
    Ok(())
}

/// Convenience entry point over a loaded model.
pub fn advance_orbit<W>(
    model: &VectorFieldModel,
    settings: &IntegrationSettings,
    orbit: &mut Orbit,
    drawer: &mut W,
    still_valid: impl FnMut(SpherePoint, (f64, f64)) -> bool,
    n_points: usize,
) -> Result<AdvanceReport>
where
    W: Drawer + ?Sized,
{
    advance(
        &GlobalDomain::new(model),
        settings,
        orbit,
        drawer,
        still_valid,
        n_points,
    )
}
