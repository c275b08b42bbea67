//! Separatrix bootstrap near a degenerate singularity.
//!
//! A degenerate singular point is desingularized elsewhere into a chain
//! of quasi-homogeneous (monomial) coordinate transforms together with a
//! local power-series expansion of each separatrix. This module only
//! consumes that chain: it seeds the separatrix by evaluating the series,
//! then integrates the blown-up local vector field until the orbit leaves
//! the local chart, at which point the caller switches back to the
//! ordinary global chart system.

use anyhow::{bail, Result};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::charts::{Chart, SphereGeometry, SpherePoint};
use crate::field::ChartField;
use crate::integrator::{advance, IntegrationSettings, OrbitDomain, Placement};
use crate::orbit::{
    Color, IntegrationState, Orbit, OrbitKind, OrbitPoint, OrbitStatus, TerminationReason,
};
use crate::poly::{pow_conv, Poly1};
use crate::traits::Drawer;

/// Number of equal sub-steps used to walk the power series.
pub const SERIES_STEPS: usize = 100;

/// One blow-up step: `(x, y) -> (x0 + c1 x^d1 y^d2, y0 + c2 x^d3 y^d4)`,
/// with the convention `a^0 = 1` for all `a`, including zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transformation {
    pub x0: f64,
    pub y0: f64,
    pub c1: f64,
    pub c2: f64,
    pub d1: i32,
    pub d2: i32,
    pub d3: i32,
    pub d4: i32,
}

impl Transformation {
    pub fn identity() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            c1: 1.0,
            c2: 1.0,
            d1: 1,
            d2: 0,
            d3: 0,
            d4: 1,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.x0 + self.c1 * pow_conv(x, self.d1) * pow_conv(y, self.d2),
            self.y0 + self.c2 * pow_conv(x, self.d3) * pow_conv(y, self.d4),
        )
    }
}

/// Applies every transformation in order, first listed first,
/// accumulating the true pre-blow-up coordinates of a local point.
pub fn compose(transformations: &[Transformation], x: f64, y: f64) -> (f64, f64) {
    transformations
        .iter()
        .fold((x, y), |(x, y), t| t.apply(x, y))
}

/// Precomputed desingularization data for one separatrix, supplied by an
/// external classification stage, plus the position of the in-progress
/// local integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlowUpChain {
    pub transformations: Vec<Transformation>,
    /// Last finite point before the degenerate singularity.
    pub x0: f64,
    pub y0: f64,
    /// Accumulated linear part of the chain.
    pub a11: f64,
    pub a12: f64,
    pub a21: f64,
    pub a22: f64,
    /// Blown-up vector field in local coordinates.
    pub local_field: ChartField,
    /// Power-series expansion of the separatrix, `y = f(t)`.
    pub series: Poly1,
    /// Current local point.
    pub local: (f64, f64),
    pub kind: OrbitKind,
    pub chart: Chart,
    pub integrating_in_local_chart: bool,
}

/// Where the local continuation stands after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalContinuation {
    /// More local points can be requested.
    StillLocal,
    /// The orbit left the local chart; switch to the global chart system
    /// (see `reseat_orbit`).
    HandOff,
    /// The chain ended before any hand-off condition was met; the caller
    /// must switch representations early.
    Exhausted,
}

/// The blown-up neighborhood as an integration domain: one local chart
/// whose primary and mirror sides are separated by the sign of the second
/// local coordinate, mapped to the true phase space through the chain.
struct BlowUpDomain<'a> {
    chain: &'a BlowUpChain,
    geometry: SphereGeometry,
    seam_floor: f64,
}

const PRIMARY_SIDE: usize = 0;
const MIRROR_SIDE: usize = 1;

impl BlowUpDomain<'_> {
    fn linear(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.chain.a11,
            self.chain.a12,
            self.chain.a21,
            self.chain.a22,
        )
    }
}

impl OrbitDomain for BlowUpDomain<'_> {
    fn eval(&self, _placement: Placement, x: f64, y: f64) -> (f64, f64) {
        let (f1, f2) = self.chain.local_field.eval(x, y);
        let v = self.linear() * Vector2::new(f1, f2);
        (v.x, v.y)
    }

    fn to_sphere(&self, _chart: Chart, u: f64, v: f64) -> SpherePoint {
        let (x, y) = compose(&self.chain.transformations, u, v);
        self.geometry.to_sphere(Chart::R2, x, y)
    }

    fn from_sphere(&self, chart: Chart, p: SpherePoint) -> (f64, f64) {
        // The local chart never hands over to another one, so the seam
        // machinery never relocalizes here; only the global geometry
        // could answer anyway.
        self.geometry.from_sphere(chart, p)
    }

    fn resolve(&self, _p: SpherePoint, local: (f64, f64), _prior: Placement) -> Option<Placement> {
        let side = if local.1 >= 0.0 {
            PRIMARY_SIDE
        } else {
            MIRROR_SIDE
        };
        Some(Placement {
            branch: side,
            chart: self.chain.chart,
        })
    }

    fn reverses_time(&self, placement: Placement) -> bool {
        placement.branch == MIRROR_SIDE && self.chain.local_field.reverses_time
    }

    fn seam_floor(&self, _placement: Placement) -> f64 {
        self.seam_floor
    }
}

fn emit<W: Drawer + ?Sized>(drawer: &mut W, orbit: &Orbit, point: &OrbitPoint) {
    match orbit.points.last() {
        Some(prev) if point.dashes => drawer.draw_line(prev.point, point.point, point.color),
        _ => drawer.draw_point(point.point, point.color),
    }
}

/// Seeds a separatrix orbit from the chain's power series.
///
/// `t` walks from 0 to `epsilon` in `SERIES_STEPS` equal sub-steps; each
/// local point `(t, f(t))` is composed through the chain, mapped through
/// the chart geometry, and appended. No numerical integration happens
/// here. Returns the orbit prefix together with the continuation status:
/// `Exhausted` when the chain carries no series.
pub fn seed_separatrix<W: Drawer + ?Sized>(
    chain: &mut BlowUpChain,
    geometry: SphereGeometry,
    settings: &IntegrationSettings,
    epsilon: f64,
    color: Color,
    direction: i8,
    drawer: &mut W,
) -> Result<(Orbit, LocalContinuation)> {
    if !(epsilon > 0.0) {
        bail!("epsilon must be positive, got {}", epsilon);
    }
    if direction != 1 && direction != -1 {
        bail!("direction must be +1 or -1, got {}", direction);
    }

    let start = geometry.to_sphere(Chart::R2, chain.x0, chain.y0);
    let state = IntegrationState {
        local: chain.local,
        chart: chain.chart,
        branch: PRIMARY_SIDE,
        h: settings.h_start.clamp(settings.h_min, settings.h_max) * direction as f64,
        direction,
        kind: chain.kind,
        status: OrbitStatus::Active,
    };
    let mut orbit = Orbit::new(start, color, state);

    if chain.series.is_empty() {
        chain.integrating_in_local_chart = false;
        return Ok((orbit, LocalContinuation::Exhausted));
    }

    for i in 1..=SERIES_STEPS {
        let t = epsilon * i as f64 / SERIES_STEPS as f64;
        let ft = chain.series.eval(t);
        let (x, y) = compose(&chain.transformations, t, ft);
        let point = OrbitPoint {
            point: geometry.to_sphere(Chart::R2, x, y),
            color,
            dashes: i > 1,
            direction,
            kind: chain.kind,
        };
        emit(drawer, &orbit, &point);
        orbit.points.push(point);
        if i == SERIES_STEPS {
            chain.local = (t, ft);
        }
    }
    orbit.state.local = chain.local;
    chain.integrating_in_local_chart = true;
    debug!(
        points = orbit.points.len(),
        local = ?chain.local,
        "separatrix seeded from power series"
    );
    Ok((orbit, LocalContinuation::StillLocal))
}

/// Advances the seeded orbit numerically in the blown-up local chart.
///
/// The evaluator is the chain's local field composed with its accumulated
/// linear map. Integration proceeds until the local point reaches the
/// unit circle, at which point `integrating_in_local_chart` clears and
/// the caller must switch to the global chart system for further
/// integration. The local chart's primary/mirror seam follows the same
/// bisection-and-flip rule as every other seam, once per crossing.
pub fn continue_in_local_chart<W: Drawer + ?Sized>(
    chain: &mut BlowUpChain,
    geometry: SphereGeometry,
    settings: &IntegrationSettings,
    orbit: &mut Orbit,
    drawer: &mut W,
    n_points: usize,
) -> Result<LocalContinuation> {
    if !chain.integrating_in_local_chart {
        return Ok(LocalContinuation::HandOff);
    }
    let domain = BlowUpDomain {
        chain,
        geometry,
        seam_floor: settings.h_min,
    };
    let report = advance(
        &domain,
        settings,
        orbit,
        drawer,
        |_, local| local.0 * local.0 + local.1 * local.1 < 1.0,
        n_points,
    )?;
    chain.local = orbit.state.local;

    match report.status {
        OrbitStatus::Active => Ok(LocalContinuation::StillLocal),
        OrbitStatus::Terminated(TerminationReason::LeftRegionOfInterest) => {
            chain.integrating_in_local_chart = false;
            debug!(local = ?chain.local, "blow-up hand-off to global charts");
            Ok(LocalContinuation::HandOff)
        }
        OrbitStatus::Terminated(_) => {
            chain.integrating_in_local_chart = false;
            Ok(LocalContinuation::Exhausted)
        }
    }
}
