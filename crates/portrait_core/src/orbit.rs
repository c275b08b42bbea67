//! Orbit records: the append-only product of integration, plus the
//! resumable state carried between `advance` calls.

use serde::{Deserialize, Serialize};

use crate::charts::{Chart, SpherePoint};

/// Drawing color index, interpreted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8);

/// Classification of the curve being integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitKind {
    Stable,
    Unstable,
    CenterStable,
    CenterUnstable,
    PlainOrbit,
}

impl OrbitKind {
    /// The classification after a time-orientation reversal.
    pub fn flipped(self) -> Self {
        match self {
            OrbitKind::Stable => OrbitKind::Unstable,
            OrbitKind::Unstable => OrbitKind::Stable,
            OrbitKind::CenterStable => OrbitKind::CenterUnstable,
            OrbitKind::CenterUnstable => OrbitKind::CenterStable,
            OrbitKind::PlainOrbit => OrbitKind::PlainOrbit,
        }
    }

    /// Recomputed classification at a seam. Never inherited silently: the
    /// caller states whether the crossing reversed orientation.
    pub fn recompute(self, reversed: bool) -> Self {
        if reversed {
            self.flipped()
        } else {
            self
        }
    }
}

/// One accepted point of an orbit.
///
/// `dashes` requests a connecting segment to the previous point; a flagged
/// discontinuity (seam crossing or forced step) clears it so the point is
/// drawn as an isolated dot. `direction` is the time orientation actually
/// used, possibly flipped from the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitPoint {
    pub point: SpherePoint,
    pub color: Color,
    pub dashes: bool,
    pub direction: i8,
    pub kind: OrbitKind,
}

/// Why an orbit stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// No branch's region predicates hold at the trial point. Fatal for
    /// this orbit only; the computed prefix is retained.
    UnresolvableRegion,
    /// The caller's validity predicate went false.
    LeftRegionOfInterest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitStatus {
    Active,
    Terminated(TerminationReason),
}

impl OrbitStatus {
    pub fn is_active(self) -> bool {
        matches!(self, OrbitStatus::Active)
    }
}

/// Everything needed to resume integration of an orbit: current local
/// point, placement, signed step, and orientation bookkeeping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntegrationState {
    pub local: (f64, f64),
    pub chart: Chart,
    pub branch: usize,
    pub h: f64,
    pub direction: i8,
    pub kind: OrbitKind,
    pub status: OrbitStatus,
}

/// One user-initiated integration: a start point and the ordered points
/// computed so far. Grows by append only; truncation happens only as
/// whole-orbit deletion in the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orbit {
    pub start: SpherePoint,
    pub color: Color,
    pub points: Vec<OrbitPoint>,
    pub state: IntegrationState,
}

impl Orbit {
    pub fn new(start: SpherePoint, color: Color, state: IntegrationState) -> Self {
        Self {
            start,
            color,
            points: Vec::new(),
            state,
        }
    }

    pub fn last_point(&self) -> Option<&OrbitPoint> {
        self.points.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flipping_swaps_stable_and_unstable_pairs() {
        assert_eq!(OrbitKind::Stable.flipped(), OrbitKind::Unstable);
        assert_eq!(OrbitKind::CenterUnstable.flipped(), OrbitKind::CenterStable);
        assert_eq!(OrbitKind::PlainOrbit.flipped(), OrbitKind::PlainOrbit);
    }

    #[test]
    fn recompute_without_reversal_is_identity() {
        for kind in [
            OrbitKind::Stable,
            OrbitKind::Unstable,
            OrbitKind::CenterStable,
            OrbitKind::CenterUnstable,
            OrbitKind::PlainOrbit,
        ] {
            assert_eq!(kind.recompute(false), kind);
            assert_eq!(kind.recompute(true), kind.flipped());
        }
    }
}
