//! Piecewise polynomial vector-field data and the region resolver.
//!
//! The branch coefficients, region predicates, and orientation flags are
//! produced by an external vector-field-study model (file loaded); this
//! crate only validates and consumes them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::charts::{Chart, SphereGeometry, SpherePoint};
use crate::poly::Poly2;

/// Per-chart storage for branch data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartMap<T> {
    pub r2: T,
    pub u1: T,
    pub v1: T,
    pub u2: T,
    pub v2: T,
}

impl<T> ChartMap<T> {
    pub fn get(&self, chart: Chart) -> &T {
        match chart {
            Chart::R2 => &self.r2,
            Chart::U1 => &self.u1,
            Chart::V1 => &self.v1,
            Chart::U2 => &self.u2,
            Chart::V2 => &self.v2,
        }
    }
}

impl<T: Clone> ChartMap<T> {
    /// The same entry in every chart.
    pub fn uniform(value: T) -> Self {
        Self {
            r2: value.clone(),
            u1: value.clone(),
            v1: value.clone(),
            u2: value.clone(),
            v2: value,
        }
    }
}

/// The vector field of one branch expressed in one chart's local
/// coordinates, plus whether local time runs against true orbit time
/// there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartField {
    pub dx: Poly2,
    pub dy: Poly2,
    pub reverses_time: bool,
}

impl ChartField {
    pub fn eval(&self, x: f64, y: f64) -> (f64, f64) {
        (self.dx.eval(x, y), self.dy.eval(x, y))
    }
}

/// Sign condition defining part of a branch's region: the separating
/// curve at `curve` must evaluate with the given sign (`-1` or `+1`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionPredicate {
    pub curve: usize,
    pub sign: i8,
}

/// A separating curve, expressed per chart so it can be evaluated at any
/// point of the compactified space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeparatingCurve {
    pub exprs: ChartMap<Poly2>,
}

impl SeparatingCurve {
    fn eval_at(&self, geometry: SphereGeometry, p: SpherePoint) -> f64 {
        let chart = geometry.chart_for(p);
        let (u, v) = geometry.from_sphere(chart, p);
        self.exprs.get(chart).eval(u, v)
    }
}

/// One piece of a piecewise-defined vector field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFieldBranch {
    pub fields: ChartMap<ChartField>,
    pub predicates: Vec<RegionPredicate>,
    /// Step floor adopted while resolving a crossing into this branch.
    pub h_min_seam: f64,
}

/// A complete loaded vector-field study: compactification choice, branch
/// collection, and the separating curves the predicates refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFieldModel {
    pub geometry: SphereGeometry,
    pub branches: Vec<VectorFieldBranch>,
    pub curves: Vec<SeparatingCurve>,
}

/// Structural failures in externally supplied coefficient data. Reported
/// once, before any integration starts.
#[derive(Debug, Error)]
pub enum CoefficientLoadError {
    #[error("vector field model has no branches")]
    EmptyModel,
    #[error("branch {branch} predicate references missing curve {curve}")]
    MissingCurve { branch: usize, curve: usize },
    #[error("branch {branch} predicate sign must be -1 or +1, got {sign}")]
    InvalidSign { branch: usize, sign: i8 },
    #[error("branch {branch} seam step floor must be positive, got {floor}")]
    InvalidSeamFloor { branch: usize, floor: f64 },
}

impl VectorFieldModel {
    pub fn new(
        geometry: SphereGeometry,
        branches: Vec<VectorFieldBranch>,
        curves: Vec<SeparatingCurve>,
    ) -> Result<Self, CoefficientLoadError> {
        if branches.is_empty() {
            return Err(CoefficientLoadError::EmptyModel);
        }
        for (i, branch) in branches.iter().enumerate() {
            if !(branch.h_min_seam > 0.0) {
                return Err(CoefficientLoadError::InvalidSeamFloor {
                    branch: i,
                    floor: branch.h_min_seam,
                });
            }
            for predicate in &branch.predicates {
                if predicate.curve >= curves.len() {
                    return Err(CoefficientLoadError::MissingCurve {
                        branch: i,
                        curve: predicate.curve,
                    });
                }
                if predicate.sign != 1 && predicate.sign != -1 {
                    return Err(CoefficientLoadError::InvalidSign {
                        branch: i,
                        sign: predicate.sign,
                    });
                }
            }
        }
        Ok(Self {
            geometry,
            branches,
            curves,
        })
    }

    fn branch_holds_at(&self, index: usize, p: SpherePoint) -> bool {
        self.branches[index].predicates.iter().all(|predicate| {
            let value = self.curves[predicate.curve].eval_at(self.geometry, p);
            if predicate.sign > 0 {
                value > 0.0
            } else {
                value < 0.0
            }
        })
    }

    /// Selects the branch governing dynamics at `p`.
    ///
    /// Candidates are tried preferring `prior` first (continuity bias),
    /// then ascending above it, then descending below it; the first branch
    /// whose region predicates all hold wins. `None` is fatal for the
    /// current integration attempt only: the caller stops the orbit at its
    /// last valid point.
    pub fn resolve_branch(&self, p: SpherePoint, prior: usize) -> Option<usize> {
        let n = self.branches.len();
        let prior = prior.min(n - 1);
        if self.branch_holds_at(prior, p) {
            return Some(prior);
        }
        for index in prior + 1..n {
            if self.branch_holds_at(index, p) {
                return Some(index);
            }
        }
        for index in (0..prior).rev() {
            if self.branch_holds_at(index, p) {
                return Some(index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::Term2;

    /// Two branches split by the separating curve x = 0: branch 0 owns
    /// x > 0, branch 1 owns x < 0.
    fn half_plane_model() -> VectorFieldModel {
        let curve = SeparatingCurve {
            exprs: ChartMap::uniform(Poly2::new(vec![Term2::new(1.0, 1, 0)])),
        };
        let field = ChartMap::uniform(ChartField {
            dx: Poly2::constant(-1.0),
            dy: Poly2::constant(0.0),
            reverses_time: false,
        });
        let branches = vec![
            VectorFieldBranch {
                fields: field.clone(),
                predicates: vec![RegionPredicate { curve: 0, sign: 1 }],
                h_min_seam: 1e-8,
            },
            VectorFieldBranch {
                fields: field,
                predicates: vec![RegionPredicate { curve: 0, sign: -1 }],
                h_min_seam: 1e-8,
            },
        ];
        VectorFieldModel::new(SphereGeometry::Poincare, branches, vec![curve]).unwrap()
    }

    fn at(x: f64, y: f64) -> SpherePoint {
        SphereGeometry::Poincare.to_sphere(Chart::R2, x, y)
    }

    #[test]
    fn resolve_prefers_prior_branch() {
        let model = half_plane_model();
        assert_eq!(model.resolve_branch(at(2.0, 0.0), 0), Some(0));
        assert_eq!(model.resolve_branch(at(2.0, 0.0), 1), Some(0));
        assert_eq!(model.resolve_branch(at(-2.0, 0.0), 0), Some(1));
        assert_eq!(model.resolve_branch(at(-2.0, 0.0), 1), Some(1));
    }

    #[test]
    fn resolve_returns_none_on_the_boundary() {
        // Strict sign predicates: the separating curve itself belongs to
        // no region.
        let model = half_plane_model();
        assert_eq!(model.resolve_branch(at(0.0, 1.0), 0), None);
    }

    #[test]
    fn resolve_scans_descending_below_prior() {
        let model = half_plane_model();
        // Prior branch out of range is clamped before scanning.
        assert_eq!(model.resolve_branch(at(2.0, 0.0), 7), Some(0));
    }

    #[test]
    fn constructor_rejects_missing_curve() {
        let branch = VectorFieldBranch {
            fields: ChartMap::uniform(ChartField::default()),
            predicates: vec![RegionPredicate { curve: 3, sign: 1 }],
            h_min_seam: 1e-8,
        };
        let err = VectorFieldModel::new(SphereGeometry::Poincare, vec![branch], vec![]);
        assert!(matches!(
            err,
            Err(CoefficientLoadError::MissingCurve { branch: 0, curve: 3 })
        ));
    }

    #[test]
    fn constructor_rejects_empty_model() {
        let err = VectorFieldModel::new(SphereGeometry::Poincare, vec![], vec![]);
        assert!(matches!(err, Err(CoefficientLoadError::EmptyModel)));
    }

    #[test]
    fn constructor_rejects_zero_seam_floor() {
        let branch = VectorFieldBranch {
            fields: ChartMap::uniform(ChartField::default()),
            predicates: vec![],
            h_min_seam: 0.0,
        };
        let err = VectorFieldModel::new(SphereGeometry::Poincare, vec![branch], vec![]);
        assert!(matches!(
            err,
            Err(CoefficientLoadError::InvalidSeamFloor { branch: 0, .. })
        ));
    }
}
