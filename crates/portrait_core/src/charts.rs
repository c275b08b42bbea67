//! Coordinate charts covering the compactified phase space.
//!
//! The finite plane is projected onto the upper half of the unit sphere
//! (Poincare compactification), or onto a disk-plus-annulus cylinder when
//! the vector field carries weights at infinity (Poincare-Lyapunov). Five
//! local charts cover the result: the central chart `R2` and four charts
//! `U1, V1, U2, V2` around the circle at infinity, each with a primary and
//! a mirror sub-chart selected by the sign of the second local coordinate.
//!
//! All maps are closed-form. Calling `from_sphere` for a chart whose
//! domain does not contain the point is undefined; callers select the
//! chart with `chart_for` first.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::poly::pow_conv;

/// Largest finite-plane radius the central chart is responsible for.
/// Beyond it, points are handled through the infinity charts.
const R2_DOMAIN_LIMIT: f64 = 25.0;

/// Identifier of a local coordinate chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chart {
    R2,
    U1,
    V1,
    U2,
    V2,
}

impl Chart {
    pub const ALL: [Chart; 5] = [Chart::R2, Chart::U1, Chart::V1, Chart::U2, Chart::V2];
}

/// A point on the compactified phase space. Immutable once produced.
///
/// `Sphere` is the isotropic representation: the upper-hemisphere
/// representative (`z >= 0`) of a point on the unit sphere. `Plane` and
/// `Cylinder` are the two halves of the weighted representation: finite
/// plane coordinates inside the unit disk, and `(r, theta)` with `r` in
/// `(0, 1]` outside it, `r -> 0` being the circle at infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpherePoint {
    Sphere { x: f64, y: f64, z: f64 },
    Plane { x: f64, y: f64 },
    Cylinder { r: f64, theta: f64 },
}

/// Which compactification is in force, fixed per vector-field model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SphereGeometry {
    /// Isotropic Poincare sphere.
    Poincare,
    /// Weighted Poincare-Lyapunov cylinder with weights `(p, q)`.
    PoincareLyapunov { p: u32, q: u32 },
}

fn wrap_angle(theta: f64) -> f64 {
    let mut t = theta;
    while t > PI {
        t -= 2.0 * PI;
    }
    while t <= -PI {
        t += 2.0 * PI;
    }
    t
}

impl SphereGeometry {
    /// Maps chart-local coordinates to the compactified representation.
    pub fn to_sphere(&self, chart: Chart, u: f64, v: f64) -> SpherePoint {
        match *self {
            SphereGeometry::Poincare => to_poincare(chart, u, v),
            SphereGeometry::PoincareLyapunov { .. } => self.to_cylinder(chart, u, v),
        }
    }

    /// Inverse of `to_sphere` on the chart's domain.
    pub fn from_sphere(&self, chart: Chart, p: SpherePoint) -> (f64, f64) {
        match p {
            SpherePoint::Sphere { x, y, z } => from_poincare(chart, x, y, z),
            _ => self.from_cylinder(chart, p),
        }
    }

    /// Weighted variant of `to_sphere`: chart-local coordinates into the
    /// disk-plus-annulus cylinder representation.
    ///
    /// The infinity charts use `(tan-like angle, r)` local coordinates so
    /// that every map stays algebraic; the mirror sub-charts never arise
    /// here because `r` is positive throughout the annulus.
    pub fn to_cylinder(&self, chart: Chart, u: f64, v: f64) -> SpherePoint {
        match chart {
            Chart::R2 => SpherePoint::Plane { x: u, y: v },
            Chart::U1 => SpherePoint::Cylinder {
                r: v,
                theta: u.atan(),
            },
            Chart::V1 => SpherePoint::Cylinder {
                r: v,
                theta: wrap_angle(u.atan() + PI),
            },
            Chart::U2 => SpherePoint::Cylinder {
                r: v,
                theta: PI / 2.0 - u.atan(),
            },
            Chart::V2 => SpherePoint::Cylinder {
                r: v,
                theta: u.atan() - PI / 2.0,
            },
        }
    }

    /// Weighted variant of `from_sphere`.
    pub fn from_cylinder(&self, chart: Chart, p: SpherePoint) -> (f64, f64) {
        match (chart, p) {
            (Chart::R2, SpherePoint::Plane { x, y }) => (x, y),
            (Chart::R2, SpherePoint::Cylinder { r, theta }) => self.cylinder_to_plane(r, theta),
            (chart, SpherePoint::Plane { x, y }) => {
                let (r, theta) = self.plane_to_cylinder(x, y);
                self.from_cylinder(chart, SpherePoint::Cylinder { r, theta })
            }
            (Chart::U1, SpherePoint::Cylinder { r, theta })
            | (Chart::V1, SpherePoint::Cylinder { r, theta }) => (theta.tan(), r),
            (Chart::U2, SpherePoint::Cylinder { r, theta }) => (theta.cos() / theta.sin(), r),
            (Chart::V2, SpherePoint::Cylinder { r, theta }) => ((theta + PI / 2.0).tan(), r),
            (chart, SpherePoint::Sphere { x, y, z }) => {
                // Isotropic representative handed to the weighted geometry;
                // treat it through the plane.
                let (u, v) = from_poincare(Chart::R2, x, y, z);
                self.from_cylinder(chart, SpherePoint::Plane { x: u, y: v })
            }
        }
    }

    /// Plane coordinates of an annulus point: `x = cos(theta)/r^p`,
    /// `y = sin(theta)/r^q`.
    pub fn cylinder_to_plane(&self, r: f64, theta: f64) -> (f64, f64) {
        let (p, q) = self.weights();
        (
            theta.cos() / pow_conv(r, p as i32),
            theta.sin() / pow_conv(r, q as i32),
        )
    }

    /// Inverse of `cylinder_to_plane`. Exact for equal weights; for
    /// unequal weights the inverse is not elementary, and the conversion
    /// projects onto the `r = 1` seam circle, the only locus where the
    /// integrator crosses between the two halves.
    pub fn plane_to_cylinder(&self, x: f64, y: f64) -> (f64, f64) {
        let (p, q) = self.weights();
        let theta = y.atan2(x);
        if p == q {
            let rho = x.hypot(y);
            (rho.powf(-1.0 / p as f64), theta)
        } else {
            (1.0, theta)
        }
    }

    /// Selects the chart whose domain contains `p`. This is the sign test
    /// callers must run before `from_sphere`.
    pub fn chart_for(&self, p: SpherePoint) -> Chart {
        match p {
            SpherePoint::Sphere { x, y, z } => {
                if z * R2_DOMAIN_LIMIT >= x.hypot(y) {
                    Chart::R2
                } else if x.abs() >= y.abs() {
                    if x > 0.0 {
                        Chart::U1
                    } else {
                        Chart::V1
                    }
                } else if y > 0.0 {
                    Chart::U2
                } else {
                    Chart::V2
                }
            }
            SpherePoint::Plane { x, y } => {
                if x * x + y * y < 1.0 {
                    Chart::R2
                } else if x.abs() >= y.abs() {
                    if x > 0.0 {
                        Chart::U1
                    } else {
                        Chart::V1
                    }
                } else if y > 0.0 {
                    Chart::U2
                } else {
                    Chart::V2
                }
            }
            SpherePoint::Cylinder { r, theta } => {
                if r > 1.0 {
                    Chart::R2
                } else {
                    let c = theta.cos();
                    let s = theta.sin();
                    if c.abs() >= s.abs() {
                        if c > 0.0 {
                            Chart::U1
                        } else {
                            Chart::V1
                        }
                    } else if s > 0.0 {
                        Chart::U2
                    } else {
                        Chart::V2
                    }
                }
            }
        }
    }

    fn weights(&self) -> (u32, u32) {
        match *self {
            SphereGeometry::Poincare => (1, 1),
            SphereGeometry::PoincareLyapunov { p, q } => (p, q),
        }
    }
}

/// Central projection of chart-local coordinates onto the unit sphere,
/// normalized to the upper-hemisphere representative. Mirror sub-charts
/// (negative second coordinate) map through the antipode so the stored
/// triple keeps `z >= 0`.
fn to_poincare(chart: Chart, u: f64, v: f64) -> SpherePoint {
    let s = 1.0 / (1.0 + u * u + v * v).sqrt();
    let (x, y, z) = match chart {
        Chart::R2 => (s * u, s * v, s),
        Chart::U1 => (s, s * u, s * v),
        Chart::V1 => (-s, s * u, s * v),
        Chart::U2 => (s * u, s, s * v),
        Chart::V2 => (s * u, -s, s * v),
    };
    if z < 0.0 {
        SpherePoint::Sphere {
            x: -x,
            y: -y,
            z: -z,
        }
    } else {
        SpherePoint::Sphere { x, y, z }
    }
}

fn from_poincare(chart: Chart, x: f64, y: f64, z: f64) -> (f64, f64) {
    match chart {
        Chart::R2 => (x / z, y / z),
        Chart::U1 => (y / x, z / x),
        Chart::V1 => (-y / x, -z / x),
        Chart::U2 => (x / y, z / y),
        Chart::V2 => (-x / y, -z / y),
    }
}
