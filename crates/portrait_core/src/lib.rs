/// The `portrait_core` crate is the orbit-integration engine for phase
/// portraits of planar polynomial vector fields on a compactified phase
/// space (Poincare or Poincare-Lyapunov sphere), so that behavior at
/// infinity and at degenerate singular points is observable.
///
/// Key components:
/// - **Charts**: closed-form maps between five local charts and the
///   compactified representation.
/// - **Field**: piecewise vector-field branch data and the region
///   resolver selecting the branch governing a point.
/// - **Solver**: one adaptive embedded Runge-Kutta-Fehlberg 7(8) step.
/// - **Integrator**: the multi-chart state machine that advances orbits,
///   detecting and bisecting chart/branch seams.
/// - **Blowup**: separatrix bootstrap through a precomputed chain of
///   quasi-homogeneous transforms near degenerate singularities.
/// - **Stream**: append-only orbit record shared with renderers.
pub mod blowup;
pub mod charts;
pub mod field;
pub mod integrator;
pub mod orbit;
pub mod poly;
pub mod solver;
pub mod stream;
pub mod traits;
