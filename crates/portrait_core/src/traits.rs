use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

use crate::charts::SpherePoint;
use crate::orbit::Color;

/// A trait for types that can be used as scalars in polynomial evaluation.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Rendering capability injected per call by the owning view.
///
/// The three concrete renderers (screen, vector image, raster image) live
/// outside this crate; the integrator only ever sees this interface. A
/// `draw_line` connects an accepted point to its predecessor, a
/// `draw_point` marks an isolated dot at a flagged discontinuity.
pub trait Drawer {
    fn draw_point(&mut self, p: SpherePoint, color: Color);
    fn draw_line(&mut self, from: SpherePoint, to: SpherePoint, color: Color);
}

/// Drawer that ignores every primitive. Useful for headless recomputation.
pub struct NullDrawer;

impl Drawer for NullDrawer {
    fn draw_point(&mut self, _p: SpherePoint, _color: Color) {}
    fn draw_line(&mut self, _from: SpherePoint, _to: SpherePoint, _color: Color) {}
}
