//! Append-only record of computed orbits, exposed to the drawing and
//! printing collaborators.

use serde::{Deserialize, Serialize};

use crate::orbit::Orbit;
use crate::traits::Drawer;

/// The orbits a view has accumulated, in creation order. Growth is by
/// append only; the single supported mutation is removing the most
/// recent whole orbit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrbitPointStream {
    orbits: Vec<Orbit>,
}

impl OrbitPointStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, orbit: Orbit) {
        self.orbits.push(orbit);
    }

    pub fn len(&self) -> usize {
        self.orbits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orbits.is_empty()
    }

    pub fn orbits(&self) -> &[Orbit] {
        &self.orbits
    }

    /// The orbit currently being extended, if any.
    pub fn last_mut(&mut self) -> Option<&mut Orbit> {
        self.orbits.last_mut()
    }

    /// Replays every stored orbit through `drawer`, reproducing the
    /// dot-or-segment decision made when each point was accepted.
    pub fn redraw<W: Drawer + ?Sized>(&self, drawer: &mut W) {
        for orbit in &self.orbits {
            let mut prev = None;
            for point in &orbit.points {
                match prev {
                    Some(prev) if point.dashes => {
                        drawer.draw_line(prev, point.point, point.color)
                    }
                    _ => drawer.draw_point(point.point, point.color),
                }
                prev = Some(point.point);
            }
        }
    }

    /// Removes the most recent orbit, replaying the survivors so the
    /// caller can erase and redraw the affected region. Individual points
    /// are never deleted.
    pub fn delete_last<W: Drawer + ?Sized>(&mut self, drawer: &mut W) -> Option<Orbit> {
        let removed = self.orbits.pop()?;
        self.redraw(drawer);
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{Chart, SpherePoint};
    use crate::orbit::{Color, IntegrationState, OrbitKind, OrbitPoint, OrbitStatus};

    struct CountingDrawer {
        dots: usize,
        lines: usize,
    }

    impl Drawer for CountingDrawer {
        fn draw_point(&mut self, _p: SpherePoint, _c: Color) {
            self.dots += 1;
        }
        fn draw_line(&mut self, _a: SpherePoint, _b: SpherePoint, _c: Color) {
            self.lines += 1;
        }
    }

    fn orbit_with_points(n: usize) -> Orbit {
        let p = SpherePoint::Sphere {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        };
        let state = IntegrationState {
            local: (0.0, 0.0),
            chart: Chart::R2,
            branch: 0,
            h: 0.1,
            direction: 1,
            kind: OrbitKind::PlainOrbit,
            status: OrbitStatus::Active,
        };
        let mut orbit = Orbit::new(p, Color(1), state);
        for i in 0..n {
            orbit.points.push(OrbitPoint {
                point: p,
                color: Color(1),
                dashes: i > 0,
                direction: 1,
                kind: OrbitKind::PlainOrbit,
            });
        }
        orbit
    }

    #[test]
    fn delete_last_removes_whole_orbits_only() {
        let mut stream = OrbitPointStream::new();
        stream.push(orbit_with_points(5));
        stream.push(orbit_with_points(3));

        let mut drawer = CountingDrawer { dots: 0, lines: 0 };
        let removed = stream.delete_last(&mut drawer).unwrap();
        assert_eq!(removed.points.len(), 3);
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.orbits()[0].points.len(), 5);

        assert!(stream.delete_last(&mut drawer).is_some());
        assert!(stream.delete_last(&mut drawer).is_none());
    }

    #[test]
    fn redraw_reproduces_dots_and_segments() {
        let mut stream = OrbitPointStream::new();
        stream.push(orbit_with_points(5));
        let mut drawer = CountingDrawer { dots: 0, lines: 0 };
        stream.redraw(&mut drawer);
        assert_eq!(drawer.dots, 1);
        assert_eq!(drawer.lines, 4);
    }
}
