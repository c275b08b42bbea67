//! Adaptive embedded Runge-Kutta step primitive.
//!
//! One error-controlled step of a planar autonomous ODE, using the
//! 13-stage Fehlberg 7(8) pair (NASA TR R-287). The integrator above this
//! layer only relies on the clamped output contract: the magnitude of the
//! step actually taken and of the suggested next step always lies in
//! `[h_min, h_max]`.

pub const STAGES: usize = 13;

/// Stage coupling coefficients, row `i` holding `a[i][j]` for `j < i`.
/// The field is autonomous, so the tableau's time nodes are not needed.
const A: [[f64; 12]; STAGES] = [
    [0.0; 12],
    [
        2.0 / 27.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 36.0,
        1.0 / 12.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 24.0,
        0.0,
        1.0 / 8.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        5.0 / 12.0,
        0.0,
        -25.0 / 16.0,
        25.0 / 16.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 20.0,
        0.0,
        0.0,
        1.0 / 4.0,
        1.0 / 5.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -25.0 / 108.0,
        0.0,
        0.0,
        125.0 / 108.0,
        -65.0 / 27.0,
        125.0 / 54.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        31.0 / 300.0,
        0.0,
        0.0,
        0.0,
        61.0 / 225.0,
        -2.0 / 9.0,
        13.0 / 900.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2.0,
        0.0,
        0.0,
        -53.0 / 6.0,
        704.0 / 45.0,
        -107.0 / 9.0,
        67.0 / 90.0,
        3.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

/// 8th-order solution weights.
const B: [f64; STAGES] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

const ERR_WEIGHT: f64 = 41.0 / 840.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const ORDER_EXPONENT: f64 = 1.0 / 8.0;

fn stages<F>(eval: &F, x: f64, y: f64, h: f64) -> [(f64, f64); STAGES]
where
    F: Fn(f64, f64) -> (f64, f64),
{
    let mut k = [(0.0, 0.0); STAGES];
    k[0] = eval(x, y);
    for i in 1..STAGES {
        let mut sx = 0.0;
        let mut sy = 0.0;
        for j in 0..i {
            sx += A[i][j] * k[j].0;
            sy += A[i][j] * k[j].1;
        }
        k[i] = eval(x + h * sx, y + h * sy);
    }
    k
}

fn solution(x: f64, y: f64, h: f64, k: &[(f64, f64); STAGES]) -> (f64, f64) {
    let mut sx = 0.0;
    let mut sy = 0.0;
    for i in 0..STAGES {
        sx += B[i] * k[i].0;
        sy += B[i] * k[i].1;
    }
    (x + h * sx, y + h * sy)
}

/// Leading-order local error estimate, max over components.
fn error_estimate(h: f64, k: &[(f64, f64); STAGES]) -> f64 {
    let ex = ERR_WEIGHT * (k[0].0 + k[10].0 - k[11].0 - k[12].0);
    let ey = ERR_WEIGHT * (k[0].1 + k[10].1 - k[11].1 - k[12].1);
    h.abs() * ex.abs().max(ey.abs())
}

fn growth_factor(error: f64, tol: f64) -> f64 {
    if error == 0.0 {
        return MAX_FACTOR;
    }
    if !error.is_finite() {
        // A blown-up stage evaluation; only shrinking makes sense.
        return MIN_FACTOR;
    }
    (SAFETY * (tol / error).powf(ORDER_EXPONENT)).clamp(MIN_FACTOR, MAX_FACTOR)
}

/// One adaptive step of `d(x,y)/dt = eval(x,y)`.
///
/// `h` carries the integration direction in its sign; its magnitude is
/// clamped into `[h_min, h_max]` before the first attempt. The step is
/// retried with a reduced size while the error estimate exceeds `tol`,
/// until the floor is reached, at which point the step is taken anyway.
/// Returns the advanced point and the suggested (signed) next step,
/// clamped into the same band.
pub fn rkf78_step<F>(
    eval: &F,
    point: (f64, f64),
    h: f64,
    h_min: f64,
    h_max: f64,
    tol: f64,
) -> ((f64, f64), f64)
where
    F: Fn(f64, f64) -> (f64, f64),
{
    let (x, y) = point;
    let sign = if h < 0.0 { -1.0 } else { 1.0 };
    let mut mag = h.abs().clamp(h_min, h_max);

    loop {
        let k = stages(eval, x, y, sign * mag);
        let error = error_estimate(sign * mag, &k);
        let factor = growth_factor(error, tol);
        if error <= tol || mag <= h_min * (1.0 + 1e-12) {
            let next = (mag * factor).clamp(h_min, h_max);
            return (solution(x, y, sign * mag, &k), sign * next);
        }
        mag = (mag * factor).max(h_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation(x: f64, y: f64) -> (f64, f64) {
        (-y, x)
    }

    #[test]
    fn step_tracks_circular_motion() {
        let ((x, y), _) = rkf78_step(&rotation, (1.0, 0.0), 0.1, 1e-12, 1.0, 1e-9);
        assert!((x - 0.1_f64.cos()).abs() < 1e-10, "x = {}", x);
        assert!((y - 0.1_f64.sin()).abs() < 1e-10, "y = {}", y);
    }

    #[test]
    fn backward_step_preserves_direction_sign() {
        let ((x, y), next) = rkf78_step(&rotation, (1.0, 0.0), -0.1, 1e-12, 1.0, 1e-9);
        assert!(next < 0.0, "suggested step lost its sign: {}", next);
        assert!((x - 0.1_f64.cos()).abs() < 1e-10);
        assert!((y + 0.1_f64.sin()).abs() < 1e-10);
    }

    #[test]
    fn suggested_step_is_clamped_into_band() {
        // Trivial field: error estimate is zero, growth wants MAX_FACTOR.
        let constant = |_x: f64, _y: f64| (1.0, 0.0);
        let (_, next) = rkf78_step(&constant, (0.0, 0.0), 0.25, 0.01, 0.5, 1e-9);
        assert!(next <= 0.5 + 1e-15, "next = {}", next);
        assert!(next >= 0.01, "next = {}", next);
    }

    #[test]
    fn halving_the_step_reduces_local_error() {
        // Loose tolerance so both step sizes are accepted unmodified; the
        // true one-step error of the smaller step must be strictly lower.
        let err_for = |h: f64| {
            let ((x, y), _) = rkf78_step(&rotation, (1.0, 0.0), h, 1e-15, 10.0, 1e10);
            ((x - h.cos()).powi(2) + (y - h.sin()).powi(2)).sqrt()
        };
        let full = err_for(1.2);
        let half = err_for(0.6);
        assert!(
            half < full,
            "expected error reduction: err(h) = {}, err(h/2) = {}",
            full,
            half
        );
    }

    #[test]
    fn floor_forces_acceptance() {
        // A violently stiff field with a tolerance it can never meet: the
        // step must still complete at the clamped floor.
        let stiff = |x: f64, _y: f64| (1e12 * (1.0 + x * x), 1e12);
        let (_, next) = rkf78_step(&stiff, (1.0, 0.0), 0.5, 1e-3, 0.5, 1e-12);
        assert!((next.abs() - 1e-3).abs() < 1e-12, "next = {}", next);
    }
}
