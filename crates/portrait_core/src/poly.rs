use serde::{Deserialize, Serialize};

use crate::traits::Scalar;

/// Raises `a` to an integer power with the convention `a^0 = 1` for all `a`,
/// including zero. Blow-up transformations rely on this at the origin.
pub fn pow_conv<T: Scalar>(a: T, d: i32) -> T {
    if d == 0 {
        T::one()
    } else {
        a.powi(d)
    }
}

/// One term of a univariate polynomial: `coeff * t^deg`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Term1 {
    pub coeff: f64,
    pub deg: u32,
}

/// Univariate polynomial as an owned term list. Used for the local
/// power-series expansion of a separatrix, `y = f(t)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Poly1 {
    pub terms: Vec<Term1>,
}

impl Poly1 {
    pub fn new(terms: Vec<Term1>) -> Self {
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.terms
            .iter()
            .map(|term| term.coeff * pow_conv(t, term.deg as i32))
            .sum()
    }
}

/// One term of a bivariate polynomial: `coeff * x^dx * y^dy`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Term2 {
    pub coeff: f64,
    pub dx: u32,
    pub dy: u32,
}

impl Term2 {
    pub fn new(coeff: f64, dx: u32, dy: u32) -> Self {
        Self { coeff, dx, dy }
    }
}

/// Bivariate polynomial as an owned term list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Poly2 {
    pub terms: Vec<Term2>,
}

impl Poly2 {
    pub fn new(terms: Vec<Term2>) -> Self {
        Self { terms }
    }

    /// Constant polynomial.
    pub fn constant(c: f64) -> Self {
        Self {
            terms: vec![Term2::new(c, 0, 0)],
        }
    }

    pub fn eval<T: Scalar>(&self, x: T, y: T) -> T {
        let mut acc = T::zero();
        for term in &self.terms {
            let c = T::from_f64(term.coeff).unwrap_or_else(T::zero);
            acc = acc + c * pow_conv(x, term.dx as i32) * pow_conv(y, term.dy as i32);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_conv_zero_exponent_is_one_even_at_zero() {
        assert_eq!(pow_conv(0.0_f64, 0), 1.0);
        assert_eq!(pow_conv(-3.5_f64, 0), 1.0);
    }

    #[test]
    fn pow_conv_negative_exponent() {
        assert!((pow_conv(2.0_f64, -2) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn poly1_evaluates_series() {
        // f(t) = 1 + 2t + 3t^2
        let f = Poly1::new(vec![
            Term1 { coeff: 1.0, deg: 0 },
            Term1 { coeff: 2.0, deg: 1 },
            Term1 { coeff: 3.0, deg: 2 },
        ]);
        assert!((f.eval(2.0) - 17.0).abs() < 1e-12);
        assert!((f.eval(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn poly2_evaluates_bivariate_terms() {
        // p(x, y) = x^2 y - 4
        let p = Poly2::new(vec![Term2::new(1.0, 2, 1), Term2::new(-4.0, 0, 0)]);
        assert!((p.eval(3.0_f64, 2.0_f64) - 14.0).abs() < 1e-12);
        assert!((p.eval(0.0_f64, 0.0_f64) + 4.0).abs() < 1e-12);
    }
}
