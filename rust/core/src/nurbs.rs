// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Narrow interface to the NURBS evaluation library.
//!
//! Entity 126 needs exactly four operations from the underlying basis
//! library: construct (validate) a curve, evaluate a position, compute the
//! natural parameter range, and classify closure. Everything is routed
//! through [`NurbsKernel`] so the implementation can be swapped; the default
//! [`BasisEvaluator`] is a clamped de Boor evaluator.

use nalgebra::{Point3, Point4};

use crate::error::{Error, Result};

/// Borrowed view of one curve's data, in the shape the kernel consumes.
#[derive(Debug, Clone, Copy)]
pub struct CurveSpec<'a> {
    pub control: &'a [Point3<f64>],
    /// One weight per control point; all 1.0 for polynomial curves.
    pub weights: &'a [f64],
    pub knots: &'a [f64],
    /// Order = degree + 1.
    pub order: usize,
    pub rational: bool,
}

impl CurveSpec<'_> {
    pub fn degree(&self) -> usize {
        self.order - 1
    }
}

/// Closure classification of a curve within a tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    Open,
    Closed,
    ClosedPeriodic,
}

/// The four operations consumed from the external basis library.
pub trait NurbsKernel: std::fmt::Debug + Send + Sync {
    /// Construct-time validation of a curve spec.
    fn check_curve(&self, spec: &CurveSpec) -> Result<()>;

    /// Position on the curve at parameter `t`.
    fn evaluate(&self, spec: &CurveSpec, t: f64) -> Result<Point3<f64>>;

    /// Natural parameter range `(v0, v1)` of the curve.
    fn natural_range(&self, spec: &CurveSpec) -> Result<(f64, f64)>;

    /// Closure/periodicity within `tol`.
    fn classify_closure(&self, spec: &CurveSpec, tol: f64) -> Result<Closure>;
}

/// Default kernel: clamped de Boor evaluation on homogeneous coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasisEvaluator;

impl BasisEvaluator {
    fn span(knots: &[f64], order: usize, n: usize, t: f64) -> usize {
        // valid spans are [order-1, n-1]; clamp t into the natural range
        let lo = order - 1;
        let hi = n - 1;
        if t >= knots[n] {
            return hi;
        }
        let mut k = lo;
        while k < hi && !(t >= knots[k] && t < knots[k + 1]) {
            k += 1;
        }
        k
    }
}

impl NurbsKernel for BasisEvaluator {
    fn check_curve(&self, spec: &CurveSpec) -> Result<()> {
        let n = spec.control.len();

        if spec.order < 2 {
            return Err(Error::ExternalFailure(format!(
                "order {} below the minimum of 2",
                spec.order
            )));
        }
        if n < spec.order {
            return Err(Error::ExternalFailure(format!(
                "{} control points cannot carry order {}",
                n, spec.order
            )));
        }
        if spec.knots.len() != n + spec.order {
            return Err(Error::ExternalFailure(format!(
                "knot count {} does not match {} control points of order {}",
                spec.knots.len(),
                n,
                spec.order
            )));
        }
        if spec.weights.len() != n {
            return Err(Error::ExternalFailure(
                "weight count does not match control point count".into(),
            ));
        }
        if spec.knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::ExternalFailure("knots are not non-decreasing".into()));
        }
        Ok(())
    }

    fn evaluate(&self, spec: &CurveSpec, t: f64) -> Result<Point3<f64>> {
        self.check_curve(spec)?;

        let n = spec.control.len();
        let order = spec.order;
        let degree = spec.degree();
        let k = Self::span(spec.knots, order, n, t);

        // homogeneous working set d[i] = w_i * (x, y, z, 1)
        let mut d: Vec<Point4<f64>> = (k + 1 - order..=k)
            .map(|i| {
                let w = spec.weights[i];
                let p = spec.control[i];
                Point4::new(p.x * w, p.y * w, p.z * w, w)
            })
            .collect();

        for r in 1..=degree {
            for j in (r..=degree).rev() {
                let i = k + 1 - order + j;
                let denom = spec.knots[i + order - r] - spec.knots[i];
                let alpha = if denom == 0.0 {
                    0.0
                } else {
                    (t - spec.knots[i]) / denom
                };
                d[j] = Point4::from(d[j - 1].coords.lerp(&d[j].coords, alpha));
            }
        }

        let h = d[degree];
        if h.w == 0.0 {
            return Err(Error::ExternalFailure(format!(
                "zero homogeneous weight at t = {}",
                t
            )));
        }
        Ok(Point3::new(h.x / h.w, h.y / h.w, h.z / h.w))
    }

    fn natural_range(&self, spec: &CurveSpec) -> Result<(f64, f64)> {
        self.check_curve(spec)?;
        let n = spec.control.len();
        Ok((spec.knots[spec.degree()], spec.knots[n]))
    }

    fn classify_closure(&self, spec: &CurveSpec, tol: f64) -> Result<Closure> {
        let (v0, v1) = self.natural_range(spec)?;
        let start = self.evaluate(spec, v0)?;
        let end = self.evaluate(spec, v1)?;

        if (end - start).norm() > tol.max(0.0) {
            return Ok(Closure::Open);
        }

        // an unclamped start knot means the basis wraps: treat as periodic
        let clamped = spec
            .knots
            .iter()
            .take(spec.order)
            .all(|&k| (k - spec.knots[0]).abs() <= f64::EPSILON);
        if clamped {
            Ok(Closure::Closed)
        } else {
            Ok(Closure::ClosedPeriodic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_spec<'a>(
        control: &'a [Point3<f64>],
        weights: &'a [f64],
        knots: &'a [f64],
    ) -> CurveSpec<'a> {
        CurveSpec {
            control,
            weights,
            knots,
            order: 2,
            rational: false,
        }
    }

    #[test]
    fn evaluates_linear_segment() {
        let control = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 0.0)];
        let weights = [1.0, 1.0];
        let knots = [0.0, 0.0, 1.0, 1.0];
        let spec = line_spec(&control, &weights, &knots);
        let k = BasisEvaluator;

        assert_eq!(k.natural_range(&spec).unwrap(), (0.0, 1.0));
        assert_eq!(k.evaluate(&spec, 0.0).unwrap(), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(k.evaluate(&spec, 1.0).unwrap(), Point3::new(2.0, 4.0, 0.0));
        assert_eq!(k.evaluate(&spec, 0.5).unwrap(), Point3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn evaluates_cubic_bezier_endpoints() {
        let control = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let weights = [1.0; 4];
        let knots = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let spec = CurveSpec {
            control: &control,
            weights: &weights,
            knots: &knots,
            order: 4,
            rational: false,
        };
        let k = BasisEvaluator;

        assert_eq!(k.evaluate(&spec, 0.0).unwrap(), control[0]);
        assert_eq!(k.evaluate(&spec, 1.0).unwrap(), control[3]);

        // midpoint of this symmetric Bezier: (1.5, 1.5, 0)
        let mid = k.evaluate(&spec, 0.5).unwrap();
        assert!((mid - Point3::new(1.5, 1.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn rational_quarter_circle() {
        // quarter circle from (1,0) to (0,1), weight sqrt(2)/2 on the corner
        let w = (2.0f64).sqrt() / 2.0;
        let control = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let weights = [1.0, w, 1.0];
        let knots = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let spec = CurveSpec {
            control: &control,
            weights: &weights,
            knots: &knots,
            order: 3,
            rational: true,
        };
        let k = BasisEvaluator;

        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = k.evaluate(&spec, t).unwrap();
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 1.0).abs() < 1e-12, "radius {} at t={}", r, t);
        }
    }

    #[test]
    fn classifies_closure() {
        let open = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let closed = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -2.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let weights2 = [1.0, 1.0];
        let knots2 = [0.0, 0.0, 1.0, 1.0];
        let k = BasisEvaluator;

        assert_eq!(
            k.classify_closure(&line_spec(&open, &weights2, &knots2), 1e-8)
                .unwrap(),
            Closure::Open
        );

        let weights5 = [1.0; 5];
        let knots5 = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        let spec = CurveSpec {
            control: &closed,
            weights: &weights5,
            knots: &knots5,
            order: 3,
            rational: false,
        };
        assert_eq!(k.classify_closure(&spec, 1e-8).unwrap(), Closure::Closed);
    }

    #[test]
    fn rejects_bad_specs() {
        let control = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let weights = [1.0, 1.0];
        let bad_knots = [0.0, 0.0, 1.0];
        let spec = line_spec(&control, &weights, &bad_knots);
        assert!(BasisEvaluator.check_curve(&spec).is_err());
    }
}
