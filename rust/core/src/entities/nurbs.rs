// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entities 126 and 128: NURBS curve and surface.
//!
//! The curve keeps its control net in model shape (separate weights and
//! points); evaluation goes through the injected [`NurbsKernel`]. A curve
//! that serves as the parameter-space boundary of a Curve on Surface is
//! flagged during association and rescales only its Z coordinates.

use nalgebra::{Point3, Vector3};

use super::{TOL_BOOK, TOL_NURBS};
use crate::entity::{EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::nurbs::{Closure, CurveSpec, NurbsKernel};
use crate::pd::{format_pd_real, PdCursor};

/// Control points are coplanar when every triple's normal agrees within
/// this distance.
const PLANE_TOL: f64 = 1e-8;

/// Entity 126: NURBS curve. `K` is the upper index of control points,
/// `M` the degree of the basis functions.
#[derive(Debug, Clone, Default)]
pub struct NurbsCurve {
    pub k: i32,
    pub m: i32,
    /// 1 when the curve lies in a unique plane.
    pub planar: bool,
    /// 1 when start and end coincide.
    pub closed: bool,
    /// 1 when the curve is polynomial (all weights equal).
    pub polynomial: bool,
    /// 1 when the basis wraps periodically.
    pub periodic: bool,
    pub knots: Vec<f64>,
    /// One weight per control point, strictly positive.
    pub weights: Vec<f64>,
    pub control: Vec<Point3<f64>>,
    pub v0: f64,
    pub v1: f64,
    /// Unit normal of the containing plane; meaningful when `planar`.
    pub normal: Vector3<f64>,
    /// Set during association: this curve sits inside the parameter-space
    /// boundary (BPTR) of some Curve on Surface.
    pub(crate) uv_bound: bool,
}

impl NurbsCurve {
    pub fn is_planar(&self) -> bool {
        self.planar
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_rational(&self) -> bool {
        !self.polynomial
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn coeff_count(&self) -> usize {
        self.control.len()
    }

    /// Plane normal, if the curve is planar.
    pub fn plane_normal(&self) -> Option<Vector3<f64>> {
        self.planar.then_some(self.normal)
    }

    /// Borrow the payload in the kernel's shape.
    pub fn spec(&self) -> CurveSpec<'_> {
        CurveSpec {
            control: &self.control,
            weights: &self.weights,
            knots: &self.knots,
            order: (self.m + 1) as usize,
            rational: !self.polynomial,
        }
    }

    pub fn start_point(&self, kernel: &dyn NurbsKernel) -> Result<Point3<f64>> {
        if self.control.len() < 2 {
            return Err(Error::InvariantViolation {
                entity_type: 126,
                reason: "curve has no data".into(),
            });
        }
        kernel.evaluate(&self.spec(), self.v0)
    }

    pub fn end_point(&self, kernel: &dyn NurbsKernel) -> Result<Point3<f64>> {
        if self.control.len() < 2 {
            return Err(Error::InvariantViolation {
                entity_type: 126,
                reason: "curve has no data".into(),
            });
        }
        kernel.evaluate(&self.spec(), self.v1)
    }

    /// Evaluate inside piecewise segment `seg` at the blended knot
    /// parameter `(1-var)*t[seg] + var*t[seg+1]`, `var` in `[0,1]`.
    pub fn interpolate(&self, seg: usize, var: f64, kernel: &dyn NurbsKernel) -> Result<Point3<f64>> {
        if !(0.0..=1.0).contains(&var) {
            return Err(Error::BadField {
                field: "var",
                reason: format!("{} outside [0,1]", var),
            });
        }
        if seg >= self.control.len() {
            return Err(Error::BadField {
                field: "nSeg",
                reason: format!("segment {} out of range", seg),
            });
        }

        let idx0 = (self.knots.len() - self.control.len()) / 2;
        let t = (1.0 - var) * self.knots[idx0 + seg] + var * self.knots[idx0 + seg + 1];
        kernel.evaluate(&self.spec(), t)
    }

    /// Install new curve data, recomputing the derived properties the way
    /// the file format wants them: parameter range (normalised to end at 1
    /// when it starts at 0), closure and periodicity from the kernel,
    /// planarity from the control net.
    pub fn set_data(
        &mut self,
        control: &[Point3<f64>],
        weights: &[f64],
        knots: &[f64],
        order: usize,
        rational: bool,
        kernel: &dyn NurbsKernel,
        min_resolution: f64,
    ) -> Result<()> {
        if order < 2 {
            return Err(Error::BadField {
                field: "order",
                reason: "minimum order is 2, a line".into(),
            });
        }
        if control.len() < order {
            return Err(Error::BadField {
                field: "nCoeff",
                reason: "need at least `order` control points".into(),
            });
        }
        if weights.len() != control.len() {
            return Err(Error::BadField {
                field: "weights",
                reason: "one weight per control point".into(),
            });
        }
        if knots.len() != control.len() + order {
            return Err(Error::BadField {
                field: "knots",
                reason: format!(
                    "expected {} knots, got {}",
                    control.len() + order,
                    knots.len()
                ),
            });
        }

        self.control = control.to_vec();
        self.weights = weights.to_vec();
        self.knots = knots.to_vec();
        self.k = control.len() as i32 - 1;
        self.m = order as i32 - 1;
        self.polynomial = !rational;

        let spec = self.spec();
        kernel.check_curve(&spec)?;
        let (v0, v1) = kernel.natural_range(&spec)?;
        self.v0 = v0;
        self.v1 = v1;

        if self.v0 == 0.0 && self.v1 != 1.0 {
            for k in &mut self.knots {
                *k /= v1;
            }
            self.v1 = 1.0;
        }

        match kernel.classify_closure(&self.spec(), min_resolution)? {
            Closure::Open => {
                self.closed = false;
                self.periodic = false;
            }
            Closure::Closed => {
                self.closed = true;
                self.periodic = false;
            }
            Closure::ClosedPeriodic => {
                self.closed = true;
                self.periodic = true;
            }
        }

        match unique_plane(&self.control) {
            Some(n) => {
                self.planar = true;
                self.normal = n;
            }
            None => {
                self.planar = false;
                self.normal = Vector3::z();
            }
        }

        Ok(())
    }
}

/// Normal shared by every control point triple, or `None` when the points
/// do not sit in one plane.
fn unique_plane(control: &[Point3<f64>]) -> Option<Vector3<f64>> {
    if control.len() < 3 {
        return None;
    }

    let mut reference: Option<Vector3<f64>> = None;
    for w in control.windows(3) {
        let n = (w[1] - w[0]).cross(&(w[2] - w[1]));
        let len = n.norm();
        if len <= PLANE_TOL {
            // collinear triple constrains nothing
            continue;
        }
        let n = n / len;
        match reference {
            None => reference = Some(n),
            Some(r) => {
                if (n - r).norm() > PLANE_TOL && (n + r).norm() > PLANE_TOL {
                    return None;
                }
            }
        }
    }
    reference.map(canonical_normal)
}

/// A plane has two unit normals; emit the one whose leading non-zero
/// component is positive so equal planes compare equal.
fn canonical_normal(n: Vector3<f64>) -> Vector3<f64> {
    let flip = if n.z != 0.0 {
        n.z < 0.0
    } else if n.y != 0.0 {
        n.y < 0.0
    } else {
        n.x < 0.0
    };
    if flip {
        -n
    } else {
        n
    }
}

impl EntityClass for NurbsCurve {
    fn kind(&self) -> EntityKind {
        EntityKind::NurbsCurve
    }

    fn form_ok(form: i32) -> bool {
        (0..=5).contains(&form)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.k = pd.read_int("K")? as i32;
        if self.k < 1 {
            return Err(Error::BadField {
                field: "K",
                reason: format!("{} below minimum of 1", self.k),
            });
        }
        self.m = pd.read_int("M")? as i32;
        if self.m < 1 {
            return Err(Error::BadField {
                field: "M",
                reason: format!("{} below minimum of 1", self.m),
            });
        }

        let prop = |pd: &mut PdCursor, field| -> Result<bool> {
            match pd.read_int(field)? {
                0 => Ok(false),
                1 => Ok(true),
                v => Err(Error::BadField {
                    field,
                    reason: format!("{} is not 0 or 1", v),
                }),
            }
        };
        self.planar = prop(pd, "PROP1")?;
        self.closed = prop(pd, "PROP2")?;
        self.polynomial = prop(pd, "PROP3")?;
        self.periodic = prop(pd, "PROP4")?;

        let n_knots = (2 + self.k + self.m) as usize;
        let n_coeffs = (self.k + 1) as usize;

        self.knots.clear();
        for _ in 0..n_knots {
            self.knots.push(pd.read_real("knot")?);
        }

        self.weights.clear();
        for _ in 0..n_coeffs {
            let w = pd.read_real("weight")?;
            if w <= 0.0 {
                return Err(Error::BadField {
                    field: "weight",
                    reason: format!("non-positive weight {}", w),
                });
            }
            self.weights.push(w);
        }

        self.control.clear();
        for _ in 0..n_coeffs {
            let x = pd.read_real("control point")?;
            let y = pd.read_real("control point")?;
            let z = pd.read_real("control point")?;
            self.control.push(Point3::new(x, y, z));
        }

        self.v0 = pd.read_real("V0")?;
        self.v1 = pd.read_real("V1")?;

        let nx = pd.read_real_or("XNORM", 0.0)?;
        let ny = pd.read_real_or("YNORM", 0.0)?;
        let nz = pd.read_real_or("ZNORM", 1.0)?;

        if self.planar {
            let n = Vector3::new(nx, ny, nz);
            if (n.norm() - 1.0).abs() > 1.0e-6 {
                return Err(Error::BadField {
                    field: "normal",
                    reason: format!("({}, {}, {}) is not a unit vector", nx, ny, nz),
                });
            }
            self.normal = n;
        } else {
            self.normal = Vector3::z();
        }

        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        let n_coeffs = (self.k + 1) as usize;
        if self.knots.len() != (2 + self.k + self.m) as usize || self.control.len() != n_coeffs {
            return Err(Error::InvariantViolation {
                entity_type: 126,
                reason: format!(
                    "K={} M={} demand {} knots and {} control points",
                    self.k,
                    self.m,
                    2 + self.k + self.m,
                    n_coeffs
                ),
            });
        }

        out.push(self.k.to_string());
        out.push(self.m.to_string());
        for flag in [self.planar, self.closed, self.polynomial, self.periodic] {
            out.push(i32::from(flag).to_string());
        }
        for k in &self.knots {
            out.push(format_pd_real(*k, TOL_NURBS));
        }
        for w in &self.weights {
            out.push(format_pd_real(*w, TOL_BOOK));
        }
        for p in &self.control {
            out.push(format_pd_real(p.x, TOL_NURBS));
            out.push(format_pd_real(p.y, TOL_NURBS));
            out.push(format_pd_real(p.z, TOL_NURBS));
        }
        out.push(format_pd_real(self.v0, TOL_NURBS));
        out.push(format_pd_real(self.v1, TOL_NURBS));
        out.push(format_pd_real(self.normal.x, TOL_NURBS));
        out.push(format_pd_real(self.normal.y, TOL_NURBS));
        out.push(format_pd_real(self.normal.z, TOL_NURBS));
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        // a parameter-space boundary keeps its (u, v) coordinates
        for p in &mut self.control {
            if !self.uv_bound {
                p.x *= sf;
                p.y *= sf;
            }
            p.z *= sf;
        }
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 128: NURBS surface, the two-parameter analogue of 126. Control
/// points are stored row-major, the `u` index running fastest.
#[derive(Debug, Clone, Default)]
pub struct NurbsSurface {
    pub k1: i32,
    pub k2: i32,
    pub m1: i32,
    pub m2: i32,
    pub closed_u: bool,
    pub closed_v: bool,
    pub polynomial: bool,
    pub periodic_u: bool,
    pub periodic_v: bool,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub weights: Vec<f64>,
    pub control: Vec<Point3<f64>>,
    pub u0: f64,
    pub u1: f64,
    pub v0: f64,
    pub v1: f64,
}

impl NurbsSurface {
    pub fn control_dims(&self) -> (usize, usize) {
        ((self.k1 + 1) as usize, (self.k2 + 1) as usize)
    }

    pub fn control_at(&self, i: usize, j: usize) -> Option<Point3<f64>> {
        let (nu, _) = self.control_dims();
        self.control.get(j * nu + i).copied()
    }

    pub fn is_rational(&self) -> bool {
        !self.polynomial
    }
}

impl EntityClass for NurbsSurface {
    fn kind(&self) -> EntityKind {
        EntityKind::NurbsSurface
    }

    fn form_ok(form: i32) -> bool {
        (0..=9).contains(&form)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.k1 = pd.read_int("K1")? as i32;
        self.k2 = pd.read_int("K2")? as i32;
        self.m1 = pd.read_int("M1")? as i32;
        self.m2 = pd.read_int("M2")? as i32;
        if self.k1 < 1 || self.k2 < 1 || self.m1 < 1 || self.m2 < 1 {
            return Err(Error::BadField {
                field: "K1",
                reason: "surface indices and degrees start at 1".into(),
            });
        }

        let prop = |pd: &mut PdCursor, field| -> Result<bool> {
            match pd.read_int(field)? {
                0 => Ok(false),
                1 => Ok(true),
                v => Err(Error::BadField {
                    field,
                    reason: format!("{} is not 0 or 1", v),
                }),
            }
        };
        self.closed_u = prop(pd, "PROP1")?;
        self.closed_v = prop(pd, "PROP2")?;
        self.polynomial = prop(pd, "PROP3")?;
        self.periodic_u = prop(pd, "PROP4")?;
        self.periodic_v = prop(pd, "PROP5")?;

        let nk_u = (2 + self.k1 + self.m1) as usize;
        let nk_v = (2 + self.k2 + self.m2) as usize;
        let n_pts = ((self.k1 + 1) * (self.k2 + 1)) as usize;

        self.knots_u.clear();
        for _ in 0..nk_u {
            self.knots_u.push(pd.read_real("S knot")?);
        }
        self.knots_v.clear();
        for _ in 0..nk_v {
            self.knots_v.push(pd.read_real("T knot")?);
        }

        self.weights.clear();
        for _ in 0..n_pts {
            let w = pd.read_real("weight")?;
            if w <= 0.0 {
                return Err(Error::BadField {
                    field: "weight",
                    reason: format!("non-positive weight {}", w),
                });
            }
            self.weights.push(w);
        }

        self.control.clear();
        for _ in 0..n_pts {
            let x = pd.read_real("control point")?;
            let y = pd.read_real("control point")?;
            let z = pd.read_real("control point")?;
            self.control.push(Point3::new(x, y, z));
        }

        self.u0 = pd.read_real("U0")?;
        self.u1 = pd.read_real("U1")?;
        self.v0 = pd.read_real("V0")?;
        self.v1 = pd.read_real("V1")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        let n_pts = ((self.k1 + 1) * (self.k2 + 1)) as usize;
        if self.control.len() != n_pts
            || self.knots_u.len() != (2 + self.k1 + self.m1) as usize
            || self.knots_v.len() != (2 + self.k2 + self.m2) as usize
        {
            return Err(Error::InvariantViolation {
                entity_type: 128,
                reason: "knot or control net size disagrees with K1/K2/M1/M2".into(),
            });
        }

        out.push(self.k1.to_string());
        out.push(self.k2.to_string());
        out.push(self.m1.to_string());
        out.push(self.m2.to_string());
        for flag in [
            self.closed_u,
            self.closed_v,
            self.polynomial,
            self.periodic_u,
            self.periodic_v,
        ] {
            out.push(i32::from(flag).to_string());
        }
        for k in &self.knots_u {
            out.push(format_pd_real(*k, TOL_NURBS));
        }
        for k in &self.knots_v {
            out.push(format_pd_real(*k, TOL_NURBS));
        }
        for w in &self.weights {
            out.push(format_pd_real(*w, TOL_BOOK));
        }
        for p in &self.control {
            out.push(format_pd_real(p.x, TOL_NURBS));
            out.push(format_pd_real(p.y, TOL_NURBS));
            out.push(format_pd_real(p.z, TOL_NURBS));
        }
        out.push(format_pd_real(self.u0, TOL_NURBS));
        out.push(format_pd_real(self.u1, TOL_NURBS));
        out.push(format_pd_real(self.v0, TOL_NURBS));
        out.push(format_pd_real(self.v1, TOL_NURBS));
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        for p in &mut self.control {
            p.x *= sf;
            p.y *= sf;
            p.z *= sf;
        }
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::BasisEvaluator;

    fn read_curve(text: &str) -> Result<NurbsCurve> {
        let mut pd = PdCursor::new(text, ',', ';');
        pd.read_int("type").unwrap();
        let mut c = NurbsCurve::default();
        let mut core = crate::entity::Entity::new(EntityKind::NurbsCurve).core;
        c.read_pd(&mut pd, &mut core, &GlobalParams::default())?;
        Ok(c)
    }

    const BEZIER: &str = "126,3,3,1,0,1,0,\
                          0.0,0.0,0.0,0.0,1.0,1.0,1.0,1.0,\
                          1.0,1.0,1.0,1.0,\
                          0.0,0.0,0.0,1.0,2.0,0.0,2.0,2.0,0.0,3.0,0.0,0.0,\
                          0.0,1.0,0.0,0.0,1.0;";

    #[test]
    fn reads_cubic_bezier() {
        let c = read_curve(BEZIER).unwrap();
        assert_eq!(c.k, 3);
        assert_eq!(c.m, 3);
        assert!(c.is_planar());
        assert!(!c.is_closed());
        assert!(!c.is_rational());
        assert_eq!(c.knots.len(), 8);
        assert_eq!(c.control.len(), 4);
        assert_eq!(c.normal, Vector3::z());
    }

    #[test]
    fn rejects_nonpositive_weight() {
        let text = "126,1,1,0,0,1,0,0.0,0.0,1.0,1.0,1.0,0.0,\
                    0.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0;";
        assert!(read_curve(text).is_err());
    }

    #[test]
    fn set_data_derives_properties() {
        let mut c = NurbsCurve::default();
        let control = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let weights = [1.0; 4];
        let knots = [0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 2.0];

        c.set_data(&control, &weights, &knots, 4, false, &BasisEvaluator, 1e-8)
            .unwrap();

        assert_eq!(c.k, 3);
        assert_eq!(c.m, 3);
        assert!(c.planar);
        assert!(!c.closed);
        assert!(c.polynomial);
        assert!(!c.periodic);
        assert_eq!(c.normal, Vector3::z());

        // knot range [0,2] is normalised to end at 1
        assert_eq!(c.v0, 0.0);
        assert_eq!(c.v1, 1.0);
        assert_eq!(c.knots.last().copied(), Some(1.0));
    }

    #[test]
    fn interpolate_uses_blended_knot_parameter() {
        let c = read_curve(BEZIER).unwrap();
        let k = BasisEvaluator;

        let start = c.interpolate(0, 0.0, &k).unwrap();
        assert_eq!(start, Point3::new(0.0, 0.0, 0.0));

        // the last segment at var=1 lands on the curve end
        let end = c.interpolate(3, 1.0, &k).unwrap();
        assert_eq!(end, c.end_point(&k).unwrap());
    }

    #[test]
    fn uv_bound_rescales_z_only() {
        let mut c = read_curve(BEZIER).unwrap();
        c.uv_bound = true;
        c.control[1].z = 4.0;
        c.rescale(25.4);
        assert_eq!(c.control[1], Point3::new(1.0, 2.0, 101.6));
        assert_eq!(c.control[3], Point3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn surface_read_and_format_round_trip() {
        // bilinear patch: K1=K2=1, M1=M2=1, 4 control points
        let text = "128,1,1,1,1,0,0,1,0,0,\
                    0.0,0.0,1.0,1.0,0.0,0.0,1.0,1.0,\
                    1.0,1.0,1.0,1.0,\
                    0.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0,0.0,1.0,1.0,1.0,\
                    0.0,1.0,0.0,1.0;";
        let mut pd = PdCursor::new(text, ',', ';');
        pd.read_int("type").unwrap();
        let mut s = NurbsSurface::default();
        let mut core = crate::entity::Entity::new(EntityKind::NurbsSurface).core;
        s.read_pd(&mut pd, &mut core, &GlobalParams::default()).unwrap();

        assert_eq!(s.control_dims(), (2, 2));
        assert_eq!(s.control_at(1, 1), Some(Point3::new(1.0, 1.0, 1.0)));

        let mut out = Vec::new();
        s.format_pd(&mut out, &core, &SeqMap::default()).unwrap();
        assert_eq!(out[0], "1");
        assert_eq!(out.len(), 9 + 8 + 4 + 12 + 4);
    }
}
