// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simple curve kinds: Circular Arc (100), Conic Arc (104), Line (110),
//! Parametric Spline Curve (112), and Point (116).

use nalgebra::Point3;

use super::TOL_BOOK;
use crate::entity::{EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::entity::seq_of;
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::PdCursor;

/// Entity 100: a circular arc parallel to the XY plane, traversed
/// counter-clockwise from start to end.
#[derive(Debug, Clone)]
pub struct CircularArc {
    pub z_offset: f64,
    pub x_center: f64,
    pub y_center: f64,
    pub x_start: f64,
    pub y_start: f64,
    pub x_end: f64,
    pub y_end: f64,
}

impl Default for CircularArc {
    fn default() -> Self {
        CircularArc {
            z_offset: 0.0,
            x_center: 0.0,
            y_center: 0.0,
            x_start: 1.0,
            y_start: 0.0,
            x_end: 1.0,
            y_end: 0.0,
        }
    }
}

impl CircularArc {
    pub fn start_point(&self) -> Point3<f64> {
        Point3::new(self.x_start, self.y_start, self.z_offset)
    }

    pub fn end_point(&self) -> Point3<f64> {
        Point3::new(self.x_end, self.y_end, self.z_offset)
    }

    pub fn radius(&self) -> f64 {
        let dx = self.x_start - self.x_center;
        let dy = self.y_start - self.y_center;
        (dx * dx + dy * dy).sqrt()
    }
}

impl EntityClass for CircularArc {
    fn kind(&self) -> EntityKind {
        EntityKind::CircularArc
    }

    fn form_ok(form: i32) -> bool {
        form == 0
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.z_offset = pd.read_real_or("zOffset", 0.0)?;
        self.x_center = pd.read_real("xCenter")?;
        self.y_center = pd.read_real("yCenter")?;
        self.x_start = pd.read_real("xStart")?;
        self.y_start = pd.read_real("yStart")?;
        self.x_end = pd.read_real("xEnd")?;
        self.y_end = pd.read_real("yEnd")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        for v in [
            self.z_offset,
            self.x_center,
            self.y_center,
            self.x_start,
            self.y_start,
            self.x_end,
            self.y_end,
        ] {
            out.push(crate::pd::format_pd_real(v, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.z_offset *= sf;
        self.x_center *= sf;
        self.y_center *= sf;
        self.x_start *= sf;
        self.y_start *= sf;
        self.x_end *= sf;
        self.y_end *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 104: a conic arc `A x^2 + B xy + C y^2 + D x + E y + F = 0`
/// clipped between a start and an end point. Form 1 is an ellipse, 2 a
/// hyperbola, 3 a parabola.
#[derive(Debug, Clone, Default)]
pub struct ConicArc {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub z_offset: f64,
    pub x_start: f64,
    pub y_start: f64,
    pub x_end: f64,
    pub y_end: f64,
}

impl ConicArc {
    pub fn start_point(&self) -> Point3<f64> {
        Point3::new(self.x_start, self.y_start, self.z_offset)
    }

    pub fn end_point(&self) -> Point3<f64> {
        Point3::new(self.x_end, self.y_end, self.z_offset)
    }
}

impl EntityClass for ConicArc {
    fn kind(&self) -> EntityKind {
        EntityKind::ConicArc
    }

    fn form_ok(form: i32) -> bool {
        matches!(form, 1..=3)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.a = pd.read_real("A")?;
        self.b = pd.read_real("B")?;
        self.c = pd.read_real("C")?;
        self.d = pd.read_real("D")?;
        self.e = pd.read_real("E")?;
        self.f = pd.read_real("F")?;
        self.z_offset = pd.read_real_or("ZT", 0.0)?;
        self.x_start = pd.read_real("X1")?;
        self.y_start = pd.read_real("Y1")?;
        self.x_end = pd.read_real("X2")?;
        self.y_end = pd.read_real("Y2")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        for v in [
            self.a,
            self.b,
            self.c,
            self.d,
            self.e,
            self.f,
            self.z_offset,
            self.x_start,
            self.y_start,
            self.x_end,
            self.y_end,
        ] {
            out.push(crate::pd::format_pd_real(v, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    // scaling x and y by sf keeps the quadratic coefficients fixed, scales
    // the linear terms once and the constant twice
    fn rescale(&mut self, sf: f64) {
        self.d *= sf;
        self.e *= sf;
        self.f *= sf * sf;
        self.z_offset *= sf;
        self.x_start *= sf;
        self.y_start *= sf;
        self.x_end *= sf;
        self.y_end *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 110: a line between two model-space points.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub x1: f64,
    pub y1: f64,
    pub z1: f64,
    pub x2: f64,
    pub y2: f64,
    pub z2: f64,
}

impl Line {
    pub fn start_point(&self) -> Point3<f64> {
        Point3::new(self.x1, self.y1, self.z1)
    }

    pub fn end_point(&self) -> Point3<f64> {
        Point3::new(self.x2, self.y2, self.z2)
    }

    pub fn length(&self) -> f64 {
        (self.end_point() - self.start_point()).norm()
    }
}

impl EntityClass for Line {
    fn kind(&self) -> EntityKind {
        EntityKind::Line
    }

    fn form_ok(form: i32) -> bool {
        form == 0
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.x1 = pd.read_real("X1")?;
        self.y1 = pd.read_real("Y1")?;
        self.z1 = pd.read_real("Z1")?;
        self.x2 = pd.read_real("X2")?;
        self.y2 = pd.read_real("Y2")?;
        self.z2 = pd.read_real("Z2")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        for v in [self.x1, self.y1, self.z1, self.x2, self.y2, self.z2] {
            out.push(crate::pd::format_pd_real(v, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.x1 *= sf;
        self.y1 *= sf;
        self.z1 *= sf;
        self.x2 *= sf;
        self.y2 *= sf;
        self.z2 *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 112: a piecewise cubic (or lower) polynomial curve. Each segment
/// carries twelve coefficients, four per coordinate; the trailing block is
/// the last polynomial evaluated at the final break point.
#[derive(Debug, Clone, Default)]
pub struct SplineCurve {
    /// Spline type (1 linear .. 6 B-spline); informational.
    pub ctype: i32,
    /// Degree of continuity with respect to arc length.
    pub continuity: i32,
    /// 2 = planar, 3 = spatial.
    pub ndim: i32,
    /// Break points, one more than the number of segments.
    pub breaks: Vec<f64>,
    /// Per segment: `[ax,bx,cx,dx, ay,by,cy,dy, az,bz,cz,dz]`.
    pub segments: Vec<[f64; 12]>,
    /// Terminal values and derivatives at the last break point.
    pub terminal: [f64; 12],
}

impl SplineCurve {
    pub fn start_point(&self) -> Point3<f64> {
        match self.segments.first() {
            Some(s) => Point3::new(s[0], s[4], s[8]),
            None => Point3::origin(),
        }
    }

    pub fn end_point(&self) -> Point3<f64> {
        Point3::new(self.terminal[0], self.terminal[4], self.terminal[8])
    }

    /// Evaluate segment `seg` at local parameter `s` (offset from its break
    /// point).
    pub fn eval_segment(&self, seg: usize, s: f64) -> Option<Point3<f64>> {
        let c = self.segments.get(seg)?;
        let poly = |o: usize| c[o] + s * (c[o + 1] + s * (c[o + 2] + s * c[o + 3]));
        Some(Point3::new(poly(0), poly(4), poly(8)))
    }
}

impl EntityClass for SplineCurve {
    fn kind(&self) -> EntityKind {
        EntityKind::SplineCurve
    }

    fn form_ok(form: i32) -> bool {
        form == 0
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.ctype = pd.read_int("CTYPE")? as i32;
        self.continuity = pd.read_int("H")? as i32;
        self.ndim = pd.read_int("NDIM")? as i32;
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: format!("segment count {} out of range", n),
            });
        }

        self.breaks.clear();
        for _ in 0..=n {
            self.breaks.push(pd.read_real("break point")?);
        }

        self.segments.clear();
        for _ in 0..n {
            let mut seg = [0.0; 12];
            for v in seg.iter_mut() {
                *v = pd.read_real("coefficient")?;
            }
            self.segments.push(seg);
        }

        for v in self.terminal.iter_mut() {
            *v = pd.read_real("terminal value")?;
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        if self.segments.is_empty() || self.breaks.len() != self.segments.len() + 1 {
            return Err(Error::InvariantViolation {
                entity_type: 112,
                reason: "break point count must exceed segment count by one".into(),
            });
        }

        out.push(self.ctype.to_string());
        out.push(self.continuity.to_string());
        out.push(self.ndim.to_string());
        out.push(self.segments.len().to_string());
        for b in &self.breaks {
            out.push(crate::pd::format_pd_real(*b, TOL_BOOK));
        }
        for seg in &self.segments {
            for v in seg {
                out.push(crate::pd::format_pd_real(*v, TOL_BOOK));
            }
        }
        for v in &self.terminal {
            out.push(crate::pd::format_pd_real(*v, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        for seg in &mut self.segments {
            for v in seg.iter_mut() {
                *v *= sf;
            }
        }
        for v in self.terminal.iter_mut() {
            *v *= sf;
        }
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 116: a point, optionally displayed through a subfigure
/// definition.
#[derive(Debug, Clone, Default)]
pub struct PointEntity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Display symbol (Subfigure Definition 308), when any.
    pub symbol: Option<EntityId>,
    pending_symbol: i32,
}

impl PointEntity {
    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

impl EntityClass for PointEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Point
    }

    fn form_ok(form: i32) -> bool {
        form == 0
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.x = pd.read_real("X")?;
        self.y = pd.read_real("Y")?;
        self.z = pd.read_real("Z")?;
        self.pending_symbol = pd.read_ptr("PTR")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(crate::pd::format_pd_real(self.x, TOL_BOOK));
        out.push(crate::pd::format_pd_real(self.y, TOL_BOOK));
        out.push(crate::pd::format_pd_real(self.z, TOL_BOOK));
        match self.symbol {
            Some(id) => out.push(seq_of(map, id)?.to_string()),
            None => out.push("0".to_string()),
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        if self.pending_symbol > 0 {
            self.symbol = Some(r.typed(self.pending_symbol, &[308], "PTR")?);
        }
        self.pending_symbol = 0;
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.x *= sf;
        self.y *= sf;
        self.z *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        self.symbol.into_iter().collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        if self.symbol == Some(child) {
            self.symbol = None;
            true
        } else {
            false
        }
    }
}
