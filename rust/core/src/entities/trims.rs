// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface trimming kinds: Boundary (141), Curve on Parametric Surface
//! (142), Bounded Surface (143), Trimmed Parametric Surface (144).

use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::PdCursor;

/// Entity type codes acceptable as the surface side of a trim.
const SURFACE_CODES: &[i32] = &[120, 122, 128, 143];

fn opt_seq(map: &SeqMap, id: Option<EntityId>) -> Result<String> {
    match id {
        Some(id) => Ok(seq_of(map, id)?.to_string()),
        None => Ok("0".to_string()),
    }
}

/// One boundary curve of a 141: a model-space curve, its orientation
/// against the surface, and the parameter-space curves representing it.
#[derive(Debug, Clone)]
pub struct BoundaryCurve {
    pub curve: EntityId,
    /// 1 = model curve direction, 2 = reversed.
    pub sense: i32,
    pub parameter_curves: Vec<EntityId>,
}

/// Entity 141: a surface boundary in model space, optionally backed by
/// parameter-space curves.
#[derive(Debug, Clone, Default)]
pub struct Boundary {
    /// 0 = model curves only, 1 = model plus parameter-space curves.
    pub boundary_type: i32,
    /// Preferred representation: 0 unspecified, 1 model, 2 parameter.
    pub preference: i32,
    pub surface: Option<EntityId>,
    pub curves: Vec<BoundaryCurve>,
    pending_surface: i32,
    pending_curves: Vec<(i32, i32, Vec<i32>)>,
}

impl EntityClass for Boundary {
    fn kind(&self) -> EntityKind {
        EntityKind::Boundary
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
        self.boundary_type = pd.read_int("TYPE")? as i32;
        if !matches!(self.boundary_type, 0 | 1) {
            return Err(Error::BadField {
                field: "TYPE",
                reason: format!("boundary type {} out of range", self.boundary_type),
            });
        }
        self.preference = pd.read_int_or("PREF", 0)? as i32;
        self.pending_surface = pd.read_ptr("SPTR")?;
        let n = pd.read_int("N")?;

        self.pending_curves.clear();
        for _ in 0..n {
            let curve = pd.read_ptr("CRVPT")?;
            let sense = pd.read_int_or("SENSE", 1)? as i32;
            if !matches!(sense, 1 | 2) {
                return Err(Error::BadField {
                    field: "SENSE",
                    reason: format!("orientation {} out of range", sense),
                });
            }
            let k = pd.read_int_or("K", 0)?;
            let mut pcs = Vec::new();
            for _ in 0..k {
                pcs.push(pd.read_ptr("PSCPT")?);
            }
            self.pending_curves.push((curve, sense, pcs));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.boundary_type.to_string());
        out.push(self.preference.to_string());
        out.push(opt_seq(map, self.surface)?);
        out.push(self.curves.len().to_string());
        for bc in &self.curves {
            out.push(seq_of(map, bc.curve)?.to_string());
            out.push(bc.sense.to_string());
            out.push(bc.parameter_curves.len().to_string());
            for &pc in &bc.parameter_curves {
                out.push(seq_of(map, pc)?.to_string());
            }
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        if self.pending_surface > 0 {
            self.surface = Some(r.typed(self.pending_surface, SURFACE_CODES, "SPTR")?);
        }
        for (curve, sense, pcs) in std::mem::take(&mut self.pending_curves) {
            let curve = r.curve(curve, "CRVPT")?;
            let mut parameter_curves = Vec::with_capacity(pcs.len());
            for pc in pcs {
                parameter_curves.push(r.curve(pc, "PSCPT")?);
            }
            self.curves.push(BoundaryCurve {
                curve,
                sense,
                parameter_curves,
            });
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self.surface.into_iter().collect();
        for bc in &self.curves {
            out.push(bc.curve);
            out.extend(bc.parameter_curves.iter().copied());
        }
        out
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.surface == Some(child) {
            self.surface = None;
            removed = true;
        }
        let before = self.curves.len();
        self.curves.retain(|bc| bc.curve != child);
        removed |= before != self.curves.len();
        for bc in &mut self.curves {
            let n = bc.parameter_curves.len();
            bc.parameter_curves.retain(|&pc| pc != child);
            removed |= n != bc.parameter_curves.len();
        }
        removed
    }
}

/// Entity 142: a curve lying on a parametric surface, represented both in
/// the surface's parameter space (BPTR) and in model space (CPTR).
#[derive(Debug, Clone, Default)]
pub struct CurveOnSurface {
    /// How the curve was created: 0 unspecified, 1 projection, 2 surface
    /// intersection, 3 isoparametric.
    pub crtn: i32,
    pub surface: Option<EntityId>,
    /// Parameter-space representation.
    pub bptr: Option<EntityId>,
    /// Model-space representation.
    pub cptr: Option<EntityId>,
    /// Preferred representation: 0 unspecified, 1 parameter, 2 model,
    /// 3 equal weight.
    pub pref: i32,
    pending_surface: i32,
    pending_bptr: i32,
    pending_cptr: i32,
}

impl CurveOnSurface {
    pub(crate) fn set_surface(&mut self, surface: EntityId) {
        self.surface = Some(surface);
    }

    pub(crate) fn set_bptr(&mut self, curve: EntityId) {
        self.bptr = Some(curve);
    }

    pub(crate) fn set_cptr(&mut self, curve: EntityId) {
        self.cptr = Some(curve);
    }
}

impl EntityClass for CurveOnSurface {
    fn kind(&self) -> EntityKind {
        EntityKind::CurveOnSurface
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
        self.crtn = pd.read_int_or("CRTN", 0)? as i32;
        if !(0..=3).contains(&self.crtn) {
            return Err(Error::BadField {
                field: "CRTN",
                reason: format!("creation flag {} out of range", self.crtn),
            });
        }
        self.pending_surface = pd.read_ptr("SPTR")?;
        if self.pending_surface <= 0 {
            return Err(Error::BadField {
                field: "SPTR",
                reason: "curve on surface needs its surface".into(),
            });
        }
        self.pending_bptr = pd.read_ptr("BPTR")?;
        self.pending_cptr = pd.read_ptr("CPTR")?;
        self.pref = pd.read_int_or("PREF", 0)? as i32;
        if !(0..=3).contains(&self.pref) {
            return Err(Error::BadField {
                field: "PREF",
                reason: format!("preference {} out of range", self.pref),
            });
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let surface = self.surface.ok_or(Error::NotAssociated(142))?;
        out.push(self.crtn.to_string());
        out.push(seq_of(map, surface)?.to_string());
        out.push(opt_seq(map, self.bptr)?);
        out.push(opt_seq(map, self.cptr)?);
        out.push(self.pref.to_string());
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.surface = Some(r.typed(self.pending_surface, SURFACE_CODES, "SPTR")?);
        if self.pending_bptr > 0 {
            self.bptr = Some(r.curve(self.pending_bptr, "BPTR")?);
        }
        if self.pending_cptr > 0 {
            self.cptr = Some(r.curve(self.pending_cptr, "CPTR")?);
        }
        self.pending_surface = 0;
        self.pending_bptr = 0;
        self.pending_cptr = 0;
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.surface
            .into_iter()
            .chain(self.bptr)
            .chain(self.cptr)
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.surface == Some(child) {
            self.surface = None;
            removed = true;
        }
        if self.bptr == Some(child) {
            self.bptr = None;
            removed = true;
        }
        if self.cptr == Some(child) {
            self.cptr = None;
            removed = true;
        }
        removed
    }
}

/// Entity 143: a surface clipped by Boundary (141) entities.
#[derive(Debug, Clone, Default)]
pub struct BoundedSurface {
    /// 0 = boundaries in model space only, 1 = parameter space available.
    pub representation: i32,
    pub surface: Option<EntityId>,
    pub boundaries: Vec<EntityId>,
    pending_surface: i32,
    pending_boundaries: Vec<i32>,
}

impl EntityClass for BoundedSurface {
    fn kind(&self) -> EntityKind {
        EntityKind::BoundedSurface
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
        self.representation = pd.read_int("TYPE")? as i32;
        if !matches!(self.representation, 0 | 1) {
            return Err(Error::BadField {
                field: "TYPE",
                reason: format!("representation {} out of range", self.representation),
            });
        }
        self.pending_surface = pd.read_ptr("SPTR")?;
        let n = pd.read_int("N")?;
        self.pending_boundaries.clear();
        for _ in 0..n {
            self.pending_boundaries.push(pd.read_ptr("BDPT")?);
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.representation.to_string());
        out.push(opt_seq(map, self.surface)?);
        out.push(self.boundaries.len().to_string());
        for &b in &self.boundaries {
            out.push(seq_of(map, b)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        if self.pending_surface > 0 {
            self.surface = Some(r.typed(self.pending_surface, SURFACE_CODES, "SPTR")?);
        }
        for b in std::mem::take(&mut self.pending_boundaries) {
            self.boundaries.push(r.typed(b, &[141], "BDPT")?);
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.surface
            .into_iter()
            .chain(self.boundaries.iter().copied())
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.surface == Some(child) {
            self.surface = None;
            removed = true;
        }
        let before = self.boundaries.len();
        self.boundaries.retain(|&b| b != child);
        removed || before != self.boundaries.len()
    }
}

/// Entity 144: a parametric surface clipped to an outer boundary and a set
/// of holes, each a Curve on Surface.
#[derive(Debug, Clone, Default)]
pub struct TrimmedSurface {
    pub surface: Option<EntityId>,
    /// 0 when the outer boundary is the surface's own, 1 when PTO trims it.
    pub n1: i32,
    pub outer: Option<EntityId>,
    pub holes: Vec<EntityId>,
    pending_surface: i32,
    pending_outer: i32,
    pending_holes: Vec<i32>,
}

impl TrimmedSurface {
    pub(crate) fn set_surface(&mut self, surface: EntityId) {
        self.surface = Some(surface);
    }

    pub(crate) fn set_outer(&mut self, boundary: EntityId) {
        self.outer = Some(boundary);
        self.n1 = 1;
    }

    pub(crate) fn add_hole(&mut self, boundary: EntityId) {
        self.holes.push(boundary);
    }
}

impl EntityClass for TrimmedSurface {
    fn kind(&self) -> EntityKind {
        EntityKind::TrimmedSurface
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
        self.pending_surface = pd.read_ptr("PTS")?;
        if self.pending_surface <= 0 {
            return Err(Error::BadField {
                field: "PTS",
                reason: "trimmed surface needs its surface".into(),
            });
        }
        self.n1 = pd.read_int_or("N1", 0)? as i32;
        if !matches!(self.n1, 0 | 1) {
            return Err(Error::BadField {
                field: "N1",
                reason: format!("outer-boundary flag {} out of range", self.n1),
            });
        }
        let n2 = pd.read_int_or("N2", 0)?;
        self.pending_outer = pd.read_ptr("PTO")?;
        self.pending_holes.clear();
        for _ in 0..n2 {
            self.pending_holes.push(pd.read_ptr("PTI")?);
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let surface = self.surface.ok_or(Error::NotAssociated(144))?;
        out.push(seq_of(map, surface)?.to_string());
        out.push(self.n1.to_string());
        out.push(self.holes.len().to_string());
        out.push(opt_seq(map, self.outer)?);
        for &h in &self.holes {
            out.push(seq_of(map, h)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.surface = Some(r.typed(self.pending_surface, SURFACE_CODES, "PTS")?);
        if self.pending_outer > 0 {
            self.outer = Some(r.typed(self.pending_outer, &[142], "PTO")?);
        }
        for h in std::mem::take(&mut self.pending_holes) {
            self.holes.push(r.typed(h, &[142], "PTI")?);
        }
        self.pending_surface = 0;
        self.pending_outer = 0;
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.surface
            .into_iter()
            .chain(self.outer)
            .chain(self.holes.iter().copied())
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.surface == Some(child) {
            self.surface = None;
            removed = true;
        }
        if self.outer == Some(child) {
            self.outer = None;
            self.n1 = 0;
            removed = true;
        }
        let before = self.holes.len();
        self.holes.retain(|&h| h != child);
        removed || before != self.holes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_on_surface_requires_surface() {
        let mut pd = PdCursor::new("1,0,3,5,1;", ',', ';');
        let mut c = CurveOnSurface::default();
        let mut core = crate::entity::Entity::new(EntityKind::CurveOnSurface).core;
        let g = GlobalParams::default();
        // CRTN=1 then SPTR=0: must be rejected
        assert!(c.read_pd(&mut pd, &mut core, &g).is_err());
    }

    #[test]
    fn trimmed_surface_reads_hole_list() {
        let mut pd = PdCursor::new("7,1,2,9,11,13;", ',', ';');
        let mut t = TrimmedSurface::default();
        let mut core = crate::entity::Entity::new(EntityKind::TrimmedSurface).core;
        t.read_pd(&mut pd, &mut core, &GlobalParams::default()).unwrap();
        assert_eq!(t.pending_surface, 7);
        assert_eq!(t.n1, 1);
        assert_eq!(t.pending_outer, 9);
        assert_eq!(t.pending_holes, vec![11, 13]);
    }
}
