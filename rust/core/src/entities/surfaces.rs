// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Swept surface kinds: Surface of Revolution (120) and Tabulated
//! Cylinder (122).

use nalgebra::Point3;

use super::TOL_BOOK;
use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::{format_pd_real, PdCursor};

/// Entity 120: a generatrix curve revolved about an axis line from a start
/// to an end angle (radians, counter-clockwise about the axis).
#[derive(Debug, Clone, Default)]
pub struct SurfaceOfRevolution {
    pub axis: Option<EntityId>,
    pub generatrix: Option<EntityId>,
    pub start_angle: f64,
    pub end_angle: f64,
    pending_axis: i32,
    pending_generatrix: i32,
}

impl SurfaceOfRevolution {
    pub(crate) fn set_axis(&mut self, line: EntityId) {
        self.axis = Some(line);
    }

    pub(crate) fn set_generatrix(&mut self, curve: EntityId) {
        self.generatrix = Some(curve);
    }
}

impl EntityClass for SurfaceOfRevolution {
    fn kind(&self) -> EntityKind {
        EntityKind::SurfaceOfRevolution
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
        self.pending_axis = pd.read_ptr("L")?;
        self.pending_generatrix = pd.read_ptr("C")?;
        self.start_angle = pd.read_real_or("SA", 0.0)?;
        self.end_angle = pd.read_real_or("TA", std::f64::consts::TAU)?;

        if self.pending_axis <= 0 || self.pending_generatrix <= 0 {
            return Err(Error::BadField {
                field: "L",
                reason: "surface of revolution needs an axis and a generatrix".into(),
            });
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let axis = self.axis.ok_or(Error::NotAssociated(120))?;
        let gen = self.generatrix.ok_or(Error::NotAssociated(120))?;
        out.push(seq_of(map, axis)?.to_string());
        out.push(seq_of(map, gen)?.to_string());
        out.push(format_pd_real(self.start_angle, TOL_BOOK));
        out.push(format_pd_real(self.end_angle, TOL_BOOK));
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.axis = Some(r.typed(self.pending_axis, &[110], "L")?);
        self.generatrix = Some(r.curve(self.pending_generatrix, "C")?);
        self.pending_axis = 0;
        self.pending_generatrix = 0;
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {
        // angles are dimensionless; the axis and generatrix scale themselves
    }

    fn children(&self) -> Vec<EntityId> {
        self.axis.into_iter().chain(self.generatrix).collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.axis == Some(child) {
            self.axis = None;
            removed = true;
        }
        if self.generatrix == Some(child) {
            self.generatrix = None;
            removed = true;
        }
        removed
    }
}

/// Entity 122: a directrix curve swept linearly to a terminating point.
#[derive(Debug, Clone, Default)]
pub struct TabulatedCylinder {
    pub directrix: Option<EntityId>,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pending_directrix: i32,
}

impl TabulatedCylinder {
    pub fn terminate_point(&self) -> Point3<f64> {
        Point3::new(self.lx, self.ly, self.lz)
    }
}

impl EntityClass for TabulatedCylinder {
    fn kind(&self) -> EntityKind {
        EntityKind::TabulatedCylinder
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
        self.pending_directrix = pd.read_ptr("CPTR")?;
        if self.pending_directrix <= 0 {
            return Err(Error::BadField {
                field: "CPTR",
                reason: "tabulated cylinder needs a directrix".into(),
            });
        }
        self.lx = pd.read_real("LX")?;
        self.ly = pd.read_real("LY")?;
        self.lz = pd.read_real("LZ")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let directrix = self.directrix.ok_or(Error::NotAssociated(122))?;
        out.push(seq_of(map, directrix)?.to_string());
        out.push(format_pd_real(self.lx, TOL_BOOK));
        out.push(format_pd_real(self.ly, TOL_BOOK));
        out.push(format_pd_real(self.lz, TOL_BOOK));
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.directrix = Some(r.curve(self.pending_directrix, "CPTR")?);
        self.pending_directrix = 0;
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.lx *= sf;
        self.ly *= sf;
        self.lz *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        self.directrix.into_iter().collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        if self.directrix == Some(child) {
            self.directrix = None;
            true
        } else {
            false
        }
    }
}
