// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structure kinds: Subfigure Definition (308), Colour Definition (314),
//! Associativity Instance (402), Singular Subfigure Instance (408).

use nalgebra::Vector3;

use super::TOL_BOOK;
use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::{format_hstring, format_pd_real, PdCursor};

/// Entity 308: a named collection of entities instanced elsewhere.
#[derive(Debug, Clone, Default)]
pub struct SubfigureDefinition {
    /// Nesting depth: how many levels of subfigure instances sit below.
    pub depth: i32,
    pub name: String,
    pub entities: Vec<EntityId>,
    pending: Vec<i32>,
}

impl EntityClass for SubfigureDefinition {
    fn kind(&self) -> EntityKind {
        EntityKind::SubfigureDefinition
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
        self.depth = pd.read_int_or("DEPTH", 0)? as i32;
        self.name = pd.read_string_or("NAME", "")?;
        let n = pd.read_int("N")?;
        self.pending.clear();
        for _ in 0..n {
            let ptr = pd.read_ptr("entity pointer")?;
            if ptr > 0 {
                self.pending.push(ptr);
            }
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.depth.to_string());
        out.push(format_hstring(&self.name));
        out.push(self.entities.len().to_string());
        for &e in &self.entities {
            out.push(seq_of(map, e)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for ptr in std::mem::take(&mut self.pending) {
            self.entities.push(r.entity(ptr, "entity pointer")?);
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.entities.clone()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.entities.len();
        self.entities.retain(|&e| e != child);
        before != self.entities.len()
    }
}

/// Entity 314: an RGB colour, each channel in percent.
#[derive(Debug, Clone, Default)]
pub struct ColorDefinition {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub name: String,
}

impl EntityClass for ColorDefinition {
    fn kind(&self) -> EntityKind {
        EntityKind::ColorDefinition
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
        self.red = pd.read_real("CC1")?;
        self.green = pd.read_real("CC2")?;
        self.blue = pd.read_real("CC3")?;
        for (field, v) in [("CC1", self.red), ("CC2", self.green), ("CC3", self.blue)] {
            if !(0.0..=100.0).contains(&v) {
                return Err(Error::BadField {
                    field,
                    reason: format!("colour component {} outside 0..100", v),
                });
            }
        }
        self.name = pd.read_string_or("CNAME", "")?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        out.push(format_pd_real(self.red, TOL_BOOK));
        out.push(format_pd_real(self.green, TOL_BOOK));
        out.push(format_pd_real(self.blue, TOL_BOOK));
        if !self.name.is_empty() {
            out.push(format_hstring(&self.name));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 402: an associativity instance grouping entities. Forms 1/7 are
/// unordered groups (with and without back pointers), 14/15 their ordered
/// counterparts.
#[derive(Debug, Clone, Default)]
pub struct Associativity {
    pub members: Vec<EntityId>,
    pending: Vec<i32>,
}

impl EntityClass for Associativity {
    fn kind(&self) -> EntityKind {
        EntityKind::Associativity
    }

    fn form_ok(form: i32) -> bool {
        matches!(form, 1 | 7 | 14 | 15)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        let n = pd.read_int("N")?;
        self.pending.clear();
        for _ in 0..n {
            let ptr = pd.read_ptr("member")?;
            if ptr > 0 {
                self.pending.push(ptr);
            }
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.members.len().to_string());
        for &m in &self.members {
            out.push(seq_of(map, m)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for ptr in std::mem::take(&mut self.pending) {
            self.members.push(r.entity(ptr, "member")?);
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.members.clone()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != child);
        before != self.members.len()
    }
}

/// Entity 408: an instance of a Subfigure Definition, translated and
/// uniformly scaled.
#[derive(Debug, Clone)]
pub struct SubfigureInstance {
    pub definition: Option<EntityId>,
    pub translation: Vector3<f64>,
    pub scale: f64,
    pending_definition: i32,
}

impl Default for SubfigureInstance {
    fn default() -> Self {
        SubfigureInstance {
            definition: None,
            translation: Vector3::zeros(),
            scale: 1.0,
            pending_definition: 0,
        }
    }
}

impl EntityClass for SubfigureInstance {
    fn kind(&self) -> EntityKind {
        EntityKind::SubfigureInstance
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
        self.pending_definition = pd.read_ptr("DE")?;
        if self.pending_definition <= 0 {
            return Err(Error::BadField {
                field: "DE",
                reason: "subfigure instance needs its definition".into(),
            });
        }
        self.translation.x = pd.read_real_or("X", 0.0)?;
        self.translation.y = pd.read_real_or("Y", 0.0)?;
        self.translation.z = pd.read_real_or("Z", 0.0)?;
        self.scale = pd.read_real_or("S", 1.0)?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let def = self.definition.ok_or(Error::NotAssociated(408))?;
        out.push(seq_of(map, def)?.to_string());
        out.push(format_pd_real(self.translation.x, TOL_BOOK));
        out.push(format_pd_real(self.translation.y, TOL_BOOK));
        out.push(format_pd_real(self.translation.z, TOL_BOOK));
        out.push(format_pd_real(self.scale, TOL_BOOK));
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.definition = Some(r.typed(self.pending_definition, &[308], "DE")?);
        self.pending_definition = 0;
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        // the scale factor is a ratio; only the placement moves
        self.translation *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        self.definition.into_iter().collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        if self.definition == Some(child) {
            self.definition = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_definition_bounds_channels() {
        let g = GlobalParams::default();
        let mut core = crate::entity::Entity::new(EntityKind::ColorDefinition).core;

        let mut pd = PdCursor::new("100.0,50.0,0.0,3Hred;", ',', ';');
        let mut c = ColorDefinition::default();
        c.read_pd(&mut pd, &mut core, &g).unwrap();
        assert_eq!((c.red, c.green, c.blue), (100.0, 50.0, 0.0));
        assert_eq!(c.name, "red");

        let mut pd = PdCursor::new("120.0,0.0,0.0;", ',', ';');
        let mut c = ColorDefinition::default();
        assert!(c.read_pd(&mut pd, &mut core, &g).is_err());
    }

    #[test]
    fn subfigure_definition_reads_member_list() {
        let g = GlobalParams::default();
        let mut core = crate::entity::Entity::new(EntityKind::SubfigureDefinition).core;

        let mut pd = PdCursor::new("1,6Hholes!,2,7,9;", ',', ';');
        let mut s = SubfigureDefinition::default();
        s.read_pd(&mut pd, &mut core, &g).unwrap();
        assert_eq!(s.depth, 1);
        assert_eq!(s.name, "holes!");
        assert_eq!(s.pending, vec![7, 9]);
    }
}
