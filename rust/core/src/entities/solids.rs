// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solid kinds: Right Circular Cylinder (154), Solid of Linear Extrusion
//! (164), Boolean Tree (180), Manifold Solid B-Rep Object (186).

use nalgebra::{Point3, Vector3};

use super::TOL_BOOK;
use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::{format_pd_real, PdCursor};

/// Entity 154: a solid cylinder from a face centre along a unit axis.
#[derive(Debug, Clone)]
pub struct RightCircularCylinder {
    pub height: f64,
    pub radius: f64,
    pub center: Point3<f64>,
    pub axis: Vector3<f64>,
}

impl Default for RightCircularCylinder {
    fn default() -> Self {
        RightCircularCylinder {
            height: 0.0,
            radius: 0.0,
            center: Point3::origin(),
            axis: Vector3::z(),
        }
    }
}

impl EntityClass for RightCircularCylinder {
    fn kind(&self) -> EntityKind {
        EntityKind::RightCircularCylinder
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
        self.height = pd.read_real("H")?;
        self.radius = pd.read_real("R")?;
        if self.height <= 0.0 || self.radius <= 0.0 {
            return Err(Error::BadField {
                field: "H",
                reason: "height and radius must be positive".into(),
            });
        }
        self.center.x = pd.read_real_or("X1", 0.0)?;
        self.center.y = pd.read_real_or("Y1", 0.0)?;
        self.center.z = pd.read_real_or("Z1", 0.0)?;
        self.axis.x = pd.read_real_or("I1", 0.0)?;
        self.axis.y = pd.read_real_or("J1", 0.0)?;
        self.axis.z = pd.read_real_or("K1", 1.0)?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        for v in [
            self.height,
            self.radius,
            self.center.x,
            self.center.y,
            self.center.z,
            self.axis.x,
            self.axis.y,
            self.axis.z,
        ] {
            out.push(format_pd_real(v, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.height *= sf;
        self.radius *= sf;
        self.center *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

/// Entity 164: a planar curve extruded along a direction for a length.
#[derive(Debug, Clone)]
pub struct SolidOfLinearExtrusion {
    pub curve: Option<EntityId>,
    pub length: f64,
    pub direction: Vector3<f64>,
    pending_curve: i32,
}

impl Default for SolidOfLinearExtrusion {
    fn default() -> Self {
        SolidOfLinearExtrusion {
            curve: None,
            length: 0.0,
            direction: Vector3::z(),
            pending_curve: 0,
        }
    }
}

impl EntityClass for SolidOfLinearExtrusion {
    fn kind(&self) -> EntityKind {
        EntityKind::SolidOfLinearExtrusion
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
        self.pending_curve = pd.read_ptr("PTR")?;
        if self.pending_curve <= 0 {
            return Err(Error::BadField {
                field: "PTR",
                reason: "extrusion needs its section curve".into(),
            });
        }
        self.length = pd.read_real("L")?;
        if self.length <= 0.0 {
            return Err(Error::BadField {
                field: "L",
                reason: format!("extrusion length {} must be positive", self.length),
            });
        }
        self.direction.x = pd.read_real_or("I1", 0.0)?;
        self.direction.y = pd.read_real_or("J1", 0.0)?;
        self.direction.z = pd.read_real_or("K1", 1.0)?;
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let curve = self.curve.ok_or(Error::NotAssociated(164))?;
        out.push(seq_of(map, curve)?.to_string());
        out.push(format_pd_real(self.length, TOL_BOOK));
        out.push(format_pd_real(self.direction.x, TOL_BOOK));
        out.push(format_pd_real(self.direction.y, TOL_BOOK));
        out.push(format_pd_real(self.direction.z, TOL_BOOK));
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.curve = Some(r.curve(self.pending_curve, "PTR")?);
        self.pending_curve = 0;
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        // the direction is a unit vector; only the sweep length scales
        self.length *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        self.curve.into_iter().collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        if self.curve == Some(child) {
            self.curve = None;
            true
        } else {
            false
        }
    }
}

/// Boolean operator of a 180 tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Intersection,
    Difference,
}

impl BooleanOp {
    fn from_code(v: i32) -> Option<Self> {
        match v {
            1 => Some(BooleanOp::Union),
            2 => Some(BooleanOp::Intersection),
            3 => Some(BooleanOp::Difference),
            _ => None,
        }
    }

    fn code(self) -> i32 {
        match self {
            BooleanOp::Union => 1,
            BooleanOp::Intersection => 2,
            BooleanOp::Difference => 3,
        }
    }
}

/// One postfix token of a Boolean tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanNode {
    Operand(EntityId),
    Operator(BooleanOp),
}

/// Entity 180: a Boolean expression over solids in postfix order. Operands
/// are written as negated DE pointers, operators as 1/2/3.
#[derive(Debug, Clone, Default)]
pub struct BooleanTree {
    pub nodes: Vec<BooleanNode>,
    pending: Vec<i32>,
}

impl EntityClass for BooleanTree {
    fn kind(&self) -> EntityKind {
        EntityKind::BooleanTree
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
        let n = pd.read_int("N")?;
        if n < 3 {
            return Err(Error::BadField {
                field: "N",
                reason: format!("a Boolean tree needs at least 3 tokens, got {}", n),
            });
        }

        self.pending.clear();
        let mut depth = 0i32;
        for _ in 0..n {
            let v = pd.read_ptr("token")?;
            if v < 0 {
                depth += 1;
            } else if BooleanOp::from_code(v).is_some() {
                depth -= 1;
                if depth < 1 {
                    return Err(Error::BadField {
                        field: "token",
                        reason: "operator applied to fewer than two operands".into(),
                    });
                }
            } else {
                return Err(Error::BadField {
                    field: "token",
                    reason: format!("{} is neither an operand pointer nor an operator", v),
                });
            }
            self.pending.push(v);
        }

        if depth != 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "postfix expression does not reduce to one solid".into(),
            });
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.nodes.len().to_string());
        for node in &self.nodes {
            match node {
                BooleanNode::Operand(id) => {
                    out.push(format!("-{}", seq_of(map, *id)?));
                }
                BooleanNode::Operator(op) => out.push(op.code().to_string()),
            }
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for v in std::mem::take(&mut self.pending) {
            if v < 0 {
                self.nodes.push(BooleanNode::Operand(r.entity(-v, "operand")?));
            } else if let Some(op) = BooleanOp::from_code(v) {
                self.nodes.push(BooleanNode::Operator(op));
            }
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                BooleanNode::Operand(id) => Some(*id),
                BooleanNode::Operator(_) => None,
            })
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| !matches!(n, BooleanNode::Operand(id) if *id == child));
        before != self.nodes.len()
    }
}

/// Entity 186: a closed shell bounding a solid, plus void shells.
#[derive(Debug, Clone, Default)]
pub struct ManifoldSolid {
    pub shell: Option<EntityId>,
    /// True when the shell normals point away from the solid interior.
    pub outward: bool,
    pub voids: Vec<(EntityId, bool)>,
    pending_shell: i32,
    pending_voids: Vec<(i32, bool)>,
}

impl EntityClass for ManifoldSolid {
    fn kind(&self) -> EntityKind {
        EntityKind::ManifoldSolid
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
        self.pending_shell = pd.read_ptr("SHELL")?;
        if self.pending_shell <= 0 {
            return Err(Error::BadField {
                field: "SHELL",
                reason: "manifold solid needs its outer shell".into(),
            });
        }
        self.outward = pd.read_int_or("SOF", 1)? != 0;
        let n = pd.read_int_or("N", 0)?;
        self.pending_voids.clear();
        for _ in 0..n {
            let ptr = pd.read_ptr("VOID")?;
            let flag = pd.read_int_or("VOF", 1)? != 0;
            self.pending_voids.push((ptr, flag));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let shell = self.shell.ok_or(Error::NotAssociated(186))?;
        out.push(seq_of(map, shell)?.to_string());
        out.push(i32::from(self.outward).to_string());
        out.push(self.voids.len().to_string());
        for &(id, flag) in &self.voids {
            out.push(seq_of(map, id)?.to_string());
            out.push(i32::from(flag).to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.shell = Some(r.typed(self.pending_shell, &[514], "SHELL")?);
        for (ptr, flag) in std::mem::take(&mut self.pending_voids) {
            self.voids.push((r.typed(ptr, &[514], "VOID")?, flag));
        }
        self.pending_shell = 0;
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.shell
            .into_iter()
            .chain(self.voids.iter().map(|&(id, _)| id))
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.shell == Some(child) {
            self.shell = None;
            removed = true;
        }
        let before = self.voids.len();
        self.voids.retain(|&(id, _)| id != child);
        removed || before != self.voids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_tree_checks_postfix_shape() {
        let g = GlobalParams::default();
        let mut core = crate::entity::Entity::new(EntityKind::BooleanTree).core;

        // (A - B): two operands then one operator
        let mut pd = PdCursor::new("3,-1,-3,3;", ',', ';');
        let mut t = BooleanTree::default();
        assert!(t.read_pd(&mut pd, &mut core, &g).is_ok());

        // operator with a single operand on the stack
        let mut pd = PdCursor::new("3,-1,3,-3;", ',', ';');
        let mut t = BooleanTree::default();
        assert!(t.read_pd(&mut pd, &mut core, &g).is_err());

        // leftover operands
        let mut pd = PdCursor::new("4,-1,-3,-5,3;", ',', ';');
        let mut t = BooleanTree::default();
        assert!(t.read_pd(&mut pd, &mut core, &g).is_err());
    }

    #[test]
    fn cylinder_rescale_scales_lengths() {
        let mut c = RightCircularCylinder {
            height: 2.0,
            radius: 0.5,
            center: Point3::new(1.0, 0.0, 0.0),
            axis: Vector3::z(),
        };
        c.rescale(25.4);
        assert_eq!(c.height, 50.8);
        assert_eq!(c.radius, 12.7);
        assert_eq!(c.center, Point3::new(25.4, 0.0, 0.0));
        assert_eq!(c.axis, Vector3::z());
    }
}
