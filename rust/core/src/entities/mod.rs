// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-kind entity modules.
//!
//! Each module implements the parameter-data contract for one kind or a
//! tight family of kinds: `read_pd`, `format_pd`, `associate`, `rescale`,
//! plus the class-specific accessors.

mod brep;
mod composite;
mod curves;
mod nurbs;
mod solids;
mod structure;
mod surfaces;
mod transform;
mod trims;

pub use brep::{EdgeList, EdgeUse, Face, LoopEntity, LoopEdge, Shell, VertexList};
pub use composite::CompositeCurve;
pub use curves::{CircularArc, ConicArc, Line, PointEntity, SplineCurve};
pub use nurbs::{NurbsCurve, NurbsSurface};
pub use solids::{BooleanOp, BooleanTree, BooleanNode, ManifoldSolid, RightCircularCylinder, SolidOfLinearExtrusion};
pub use structure::{Associativity, ColorDefinition, SubfigureDefinition, SubfigureInstance};
pub use surfaces::{SurfaceOfRevolution, TabulatedCylinder};
pub use transform::TransformationMatrix;
pub use trims::{Boundary, BoundaryCurve, BoundedSurface, CurveOnSurface, TrimmedSurface};

use crate::directory::Hierarchy;
use crate::entity::{EntityCore, EntityKind, Payload};

/// Relative tolerance for NURBS reals (knots, control points, ranges).
pub(crate) const TOL_NURBS: f64 = 1e-15;
/// Relative tolerance for weights and bookkeeping reals.
pub(crate) const TOL_BOOK: f64 = 1e-6;

/// Default payload for a freshly constructed entity of `kind`.
pub(crate) fn default_payload(kind: EntityKind) -> Payload {
    match kind {
        EntityKind::CircularArc => Payload::CircularArc(CircularArc::default()),
        EntityKind::CompositeCurve => Payload::CompositeCurve(CompositeCurve::default()),
        EntityKind::ConicArc => Payload::ConicArc(ConicArc::default()),
        EntityKind::Line => Payload::Line(Line::default()),
        EntityKind::SplineCurve => Payload::SplineCurve(SplineCurve::default()),
        EntityKind::Point => Payload::Point(PointEntity::default()),
        EntityKind::SurfaceOfRevolution => {
            Payload::SurfaceOfRevolution(SurfaceOfRevolution::default())
        }
        EntityKind::TabulatedCylinder => Payload::TabulatedCylinder(TabulatedCylinder::default()),
        EntityKind::TransformationMatrix => {
            Payload::TransformationMatrix(TransformationMatrix::default())
        }
        EntityKind::NurbsCurve => Payload::NurbsCurve(NurbsCurve::default()),
        EntityKind::NurbsSurface => Payload::NurbsSurface(NurbsSurface::default()),
        EntityKind::Boundary => Payload::Boundary(Boundary::default()),
        EntityKind::CurveOnSurface => Payload::CurveOnSurface(CurveOnSurface::default()),
        EntityKind::BoundedSurface => Payload::BoundedSurface(BoundedSurface::default()),
        EntityKind::TrimmedSurface => Payload::TrimmedSurface(TrimmedSurface::default()),
        EntityKind::RightCircularCylinder => {
            Payload::RightCircularCylinder(RightCircularCylinder::default())
        }
        EntityKind::SolidOfLinearExtrusion => {
            Payload::SolidOfLinearExtrusion(SolidOfLinearExtrusion::default())
        }
        EntityKind::BooleanTree => Payload::BooleanTree(BooleanTree::default()),
        EntityKind::ManifoldSolid => Payload::ManifoldSolid(ManifoldSolid::default()),
        EntityKind::SubfigureDefinition => {
            Payload::SubfigureDefinition(SubfigureDefinition::default())
        }
        EntityKind::ColorDefinition => Payload::ColorDefinition(ColorDefinition::default()),
        EntityKind::Associativity => Payload::Associativity(Associativity::default()),
        EntityKind::SubfigureInstance => Payload::SubfigureInstance(SubfigureInstance::default()),
        EntityKind::VertexList => Payload::VertexList(VertexList::default()),
        EntityKind::EdgeList => Payload::EdgeList(EdgeList::default()),
        EntityKind::Loop => Payload::Loop(LoopEntity::default()),
        EntityKind::Face => Payload::Face(Face::default()),
        EntityKind::Shell => Payload::Shell(Shell::default()),
    }
}

/// The form number a freshly constructed entity starts with.
pub(crate) fn default_form(kind: EntityKind) -> i32 {
    match kind {
        EntityKind::Associativity
        | EntityKind::VertexList
        | EntityKind::EdgeList
        | EntityKind::Loop
        | EntityKind::Face
        | EntityKind::Shell => 1,
        _ => 0,
    }
}

/// Form numbers each kind accepts.
pub(crate) fn form_ok(kind: EntityKind, form: i32) -> bool {
    match kind {
        EntityKind::ConicArc => matches!(form, 1..=3),
        EntityKind::TransformationMatrix => matches!(form, 0 | 1 | 10 | 11 | 12),
        EntityKind::NurbsCurve => matches!(form, 0..=5),
        EntityKind::NurbsSurface => matches!(form, 0..=9),
        EntityKind::Associativity => matches!(form, 1 | 7 | 14 | 15),
        EntityKind::VertexList | EntityKind::EdgeList | EntityKind::Face => form == 1,
        EntityKind::Loop => matches!(form, 0 | 1),
        EntityKind::Shell => matches!(form, 1 | 2),
        _ => form == 0,
    }
}

/// Force the DE fields a kind ignores back to their fixed values. The
/// structure field (DE field 3) applies only to macro entities, so every
/// catalogued kind reads it as N.A.; arcs and NURBS curves ignore
/// hierarchy; a Shell takes no decoration, transform, or colour at all.
pub(crate) fn fixup_ignored_de_fields(core: &mut EntityCore) {
    core.structure = 0;

    match core.entity_type {
        100 | 126 => {
            core.status.hierarchy = Hierarchy::AllSubordinate;
        }
        514 => {
            core.line_font = 0;
            core.view = 0;
            core.line_weight = 0;
            core.color = 0;
            core.pending_color = 0;
            core.pending_transform = 0;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn structure_is_cleared_for_every_kind() {
        for kind in [
            EntityKind::Shell,
            EntityKind::SubfigureDefinition,
            EntityKind::BooleanTree,
            EntityKind::ColorDefinition,
            EntityKind::VertexList,
            EntityKind::Line,
        ] {
            let mut core = Entity::new(kind).core;
            core.structure = 9;
            fixup_ignored_de_fields(&mut core);
            assert_eq!(core.structure, 0, "kind {:?}", kind);
        }
    }

    #[test]
    fn shell_drops_decoration_transform_and_color() {
        let mut core = Entity::new(EntityKind::Shell).core;
        core.line_font = 2;
        core.view = 5;
        core.line_weight = 3;
        core.color = 4;
        core.pending_color = -9;
        core.pending_transform = 7;

        fixup_ignored_de_fields(&mut core);
        assert_eq!(core.line_font, 0);
        assert_eq!(core.view, 0);
        assert_eq!(core.line_weight, 0);
        assert_eq!(core.color, 0);
        assert_eq!(core.pending_color, 0);
        assert_eq!(core.pending_transform, 0);
    }

    #[test]
    fn arc_hierarchy_is_forced_subordinate() {
        let mut core = Entity::new(EntityKind::CircularArc).core;
        core.status.hierarchy = Hierarchy::GlobalDefer;
        fixup_ignored_de_fields(&mut core);
        assert_eq!(core.status.hierarchy, Hierarchy::AllSubordinate);
    }
}
