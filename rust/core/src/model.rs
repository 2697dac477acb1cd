// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The model container.
//!
//! A [`Model`] owns every entity in a slot-map arena keyed by [`EntityId`].
//! Graph edges are keys: children carry the set of their parents (`refs`),
//! parents reach children through their payload fields. Deletion cascades to
//! subordinate children whose last reference disappears.

use std::sync::Arc;

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use tracing::warn;

use crate::entities::*;
use crate::entity::{Entity, EntityId, EntityKind, LifeCycle, Payload, Resolver};
use crate::error::{Error, Result, Warning};
use crate::global::{GlobalParams, Unit};
use crate::nurbs::{BasisEvaluator, NurbsKernel};

/// Knobs for the corners where the written IGES standard is ambiguous.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationPolicy {
    /// Permit interleaved Point members (116, 132, 116, ...) in a Composite
    /// Curve; only two *consecutive identical* point kinds are rejected.
    /// The strict reading forbids any two consecutive point-kind members.
    pub allow_interleaved_points: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            allow_interleaved_points: true,
        }
    }
}

/// An IGES model: global parameters plus the entity graph.
#[derive(Debug, Clone)]
pub struct Model {
    pub globals: GlobalParams,
    /// Free-form Start section lines.
    pub start_comments: Vec<String>,
    pub policy: ValidationPolicy,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    /// Insertion order; drives DE numbering on write.
    pub(crate) order: Vec<EntityId>,
    kernel: Arc<dyn NurbsKernel>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    pub fn new() -> Model {
        Model {
            globals: GlobalParams::default(),
            start_comments: Vec::new(),
            policy: ValidationPolicy::default(),
            entities: SlotMap::with_key(),
            order: Vec::new(),
            kernel: Arc::new(BasisEvaluator),
        }
    }

    /// Swap in a different NURBS kernel.
    pub fn with_kernel(kernel: Arc<dyn NurbsKernel>) -> Model {
        Model {
            kernel,
            ..Model::new()
        }
    }

    pub fn kernel(&self) -> &dyn NurbsKernel {
        self.kernel.as_ref()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Create a fresh entity of `kind` and hand back its key.
    pub fn new_entity(&mut self, kind: EntityKind) -> EntityId {
        let id = self.entities.insert(Entity::new(kind));
        self.order.push(id);
        id
    }

    pub(crate) fn insert_loaded(&mut self, entity: Entity) -> EntityId {
        let id = self.entities.insert(entity);
        self.order.push(id);
        id
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| Error::NotFound("no entity behind this key".into()))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| Error::NotFound("no entity behind this key".into()))
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.order
            .iter()
            .filter_map(move |&id| self.entities.get(id).map(|e| (id, e)))
    }

    /// Keys of every entity of one kind.
    pub fn entities_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.entities()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Delete an entity. Every back-edge is unlinked first; subordinate
    /// children whose last reference disappears are released as well.
    pub fn del_entity(&mut self, id: EntityId) -> Result<()> {
        if !self.entities.contains_key(id) {
            return Err(Error::NotFound("no entity behind this key".into()));
        }

        let parents = self.entities[id].core.refs.clone();
        for p in parents {
            if let Some(parent) = self.entities.get_mut(p) {
                parent.unlink(id);
            }
        }

        let children = self.entities[id].children();
        self.entities.remove(id);
        self.order.retain(|&e| e != id);

        for c in children {
            let orphaned = match self.entities.get_mut(c) {
                Some(child) => {
                    // tolerate an already-missing back-edge
                    let _ = child.del_reference(id);
                    child.is_orphaned()
                }
                None => false,
            };
            if orphaned {
                let _ = self.del_entity(c);
            }
        }
        Ok(())
    }

    /// Install the back-reference `child -> parent`. Returns the duplicate
    /// flag from the child's `add_reference`.
    pub(crate) fn link_child(&mut self, parent: EntityId, child: EntityId) -> Result<bool> {
        if parent == child {
            return Err(Error::InvariantViolation {
                entity_type: self.entity(parent)?.entity_type(),
                reason: "an entity may not reference itself".into(),
            });
        }
        let parent_type = self.entity(parent)?.entity_type();
        self.entity_mut(child)?.add_reference(parent, parent_type)
    }

    /// Point the entity's transform field at `transform` (or clear it),
    /// atomically updating the back-reference on both the old and the new
    /// transform entity.
    pub fn set_transform(&mut self, id: EntityId, transform: Option<EntityId>) -> Result<()> {
        if let Some(t) = transform {
            if self.entity(t)?.entity_type() != 124 {
                return Err(Error::BadField {
                    field: "transform",
                    reason: "transform pointer must name a 124".into(),
                });
            }
        }

        let old = self.entity(id)?.core.transform;
        if old == transform {
            return Ok(());
        }

        if let Some(o) = old {
            if let Some(e) = self.entities.get_mut(o) {
                let _ = e.del_reference(id);
            }
        }
        if let Some(t) = transform {
            self.link_child(id, t)?;
        }
        self.entity_mut(id)?.core.transform = transform;
        Ok(())
    }

    /// Attach an extra (associativity/property) pointer.
    pub fn add_extra(&mut self, id: EntityId, extra: EntityId) -> Result<()> {
        self.link_child(id, extra)?;
        self.entity_mut(id)?.core.extras.push(extra);
        Ok(())
    }

    /// Remove one extra pointer.
    pub fn remove_extra(&mut self, id: EntityId, extra: EntityId) -> Result<()> {
        let core = &mut self.entity_mut(id)?.core;
        match core.extras.iter().position(|&e| e == extra) {
            Some(i) => {
                core.extras.remove(i);
            }
            None => return Err(Error::NotFound("no such extra pointer".into())),
        }
        if let Some(e) = self.entities.get_mut(extra) {
            let _ = e.del_reference(id);
        }
        Ok(())
    }

    /// Change the form number, vetoed per kind.
    pub fn set_form(&mut self, id: EntityId, form: i32) -> Result<()> {
        let e = self.entity_mut(id)?;
        if !form_ok(e.kind(), form) {
            return Err(Error::CorruptFile(format!(
                "entity type {} does not take form {}",
                e.entity_type(),
                form
            )));
        }
        e.core.form = form;
        Ok(())
    }

    // --- typed payload accessors -----------------------------------------

    pub fn payload(&self, id: EntityId) -> Result<&Payload> {
        Ok(&self.entity(id)?.payload)
    }

    // --- composite curve -------------------------------------------------

    /// Append a member curve to a Composite Curve, installing the
    /// back-reference.
    pub fn add_segment(&mut self, composite: EntityId, curve: EntityId) -> Result<()> {
        match self.entity(composite)?.payload {
            Payload::CompositeCurve(_) => {}
            _ => {
                return Err(Error::BadField {
                    field: "composite",
                    reason: "target is not a Composite Curve".into(),
                })
            }
        }
        let child_type = self.entity(curve)?.entity_type();
        if !crate::entity::is_curve_code(child_type) {
            return Err(Error::BadField {
                field: "curve",
                reason: format!("entity type {} is not a curve", child_type),
            });
        }

        self.link_child(composite, curve)?;
        if let Payload::CompositeCurve(cc) = &mut self.entity_mut(composite)?.payload {
            cc.push_segment(curve);
        }
        let core = &mut self.entity_mut(composite)?.core;
        core.advance(LifeCycle::Associated);
        Ok(())
    }

    // --- surface of revolution -------------------------------------------

    pub fn set_revolution_axis(&mut self, surface: EntityId, axis: EntityId) -> Result<()> {
        if self.entity(axis)?.entity_type() != 110 {
            return Err(Error::BadField {
                field: "axis",
                reason: "axis of revolution must be a Line".into(),
            });
        }
        self.link_child(surface, axis)?;
        match &mut self.entity_mut(surface)?.payload {
            Payload::SurfaceOfRevolution(s) => s.set_axis(axis),
            _ => {
                return Err(Error::BadField {
                    field: "surface",
                    reason: "target is not a Surface of Revolution".into(),
                })
            }
        }
        self.entity_mut(surface)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn set_revolution_generatrix(&mut self, surface: EntityId, curve: EntityId) -> Result<()> {
        if !crate::entity::is_curve_code(self.entity(curve)?.entity_type()) {
            return Err(Error::BadField {
                field: "generatrix",
                reason: "generatrix must be a curve".into(),
            });
        }
        self.link_child(surface, curve)?;
        match &mut self.entity_mut(surface)?.payload {
            Payload::SurfaceOfRevolution(s) => s.set_generatrix(curve),
            _ => {
                return Err(Error::BadField {
                    field: "surface",
                    reason: "target is not a Surface of Revolution".into(),
                })
            }
        }
        self.entity_mut(surface)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    // --- curve on surface / trimmed surface -------------------------------

    pub fn set_cos_surface(&mut self, cos: EntityId, surface: EntityId) -> Result<()> {
        self.link_child(cos, surface)?;
        match &mut self.entity_mut(cos)?.payload {
            Payload::CurveOnSurface(c) => c.set_surface(surface),
            _ => {
                return Err(Error::BadField {
                    field: "cos",
                    reason: "target is not a Curve on Surface".into(),
                })
            }
        }
        self.entity_mut(cos)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn set_cos_bptr(&mut self, cos: EntityId, curve: EntityId) -> Result<()> {
        self.link_child(cos, curve)?;
        match &mut self.entity_mut(cos)?.payload {
            Payload::CurveOnSurface(c) => c.set_bptr(curve),
            _ => {
                return Err(Error::BadField {
                    field: "cos",
                    reason: "target is not a Curve on Surface".into(),
                })
            }
        }
        self.mark_uv_bounds();
        self.entity_mut(cos)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn set_cos_cptr(&mut self, cos: EntityId, curve: EntityId) -> Result<()> {
        self.link_child(cos, curve)?;
        match &mut self.entity_mut(cos)?.payload {
            Payload::CurveOnSurface(c) => c.set_cptr(curve),
            _ => {
                return Err(Error::BadField {
                    field: "cos",
                    reason: "target is not a Curve on Surface".into(),
                })
            }
        }
        self.entity_mut(cos)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn set_trim_surface(&mut self, trim: EntityId, surface: EntityId) -> Result<()> {
        self.link_child(trim, surface)?;
        match &mut self.entity_mut(trim)?.payload {
            Payload::TrimmedSurface(t) => t.set_surface(surface),
            _ => {
                return Err(Error::BadField {
                    field: "trim",
                    reason: "target is not a Trimmed Surface".into(),
                })
            }
        }
        self.entity_mut(trim)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn set_trim_outer(&mut self, trim: EntityId, cos: EntityId) -> Result<()> {
        if self.entity(cos)?.entity_type() != 142 {
            return Err(Error::BadField {
                field: "outer",
                reason: "outer boundary must be a Curve on Surface".into(),
            });
        }
        self.link_child(trim, cos)?;
        match &mut self.entity_mut(trim)?.payload {
            Payload::TrimmedSurface(t) => t.set_outer(cos),
            _ => {
                return Err(Error::BadField {
                    field: "trim",
                    reason: "target is not a Trimmed Surface".into(),
                })
            }
        }
        self.entity_mut(trim)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    pub fn add_trim_hole(&mut self, trim: EntityId, cos: EntityId) -> Result<()> {
        if self.entity(cos)?.entity_type() != 142 {
            return Err(Error::BadField {
                field: "hole",
                reason: "hole boundary must be a Curve on Surface".into(),
            });
        }
        self.link_child(trim, cos)?;
        match &mut self.entity_mut(trim)?.payload {
            Payload::TrimmedSurface(t) => t.add_hole(cos),
            _ => {
                return Err(Error::BadField {
                    field: "trim",
                    reason: "target is not a Trimmed Surface".into(),
                })
            }
        }
        self.entity_mut(trim)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    // --- NURBS curve -------------------------------------------------------

    /// Install new data into a NURBS curve, recomputing its derived
    /// properties through the model's kernel.
    pub fn set_nurbs_data(
        &mut self,
        id: EntityId,
        control: &[Point3<f64>],
        weights: &[f64],
        knots: &[f64],
        order: usize,
        rational: bool,
    ) -> Result<()> {
        let kernel = Arc::clone(&self.kernel);
        let min_res = self.globals.min_resolution;
        match &mut self.entity_mut(id)?.payload {
            Payload::NurbsCurve(c) => {
                c.set_data(control, weights, knots, order, rational, kernel.as_ref(), min_res)?
            }
            _ => {
                return Err(Error::BadField {
                    field: "id",
                    reason: "target is not a NURBS curve".into(),
                })
            }
        }
        self.entity_mut(id)?.core.advance(LifeCycle::Associated);
        Ok(())
    }

    // --- curve geometry ----------------------------------------------------

    /// Effective transform of an entity, composed up the 124 chain.
    pub fn resolved_transform(&self, id: EntityId) -> Result<Option<TransformationMatrix>> {
        let mut current = self.entity(id)?.core.transform;
        let mut acc: Option<TransformationMatrix> = None;
        let mut hops = 0;

        while let Some(tid) = current {
            hops += 1;
            if hops > 64 {
                return Err(Error::InvariantViolation {
                    entity_type: 124,
                    reason: "transform chain does not terminate".into(),
                });
            }
            let e = self.entity(tid)?;
            let t = match &e.payload {
                Payload::TransformationMatrix(t) => t.clone(),
                _ => {
                    return Err(Error::BadField {
                        field: "transform",
                        reason: "transform pointer does not name a 124".into(),
                    })
                }
            };
            // an outer transform is applied after the one below it
            acc = Some(match acc {
                Some(inner) => t.compose(&inner),
                None => t,
            });
            current = e.core.transform;
        }
        Ok(acc)
    }

    /// Start point of a curve entity, optionally transformed.
    pub fn curve_start_point(&self, id: EntityId, xform: bool) -> Result<Point3<f64>> {
        self.curve_endpoint(id, xform, true)
    }

    /// End point of a curve entity, optionally transformed.
    pub fn curve_end_point(&self, id: EntityId, xform: bool) -> Result<Point3<f64>> {
        self.curve_endpoint(id, xform, false)
    }

    fn curve_endpoint(&self, id: EntityId, xform: bool, start: bool) -> Result<Point3<f64>> {
        let e = self.entity(id)?;
        let raw = match &e.payload {
            Payload::CircularArc(a) => {
                if start {
                    a.start_point()
                } else {
                    a.end_point()
                }
            }
            Payload::ConicArc(c) => {
                if start {
                    c.start_point()
                } else {
                    c.end_point()
                }
            }
            Payload::Line(l) => {
                if start {
                    l.start_point()
                } else {
                    l.end_point()
                }
            }
            Payload::SplineCurve(s) => {
                if start {
                    s.start_point()
                } else {
                    s.end_point()
                }
            }
            Payload::Point(p) => p.position(),
            Payload::NurbsCurve(n) => {
                if start {
                    n.start_point(self.kernel.as_ref())?
                } else {
                    n.end_point(self.kernel.as_ref())?
                }
            }
            Payload::CompositeCurve(cc) => {
                if e.core.state < LifeCycle::Associated {
                    return Err(Error::NotAssociated(102));
                }
                let member = if start {
                    cc.curves.first()
                } else {
                    cc.curves.last()
                };
                let member = member.copied().ok_or(Error::InvariantViolation {
                    entity_type: 102,
                    reason: "composite curve has no members".into(),
                })?;
                // member endpoints come through their own transforms
                let p = self.curve_endpoint(member, true, start)?;
                return Ok(if xform {
                    match self.resolved_transform(id)? {
                        Some(t) => t.apply(p),
                        None => p,
                    }
                } else {
                    p
                });
            }
            _ => {
                return Err(Error::BadField {
                    field: "id",
                    reason: format!("entity type {} is not a curve", e.entity_type()),
                })
            }
        };

        if xform {
            match self.resolved_transform(id)? {
                Some(t) => Ok(t.apply(raw)),
                None => Ok(raw),
            }
        } else {
            Ok(raw)
        }
    }

    // --- association -------------------------------------------------------

    /// Second pass of loading: resolve every DE-index field into keys and
    /// install back-references. Failures are collected, not fatal.
    pub(crate) fn associate_all(&mut self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        let mut seq_map: FxHashMap<u32, EntityId> = FxHashMap::default();
        let mut kinds: SecondaryMap<EntityId, i32> = SecondaryMap::new();
        for &id in &self.order {
            let e = &self.entities[id];
            seq_map.insert(e.core.de_sequence, id);
            kinds.insert(id, e.core.entity_type);
        }

        for id in self.order.clone() {
            let mut resolver = Resolver::new(&seq_map, &kinds);
            let de = self.entities[id].core.de_sequence;

            let outcome = self.entities[id].associate(&mut resolver);
            let linked = std::mem::take(&mut resolver.linked);
            drop(resolver);

            // children resolved before a failure keep their back-edges so
            // the graph stays symmetric either way
            for child in linked {
                if let Err(e) = self.link_child(id, child) {
                    warnings.push(Warning::new(Some(de), e));
                }
            }

            if let Err(e) = outcome {
                warn!(de, error = %e, "association failed");
                warnings.push(Warning::new(Some(de), e));
            }
        }

        self.mark_uv_bounds();
        warnings
    }

    /// Flag every NURBS curve reachable from some 142's BPTR so `rescale`
    /// can leave its (u, v) coordinates alone without walking ancestors.
    pub(crate) fn mark_uv_bounds(&mut self) {
        let mut uv_roots = Vec::new();
        for (_, e) in self.entities() {
            if let Payload::CurveOnSurface(c) = &e.payload {
                if let Some(b) = c.bptr {
                    uv_roots.push(b);
                }
            }
        }

        let mut stack = uv_roots;
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(e) = self.entities.get_mut(id) {
                match &mut e.payload {
                    Payload::NurbsCurve(n) => n.uv_bound = true,
                    Payload::CompositeCurve(cc) => stack.extend(cc.curves.iter().copied()),
                    _ => {}
                }
            }
        }
    }

    // --- rescaling ---------------------------------------------------------

    /// Multiply every length-bearing field in the model by `sf`. Each
    /// entity rescales exactly once; parameter-space NURBS bounds keep
    /// their (u, v) coordinates.
    pub fn rescale(&mut self, sf: f64) {
        if sf == 1.0 {
            return;
        }
        for id in self.order.clone() {
            if let Some(e) = self.entities.get_mut(id) {
                e.rescale(sf);
            }
        }
        self.globals.min_resolution *= sf;
        self.globals.max_coordinate *= sf;
        self.globals.max_lineweight *= sf;
    }

    /// Convert the model into `target` units.
    pub fn convert_units(&mut self, target: Unit) {
        let sf = self.globals.units.scale_to(target);
        self.rescale(sf);
        self.globals.units = target;
        self.globals.unit_name = target.name().to_string();
    }
}
