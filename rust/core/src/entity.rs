// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity base: common state, kind dispatch, and reference bookkeeping.
//!
//! Every entity is an [`EntityCore`] (the attributes shared by all kinds,
//! mostly the Directory Entry image) composed with a [`Payload`] tagged
//! variant carrying the kind-specific parameter data. Back-references are
//! arena keys, never pointers; refcounts are multiset operations over keys.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SecondaryMap};

use crate::directory::{DirEntry, Hierarchy, StatusFlags};
use crate::entities::*;
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::{PdCursor, PdWriter};

new_key_type! {
    /// Stable generational key of an entity inside its model.
    pub struct EntityId;
}

/// Map from entity key to the DE sequence assigned at emission.
pub type SeqMap = SecondaryMap<EntityId, u32>;

/// The supported entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    CircularArc,
    CompositeCurve,
    ConicArc,
    Line,
    SplineCurve,
    Point,
    SurfaceOfRevolution,
    TabulatedCylinder,
    TransformationMatrix,
    NurbsCurve,
    NurbsSurface,
    Boundary,
    CurveOnSurface,
    BoundedSurface,
    TrimmedSurface,
    RightCircularCylinder,
    SolidOfLinearExtrusion,
    BooleanTree,
    ManifoldSolid,
    SubfigureDefinition,
    ColorDefinition,
    Associativity,
    SubfigureInstance,
    VertexList,
    EdgeList,
    Loop,
    Face,
    Shell,
}

impl EntityKind {
    pub fn code(self) -> i32 {
        match self {
            EntityKind::CircularArc => 100,
            EntityKind::CompositeCurve => 102,
            EntityKind::ConicArc => 104,
            EntityKind::Line => 110,
            EntityKind::SplineCurve => 112,
            EntityKind::Point => 116,
            EntityKind::SurfaceOfRevolution => 120,
            EntityKind::TabulatedCylinder => 122,
            EntityKind::TransformationMatrix => 124,
            EntityKind::NurbsCurve => 126,
            EntityKind::NurbsSurface => 128,
            EntityKind::Boundary => 141,
            EntityKind::CurveOnSurface => 142,
            EntityKind::BoundedSurface => 143,
            EntityKind::TrimmedSurface => 144,
            EntityKind::RightCircularCylinder => 154,
            EntityKind::SolidOfLinearExtrusion => 164,
            EntityKind::BooleanTree => 180,
            EntityKind::ManifoldSolid => 186,
            EntityKind::SubfigureDefinition => 308,
            EntityKind::ColorDefinition => 314,
            EntityKind::Associativity => 402,
            EntityKind::SubfigureInstance => 408,
            EntityKind::VertexList => 502,
            EntityKind::EdgeList => 504,
            EntityKind::Loop => 508,
            EntityKind::Face => 510,
            EntityKind::Shell => 514,
        }
    }

    pub fn from_code(code: i32) -> Option<EntityKind> {
        match code {
            100 => Some(EntityKind::CircularArc),
            102 => Some(EntityKind::CompositeCurve),
            104 => Some(EntityKind::ConicArc),
            110 => Some(EntityKind::Line),
            112 => Some(EntityKind::SplineCurve),
            116 => Some(EntityKind::Point),
            120 => Some(EntityKind::SurfaceOfRevolution),
            122 => Some(EntityKind::TabulatedCylinder),
            124 => Some(EntityKind::TransformationMatrix),
            126 => Some(EntityKind::NurbsCurve),
            128 => Some(EntityKind::NurbsSurface),
            141 => Some(EntityKind::Boundary),
            142 => Some(EntityKind::CurveOnSurface),
            143 => Some(EntityKind::BoundedSurface),
            144 => Some(EntityKind::TrimmedSurface),
            154 => Some(EntityKind::RightCircularCylinder),
            164 => Some(EntityKind::SolidOfLinearExtrusion),
            180 => Some(EntityKind::BooleanTree),
            186 => Some(EntityKind::ManifoldSolid),
            308 => Some(EntityKind::SubfigureDefinition),
            314 => Some(EntityKind::ColorDefinition),
            402 => Some(EntityKind::Associativity),
            408 => Some(EntityKind::SubfigureInstance),
            502 => Some(EntityKind::VertexList),
            504 => Some(EntityKind::EdgeList),
            508 => Some(EntityKind::Loop),
            510 => Some(EntityKind::Face),
            514 => Some(EntityKind::Shell),
            _ => None,
        }
    }
}

/// Entity codes a Composite Curve (and other curve consumers) accept.
pub fn is_curve_code(code: i32) -> bool {
    matches!(code, 100 | 102 | 104 | 110 | 112 | 116 | 126)
}

/// Lifecycle of an entity. Transitions are one-way except `Rescaled`,
/// which every further unit conversion re-enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifeCycle {
    Empty,
    Parsed,
    Associated,
    Rescaled,
    Formatted,
    Emitted,
}

/// State shared by every entity kind: the Directory Entry image, the
/// parent back-references, the extra pointers, and the comment list.
#[derive(Debug, Clone)]
pub struct EntityCore {
    pub entity_type: i32,
    pub form: i32,
    pub status: StatusFlags,
    pub line_font: i32,
    pub level: i32,
    pub view: i32,
    pub line_weight: i32,
    /// Raw colour field: non-negative enum, negative DE pointer.
    pub color: i32,
    pub label_display: i32,
    pub structure: i32,
    pub label: String,
    pub subscript: i32,
    /// Resolved transformation matrix entity, if any.
    pub transform: Option<EntityId>,
    /// Resolved colour-definition entity when `color` was a pointer.
    pub color_ref: Option<EntityId>,
    /// Resolved associativity/property pointers from the PD trailer.
    pub extras: Vec<EntityId>,
    pub comments: Vec<String>,
    /// Parents referencing this entity.
    pub refs: Vec<EntityId>,
    pub state: LifeCycle,
    /// DE sequence from the source file, or the one assigned on write.
    pub de_sequence: u32,

    // raw DE-index fields awaiting association
    pub(crate) pending_transform: i32,
    pub(crate) pending_color: i32,
    pub(crate) pending_extras: Vec<i32>,
}

impl EntityCore {
    fn new(entity_type: i32, form: i32) -> EntityCore {
        EntityCore {
            entity_type,
            form,
            status: StatusFlags::default(),
            line_font: 0,
            level: 0,
            view: 0,
            line_weight: 0,
            color: 0,
            label_display: 0,
            structure: 0,
            label: String::new(),
            subscript: 0,
            transform: None,
            color_ref: None,
            extras: Vec::new(),
            comments: Vec::new(),
            refs: Vec::new(),
            state: LifeCycle::Empty,
            de_sequence: 0,
            pending_transform: 0,
            pending_color: 0,
            pending_extras: Vec::new(),
        }
    }

    /// Populate the DE image from a decoded directory pair.
    pub(crate) fn apply_dir_entry(&mut self, de: &DirEntry) {
        self.form = de.form;
        self.status = de.status;
        self.line_font = de.line_font;
        self.level = de.level;
        self.view = de.view;
        self.line_weight = de.line_weight;
        self.color = de.color.max(0);
        self.pending_color = de.color;
        self.label_display = de.label_display;
        self.structure = de.structure;
        self.label = de.label.clone();
        self.subscript = de.subscript;
        self.pending_transform = de.transform;
        self.de_sequence = de.sequence;
    }

    pub(crate) fn advance(&mut self, to: LifeCycle) {
        if to > self.state {
            self.state = to;
        }
    }
}

/// Kind-specific payload. One variant per supported entity kind.
#[derive(Debug, Clone)]
pub enum Payload {
    CircularArc(CircularArc),
    CompositeCurve(CompositeCurve),
    ConicArc(ConicArc),
    Line(Line),
    SplineCurve(SplineCurve),
    Point(PointEntity),
    SurfaceOfRevolution(SurfaceOfRevolution),
    TabulatedCylinder(TabulatedCylinder),
    TransformationMatrix(TransformationMatrix),
    NurbsCurve(NurbsCurve),
    NurbsSurface(NurbsSurface),
    Boundary(Boundary),
    CurveOnSurface(CurveOnSurface),
    BoundedSurface(BoundedSurface),
    TrimmedSurface(TrimmedSurface),
    RightCircularCylinder(RightCircularCylinder),
    SolidOfLinearExtrusion(SolidOfLinearExtrusion),
    BooleanTree(BooleanTree),
    ManifoldSolid(ManifoldSolid),
    SubfigureDefinition(SubfigureDefinition),
    ColorDefinition(ColorDefinition),
    Associativity(Associativity),
    SubfigureInstance(SubfigureInstance),
    VertexList(VertexList),
    EdgeList(EdgeList),
    Loop(LoopEntity),
    Face(Face),
    Shell(Shell),
}

macro_rules! dispatch {
    ($payload:expr, $p:ident => $body:expr) => {
        match $payload {
            Payload::CircularArc($p) => $body,
            Payload::CompositeCurve($p) => $body,
            Payload::ConicArc($p) => $body,
            Payload::Line($p) => $body,
            Payload::SplineCurve($p) => $body,
            Payload::Point($p) => $body,
            Payload::SurfaceOfRevolution($p) => $body,
            Payload::TabulatedCylinder($p) => $body,
            Payload::TransformationMatrix($p) => $body,
            Payload::NurbsCurve($p) => $body,
            Payload::NurbsSurface($p) => $body,
            Payload::Boundary($p) => $body,
            Payload::CurveOnSurface($p) => $body,
            Payload::BoundedSurface($p) => $body,
            Payload::TrimmedSurface($p) => $body,
            Payload::RightCircularCylinder($p) => $body,
            Payload::SolidOfLinearExtrusion($p) => $body,
            Payload::BooleanTree($p) => $body,
            Payload::ManifoldSolid($p) => $body,
            Payload::SubfigureDefinition($p) => $body,
            Payload::ColorDefinition($p) => $body,
            Payload::Associativity($p) => $body,
            Payload::SubfigureInstance($p) => $body,
            Payload::VertexList($p) => $body,
            Payload::EdgeList($p) => $body,
            Payload::Loop($p) => $body,
            Payload::Face($p) => $body,
            Payload::Shell($p) => $body,
        }
    };
}

/// The operations every entity kind implements against its own payload.
/// Cross-entity behaviour (reference bookkeeping, resolution, traversal)
/// lives on [`Entity`] and the model.
pub trait EntityClass {
    /// Entity kind of this payload.
    fn kind(&self) -> EntityKind;

    /// True when the kind accepts `form` as its DE form number.
    fn form_ok(form: i32) -> bool
    where
        Self: Sized;

    /// Parse the payload fields; the cursor sits just past the leading
    /// entity-type token.
    fn read_pd(&mut self, pd: &mut PdCursor, core: &mut EntityCore, globals: &GlobalParams)
        -> Result<()>;

    /// Emit the payload fields as formatted tokens (without the leading
    /// entity-type token or the optional trailer).
    fn format_pd(&self, out: &mut Vec<String>, core: &EntityCore, map: &SeqMap) -> Result<()>;

    /// Replace pending DE indexes with resolved keys, registering each child
    /// with the resolver for back-reference bookkeeping.
    fn associate(&mut self, r: &mut Resolver) -> Result<()>;

    /// Multiply length-bearing fields by `sf`.
    fn rescale(&mut self, sf: f64);

    /// Resolved forward edges of this payload.
    fn children(&self) -> Vec<EntityId>;

    /// Drop `child` from the payload's child lists. Returns true if any
    /// removal occurred.
    fn unlink(&mut self, child: EntityId) -> bool;
}

/// One entity: shared state plus kind payload.
#[derive(Debug, Clone)]
pub struct Entity {
    pub core: EntityCore,
    pub payload: Payload,
}

impl Entity {
    /// Factory: a fresh entity of `kind` with the kind's default payload.
    pub fn new(kind: EntityKind) -> Entity {
        let payload = default_payload(kind);
        Entity {
            core: EntityCore::new(kind.code(), default_form(kind)),
            payload,
        }
    }

    /// Factory for file loading: validates the form number for the kind.
    pub(crate) fn from_dir_entry(de: &DirEntry) -> Result<Entity> {
        let kind = EntityKind::from_code(de.entity_type).ok_or(Error::Unimplemented {
            entity_type: de.entity_type,
            form: de.form,
        })?;

        if !form_ok(kind, de.form) {
            return Err(Error::CorruptFile(format!(
                "entity type {} does not take form {}",
                de.entity_type, de.form
            )));
        }

        let mut e = Entity::new(kind);
        e.core.apply_dir_entry(de);
        fixup_ignored_de_fields(&mut e.core);
        Ok(e)
    }

    pub fn kind(&self) -> EntityKind {
        dispatch!(&self.payload, p => p.kind())
    }

    pub fn entity_type(&self) -> i32 {
        self.core.entity_type
    }

    /// An entity is orphaned when nothing references it and its dependency
    /// is subordinate. A Circular Arc is orphaned on empty parents
    /// regardless of the dependency flag.
    pub fn is_orphaned(&self) -> bool {
        self.core.refs.is_empty()
            && (self.core.entity_type == 100
                || self.core.status.depends != crate::directory::Dependency::Independent)
    }

    /// Record `parent` as referencing this entity. Idempotent: the returned
    /// flag is true when the back-edge already existed.
    pub fn add_reference(&mut self, parent: EntityId, parent_type: i32) -> Result<bool> {
        if let Payload::CompositeCurve(_) = self.payload {
            if parent_type == 102 {
                return Err(Error::InvalidParent {
                    parent_type,
                    child_type: 102,
                });
            }
        }

        if self.core.refs.contains(&parent) {
            return Ok(true);
        }
        self.core.refs.push(parent);
        Ok(false)
    }

    /// Release exactly one back-edge to `parent`.
    pub fn del_reference(&mut self, parent: EntityId) -> Result<()> {
        match self.core.refs.iter().position(|&p| p == parent) {
            Some(i) => {
                self.core.refs.remove(i);
                Ok(())
            }
            None => Err(Error::NotFound("no such parent reference".into())),
        }
    }

    /// Drop `child` from every child list (payload, transform, extras).
    pub fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = dispatch!(&mut self.payload, p => p.unlink(child));

        if self.core.transform == Some(child) {
            self.core.transform = None;
            removed = true;
        }
        if self.core.color_ref == Some(child) {
            self.core.color_ref = None;
            removed = true;
        }
        let before = self.core.extras.len();
        self.core.extras.retain(|&e| e != child);
        removed || before != self.core.extras.len()
    }

    /// All resolved forward edges: payload children, transform, colour
    /// reference, extras.
    pub fn children(&self) -> Vec<EntityId> {
        let mut out = dispatch!(&self.payload, p => p.children());
        out.extend(self.core.transform);
        out.extend(self.core.color_ref);
        out.extend(self.core.extras.iter().copied());
        out
    }

    /// Hierarchy setter with the per-kind veto: arcs and NURBS curves ignore
    /// the field (the request is accepted and dropped).
    pub fn set_hierarchy(&mut self, hierarchy: Hierarchy) {
        if matches!(self.core.entity_type, 100 | 126) {
            return;
        }
        self.core.status.hierarchy = hierarchy;
    }

    /// Parse this entity's parameter data (the concatenated 64-column
    /// payload windows of its P records).
    pub(crate) fn read_pd(&mut self, text: &str, globals: &GlobalParams) -> Result<()> {
        let mut pd = PdCursor::new(text, globals.pdelim, globals.rdelim);

        let lead = pd.read_int("entity type")?;
        if lead as i32 != self.core.entity_type {
            return Err(Error::CorruptFile(format!(
                "parameter data opens with {} for a type-{} entity",
                lead, self.core.entity_type
            )));
        }

        dispatch!(&mut self.payload, p => p.read_pd(&mut pd, &mut self.core, globals))?;
        self.read_trailer(&mut pd)?;
        self.core.advance(LifeCycle::Parsed);
        Ok(())
    }

    /// Optional PD trailer: extra pointers, then comment strings, both
    /// count-prefixed.
    fn read_trailer(&mut self, pd: &mut PdCursor) -> Result<()> {
        if pd.at_end() {
            return Ok(());
        }

        let n = pd.read_int_or("extra pointer count", 0)?;
        for _ in 0..n {
            let ptr = pd.read_ptr("extra pointer")?;
            if ptr > 0 {
                self.core.pending_extras.push(ptr);
            }
        }

        if pd.at_end() {
            return Ok(());
        }

        let n = pd.read_int_or("comment count", 0)?;
        for _ in 0..n {
            self.core.comments.push(pd.read_string_or("comment", "")?);
        }

        Ok(())
    }

    /// Produce the full token list for this entity's parameter data: leading
    /// type code, payload fields, optional trailer.
    pub(crate) fn format_tokens(&self, map: &SeqMap) -> Result<Vec<String>> {
        let mut out = vec![self.core.entity_type.to_string()];
        dispatch!(&self.payload, p => p.format_pd(&mut out, &self.core, map))?;

        if !self.core.extras.is_empty() || !self.core.comments.is_empty() {
            out.push(self.core.extras.len().to_string());
            for &e in &self.core.extras {
                out.push(seq_of(map, e)?.to_string());
            }
            if !self.core.comments.is_empty() {
                out.push(self.core.comments.len().to_string());
                for c in &self.core.comments {
                    out.push(crate::pd::format_hstring(c));
                }
            }
        }

        Ok(out)
    }

    /// Resolve pending DE indexes (core fields first, then the payload).
    pub(crate) fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        if self.core.pending_transform != 0 {
            let id = r.typed(self.core.pending_transform, &[124], "transform")?;
            self.core.transform = Some(id);
        }
        if self.core.pending_color < 0 {
            let id = r.typed(-self.core.pending_color, &[314], "color")?;
            self.core.color_ref = Some(id);
            self.core.color = 0;
        }
        for ptr in std::mem::take(&mut self.core.pending_extras) {
            let id = r.entity(ptr, "extra pointer")?;
            self.core.extras.push(id);
        }

        dispatch!(&mut self.payload, p => p.associate(r))?;
        self.core.advance(LifeCycle::Associated);
        Ok(())
    }

    /// Multiply length-bearing fields by `sf`. An associated entity enters
    /// the re-entrant `Rescaled` state; one still waiting on resolution
    /// keeps its position.
    pub(crate) fn rescale(&mut self, sf: f64) {
        dispatch!(&mut self.payload, p => p.rescale(sf));
        if self.core.state >= LifeCycle::Associated {
            self.core.advance(LifeCycle::Rescaled);
        }
    }
}

/// Pack a token list into 64-column parameter lines. Every token but the
/// last is followed by the parameter delimiter; the last takes the record
/// delimiter.
pub(crate) fn pack_pd_tokens(tokens: &[String], globals: &GlobalParams) -> Vec<String> {
    let mut w = PdWriter::new();
    for (i, t) in tokens.iter().enumerate() {
        let last = i + 1 == tokens.len();
        w.push(t, if last { globals.rdelim } else { globals.pdelim });
    }
    w.finish()
}

/// Look up the emitted DE sequence of a child key.
pub(crate) fn seq_of(map: &SeqMap, id: EntityId) -> Result<u32> {
    map.get(id)
        .copied()
        .ok_or_else(|| Error::NotFound("child entity is not part of the model being written".into()))
}

/// Two-pass link support handed to each payload's `associate`.
///
/// Pass one built `seq_map` (DE sequence to key, every shell at the odd
/// index it was read from); pass two walks the payloads, which call
/// [`Resolver::entity`] and friends for every pointer field. Each resolved
/// child is recorded so the model can install the back-reference afterwards.
pub struct Resolver<'a> {
    seq_map: &'a FxHashMap<u32, EntityId>,
    kinds: &'a SecondaryMap<EntityId, i32>,
    /// Children resolved for the entity currently being associated.
    pub(crate) linked: Vec<EntityId>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        seq_map: &'a FxHashMap<u32, EntityId>,
        kinds: &'a SecondaryMap<EntityId, i32>,
    ) -> Self {
        Resolver {
            seq_map,
            kinds,
            linked: Vec::new(),
        }
    }

    /// Resolve a raw DE index: positive, odd, and present in the model.
    pub fn entity(&mut self, de: i32, field: &'static str) -> Result<EntityId> {
        if de <= 0 || de % 2 == 0 {
            return Err(Error::BadField {
                field,
                reason: format!("{} is not a valid DE sequence", de),
            });
        }
        match self.seq_map.get(&(de as u32)) {
            Some(&id) => {
                self.linked.push(id);
                Ok(id)
            }
            None => Err(Error::UnresolvedRef { de }),
        }
    }

    /// Resolve and require one of the `allowed` entity type codes.
    pub fn typed(&mut self, de: i32, allowed: &[i32], field: &'static str) -> Result<EntityId> {
        let id = self.entity(de, field)?;
        let t = self.kinds.get(id).copied().unwrap_or(0);
        if allowed.contains(&t) {
            Ok(id)
        } else {
            Err(Error::BadField {
                field,
                reason: format!("DE {} is entity type {}, expected one of {:?}", de, t, allowed),
            })
        }
    }

    /// Resolve a field that must name a curve entity.
    pub fn curve(&mut self, de: i32, field: &'static str) -> Result<EntityId> {
        let id = self.entity(de, field)?;
        let t = self.kinds.get(id).copied().unwrap_or(0);
        if is_curve_code(t) {
            Ok(id)
        } else {
            Err(Error::BadField {
                field,
                reason: format!("DE {} is entity type {}, expected a curve", de, t),
            })
        }
    }

    /// Entity type code behind a key, when it exists.
    pub fn kind_of(&self, id: EntityId) -> Option<i32> {
        self.kinds.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn arena() -> SlotMap<EntityId, ()> {
        SlotMap::with_key()
    }

    #[test]
    fn add_reference_is_idempotent() {
        let mut sm = arena();
        let parent = sm.insert(());

        let mut line = Entity::new(EntityKind::Line);
        assert!(!line.add_reference(parent, 102).unwrap());
        assert!(line.add_reference(parent, 102).unwrap());
        assert_eq!(line.core.refs.len(), 1);
    }

    #[test]
    fn del_reference_releases_one_edge() {
        let mut sm = arena();
        let parent = sm.insert(());

        let mut line = Entity::new(EntityKind::Line);
        line.add_reference(parent, 144).unwrap();
        line.del_reference(parent).unwrap();
        assert!(line.core.refs.is_empty());
        assert!(matches!(
            line.del_reference(parent),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn composite_rejects_composite_parent() {
        let mut sm = arena();
        let parent = sm.insert(());

        let mut cc = Entity::new(EntityKind::CompositeCurve);
        assert!(matches!(
            cc.add_reference(parent, 102),
            Err(Error::InvalidParent { .. })
        ));
        assert!(cc.add_reference(parent, 144).is_ok());
    }

    #[test]
    fn arc_is_orphaned_regardless_of_dependency() {
        let arc = Entity::new(EntityKind::CircularArc);
        assert_eq!(arc.core.status.depends, crate::directory::Dependency::Independent);
        assert!(arc.is_orphaned());

        let line = Entity::new(EntityKind::Line);
        assert!(!line.is_orphaned());
    }

    #[test]
    fn hierarchy_veto_on_arc() {
        let mut arc = Entity::new(EntityKind::CircularArc);
        arc.set_hierarchy(Hierarchy::GlobalDefer);
        assert_eq!(arc.core.status.hierarchy, Hierarchy::AllSubordinate);

        let mut cc = Entity::new(EntityKind::CompositeCurve);
        cc.set_hierarchy(Hierarchy::GlobalDefer);
        assert_eq!(cc.core.status.hierarchy, Hierarchy::GlobalDefer);
    }

    #[test]
    fn lifecycle_is_one_way() {
        let mut core = EntityCore::new(110, 0);
        core.advance(LifeCycle::Associated);
        core.advance(LifeCycle::Parsed);
        assert_eq!(core.state, LifeCycle::Associated);
    }

    #[test]
    fn rescaled_state_is_reentrant() {
        let mut line = Entity::new(EntityKind::Line);
        line.core.advance(LifeCycle::Associated);

        line.rescale(25.4);
        assert_eq!(line.core.state, LifeCycle::Rescaled);
        line.rescale(1.0 / 25.4);
        assert_eq!(line.core.state, LifeCycle::Rescaled);
    }

    #[test]
    fn rescale_leaves_unresolved_entities_in_place() {
        let mut line = Entity::new(EntityKind::Line);
        line.core.advance(LifeCycle::Parsed);
        line.rescale(25.4);
        assert_eq!(line.core.state, LifeCycle::Parsed);
    }
}
