// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! B-rep topology kinds: Vertex List (502), Edge List (504), Loop (508),
//! Face (510), Shell (514).
//!
//! Vertices and edges live in shared list entities; consumers address them
//! as (list pointer, 1-based index) pairs.

use nalgebra::Point3;

use super::TOL_BOOK;
use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::{format_pd_real, PdCursor};

/// Entity 510's acceptable underlying surfaces.
const FACE_SURFACES: &[i32] = &[120, 122, 128, 143];

/// Entity 502 form 1: an indexed pool of model-space vertices.
#[derive(Debug, Clone, Default)]
pub struct VertexList {
    pub vertices: Vec<Point3<f64>>,
}

impl VertexList {
    /// 1-based lookup, as the file format addresses vertices.
    pub fn vertex(&self, index: usize) -> Option<Point3<f64>> {
        index
            .checked_sub(1)
            .and_then(|i| self.vertices.get(i))
            .copied()
    }
}

impl EntityClass for VertexList {
    fn kind(&self) -> EntityKind {
        EntityKind::VertexList
    }

    fn form_ok(form: i32) -> bool {
        form == 1
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "vertex list may not be empty".into(),
            });
        }
        self.vertices.clear();
        for _ in 0..n {
            let x = pd.read_real("X")?;
            let y = pd.read_real("Y")?;
            let z = pd.read_real("Z")?;
            self.vertices.push(Point3::new(x, y, z));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        out.push(self.vertices.len().to_string());
        for v in &self.vertices {
            out.push(format_pd_real(v.x, TOL_BOOK));
            out.push(format_pd_real(v.y, TOL_BOOK));
            out.push(format_pd_real(v.z, TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        for v in &mut self.vertices {
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

/// One edge of a 504: a model curve bounded by two vertex references.
#[derive(Debug, Clone)]
pub struct EdgeUse {
    pub curve: EntityId,
    pub start_list: EntityId,
    pub start_index: usize,
    pub end_list: EntityId,
    pub end_index: usize,
}

/// Entity 504 form 1: an indexed pool of edges.
#[derive(Debug, Clone, Default)]
pub struct EdgeList {
    pub edges: Vec<EdgeUse>,
    pending: Vec<(i32, i32, usize, i32, usize)>,
}

impl EdgeList {
    /// 1-based lookup.
    pub fn edge(&self, index: usize) -> Option<&EdgeUse> {
        index.checked_sub(1).and_then(|i| self.edges.get(i))
    }
}

impl EntityClass for EdgeList {
    fn kind(&self) -> EntityKind {
        EntityKind::EdgeList
    }

    fn form_ok(form: i32) -> bool {
        form == 1
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "edge list may not be empty".into(),
            });
        }
        self.pending.clear();
        for _ in 0..n {
            let curve = pd.read_ptr("CURV")?;
            let svp = pd.read_ptr("SVP")?;
            let sv = pd.read_int("SV")?;
            let tvp = pd.read_ptr("TVP")?;
            let tv = pd.read_int("TV")?;
            if sv < 1 || tv < 1 {
                return Err(Error::BadField {
                    field: "SV",
                    reason: "vertex indices are 1-based".into(),
                });
            }
            self.pending.push((curve, svp, sv as usize, tvp, tv as usize));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.edges.len().to_string());
        for e in &self.edges {
            out.push(seq_of(map, e.curve)?.to_string());
            out.push(seq_of(map, e.start_list)?.to_string());
            out.push(e.start_index.to_string());
            out.push(seq_of(map, e.end_list)?.to_string());
            out.push(e.end_index.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for (curve, svp, sv, tvp, tv) in std::mem::take(&mut self.pending) {
            self.edges.push(EdgeUse {
                curve: r.curve(curve, "CURV")?,
                start_list: r.typed(svp, &[502], "SVP")?,
                start_index: sv,
                end_list: r.typed(tvp, &[502], "TVP")?,
                end_index: tv,
            });
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.edges.len() * 3);
        for e in &self.edges {
            out.push(e.curve);
            out.push(e.start_list);
            out.push(e.end_list);
        }
        out
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|e| e.curve != child && e.start_list != child && e.end_list != child);
        before != self.edges.len()
    }
}

/// One member of a loop: an edge (or vertex) use with orientation and its
/// parameter-space images.
#[derive(Debug, Clone)]
pub struct LoopEdge {
    /// False: an edge from a 504. True: a vertex from a 502.
    pub is_vertex: bool,
    pub list: EntityId,
    pub index: usize,
    /// True when traversed in the curve's own direction.
    pub forward: bool,
    /// Parameter-space curves: (isoparametric flag, curve).
    pub parameter_curves: Vec<(bool, EntityId)>,
}

/// Entity 508: an ordered loop of edge uses bounding a face.
#[derive(Debug, Clone, Default)]
pub struct LoopEntity {
    pub edges: Vec<LoopEdge>,
    #[allow(clippy::type_complexity)]
    pending: Vec<(bool, i32, usize, bool, Vec<(bool, i32)>)>,
}

impl EntityClass for LoopEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Loop
    }

    fn form_ok(form: i32) -> bool {
        matches!(form, 0 | 1)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "loop may not be empty".into(),
            });
        }
        self.pending.clear();
        for _ in 0..n {
            let is_vertex = match pd.read_int("TYPE")? {
                0 => false,
                1 => true,
                v => {
                    return Err(Error::BadField {
                        field: "TYPE",
                        reason: format!("edge use type {} out of range", v),
                    })
                }
            };
            let list = pd.read_ptr("EDGE")?;
            let index = pd.read_int("NDX")?;
            if index < 1 {
                return Err(Error::BadField {
                    field: "NDX",
                    reason: "edge indices are 1-based".into(),
                });
            }
            let forward = pd.read_int_or("OF", 1)? != 0;
            let k = pd.read_int_or("K", 0)?;
            let mut pcs = Vec::new();
            for _ in 0..k {
                let iso = pd.read_int_or("ISOP", 0)? != 0;
                let curve = pd.read_ptr("CURV")?;
                pcs.push((iso, curve));
            }
            self.pending
                .push((is_vertex, list, index as usize, forward, pcs));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.edges.len().to_string());
        for e in &self.edges {
            out.push(i32::from(e.is_vertex).to_string());
            out.push(seq_of(map, e.list)?.to_string());
            out.push(e.index.to_string());
            out.push(i32::from(e.forward).to_string());
            out.push(e.parameter_curves.len().to_string());
            for &(iso, c) in &e.parameter_curves {
                out.push(i32::from(iso).to_string());
                out.push(seq_of(map, c)?.to_string());
            }
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for (is_vertex, list, index, forward, pcs) in std::mem::take(&mut self.pending) {
            let list = if is_vertex {
                r.typed(list, &[502], "EDGE")?
            } else {
                r.typed(list, &[504], "EDGE")?
            };
            let mut parameter_curves = Vec::with_capacity(pcs.len());
            for (iso, c) in pcs {
                parameter_curves.push((iso, r.curve(c, "CURV")?));
            }
            self.edges.push(LoopEdge {
                is_vertex,
                list,
                index,
                forward,
                parameter_curves,
            });
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        for e in &self.edges {
            out.push(e.list);
            out.extend(e.parameter_curves.iter().map(|&(_, c)| c));
        }
        out
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        let before = self.edges.len();
        self.edges.retain(|e| e.list != child);
        removed |= before != self.edges.len();
        for e in &mut self.edges {
            let n = e.parameter_curves.len();
            e.parameter_curves.retain(|&(_, c)| c != child);
            removed |= n != e.parameter_curves.len();
        }
        removed
    }
}

/// Entity 510 form 1: a surface patch bounded by loops.
#[derive(Debug, Clone, Default)]
pub struct Face {
    pub surface: Option<EntityId>,
    /// True when the first loop is the outer boundary.
    pub has_outer: bool,
    pub loops: Vec<EntityId>,
    pending_surface: i32,
    pending_loops: Vec<i32>,
}

impl EntityClass for Face {
    fn kind(&self) -> EntityKind {
        EntityKind::Face
    }

    fn form_ok(form: i32) -> bool {
        form == 1
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        self.pending_surface = pd.read_ptr("SURF")?;
        if self.pending_surface <= 0 {
            return Err(Error::BadField {
                field: "SURF",
                reason: "face needs its surface".into(),
            });
        }
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "face needs at least one loop".into(),
            });
        }
        self.has_outer = pd.read_int_or("OF", 1)? != 0;
        self.pending_loops.clear();
        for _ in 0..n {
            self.pending_loops.push(pd.read_ptr("LOOP")?);
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        let surface = self.surface.ok_or(Error::NotAssociated(510))?;
        out.push(seq_of(map, surface)?.to_string());
        out.push(self.loops.len().to_string());
        out.push(i32::from(self.has_outer).to_string());
        for &l in &self.loops {
            out.push(seq_of(map, l)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        self.surface = Some(r.typed(self.pending_surface, FACE_SURFACES, "SURF")?);
        for l in std::mem::take(&mut self.pending_loops) {
            self.loops.push(r.typed(l, &[508], "LOOP")?);
        }
        self.pending_surface = 0;
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.surface
            .into_iter()
            .chain(self.loops.iter().copied())
            .collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let mut removed = false;
        if self.surface == Some(child) {
            self.surface = None;
            removed = true;
        }
        let before = self.loops.len();
        self.loops.retain(|&l| l != child);
        removed || before != self.loops.len()
    }
}

/// Entity 514: a shell of oriented faces. Form 1 is closed, form 2 open.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    /// (face, true when the face normal agrees with the shell).
    pub faces: Vec<(EntityId, bool)>,
    pending: Vec<(i32, bool)>,
}

impl EntityClass for Shell {
    fn kind(&self) -> EntityKind {
        EntityKind::Shell
    }

    fn form_ok(form: i32) -> bool {
        matches!(form, 1 | 2)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        let n = pd.read_int("N")?;
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: "shell needs at least one face".into(),
            });
        }
        self.pending.clear();
        for _ in 0..n {
            let face = pd.read_ptr("FACE")?;
            let flag = pd.read_int_or("OF", 1)? != 0;
            self.pending.push((face, flag));
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        out.push(self.faces.len().to_string());
        for &(f, flag) in &self.faces {
            out.push(seq_of(map, f)?.to_string());
            out.push(i32::from(flag).to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for (face, flag) in std::mem::take(&mut self.pending) {
            self.faces.push((r.typed(face, &[510], "FACE")?, flag));
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {}

    fn children(&self) -> Vec<EntityId> {
        self.faces.iter().map(|&(f, _)| f).collect()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.faces.len();
        self.faces.retain(|&(f, _)| f != child);
        before != self.faces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_list_uses_one_based_indices() {
        let mut pd = PdCursor::new("2,0.0,0.0,0.0,1.0,2.0,3.0;", ',', ';');
        let mut vl = VertexList::default();
        let mut core = crate::entity::Entity::new(EntityKind::VertexList).core;
        vl.read_pd(&mut pd, &mut core, &GlobalParams::default()).unwrap();

        assert_eq!(vl.vertex(1), Some(Point3::new(0.0, 0.0, 0.0)));
        assert_eq!(vl.vertex(2), Some(Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(vl.vertex(0), None);
        assert_eq!(vl.vertex(3), None);
    }

    #[test]
    fn loop_reads_parameter_curves() {
        // one edge use with two parameter-space curves
        let mut pd = PdCursor::new("1,0,7,1,1,2,0,9,1,11;", ',', ';');
        let mut lp = LoopEntity::default();
        let mut core = crate::entity::Entity::new(EntityKind::Loop).core;
        lp.read_pd(&mut pd, &mut core, &GlobalParams::default()).unwrap();

        assert_eq!(lp.pending.len(), 1);
        let (is_vertex, list, index, forward, pcs) = &lp.pending[0];
        assert!(!is_vertex);
        assert_eq!(*list, 7);
        assert_eq!(*index, 1);
        assert!(*forward);
        assert_eq!(pcs, &vec![(false, 9), (true, 11)]);
    }
}
