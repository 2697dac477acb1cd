// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity 102: Composite Curve, an ordered chain of curve entities.
//!
//! The chain rules (segment N starts where segment N-1 ends, the
//! point-member restrictions) are cross-entity and run in the validation
//! pass once children are resolved.

use crate::entity::{seq_of, EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::{Error, Result};
use crate::global::GlobalParams;
use crate::pd::PdCursor;

#[derive(Debug, Clone, Default)]
pub struct CompositeCurve {
    /// Member curves in chain order.
    pub curves: Vec<EntityId>,
    pending: Vec<i32>,
}

impl CompositeCurve {
    pub fn segment_count(&self) -> usize {
        self.curves.len()
    }

    pub fn segment(&self, index: usize) -> Option<EntityId> {
        self.curves.get(index).copied()
    }

    /// Append a resolved member curve. Back-referencing is the model's job.
    pub(crate) fn push_segment(&mut self, curve: EntityId) {
        self.curves.push(curve);
    }
}

impl EntityClass for CompositeCurve {
    fn kind(&self) -> EntityKind {
        EntityKind::CompositeCurve
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
        if n < 1 {
            return Err(Error::BadField {
                field: "N",
                reason: format!("composite curve needs at least one member, got {}", n),
            });
        }

        self.pending.clear();
        for _ in 0..n {
            let ptr = pd.read_ptr("curve pointer")?;
            if ptr <= 0 {
                return Err(Error::BadField {
                    field: "curve pointer",
                    reason: format!("member pointer {} must be positive", ptr),
                });
            }
            self.pending.push(ptr);
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, map: &SeqMap) -> Result<()> {
        if self.curves.is_empty() {
            return Err(Error::InvariantViolation {
                entity_type: 102,
                reason: "composite curve has no members".into(),
            });
        }

        out.push(self.curves.len().to_string());
        for &c in &self.curves {
            out.push(seq_of(map, c)?.to_string());
        }
        Ok(())
    }

    fn associate(&mut self, r: &mut Resolver) -> Result<()> {
        for ptr in std::mem::take(&mut self.pending) {
            self.curves.push(r.curve(ptr, "curve pointer")?);
        }
        Ok(())
    }

    fn rescale(&mut self, _sf: f64) {
        // nothing to scale; the members scale themselves
    }

    fn children(&self) -> Vec<EntityId> {
        self.curves.clone()
    }

    fn unlink(&mut self, child: EntityId) -> bool {
        let before = self.curves.len();
        self.curves.retain(|&c| c != child);
        before != self.curves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_requires_positive_member_count() {
        let mut cc = CompositeCurve::default();
        let mut core = crate::entity::Entity::new(EntityKind::CompositeCurve).core;
        let g = GlobalParams::default();

        let mut pd = PdCursor::new("0;", ',', ';');
        assert!(cc.read_pd(&mut pd, &mut core, &g).is_err());

        let mut pd = PdCursor::new("2,1,3;", ',', ';');
        assert!(cc.read_pd(&mut pd, &mut core, &g).is_ok());
    }

    #[test]
    fn format_refuses_empty_chain() {
        let cc = CompositeCurve::default();
        let core = crate::entity::Entity::new(EntityKind::CompositeCurve).core;
        let mut out = Vec::new();
        assert!(cc.format_pd(&mut out, &core, &SeqMap::default()).is_err());
    }
}
