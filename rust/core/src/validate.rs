// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-entity invariants.
//!
//! On load the checks accumulate [`Warning`]s without halting; before a
//! write the same checks abort on the first failure (after orphan culling).

use crate::directory::EntityUse;
use crate::entity::{EntityId, LifeCycle, Payload};
use crate::entities::{CompositeCurve, NurbsCurve, NurbsSurface};
use crate::error::{Error, Result, Warning};
use crate::model::Model;

/// Coplanarity tolerance for planar NURBS curves.
const PLANAR_TOL: f64 = 1e-8;

/// Entity kinds that are positional rather than curves proper.
fn is_point_kind(code: i32) -> bool {
    matches!(code, 116 | 132)
}

impl Model {
    /// Load-side validation: run every invariant, collect defects.
    pub fn validate(&self) -> Vec<Warning> {
        let mut out = Vec::new();

        self.check_cycles(&mut out);

        for (id, e) in self.entities() {
            let de = Some(e.core.de_sequence).filter(|&s| s != 0);

            if let Err(err) = self.check_entity(id) {
                out.push(Warning::new(de, err));
            }

            if e.is_orphaned() {
                out.push(Warning::new(
                    de,
                    Error::InvariantViolation {
                        entity_type: e.entity_type(),
                        reason: "entity is orphaned (no parents, not independent)".into(),
                    },
                ));
            }
        }

        out
    }

    /// Write-side validation: the first kind-specific failure aborts.
    /// Orphans are not an error here; the writer culls them beforehand.
    pub(crate) fn validate_strict(&self) -> Result<()> {
        let mut cycle_warnings = Vec::new();
        self.check_cycles(&mut cycle_warnings);
        if let Some(w) = cycle_warnings.into_iter().next() {
            return Err(w.error);
        }

        for (id, _) in self.entities() {
            self.check_entity(id)?;
        }
        Ok(())
    }

    /// Kind-specific invariants of one entity.
    fn check_entity(&self, id: EntityId) -> Result<()> {
        let e = self.entity(id)?;
        match &e.payload {
            Payload::NurbsCurve(n) => check_nurbs_curve(n),
            Payload::NurbsSurface(s) => check_nurbs_surface(s),
            Payload::CompositeCurve(c) => {
                if e.core.state >= LifeCycle::Associated {
                    self.check_composite(c, e.core.status.entity_use)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Chain rules of a Composite Curve: member kinds, the point-member
    /// restrictions, and end-to-start coincidence within the cubed minimum
    /// resolution.
    fn check_composite(&self, cc: &CompositeCurve, use_flag: EntityUse) -> Result<()> {
        let violation = |reason: String| Error::InvariantViolation {
            entity_type: 102,
            reason,
        };

        let mut kinds = Vec::with_capacity(cc.curves.len());
        for &m in &cc.curves {
            kinds.push(self.entity(m)?.entity_type());
        }

        if kinds.len() == 1 && is_point_kind(kinds[0]) {
            return Err(violation(
                "a composite curve may not consist of a single point".into(),
            ));
        }

        for w in kinds.windows(2) {
            let (prev, cur) = (w[0], w[1]);
            if !is_point_kind(prev) || !is_point_kind(cur) {
                continue;
            }
            if !self.policy.allow_interleaved_points || prev == cur {
                let only_pair = kinds.len() == 2;
                if !(only_pair && use_flag == EntityUse::Logical) {
                    return Err(violation(
                        "consecutive point members are only allowed as the sole \
                         pair of a logical/positional curve"
                            .into(),
                    ));
                }
            }
        }

        let tol = self.globals.sequencing_tolerance();
        for pair in cc.curves.windows(2) {
            let end = self.curve_end_point(pair[0], true)?;
            let start = self.curve_start_point(pair[1], true)?;
            let gap = (start - end).norm_squared();
            if gap > tol {
                return Err(violation(format!(
                    "segment does not continue its predecessor: end {:?}, next start {:?}",
                    end, start
                )));
            }
        }

        Ok(())
    }

    /// Reject self-references and ancestor references: the entity graph is
    /// a DAG.
    fn check_cycles(&self, out: &mut Vec<Warning>) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        let mut color: slotmap::SecondaryMap<EntityId, Color> = self
            .entities()
            .map(|(id, _)| (id, Color::White))
            .collect();

        // iterative DFS with an explicit exit marker per node
        for (root, _) in self.entities() {
            if color[root] != Color::White {
                continue;
            }
            let mut stack = vec![(root, false)];
            while let Some((id, leaving)) = stack.pop() {
                if leaving {
                    color[id] = Color::Black;
                    continue;
                }
                if color[id] != Color::White {
                    continue;
                }
                color[id] = Color::Grey;
                stack.push((id, true));

                let children = match self.entity(id) {
                    Ok(e) => e.children(),
                    Err(_) => continue,
                };
                for c in children {
                    match color.get(c).copied() {
                        Some(Color::Grey) => {
                            let (etype, de) = match self.entity(c) {
                                Ok(e) => (e.entity_type(), e.core.de_sequence),
                                Err(_) => (0, 0),
                            };
                            out.push(Warning::new(
                                Some(de).filter(|&s| s != 0),
                                Error::InvariantViolation {
                                    entity_type: etype,
                                    reason: "entity participates in a reference cycle".into(),
                                },
                            ));
                        }
                        Some(Color::White) => stack.push((c, false)),
                        _ => {}
                    }
                }
            }
        }
    }
}

fn check_nurbs_curve(n: &NurbsCurve) -> Result<()> {
    let violation = |reason: String| Error::InvariantViolation {
        entity_type: 126,
        reason,
    };

    if n.k < 1 || n.m < 1 {
        return Err(violation(format!("K={} M={} below minimum of 1", n.k, n.m)));
    }
    let n_coeffs = (n.k + 1) as usize;
    if n.knots.len() != (n.k + n.m + 2) as usize {
        return Err(violation(format!(
            "{} knots, expected K+M+2 = {}",
            n.knots.len(),
            n.k + n.m + 2
        )));
    }
    if n.control.len() != n_coeffs || n.weights.len() != n_coeffs {
        return Err(violation(format!(
            "{} control points / {} weights, expected K+1 = {}",
            n.control.len(),
            n.weights.len(),
            n_coeffs
        )));
    }
    if let Some(w) = n.weights.iter().find(|w| **w <= 0.0) {
        return Err(violation(format!("non-positive weight {}", w)));
    }

    if n.planar {
        if (n.normal.norm() - 1.0).abs() > 1.0e-6 {
            return Err(violation("planar flag with a non-unit normal".into()));
        }
        let p0 = n.control[0];
        for p in &n.control[1..] {
            let off = n.normal.dot(&(p - p0));
            if off.abs() >= PLANAR_TOL {
                return Err(violation(format!(
                    "control point off the declared plane by {}",
                    off
                )));
            }
        }
    }

    Ok(())
}

fn check_nurbs_surface(s: &NurbsSurface) -> Result<()> {
    let violation = |reason: String| Error::InvariantViolation {
        entity_type: 128,
        reason,
    };

    if s.k1 < 1 || s.k2 < 1 || s.m1 < 1 || s.m2 < 1 {
        return Err(violation("indices and degrees start at 1".into()));
    }
    let n_pts = ((s.k1 + 1) * (s.k2 + 1)) as usize;
    if s.knots_u.len() != (s.k1 + s.m1 + 2) as usize
        || s.knots_v.len() != (s.k2 + s.m2 + 2) as usize
    {
        return Err(violation("knot vector lengths disagree with K/M".into()));
    }
    if s.control.len() != n_pts || s.weights.len() != n_pts {
        return Err(violation("control net size disagrees with K1/K2".into()));
    }
    if s.weights.iter().any(|w| *w <= 0.0) {
        return Err(violation("non-positive weight".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Line;
    use crate::entity::EntityKind;

    fn line(m: &mut Model, p1: [f64; 3], p2: [f64; 3]) -> EntityId {
        let id = m.new_entity(EntityKind::Line);
        if let Payload::Line(l) = &mut m.entity_mut(id).unwrap().payload {
            *l = Line {
                x1: p1[0],
                y1: p1[1],
                z1: p1[2],
                x2: p2[0],
                y2: p2[1],
                z2: p2[2],
            };
        }
        id
    }

    #[test]
    fn composite_sequencing_detects_a_break() {
        let mut m = Model::new();
        let cc = m.new_entity(EntityKind::CompositeCurve);
        let l1 = line(&mut m, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let l2 = line(&mut m, [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]);
        m.add_segment(cc, l1).unwrap();
        m.add_segment(cc, l2).unwrap();

        // clean chain
        let warnings = m.validate();
        assert!(warnings
            .iter()
            .all(|w| !matches!(w.error, Error::InvariantViolation { entity_type: 102, .. })));

        // swap the second line's endpoints: the chain now breaks
        if let Payload::Line(l) = &mut m.entity_mut(l2).unwrap().payload {
            std::mem::swap(&mut l.x1, &mut l.x2);
            std::mem::swap(&mut l.y1, &mut l.y2);
        }
        let warnings = m.validate();
        assert!(warnings
            .iter()
            .any(|w| matches!(w.error, Error::InvariantViolation { entity_type: 102, .. })));
    }

    #[test]
    fn orphan_reporting_honours_dependency() {
        let mut m = Model::new();
        let l = m.new_entity(EntityKind::Line);
        m.entity_mut(l).unwrap().core.status.depends =
            crate::directory::Dependency::Physical;

        let warnings = m.validate();
        assert!(warnings
            .iter()
            .any(|w| matches!(&w.error, Error::InvariantViolation { reason, .. } if reason.contains("orphaned"))));

        m.entity_mut(l).unwrap().core.status.depends =
            crate::directory::Dependency::Independent;
        let warnings = m.validate();
        assert!(warnings.is_empty());
    }

    #[test]
    fn cycle_detection_flags_self_loops() {
        let mut m = Model::new();
        let cc = m.new_entity(EntityKind::CompositeCurve);
        let l1 = line(&mut m, [0.0; 3], [1.0, 0.0, 0.0]);
        m.add_segment(cc, l1).unwrap();

        // force a cycle: the composite suddenly contains itself
        if let Payload::CompositeCurve(c) = &mut m.entity_mut(cc).unwrap().payload {
            c.curves.push(cc);
        }
        let mut warnings = Vec::new();
        m.check_cycles(&mut warnings);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn strict_validation_rejects_bad_nurbs() {
        let mut m = Model::new();
        let n = m.new_entity(EntityKind::NurbsCurve);
        if let Payload::NurbsCurve(c) = &mut m.entity_mut(n).unwrap().payload {
            c.k = 1;
            c.m = 1;
            c.knots = vec![0.0, 0.0, 1.0, 1.0];
            c.weights = vec![1.0, -1.0];
            c.control = vec![
                nalgebra::Point3::origin(),
                nalgebra::Point3::new(1.0, 0.0, 0.0),
            ];
        }
        m.entity_mut(n).unwrap().core.status.depends =
            crate::directory::Dependency::Independent;

        assert!(m.validate_strict().is_err());
    }
}
