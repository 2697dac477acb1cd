// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section writer: renumbers the graph and streams the five sections.
//!
//! Writing assigns Directory sequences 1, 3, 5, ... in insertion order,
//! formats every entity's parameter data against the new numbering, then
//! emits Start, Global, Directory, Parameter, and Terminate records.
//! Invariant failures abort before the target file is touched.

use std::path::Path;

use tracing::{debug, warn};

use crate::directory::DirEntry;
use crate::entity::{pack_pd_tokens, EntityId, LifeCycle, SeqMap};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::record::{Record, Section};

impl Model {
    /// Write the model to `path`. Refuses to replace an existing file
    /// unless `overwrite` is set; a validation failure leaves the target
    /// absent.
    pub fn write(&mut self, path: impl AsRef<Path>, overwrite: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and overwrite is off", path.display()),
            )));
        }

        let text = self.render()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Produce the complete file image, renumbering the graph.
    pub fn render(&mut self) -> Result<String> {
        self.cull_unresolved();
        self.cull_orphans();

        let now = chrono::Local::now().format("%Y%m%d.%H%M%S").to_string();
        if self.globals.creation_date.is_empty() {
            self.globals.creation_date = now.clone();
        }
        self.globals.modified_date = now;
        if self.globals.file_name.is_empty() {
            self.globals.file_name = "model.igs".to_string();
        }

        self.validate_strict()?;

        // new DE numbering in insertion order
        let mut map = SeqMap::new();
        for (i, &id) in self.order.iter().enumerate() {
            map.insert(id, (2 * i + 1) as u32);
        }

        // parameter data first: the DE pair needs each entity's line count
        let mut pd_blocks: Vec<(EntityId, Vec<String>)> = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            let tokens = self.entity(id)?.format_tokens(&map)?;
            let lines = pack_pd_tokens(&tokens, &self.globals);
            pd_blocks.push((id, lines));
        }

        let mut out = String::new();

        // Start section
        let start_lines: Vec<&str> = if self.start_comments.is_empty() {
            vec![""]
        } else {
            self.start_comments.iter().map(|s| s.as_str()).collect()
        };
        for (i, s) in start_lines.iter().enumerate() {
            let data: String = s.chars().take(72).collect();
            out.push_str(&Record::encode(&data, Section::Start, (i + 1) as u32));
            out.push('\n');
        }

        // Global section
        let global_lines = self.globals.format();
        for (i, l) in global_lines.iter().enumerate() {
            out.push_str(&Record::encode(l, Section::Global, (i + 1) as u32));
            out.push('\n');
        }

        // Directory section
        let mut pd_start = 1i32;
        for (id, lines) in &pd_blocks {
            let e = self.entity(*id)?;
            let seq = map[*id];

            let de = DirEntry {
                entity_type: e.core.entity_type,
                param_data: pd_start,
                structure: 0,
                line_font: e.core.line_font.max(0),
                level: e.core.level.max(0),
                view: 0,
                transform: e.core.transform.and_then(|t| map.get(t)).map_or(0, |&s| s as i32),
                label_display: 0,
                status: e.core.status,
                line_weight: e.core.line_weight,
                color: match e.core.color_ref.and_then(|c| map.get(c)) {
                    Some(&s) => -(s as i32),
                    None => e.core.color.max(0),
                },
                param_lines: lines.len() as i32,
                form: e.core.form,
                label: e.core.label.clone(),
                subscript: e.core.subscript,
                sequence: seq,
            };

            let (d1, d2) = de.encode();
            out.push_str(&Record::encode(&d1, Section::Directory, seq));
            out.push('\n');
            out.push_str(&Record::encode(&d2, Section::Directory, seq + 1));
            out.push('\n');

            pd_start += lines.len() as i32;
        }

        // Parameter section
        let mut p_seq = 1u32;
        for (id, lines) in &pd_blocks {
            let de_seq = map[*id];
            for l in lines {
                out.push_str(&Record::encode_parameter(l, de_seq, p_seq));
                out.push('\n');
                p_seq += 1;
            }
        }

        // Terminate section
        let term = format!(
            "S{:>7}G{:>7}D{:>7}P{:>7}",
            start_lines.len(),
            global_lines.len(),
            pd_blocks.len() * 2,
            p_seq - 1
        );
        out.push_str(&Record::encode(&term, Section::Terminate, 1));
        out.push('\n');

        // the graph is renumbered only once the image is complete
        for (id, &seq) in map.iter() {
            if let Ok(e) = self.entity_mut(id) {
                e.core.de_sequence = seq;
                e.core.advance(LifeCycle::Emitted);
            }
        }

        debug!(entities = self.len(), bytes = out.len(), "model rendered");
        Ok(out)
    }

    /// Drop entities whose association never completed: their pointer
    /// fields cannot be renumbered.
    pub(crate) fn cull_unresolved(&mut self) {
        let unresolved: Vec<EntityId> = self
            .entities()
            .filter(|(_, e)| e.core.state == LifeCycle::Parsed)
            .map(|(id, _)| id)
            .collect();
        for id in unresolved {
            if let Ok(e) = self.entity(id) {
                warn!(
                    entity_type = e.entity_type(),
                    de = e.core.de_sequence,
                    "culling entity with unresolved references"
                );
                let _ = self.del_entity(id);
            }
        }
    }

    /// Remove every orphaned entity (and whatever the removals orphan in
    /// turn) before emission.
    pub(crate) fn cull_orphans(&mut self) {
        loop {
            let orphans: Vec<EntityId> = self
                .entities()
                .filter(|(_, e)| e.is_orphaned())
                .map(|(id, _)| id)
                .collect();
            if orphans.is_empty() {
                return;
            }
            for id in orphans {
                if let Ok(e) = self.entity(id) {
                    warn!(entity_type = e.entity_type(), "culling orphaned entity");
                    let _ = self.del_entity(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Dependency;
    use crate::entities::Line;
    use crate::entity::{EntityKind, Payload};

    #[test]
    fn render_renumbers_in_insertion_order() {
        let mut m = Model::new();
        let cc = m.new_entity(EntityKind::CompositeCurve);
        let l1 = m.new_entity(EntityKind::Line);
        let l2 = m.new_entity(EntityKind::Line);
        if let Payload::Line(l) = &mut m.entity_mut(l2).unwrap().payload {
            *l = Line {
                x1: 1.0,
                ..Line::default()
            };
        }
        if let Payload::Line(l) = &mut m.entity_mut(l1).unwrap().payload {
            *l = Line {
                x2: 1.0,
                ..Line::default()
            };
        }
        m.add_segment(cc, l1).unwrap();
        m.add_segment(cc, l2).unwrap();
        m.entity_mut(l1).unwrap().core.status.depends = Dependency::Physical;
        m.entity_mut(l2).unwrap().core.status.depends = Dependency::Physical;

        let text = m.render().unwrap();
        assert_eq!(m.entity(cc).unwrap().core.de_sequence, 1);
        assert_eq!(m.entity(l1).unwrap().core.de_sequence, 3);
        assert_eq!(m.entity(l2).unwrap().core.de_sequence, 5);

        // the composite's PD names its members by their new sequences
        assert!(text.contains("102,2,3,5;"));
    }

    #[test]
    fn round_trip_preserves_circle_payload() {
        let mut m = Model::new();
        // a bare arc counts as orphaned, so hang it off a composite
        let cc = m.new_entity(EntityKind::CompositeCurve);
        let arc = m.new_entity(EntityKind::CircularArc);
        if let Payload::CircularArc(a) = &mut m.entity_mut(arc).unwrap().payload {
            a.x_end = -1.0;
            a.y_end = 0.0;
        }
        m.add_segment(cc, arc).unwrap();

        let text = m.render().unwrap();
        assert!(text.contains("100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;"));

        let (m2, _warnings) = Model::parse(&text).unwrap();
        assert_eq!(m2.len(), 2);
        let arcs = m2.entities_of_kind(EntityKind::CircularArc);
        match &m2.entity(arcs[0]).unwrap().payload {
            Payload::CircularArc(a) => {
                assert_eq!((a.x_start, a.y_start), (1.0, 0.0));
                assert_eq!((a.x_end, a.y_end), (-1.0, 0.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn orphans_are_culled_on_write() {
        let mut m = Model::new();
        let _arc = m.new_entity(EntityKind::CircularArc);
        let line = m.new_entity(EntityKind::Line);
        m.entity_mut(line).unwrap().core.status.depends = Dependency::Physical;

        let text = m.render().unwrap();
        // the arc (orphaned regardless of dependency) and the physically
        // dependent line both disappear
        assert_eq!(m.len(), 0);
        assert!(!text.contains("100,"));
    }

    #[test]
    fn write_refuses_existing_file_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.igs");
        std::fs::write(&path, "placeholder").unwrap();

        let mut m = Model::new();
        m.new_entity(EntityKind::Line);
        assert!(m.write(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "placeholder");

        m.write(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("110,"));
    }

    #[test]
    fn validation_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.igs");

        let mut m = Model::new();
        let n = m.new_entity(EntityKind::NurbsCurve);
        if let Payload::NurbsCurve(c) = &mut m.entity_mut(n).unwrap().payload {
            c.k = 1;
            c.m = 1;
            c.knots = vec![0.0, 0.0, 1.0, 1.0];
            c.weights = vec![1.0, 0.0];
            c.control = vec![
                nalgebra::Point3::origin(),
                nalgebra::Point3::new(1.0, 0.0, 0.0),
            ];
        }

        assert!(m.write(&path, true).is_err());
        assert!(!path.exists());
    }
}
