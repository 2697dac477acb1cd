// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section reader: streams the five sections into a [`Model`].
//!
//! Per-entity defects (unknown kinds, bad parameter data, dangling
//! pointers) are collected as warnings and the offending entity is culled;
//! the rest of the file still loads. Defects in the section structure
//! itself are fatal.

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::directory::DirEntry;
use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result, Warning};
use crate::global::GlobalParams;
use crate::model::Model;
use crate::record::{Record, Section};

impl Model {
    /// Read an IGES file. Returns the model plus the defect set collected
    /// along the way.
    pub fn read(path: impl AsRef<Path>) -> Result<(Model, Vec<Warning>)> {
        let content = std::fs::read_to_string(path)?;
        Model::parse(&content)
    }

    /// Parse IGES file content.
    pub fn parse(content: &str) -> Result<(Model, Vec<Warning>)> {
        let mut warnings = Vec::new();

        let mut start_recs = Vec::new();
        let mut global_recs = Vec::new();
        let mut dir_recs = Vec::new();
        let mut param_recs = Vec::new();
        let mut term_rec: Option<Record> = None;

        let mut last_section: Option<Section> = None;
        let mut last_seq = 0u32;

        for (i, raw) in content.lines().enumerate() {
            let line_no = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let rec = Record::decode(raw, line_no)?;

            if last_section != Some(rec.section) {
                let order = |s: Section| match s {
                    Section::Start => 0,
                    Section::Global => 1,
                    Section::Directory => 2,
                    Section::Parameter => 3,
                    Section::Terminate => 4,
                };
                if let Some(prev) = last_section {
                    if order(rec.section) < order(prev) {
                        return Err(Error::BadRecord {
                            line: line_no,
                            reason: format!(
                                "section {} after section {}",
                                rec.section.letter(),
                                prev.letter()
                            ),
                        });
                    }
                }
                last_section = Some(rec.section);
                last_seq = 0;
            }

            if rec.sequence != last_seq + 1 {
                return Err(Error::BadRecord {
                    line: line_no,
                    reason: format!(
                        "non-monotonic sequence {} in section {} (expected {})",
                        rec.sequence,
                        rec.section.letter(),
                        last_seq + 1
                    ),
                });
            }
            last_seq = rec.sequence;

            match rec.section {
                Section::Start => start_recs.push(rec),
                Section::Global => global_recs.push(rec),
                Section::Directory => dir_recs.push((rec, line_no)),
                Section::Parameter => param_recs.push((rec, line_no)),
                Section::Terminate => term_rec = Some(rec),
            }
        }

        if global_recs.is_empty() {
            return Err(Error::CorruptFile("no Global section".into()));
        }
        if dir_recs.len() % 2 != 0 {
            return Err(Error::CorruptFile(
                "odd number of Directory records".into(),
            ));
        }

        let mut model = Model::new();

        for rec in &start_recs {
            model.start_comments.push(rec.data.trim_end().to_string());
        }

        let global_text: String = global_recs.iter().map(|r| r.data.as_str()).collect();
        let (globals, mut gw) = GlobalParams::parse(&global_text)?;
        model.globals = globals;
        warnings.append(&mut gw);

        // first pass: one shell per DE pair, indexed by its odd sequence
        let mut dir_entries: Vec<DirEntry> = Vec::new();
        let mut by_sequence: FxHashMap<u32, EntityId> = FxHashMap::default();

        for pair in dir_recs.chunks(2) {
            let (first, line) = &pair[0];
            let (second, _) = &pair[1];
            let de = match DirEntry::decode(first, second, *line) {
                Ok(de) => de,
                Err(e) => {
                    warn!(line, error = %e, "dropping undecodable DE pair");
                    warnings.push(Warning::new(Some(first.sequence), e));
                    continue;
                }
            };

            match Entity::from_dir_entry(&de) {
                Ok(entity) => {
                    let id = model.insert_loaded(entity);
                    by_sequence.insert(de.sequence, id);
                    dir_entries.push(de);
                }
                Err(e) => {
                    warn!(de = de.sequence, error = %e, "dropping unsupported entity");
                    warnings.push(Warning::new(Some(de.sequence), e));
                }
            }
        }

        // parameter records indexed by sequence number
        let n_params = param_recs.len();
        let mut params: Vec<&Record> = Vec::with_capacity(n_params);
        for (rec, _) in &param_recs {
            params.push(rec);
        }

        for de in &dir_entries {
            let Some(&id) = by_sequence.get(&de.sequence) else {
                continue;
            };

            let start = de.param_data;
            let count = de.param_lines.max(1);
            let text = match collect_pd(&params, start, count, de.sequence) {
                Ok(text) => text,
                Err(e) => {
                    warnings.push(Warning::new(Some(de.sequence), e));
                    cull(&mut model, &mut by_sequence, de.sequence, id);
                    continue;
                }
            };

            let globals = model.globals.clone();
            if let Err(e) = model
                .entity_mut(id)
                .and_then(|entity| entity.read_pd(&text, &globals))
            {
                warn!(de = de.sequence, error = %e, "dropping entity with bad parameter data");
                warnings.push(Warning::new(Some(de.sequence), e));
                cull(&mut model, &mut by_sequence, de.sequence, id);
            }
        }

        if let Some(term) = term_rec {
            check_terminate(
                &term,
                start_recs.len(),
                global_recs.len(),
                dir_recs.len(),
                n_params,
                &mut warnings,
            );
        } else {
            warnings.push(Warning::new(
                None,
                Error::CorruptFile("missing Terminate record".into()),
            ));
        }

        warnings.extend(model.associate_all());
        warnings.extend(model.validate());

        debug!(
            entities = model.len(),
            warnings = warnings.len(),
            "model loaded"
        );
        Ok((model, warnings))
    }
}

/// Concatenate the 64-column payload windows of one entity's P records.
fn collect_pd(params: &[&Record], start: i32, count: i32, owner: u32) -> Result<String> {
    if start < 1 || (start + count - 1) as usize > params.len() {
        return Err(Error::CorruptFile(format!(
            "DE {} points at parameter lines {}..{} of {}",
            owner,
            start,
            start + count - 1,
            params.len()
        )));
    }

    let mut text = String::with_capacity(count as usize * 64);
    for rec in &params[(start - 1) as usize..(start + count - 1) as usize] {
        let back = rec.parameter_owner(0)?;
        if back != owner {
            return Err(Error::CorruptFile(format!(
                "parameter line {} belongs to DE {}, not DE {}",
                rec.sequence, back, owner
            )));
        }
        text.push_str(rec.parameter_payload());
    }
    Ok(text)
}

fn cull(
    model: &mut Model,
    by_sequence: &mut FxHashMap<u32, EntityId>,
    sequence: u32,
    id: EntityId,
) {
    by_sequence.remove(&sequence);
    let _ = model.del_entity(id);
}

/// The Terminate record repeats each section's line count as
/// letter-plus-seven-digits groups.
fn check_terminate(
    term: &Record,
    s: usize,
    g: usize,
    d: usize,
    p: usize,
    warnings: &mut Vec<Warning>,
) {
    let text = &term.data;
    let mut counts: FxHashMap<char, usize> = FxHashMap::default();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 8 <= bytes.len() {
        let c = bytes[i] as char;
        if matches!(c, 'S' | 'G' | 'D' | 'P') {
            if let Ok(v) = text[i + 1..i + 8].trim().parse::<usize>() {
                counts.insert(c, v);
            }
            i += 8;
        } else {
            break;
        }
    }

    for (letter, actual) in [('S', s), ('G', g), ('D', d), ('P', p)] {
        match counts.get(&letter) {
            Some(&recorded) if recorded != actual => warnings.push(Warning::new(
                None,
                Error::CorruptFile(format!(
                    "terminate records {} {} lines, file has {}",
                    recorded, letter, actual
                )),
            )),
            None => warnings.push(Warning::new(
                None,
                Error::CorruptFile(format!("terminate is missing the {} count", letter)),
            )),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Payload};

    fn fixture() -> String {
        let mut lines = Vec::new();
        lines.push(Record::encode("simple circle", Section::Start, 1));
        lines.push(Record::encode(
            ",,,,,,,,,,,,,,,,,,,,,,,,,;",
            Section::Global,
            1,
        ));
        let d1 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            100, 1, 0, 0, 0, 0, 0, 0, "00000000"
        );
        let d2 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            100, 0, 0, 1, 0, "", "", "", 0
        );
        lines.push(Record::encode(&d1, Section::Directory, 1));
        lines.push(Record::encode(&d2, Section::Directory, 2));
        lines.push(Record::encode_parameter(
            "100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;",
            1,
            1,
        ));
        lines.push(Record::encode(
            &format!("S{:>7}G{:>7}D{:>7}P{:>7}", 1, 1, 2, 1),
            Section::Terminate,
            1,
        ));
        lines.join("\n")
    }

    #[test]
    fn parses_single_circle_file() {
        let (model, warnings) = Model::parse(&fixture()).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.start_comments[0], "simple circle");

        let (_, e) = model.entities().next().unwrap();
        assert_eq!(e.kind(), EntityKind::CircularArc);
        match &e.payload {
            Payload::CircularArc(a) => {
                assert_eq!((a.x_start, a.y_start), (1.0, 0.0));
                assert_eq!((a.x_end, a.y_end), (-1.0, 0.0));
            }
            _ => unreachable!(),
        }

        // the arc has no parents, which the orphan check reports
        assert!(warnings
            .iter()
            .all(|w| matches!(w.error, Error::InvariantViolation { .. })));
    }

    #[test]
    fn rejects_non_monotonic_sequences() {
        let text = fixture().replace("D      2", "D      4");
        assert!(matches!(
            Model::parse(&text),
            Err(Error::BadRecord { .. })
        ));
    }

    #[test]
    fn culls_unknown_entity_kinds() {
        let mut lines: Vec<String> = fixture().lines().map(String::from).collect();
        // splice in an unsupported kind (999) as DE 3/4
        let d1 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            999, 2, 0, 0, 0, 0, 0, 0, "00000000"
        );
        let d2 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            999, 0, 0, 1, 0, "", "", "", 0
        );
        lines.insert(4, Record::encode(&d1, Section::Directory, 3));
        lines.insert(5, Record::encode(&d2, Section::Directory, 4));
        lines.insert(7, Record::encode_parameter("999;", 3, 2));
        let text = lines
            .join("\n")
            .replace(
                &format!("S{:>7}G{:>7}D{:>7}P{:>7}", 1, 1, 2, 1),
                &format!("S{:>7}G{:>7}D{:>7}P{:>7}", 1, 1, 4, 2),
            );

        let (model, warnings) = Model::parse(&text).unwrap();
        assert_eq!(model.len(), 1);
        assert!(warnings
            .iter()
            .any(|w| matches!(w.error, Error::Unimplemented { .. })));
    }

    #[test]
    fn dangling_pointer_is_a_warning_not_an_error() {
        // a composite curve referencing DE 99 which does not exist
        let mut lines = Vec::new();
        lines.push(Record::encode(
            ",,,,,,,,,,,,,,,,,,,,,,,,,;",
            Section::Global,
            1,
        ));
        let d1 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            102, 1, 0, 0, 0, 0, 0, 0, "00000000"
        );
        let d2 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            102, 0, 0, 1, 0, "", "", "", 0
        );
        lines.push(Record::encode(&d1, Section::Directory, 1));
        lines.push(Record::encode(&d2, Section::Directory, 2));
        lines.push(Record::encode_parameter("102,1,99;", 1, 1));
        lines.push(Record::encode(
            &format!("S{:>7}G{:>7}D{:>7}P{:>7}", 0, 1, 2, 1),
            Section::Terminate,
            1,
        ));

        let (model, warnings) = Model::parse(&lines.join("\n")).unwrap();
        assert_eq!(model.len(), 1);
        assert!(warnings
            .iter()
            .any(|w| matches!(w.error, Error::UnresolvedRef { de: 99 })));
    }
}
