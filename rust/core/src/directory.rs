// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directory Entry codec.
//!
//! Each entity owns a pair of 80-column Directory records carrying 20 fixed
//! fields of 8 columns each. Pointer-capable fields (structure, line font,
//! level, view, transform, label display, colour) distinguish a DE pointer
//! from a small-integer enum by sign: negative means pointer.

use crate::error::{Error, Result};
use crate::record::Record;

/// Field 9, subfield 1: blank status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankStatus {
    #[default]
    Visible,
    Blanked,
}

/// Field 9, subfield 2: subordinate entity switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dependency {
    #[default]
    Independent,
    Physical,
    Logical,
    Both,
}

/// Field 9, subfield 3: entity use flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityUse {
    #[default]
    Geometry,
    Annotation,
    Definition,
    Other,
    Logical,
    Parametric2d,
    ConstructionGeometry,
}

/// Field 9, subfield 4: hierarchy switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hierarchy {
    #[default]
    AllSubordinate,
    GlobalDefer,
    UseHierarchyProperty,
}

impl BlankStatus {
    pub fn from_code(v: i32) -> Option<Self> {
        match v {
            0 => Some(BlankStatus::Visible),
            1 => Some(BlankStatus::Blanked),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Dependency {
    pub fn from_code(v: i32) -> Option<Self> {
        match v {
            0 => Some(Dependency::Independent),
            1 => Some(Dependency::Physical),
            2 => Some(Dependency::Logical),
            3 => Some(Dependency::Both),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl EntityUse {
    pub fn from_code(v: i32) -> Option<Self> {
        match v {
            0 => Some(EntityUse::Geometry),
            1 => Some(EntityUse::Annotation),
            2 => Some(EntityUse::Definition),
            3 => Some(EntityUse::Other),
            4 => Some(EntityUse::Logical),
            5 => Some(EntityUse::Parametric2d),
            6 => Some(EntityUse::ConstructionGeometry),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Hierarchy {
    pub fn from_code(v: i32) -> Option<Self> {
        match v {
            0 => Some(Hierarchy::AllSubordinate),
            1 => Some(Hierarchy::GlobalDefer),
            2 => Some(Hierarchy::UseHierarchyProperty),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The four status subfields of DE field 9.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub blank: BlankStatus,
    pub depends: Dependency,
    pub entity_use: EntityUse,
    pub hierarchy: Hierarchy,
}

impl StatusFlags {
    /// Decode the 8-character `BBDDUUHH` status field.
    pub fn decode(text: &str, line: usize) -> Result<StatusFlags> {
        let field: String = text.chars().map(|c| if c == ' ' { '0' } else { c }).collect();
        let sub = |a: usize, b: usize| -> Result<i32> {
            field
                .get(a..b)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::BadRecord {
                    line,
                    reason: format!("bad status field {:?}", text),
                })
        };

        let bad = |name: &str, v: i32| Error::BadRecord {
            line,
            reason: format!("status subfield {} out of range: {}", name, v),
        };

        let (b, d, u, h) = (sub(0, 2)?, sub(2, 4)?, sub(4, 6)?, sub(6, 8)?);

        Ok(StatusFlags {
            blank: BlankStatus::from_code(b).ok_or_else(|| bad("blank", b))?,
            depends: Dependency::from_code(d).ok_or_else(|| bad("subordinate", d))?,
            entity_use: EntityUse::from_code(u).ok_or_else(|| bad("use", u))?,
            hierarchy: Hierarchy::from_code(h).ok_or_else(|| bad("hierarchy", h))?,
        })
    }

    pub fn encode(self) -> String {
        format!(
            "{:02}{:02}{:02}{:02}",
            self.blank.code(),
            self.depends.code(),
            self.entity_use.code(),
            self.hierarchy.code()
        )
    }
}

/// The twenty DE fields of one entity, as read from or written to the file.
/// Pointer-capable fields keep the raw signed value; resolution into handles
/// happens during association.
#[derive(Debug, Clone, Default)]
pub struct DirEntry {
    pub entity_type: i32,
    /// Sequence number of the first parameter record (field 2).
    pub param_data: i32,
    pub structure: i32,
    pub line_font: i32,
    pub level: i32,
    pub view: i32,
    pub transform: i32,
    pub label_display: i32,
    pub status: StatusFlags,
    pub line_weight: i32,
    pub color: i32,
    /// Number of parameter records (field 14).
    pub param_lines: i32,
    pub form: i32,
    /// Up to 8 characters (field 18).
    pub label: String,
    pub subscript: i32,
    /// Odd sequence number of the first record of this pair.
    pub sequence: u32,
}

fn int_field(data: &str, index: usize, line: usize) -> Result<i32> {
    let s = data[index * 8..(index + 1) * 8].trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse().map_err(|_| Error::BadRecord {
        line,
        reason: format!("bad integer in DE column {}: {:?}", index * 8 + 1, s),
    })
}

impl DirEntry {
    /// Decode a DE pair. `line` is the file line of the first record.
    pub fn decode(first: &Record, second: &Record, line: usize) -> Result<DirEntry> {
        if first.sequence % 2 == 0 || second.sequence != first.sequence + 1 {
            return Err(Error::BadRecord {
                line,
                reason: format!(
                    "DE pair must occupy sequences 2n-1/2n, got {}/{}",
                    first.sequence, second.sequence
                ),
            });
        }

        let d1 = &first.data;
        let d2 = &second.data;

        let entity_type = int_field(d1, 0, line)?;
        if entity_type != int_field(d2, 0, line + 1)? {
            return Err(Error::BadRecord {
                line: line + 1,
                reason: "entity type differs between the two DE records".into(),
            });
        }

        Ok(DirEntry {
            entity_type,
            param_data: int_field(d1, 1, line)?,
            structure: int_field(d1, 2, line)?,
            line_font: int_field(d1, 3, line)?,
            level: int_field(d1, 4, line)?,
            view: int_field(d1, 5, line)?,
            transform: int_field(d1, 6, line)?,
            label_display: int_field(d1, 7, line)?,
            status: StatusFlags::decode(&d1[64..72], line)?,
            line_weight: int_field(d2, 1, line + 1)?,
            color: int_field(d2, 2, line + 1)?,
            param_lines: int_field(d2, 3, line + 1)?,
            form: int_field(d2, 4, line + 1)?,
            label: d2[56..64].trim().to_string(),
            subscript: int_field(d2, 8, line + 1)?,
            sequence: first.sequence,
        })
    }

    /// Encode into the two 72-column data strings of the DE pair.
    pub fn encode(&self) -> (String, String) {
        let line1 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            self.entity_type,
            self.param_data,
            self.structure,
            self.line_font,
            self.level,
            self.view,
            self.transform,
            self.label_display,
            self.status.encode(),
        );
        let line2 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            self.entity_type,
            self.line_weight,
            self.color,
            self.param_lines,
            self.form,
            "",
            "",
            truncate8(&self.label),
            self.subscript,
        );
        (line1, line2)
    }
}

fn truncate8(s: &str) -> &str {
    &s[..s.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Section;

    fn de_pair(d1: &str, d2: &str, seq: u32) -> (Record, Record) {
        (
            Record::decode(&Record::encode(d1, Section::Directory, seq), 1).unwrap(),
            Record::decode(&Record::encode(d2, Section::Directory, seq + 1), 2).unwrap(),
        )
    }

    #[test]
    fn decode_circle_pair() {
        let d1 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            100, 1, 0, 0, 0, 0, 0, 0, "00010000"
        );
        let d2 = format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            100, 0, 0, 1, 0, "", "", "ARC", 0
        );
        let (r1, r2) = de_pair(&d1, &d2, 1);
        let de = DirEntry::decode(&r1, &r2, 1).unwrap();
        assert_eq!(de.entity_type, 100);
        assert_eq!(de.param_data, 1);
        assert_eq!(de.status.depends, Dependency::Physical);
        assert_eq!(de.status.entity_use, EntityUse::Geometry);
        assert_eq!(de.param_lines, 1);
        assert_eq!(de.label, "ARC");
        assert_eq!(de.sequence, 1);
    }

    #[test]
    fn decode_rejects_even_first_sequence() {
        let d = format!("{:>8}{:>8}{:>48}{:>8}", 100, 1, "", "00000000");
        let (r1, r2) = de_pair(&d, &d, 2);
        assert!(DirEntry::decode(&r1, &r2, 1).is_err());
    }

    #[test]
    fn decode_rejects_mismatched_types() {
        let d1 = format!("{:>8}{:>8}{:>56}", 100, 1, "00000000");
        let d2 = format!("{:>8}{:>8}{:>56}", 110, 0, "");
        let (r1, r2) = de_pair(&d1, &d2, 1);
        assert!(DirEntry::decode(&r1, &r2, 1).is_err());
    }

    #[test]
    fn status_round_trip() {
        let s = StatusFlags {
            blank: BlankStatus::Blanked,
            depends: Dependency::Logical,
            entity_use: EntityUse::Parametric2d,
            hierarchy: Hierarchy::GlobalDefer,
        };
        let text = s.encode();
        assert_eq!(text, "01020501");
        assert_eq!(StatusFlags::decode(&text, 1).unwrap(), s);
    }

    #[test]
    fn status_tolerates_blank_padding() {
        let s = StatusFlags::decode("      01", 1).unwrap();
        assert_eq!(s.blank, BlankStatus::Visible);
        assert_eq!(s.hierarchy, Hierarchy::GlobalDefer);
    }

    #[test]
    fn encode_round_trip() {
        let de = DirEntry {
            entity_type: 126,
            param_data: 17,
            transform: 5,
            status: StatusFlags {
                depends: Dependency::Physical,
                ..StatusFlags::default()
            },
            param_lines: 4,
            form: 0,
            label: "SPLINE".into(),
            sequence: 9,
            ..DirEntry::default()
        };
        let (d1, d2) = de.encode();
        assert_eq!(d1.len(), 72);
        assert_eq!(d2.len(), 72);

        let (r1, r2) = de_pair(&d1, &d2, 9);
        let back = DirEntry::decode(&r1, &r2, 1).unwrap();
        assert_eq!(back.entity_type, 126);
        assert_eq!(back.param_data, 17);
        assert_eq!(back.transform, 5);
        assert_eq!(back.status.depends, Dependency::Physical);
        assert_eq!(back.param_lines, 4);
        assert_eq!(back.label, "SPLINE");
    }
}
