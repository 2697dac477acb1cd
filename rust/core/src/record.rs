// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-column record codec.
//!
//! Every IGES record is 80 columns: 72 data columns, a one-letter section
//! code in column 73, and a right-aligned 7-digit sequence number in columns
//! 74-80. Parameter-data records further split the data columns into a
//! 64-column payload window and the owning DE sequence in columns 66-72.

use crate::error::{Error, Result};

/// Section letter in column 73 of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Start,
    Global,
    Directory,
    Parameter,
    Terminate,
}

impl Section {
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'S' => Some(Section::Start),
            'G' => Some(Section::Global),
            'D' => Some(Section::Directory),
            'P' => Some(Section::Parameter),
            'T' => Some(Section::Terminate),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Section::Start => 'S',
            Section::Global => 'G',
            Section::Directory => 'D',
            Section::Parameter => 'P',
            Section::Terminate => 'T',
        }
    }
}

/// One decoded 80-column record.
#[derive(Debug, Clone)]
pub struct Record {
    /// Columns 1-72, exactly as read (padded with blanks on short tails).
    pub data: String,
    pub section: Section,
    /// 1-based sequence number within the section.
    pub sequence: u32,
}

impl Record {
    /// Decode one line. `line_no` is the 1-based file line for diagnostics.
    ///
    /// Lines shorter than 73 columns or with an unknown section letter are
    /// rejected; a short tail after the section letter is tolerated (some
    /// writers trim trailing blanks from the sequence field).
    pub fn decode(line: &str, line_no: usize) -> Result<Record> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.len() < 73 {
            return Err(Error::BadRecord {
                line: line_no,
                reason: format!("record is {} columns, expected at least 73", line.len()),
            });
        }

        if line.len() > 80 {
            return Err(Error::BadRecord {
                line: line_no,
                reason: format!("record is {} columns, expected at most 80", line.len()),
            });
        }

        let letter = line[72..73].chars().next().unwrap_or(' ');
        let section = Section::from_letter(letter).ok_or_else(|| Error::BadRecord {
            line: line_no,
            reason: format!("unknown section letter {:?}", letter),
        })?;

        let seq_field = line[73..].trim();
        let sequence: u32 = seq_field.parse().map_err(|_| Error::BadRecord {
            line: line_no,
            reason: format!("bad sequence field {:?}", seq_field),
        })?;

        if sequence == 0 {
            return Err(Error::BadRecord {
                line: line_no,
                reason: "sequence numbers are 1-based".into(),
            });
        }

        let mut data = line[..72].to_string();
        if data.len() < 72 {
            data.push_str(&" ".repeat(72 - data.len()));
        }

        Ok(Record {
            data,
            section,
            sequence,
        })
    }

    /// Format a record from up to 72 data columns.
    pub fn encode(data: &str, section: Section, sequence: u32) -> String {
        debug_assert!(data.len() <= 72);
        format!("{:<72}{}{:>7}", data, section.letter(), sequence)
    }

    /// Format a parameter-data record: 64 payload columns, blank column 65,
    /// owning DE sequence right-aligned in columns 66-72.
    pub fn encode_parameter(payload: &str, de_sequence: u32, sequence: u32) -> String {
        debug_assert!(payload.len() <= 64);
        format!("{:<64} {:>7}P{:>7}", payload, de_sequence, sequence)
    }

    /// The 64-column payload window of a parameter record.
    pub fn parameter_payload(&self) -> &str {
        &self.data[..64]
    }

    /// The owning DE sequence of a parameter record (columns 66-72).
    pub fn parameter_owner(&self, line_no: usize) -> Result<u32> {
        self.data[65..72]
            .trim()
            .parse()
            .map_err(|_| Error::BadRecord {
                line: line_no,
                reason: format!("bad DE back-pointer {:?}", &self.data[65..72]),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_start_record() {
        let line = format!("{:<72}S{:>7}", "test model", 1);
        let rec = Record::decode(&line, 1).unwrap();
        assert_eq!(rec.section, Section::Start);
        assert_eq!(rec.sequence, 1);
        assert!(rec.data.starts_with("test model"));
        assert_eq!(rec.data.len(), 72);
    }

    #[test]
    fn decode_rejects_short_line() {
        assert!(matches!(
            Record::decode("too short", 3),
            Err(Error::BadRecord { line: 3, .. })
        ));
    }

    #[test]
    fn decode_rejects_unknown_section() {
        let line = format!("{:<72}X{:>7}", "", 1);
        assert!(Record::decode(&line, 1).is_err());
    }

    #[test]
    fn encode_round_trip() {
        let line = Record::encode("1H,,1H;,", Section::Global, 4);
        assert_eq!(line.len(), 80);
        let rec = Record::decode(&line, 1).unwrap();
        assert_eq!(rec.section, Section::Global);
        assert_eq!(rec.sequence, 4);
        assert_eq!(rec.data.trim_end(), "1H,,1H;,");
    }

    #[test]
    fn parameter_record_owner() {
        let line = Record::encode_parameter("100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;", 7, 12);
        assert_eq!(line.len(), 80);
        let rec = Record::decode(&line, 1).unwrap();
        assert_eq!(rec.parameter_owner(1).unwrap(), 7);
        assert!(rec.parameter_payload().starts_with("100,"));
    }
}
