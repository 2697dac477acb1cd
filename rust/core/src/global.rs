// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global section: the 26-field parameter record describing the file.
//!
//! The first two fields define the parameter and record delimiters used by
//! the rest of the file (including the Global section itself); every missing
//! field assumes its IGES 5.3 default.

use crate::error::{Error, Result, Warning};
use crate::pd::{format_hstring, PdCursor, PdWriter};

/// Model-space length unit (Global field 14/15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    Inch,
    Millimeter,
    Foot,
    Mile,
    Meter,
    Kilometer,
    Mil,
    Micron,
    Centimeter,
    Microinch,
}

impl Unit {
    pub fn from_flag(flag: i32) -> Option<Unit> {
        match flag {
            1 => Some(Unit::Inch),
            2 => Some(Unit::Millimeter),
            4 => Some(Unit::Foot),
            5 => Some(Unit::Mile),
            6 => Some(Unit::Meter),
            7 => Some(Unit::Kilometer),
            8 => Some(Unit::Mil),
            9 => Some(Unit::Micron),
            10 => Some(Unit::Centimeter),
            11 => Some(Unit::Microinch),
            _ => None,
        }
    }

    pub fn flag(self) -> i32 {
        match self {
            Unit::Inch => 1,
            Unit::Millimeter => 2,
            Unit::Foot => 4,
            Unit::Mile => 5,
            Unit::Meter => 6,
            Unit::Kilometer => 7,
            Unit::Mil => 8,
            Unit::Micron => 9,
            Unit::Centimeter => 10,
            Unit::Microinch => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Unit::Inch => "IN",
            Unit::Millimeter => "MM",
            Unit::Foot => "FT",
            Unit::Mile => "MI",
            Unit::Meter => "M",
            Unit::Kilometer => "KM",
            Unit::Mil => "MIL",
            Unit::Micron => "UM",
            Unit::Centimeter => "CM",
            Unit::Microinch => "UIN",
        }
    }

    /// Millimetres per one of this unit.
    pub fn millimeters(self) -> f64 {
        match self {
            Unit::Inch => 25.4,
            Unit::Millimeter => 1.0,
            Unit::Foot => 304.8,
            Unit::Mile => 1.609_344e6,
            Unit::Meter => 1000.0,
            Unit::Kilometer => 1.0e6,
            Unit::Mil => 0.0254,
            Unit::Micron => 0.001,
            Unit::Centimeter => 10.0,
            Unit::Microinch => 2.54e-5,
        }
    }

    /// Scale factor converting lengths in `self` into lengths in `target`.
    pub fn scale_to(self, target: Unit) -> f64 {
        self.millimeters() / target.millimeters()
    }
}

/// The Global section parameters (fields 1-26).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalParams {
    pub pdelim: char,
    pub rdelim: char,
    pub product_id_sender: String,
    pub file_name: String,
    pub system_id: String,
    pub preprocessor_version: String,
    /// Binary bits in an integer on the sending system.
    pub int_bits: i32,
    /// Maximum power of ten of a single-precision real.
    pub float_max_pow: i32,
    /// Significant digits of a single-precision real.
    pub float_sig: i32,
    /// Maximum power of ten of a double-precision real.
    pub double_max_pow: i32,
    /// Significant digits of a double-precision real.
    pub double_sig: i32,
    pub product_id_receiver: String,
    pub model_scale: f64,
    pub units: Unit,
    pub unit_name: String,
    pub lineweight_gradations: i32,
    pub max_lineweight: f64,
    /// File generation timestamp, `YYYYMMDD.HHNNSS`.
    pub creation_date: String,
    /// Smallest distinguishable distance in model units.
    pub min_resolution: f64,
    /// Approximate upper bound on coordinate magnitudes; 0 when unknown.
    pub max_coordinate: f64,
    pub author: String,
    pub organization: String,
    /// Specification version; 11 and above means IGES 5.3.
    pub version: i32,
    pub draft_standard: i32,
    /// Model creation/last-modification timestamp.
    pub modified_date: String,
    pub application_note: String,
}

impl Default for GlobalParams {
    fn default() -> Self {
        GlobalParams {
            pdelim: ',',
            rdelim: ';',
            product_id_sender: String::new(),
            file_name: String::new(),
            system_id: "iges-lite".to_string(),
            preprocessor_version: String::new(),
            int_bits: 32,
            float_max_pow: 38,
            float_sig: 6,
            double_max_pow: 308,
            double_sig: 15,
            product_id_receiver: String::new(),
            model_scale: 1.0,
            units: Unit::Inch,
            unit_name: "IN".to_string(),
            lineweight_gradations: 1,
            max_lineweight: 0.0,
            creation_date: String::new(),
            min_resolution: 1.0e-8,
            max_coordinate: 0.0,
            author: String::new(),
            organization: String::new(),
            version: 11,
            draft_standard: 0,
            modified_date: String::new(),
            application_note: String::new(),
        }
    }
}

/// Characters that may never serve as a delimiter.
fn delimiter_ok(c: char) -> bool {
    !(c.is_ascii_digit()
        || c == '+'
        || c == '-'
        || c == '.'
        || c == 'E'
        || c == 'D'
        || c == 'H'
        || c == ' '
        || c.is_control())
}

impl GlobalParams {
    /// Parse the concatenated Global section data columns.
    ///
    /// The delimiters are self-defining: field 1 is either empty (keep `,`)
    /// or the Hollerith `1Hx` naming the parameter delimiter, and likewise
    /// field 2 for the record delimiter.
    pub fn parse(text: &str) -> Result<(GlobalParams, Vec<Warning>)> {
        let mut g = GlobalParams::default();
        let mut warnings = Vec::new();

        // field 1 terminates itself (the delimiter it declares follows it);
        // field 2 is terminated by the now-known parameter delimiter
        let (pdelim, after_first) = take_delim_field(text, g.pdelim, None)?;
        g.pdelim = pdelim;
        let (rdelim, rest_at) = take_delim_field(&text[after_first..], g.rdelim, Some(pdelim))?;
        g.rdelim = rdelim;

        g.check_delimiters()?;

        let mut pd = PdCursor::new(&text[after_first + rest_at..], g.pdelim, g.rdelim);
        g.product_id_sender = pd.read_string_or("product id (sender)", "")?;
        g.file_name = pd.read_string_or("file name", "")?;
        g.system_id = pd.read_string_or("system id", "")?;
        g.preprocessor_version = pd.read_string_or("preprocessor version", "")?;
        g.int_bits = pd.read_int_or("integer bits", 32)? as i32;
        g.float_max_pow = pd.read_int_or("single magnitude", 38)? as i32;
        g.float_sig = pd.read_int_or("single significance", 6)? as i32;
        g.double_max_pow = pd.read_int_or("double magnitude", 308)? as i32;
        g.double_sig = pd.read_int_or("double significance", 15)? as i32;
        g.product_id_receiver = pd.read_string_or("product id (receiver)", "")?;
        g.model_scale = pd.read_real_or("model scale", 1.0)?;

        let unit_flag = pd.read_int_or("unit flag", 1)? as i32;
        g.unit_name = pd.read_string_or("unit name", "")?;

        match Unit::from_flag(unit_flag) {
            Some(u) => g.units = u,
            None if unit_flag == 3 => {
                // unit defined only by name; we honour MM and coerce the rest
                if g.unit_name != "MM" {
                    warnings.push(Warning::new(
                        None,
                        Error::BadField {
                            field: "unit flag",
                            reason: format!(
                                "unit flag 3 with name {:?} coerced to MM",
                                g.unit_name
                            ),
                        },
                    ));
                }
                g.units = Unit::Millimeter;
            }
            None => {
                return Err(Error::BadField {
                    field: "unit flag",
                    reason: format!("unknown unit flag {}", unit_flag),
                })
            }
        }
        if g.unit_name.is_empty() {
            g.unit_name = g.units.name().to_string();
        }

        g.lineweight_gradations = pd.read_int_or("lineweight gradations", 1)? as i32;
        g.max_lineweight = pd.read_real_or("max lineweight", 0.0)?;
        g.creation_date = pd.read_string_or("creation date", "")?;
        g.min_resolution = pd.read_real_or("min resolution", 1.0e-8)?;
        g.max_coordinate = pd.read_real_or("max coordinate", 0.0)?;
        g.author = pd.read_string_or("author", "")?;
        g.organization = pd.read_string_or("organization", "")?;
        g.version = pd.read_int_or("version flag", 3)? as i32;
        g.draft_standard = pd.read_int_or("draft standard", 0)? as i32;
        g.modified_date = pd.read_string_or("modified date", "")?;
        g.application_note = pd.read_string_or("application note", "")?;

        if g.min_resolution <= 0.0 {
            warnings.push(Warning::new(
                None,
                Error::BadField {
                    field: "min resolution",
                    reason: format!("non-positive resolution {}, using 1e-8", g.min_resolution),
                },
            ));
            g.min_resolution = 1.0e-8;
        }

        Ok((g, warnings))
    }

    /// Both delimiters must be distinct single characters that can never
    /// appear inside a number.
    pub fn check_delimiters(&self) -> Result<()> {
        if !delimiter_ok(self.pdelim) || !delimiter_ok(self.rdelim) {
            return Err(Error::BadField {
                field: "delimiter",
                reason: format!(
                    "{:?}/{:?} may not serve as delimiters",
                    self.pdelim, self.rdelim
                ),
            });
        }
        if self.pdelim == self.rdelim {
            return Err(Error::BadField {
                field: "delimiter",
                reason: "parameter and record delimiters must differ".into(),
            });
        }
        Ok(())
    }

    /// Serialise into 72-column Global data lines.
    pub fn format(&self) -> Vec<String> {
        let pd = self.pdelim;
        let mut w = PdWriter::with_width(72);

        w.push(&format_hstring(&self.pdelim.to_string()), pd);
        w.push(&format_hstring(&self.rdelim.to_string()), pd);
        w.push_hstring(&self.product_id_sender, pd);
        w.push_hstring(&self.file_name, pd);
        w.push_hstring(&self.system_id, pd);
        w.push_hstring(&self.preprocessor_version, pd);
        w.push_int(self.int_bits as i64, pd);
        w.push_int(self.float_max_pow as i64, pd);
        w.push_int(self.float_sig as i64, pd);
        w.push_int(self.double_max_pow as i64, pd);
        w.push_int(self.double_sig as i64, pd);
        w.push_hstring(&self.product_id_receiver, pd);
        w.push_real(self.model_scale, 1.0e-6, pd);
        w.push_int(self.units.flag() as i64, pd);
        w.push_hstring(self.units.name(), pd);
        w.push_int(self.lineweight_gradations as i64, pd);
        w.push_real(self.max_lineweight, 1.0e-6, pd);
        w.push_hstring(&self.creation_date, pd);
        w.push_real(self.min_resolution, 1.0e-6, pd);
        w.push_real(self.max_coordinate, 1.0e-6, pd);
        w.push_hstring(&self.author, pd);
        w.push_hstring(&self.organization, pd);
        w.push_int(self.version as i64, pd);
        w.push_int(self.draft_standard as i64, pd);
        w.push_hstring(&self.modified_date, pd);
        w.push_hstring(&self.application_note, self.rdelim);

        w.finish()
    }

    /// Tolerance for composite-curve sequencing checks: the squared gap
    /// between consecutive members may not exceed the cube of the minimum
    /// resolution.
    pub fn sequencing_tolerance(&self) -> f64 {
        self.min_resolution * self.min_resolution * self.min_resolution
    }
}

/// Consume one self-defining delimiter field (`1Hx` or empty). Returns the
/// delimiter and the byte offset just past the field's terminator. The
/// terminator is `sep` when given (the already-known parameter delimiter),
/// otherwise the delimiter the field itself declares.
fn take_delim_field(text: &str, default: char, sep: Option<char>) -> Result<(char, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    if i >= bytes.len() {
        return Err(Error::CorruptFile("empty Global section".into()));
    }

    // empty field: the terminator appears immediately
    if bytes[i] as char == sep.unwrap_or(default) {
        return Ok((default, i + 1));
    }

    if text[i..].starts_with("1H") && i + 2 < bytes.len() {
        let delim = bytes[i + 2] as char;
        let mut j = i + 3;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let term = sep.unwrap_or(delim);
        if j < bytes.len() && bytes[j] as char == term {
            j += 1;
        }
        return Ok((delim, j));
    }

    let tail: String = text[i..].chars().take(8).collect();
    Err(Error::BadField {
        field: "delimiter",
        reason: format!("cannot decode delimiter field near {:?}", tail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_fields() {
        let (g, warnings) = GlobalParams::parse(",,,,,,,,,,,,,,,,,,,,,,,,,;").unwrap();
        assert_eq!(g.pdelim, ',');
        assert_eq!(g.rdelim, ';');
        assert_eq!(g.int_bits, 32);
        assert_eq!(g.float_sig, 6);
        assert_eq!(g.double_sig, 15);
        assert_eq!(g.units, Unit::Inch);
        assert_eq!(g.min_resolution, 1.0e-8);
        assert!(warnings.is_empty());
    }

    #[test]
    fn explicit_delimiters() {
        let text = "1H,,1H;,4Htest,8Htest.igs,9Higes-lite,,32,38,6,308,15,,1.0,2,2HMM,1,0.0,15H20260802.120000,1E-6,100.0,2Hme,3Horg,11,0,,;";
        let (g, warnings) = GlobalParams::parse(text).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(g.product_id_sender, "test");
        assert_eq!(g.file_name, "test.igs");
        assert_eq!(g.units, Unit::Millimeter);
        assert_eq!(g.min_resolution, 1.0e-6);
        assert_eq!(g.author, "me");
        assert_eq!(g.version, 11);
    }

    #[test]
    fn unit_flag_three_coerces_to_mm() {
        // fields 1-12 empty, then model scale, unit flag 3, a non-MM name,
        // and the tail left empty
        let text = format!("{}1.0,3,4HFEET{};", ",".repeat(12), ",".repeat(11));
        let (g, warnings) = GlobalParams::parse(&text).unwrap();
        assert_eq!(g.units, Unit::Millimeter);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn nonstandard_delimiters() {
        // field 1 is `1H|` terminated by the `|` it declares; field 2 is
        // `1H#` terminated by `|`; unit flag 2 / name MM land at fields 14/15
        let text = format!(
            "1H||1H#|4Hprod|{}2|2HMM|{}#",
            "|".repeat(10),
            "|".repeat(10)
        );
        let (g, _) = GlobalParams::parse(&text).unwrap();
        assert_eq!(g.pdelim, '|');
        assert_eq!(g.rdelim, '#');
        assert_eq!(g.product_id_sender, "prod");
        assert_eq!(g.units, Unit::Millimeter);
    }

    #[test]
    fn rejects_equal_delimiters() {
        let g = GlobalParams {
            pdelim: ';',
            rdelim: ';',
            ..GlobalParams::default()
        };
        assert!(g.check_delimiters().is_err());
    }

    #[test]
    fn format_round_trips() {
        let mut g = GlobalParams::default();
        g.file_name = "out.igs".into();
        g.units = Unit::Millimeter;
        g.unit_name = "MM".into();
        g.author = "someone".into();
        g.min_resolution = 1.0e-6;

        let lines = g.format();
        assert!(lines.iter().all(|l| l.len() <= 72));

        let joined: String = lines.concat();
        let (back, warnings) = GlobalParams::parse(&joined).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(back.file_name, "out.igs");
        assert_eq!(back.units, Unit::Millimeter);
        assert_eq!(back.author, "someone");
        assert_eq!(back.min_resolution, 1.0e-6);
    }

    #[test]
    fn unit_scales() {
        assert_eq!(Unit::Inch.scale_to(Unit::Millimeter), 25.4);
        assert!((Unit::Millimeter.scale_to(Unit::Inch) - 1.0 / 25.4).abs() < 1e-15);
        assert_eq!(Unit::Meter.scale_to(Unit::Millimeter), 1000.0);
    }
}
