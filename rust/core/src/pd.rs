// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Free-format parameter-data tokens.
//!
//! Parameter data is a delimiter-separated token stream: reals in the IGES
//! grammar (`E` or `D` exponent markers), integers, `nH` Hollerith strings,
//! and DE pointers. A zero-length token means "use the field default".
//! Blanks outside Hollerith strings are insignificant.

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{opt, recognize},
    sequence::{pair, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// One raw token between delimiters.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Zero-length field: take the default.
    Default,
    /// Anything that is not a Hollerith string, blanks stripped.
    Datum(String),
    /// `nH...` string, decoded.
    Hollerith(String),
}

/// Recognise an IGES real: optional sign, digits with optional fraction (or
/// a bare fraction), optional `E`/`D` exponent.
fn iges_real(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eEdD"), opt(one_of("+-")), digit1))),
    )))(input)
}

/// Parse a real datum, accepting the `D` exponent marker.
pub fn parse_real(text: &str) -> Result<f64> {
    let (rest, matched) = iges_real(text).map_err(|_| Error::BadField {
        field: "real",
        reason: format!("{:?} is not an IGES real", text),
    })?;

    if !rest.is_empty() {
        return Err(Error::BadField {
            field: "real",
            reason: format!("trailing garbage {:?} after real", rest),
        });
    }

    let normalised: String = matched
        .chars()
        .map(|c| if c == 'd' || c == 'D' { 'E' } else { c })
        .collect();

    fast_float::parse(&normalised).map_err(|_| Error::BadField {
        field: "real",
        reason: format!("{:?} does not convert", matched),
    })
}

pub fn parse_int(text: &str) -> Result<i64> {
    text.parse().map_err(|_| Error::BadField {
        field: "integer",
        reason: format!("{:?} is not an integer", text),
    })
}

/// Cursor over one entity's concatenated parameter data.
///
/// The cursor stops after consuming the record delimiter; required reads
/// past that point report a missing field, defaulted reads yield their
/// defaults. Hollerith strings are length-prefixed, so delimiter characters
/// inside them do not terminate the token.
pub struct PdCursor<'a> {
    input: &'a str,
    pos: usize,
    pdelim: char,
    rdelim: char,
    eor: bool,
}

impl<'a> PdCursor<'a> {
    pub fn new(input: &'a str, pdelim: char, rdelim: char) -> Self {
        PdCursor {
            input,
            pos: 0,
            pdelim,
            rdelim,
            eor: false,
        }
    }

    /// True once the record delimiter has been consumed.
    pub fn at_end(&self) -> bool {
        self.eor
    }

    fn missing(&self, field: &'static str) -> Error {
        Error::BadField {
            field,
            reason: "field missing (record ended early)".into(),
        }
    }

    /// Pull the next raw token, or `None` past the record delimiter.
    pub fn next_token(&mut self) -> Option<Token> {
        if self.eor {
            return None;
        }

        let bytes = self.input.as_bytes();
        let len = bytes.len();

        // skip insignificant blanks
        while self.pos < len && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }

        if self.pos >= len {
            // a missing record delimiter terminates the stream as well
            self.eor = true;
            return Some(Token::Default);
        }

        // Hollerith: digits immediately followed by 'H'
        let mut scan = self.pos;
        while scan < len && bytes[scan].is_ascii_digit() {
            scan += 1;
        }
        if scan > self.pos && scan < len && (bytes[scan] == b'H' || bytes[scan] == b'h') {
            let count: usize = self.input[self.pos..scan].parse().ok()?;
            let start = scan + 1;
            let end = (start + count).min(len);
            let text = self.input[start..end].to_string();
            self.pos = end;

            // consume the trailing delimiter
            while self.pos < len && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos < len {
                let c = bytes[self.pos] as char;
                if c == self.rdelim {
                    self.eor = true;
                    self.pos += 1;
                } else if c == self.pdelim {
                    self.pos += 1;
                }
            } else {
                self.eor = true;
            }

            return Some(Token::Hollerith(text));
        }

        // plain datum: scan to the next delimiter, dropping blanks
        let mut datum = String::new();
        while self.pos < len {
            let c = bytes[self.pos] as char;
            if c == self.pdelim {
                self.pos += 1;
                break;
            }
            if c == self.rdelim {
                self.pos += 1;
                self.eor = true;
                break;
            }
            if !c.is_ascii_whitespace() {
                datum.push(c);
            }
            self.pos += 1;

            if self.pos >= len {
                self.eor = true;
            }
        }

        if datum.is_empty() {
            Some(Token::Default)
        } else {
            Some(Token::Datum(datum))
        }
    }

    /// Read a required integer field.
    pub fn read_int(&mut self, field: &'static str) -> Result<i64> {
        match self.next_token().ok_or_else(|| self.missing(field))? {
            Token::Datum(s) => parse_int(&s).map_err(|e| rename(e, field)),
            Token::Default => Err(Error::BadField {
                field,
                reason: "required integer omitted".into(),
            }),
            Token::Hollerith(_) => Err(Error::BadField {
                field,
                reason: "expected integer, found string".into(),
            }),
        }
    }

    /// Read an integer field, substituting `default` when omitted or when
    /// the record ended before this field.
    pub fn read_int_or(&mut self, field: &'static str, default: i64) -> Result<i64> {
        match self.next_token() {
            Some(Token::Datum(s)) => parse_int(&s).map_err(|e| rename(e, field)),
            Some(Token::Default) | None => Ok(default),
            Some(Token::Hollerith(_)) => Err(Error::BadField {
                field,
                reason: "expected integer, found string".into(),
            }),
        }
    }

    /// Read a required real field.
    pub fn read_real(&mut self, field: &'static str) -> Result<f64> {
        match self.next_token().ok_or_else(|| self.missing(field))? {
            Token::Datum(s) => parse_real(&s).map_err(|e| rename(e, field)),
            Token::Default => Err(Error::BadField {
                field,
                reason: "required real omitted".into(),
            }),
            Token::Hollerith(_) => Err(Error::BadField {
                field,
                reason: "expected real, found string".into(),
            }),
        }
    }

    /// Read a real field, substituting `default` when omitted or when the
    /// record ended before this field.
    pub fn read_real_or(&mut self, field: &'static str, default: f64) -> Result<f64> {
        match self.next_token() {
            Some(Token::Datum(s)) => parse_real(&s).map_err(|e| rename(e, field)),
            Some(Token::Default) | None => Ok(default),
            Some(Token::Hollerith(_)) => Err(Error::BadField {
                field,
                reason: "expected real, found string".into(),
            }),
        }
    }

    /// Read a Hollerith string field, substituting `default` when omitted or
    /// when the record ended before this field.
    pub fn read_string_or(&mut self, field: &'static str, default: &str) -> Result<String> {
        match self.next_token() {
            Some(Token::Hollerith(s)) => Ok(s),
            Some(Token::Default) | None => Ok(default.to_string()),
            Some(Token::Datum(s)) => Err(Error::BadField {
                field,
                reason: format!("expected Hollerith string, found {:?}", s),
            }),
        }
    }

    /// Read a DE pointer field (an integer; negative values carry
    /// field-specific negation semantics, zero means "no pointer").
    pub fn read_ptr(&mut self, field: &'static str) -> Result<i32> {
        let v = self.read_int_or(field, 0)?;
        i32::try_from(v).map_err(|_| Error::BadField {
            field,
            reason: format!("pointer {} out of range", v),
        })
    }
}

fn rename(e: Error, field: &'static str) -> Error {
    match e {
        Error::BadField { reason, .. } => Error::BadField { field, reason },
        other => other,
    }
}

/// Format a real as the shortest representation whose round-trip error does
/// not exceed `rel_tol * |value|`. NURBS data uses 1e-15; weights and
/// bookkeeping values use 1e-6.
pub fn format_pd_real(value: f64, rel_tol: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }

    let bound = rel_tol * value.abs();
    let mut best: Option<String> = None;

    // Fixed and scientific forms trade places depending on magnitude, and a
    // shorter fixed form can appear at a higher precision than the first
    // passing scientific one, so search the whole range and keep the
    // shortest.
    for prec in 0..=17usize {
        for candidate in [tidy_fixed(value, prec), tidy_sci(value, prec)] {
            let ok = candidate
                .parse::<f64>()
                .map(|p| (p - value).abs() <= bound)
                .unwrap_or(false);
            if ok && best.as_ref().map(|b| candidate.len() < b.len()).unwrap_or(true) {
                best = Some(candidate);
            }
        }
    }

    best.unwrap_or_else(|| format!("{:E}", value))
}

fn tidy_fixed(value: f64, prec: usize) -> String {
    let mut s = format!("{:.*}", prec, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
    } else {
        s.push('.');
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}

fn tidy_sci(value: f64, prec: usize) -> String {
    let s = format!("{:.*E}", prec, value);
    // trim trailing zeros in the mantissa: 2.540E1 -> 2.54E1
    match s.split_once('E') {
        Some((mantissa, exp)) => {
            let mut m = mantissa.to_string();
            if m.contains('.') {
                while m.ends_with('0') {
                    m.pop();
                }
                if m.ends_with('.') {
                    m.push('0');
                }
            }
            format!("{}E{}", m, exp)
        }
        None => s,
    }
}

/// Format a Hollerith string: `3Habc`.
pub fn format_hstring(text: &str) -> String {
    format!("{}H{}", text.len(), text)
}

/// Packs formatted tokens into 64-column parameter lines.
///
/// Tokens that would overrun the window flush the line and resume; oversized
/// tokens (long Hollerith strings) are chunked across records.
#[derive(Debug)]
pub struct PdWriter {
    lines: Vec<String>,
    current: String,
    width: usize,
}

impl Default for PdWriter {
    fn default() -> Self {
        PdWriter {
            lines: Vec::new(),
            current: String::new(),
            width: 64,
        }
    }
}

impl PdWriter {
    pub fn new() -> Self {
        PdWriter::default()
    }

    /// A writer packing into a different window, e.g. the 72 data columns of
    /// the Global section.
    pub fn with_width(width: usize) -> Self {
        PdWriter {
            width,
            ..PdWriter::default()
        }
    }

    /// Append one token followed by its delimiter.
    pub fn push(&mut self, token: &str, delim: char) {
        let mut item = String::with_capacity(token.len() + 1);
        item.push_str(token);
        item.push(delim);

        if self.current.len() + item.len() > self.width && !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }

        let mut rest = item.as_str();
        while self.current.len() + rest.len() > self.width {
            let take = self.width - self.current.len();
            self.current.push_str(&rest[..take]);
            self.lines.push(std::mem::take(&mut self.current));
            rest = &rest[take..];
        }
        self.current.push_str(rest);
    }

    pub fn push_int(&mut self, value: i64, delim: char) {
        self.push(&value.to_string(), delim);
    }

    pub fn push_real(&mut self, value: f64, rel_tol: f64, delim: char) {
        self.push(&format_pd_real(value, rel_tol), delim);
    }

    pub fn push_hstring(&mut self, text: &str, delim: char) {
        self.push(&format_hstring(text), delim);
    }

    /// Flush and return the finished 64-column payload lines.
    pub fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() {
            self.lines.push(self.current);
        }
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines
    }

    /// Lines emitted so far plus the open line, without consuming.
    pub fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.current.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_grammar() {
        assert_eq!(parse_real("1.0").unwrap(), 1.0);
        assert_eq!(parse_real("-3.5").unwrap(), -3.5);
        assert_eq!(parse_real("2.54E1").unwrap(), 25.4);
        assert_eq!(parse_real("2.54D1").unwrap(), 25.4);
        assert_eq!(parse_real(".5").unwrap(), 0.5);
        assert_eq!(parse_real("1").unwrap(), 1.0);
        assert_eq!(parse_real("+1.5e-2").unwrap(), 0.015);
        assert!(parse_real("1.0.0").is_err());
        assert!(parse_real("abc").is_err());
    }

    #[test]
    fn cursor_walks_circle_pd() {
        let mut pd = PdCursor::new("100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;", ',', ';');
        assert_eq!(pd.read_int("type").unwrap(), 100);
        for expected in [0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0] {
            assert_eq!(pd.read_real("datum").unwrap(), expected);
        }
        assert!(pd.at_end());
        assert!(pd.next_token().is_none());
    }

    #[test]
    fn cursor_decodes_hollerith_with_embedded_delims() {
        let mut pd = PdCursor::new("6Ha,b;c,42;", ',', ';');
        assert_eq!(pd.read_string_or("s", "").unwrap(), "a,b;c");
        assert_eq!(pd.read_int("n").unwrap(), 42);
        assert!(pd.at_end());
    }

    #[test]
    fn cursor_defaults_on_empty_fields() {
        let mut pd = PdCursor::new("110,,2.0;", ',', ';');
        assert_eq!(pd.read_int("type").unwrap(), 110);
        assert_eq!(pd.read_real_or("x", 7.5).unwrap(), 7.5);
        assert_eq!(pd.read_real("y").unwrap(), 2.0);
    }

    #[test]
    fn cursor_ignores_blanks_outside_strings() {
        let mut pd = PdCursor::new(" 100 , 1.0 , 2 ;", ',', ';');
        assert_eq!(pd.read_int("type").unwrap(), 100);
        assert_eq!(pd.read_real("a").unwrap(), 1.0);
        assert_eq!(pd.read_int("b").unwrap(), 2);
    }

    #[test]
    fn shortest_real_within_tolerance() {
        assert_eq!(format_pd_real(0.0, 1e-6), "0.0");
        assert_eq!(format_pd_real(1.0, 1e-6), "1.0");
        assert_eq!(format_pd_real(25.4, 1e-6), "25.4");
        assert_eq!(format_pd_real(-0.5, 1e-6), "-0.5");

        // a third must come back at full precision under the NURBS tolerance
        let third = 1.0 / 3.0;
        let s = format_pd_real(third, 1e-15);
        let back: f64 = s.parse().unwrap();
        assert!((back - third).abs() <= 1e-15 * third);

        // and cheaply under the bookkeeping tolerance
        let s = format_pd_real(third, 1e-6);
        assert!(s.len() <= 10);
    }

    #[test]
    fn writer_flushes_at_64_columns() {
        let mut w = PdWriter::new();
        for i in 0..40 {
            w.push_int(1000 + i, ',');
        }
        w.push("0.0", ';');
        let lines = w.finish();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 64));
        let joined: String = lines.concat();
        assert!(joined.ends_with("0.0;"));
    }

    #[test]
    fn writer_chunks_oversized_hollerith() {
        let long = "x".repeat(100);
        let mut w = PdWriter::new();
        w.push_hstring(&long, ';');
        let lines = w.finish();
        assert!(lines.iter().all(|l| l.len() <= 64));
        assert_eq!(lines.concat(), format!("100H{};", long));
    }
}
