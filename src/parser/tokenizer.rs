//! Fixed-grammar scanners for the two line kinds we care about.
//!
//! A trace can be millions of lines long, so nothing here allocates except the
//! symbol string of a frame. Each scanner either returns the fields it expects
//! or a [`TraceParseError`] describing the first thing that did not fit.

use super::event::Frame;
use crate::utils::config::{NEXT_PID_MARKER, PREV_PID_MARKER, UNRESOLVED_SYMBOL};
use crate::utils::error::TraceParseError;

/// Classification of a raw trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Switch,
    Sample,
    Other,
}

/// Recognises the configured switch and sample event names
#[derive(Debug, Clone)]
pub struct EventMatcher {
    switch_marker: String,
    sample_marker: String,
}

impl EventMatcher {
    pub fn new(switch_event: &str, sample_event: &str) -> Self {
        Self {
            switch_marker: format!(" {}:", switch_event),
            sample_marker: format!(" {}:", sample_event),
        }
    }

    pub fn classify(&self, line: &str) -> LineKind {
        if line.trim().is_empty() {
            LineKind::Blank
        } else if line.starts_with('#') {
            LineKind::Comment
        } else if line.contains(&self.switch_marker) {
            LineKind::Switch
        } else if line.contains(&self.sample_marker) {
            LineKind::Sample
        } else {
            LineKind::Other
        }
    }
}

/// `<pid>/<tid> [<cpu>]` prefix shared by every event line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub pid: u32,
    pub tid: u32,
    pub cpu: Option<u32>,
}

/// `prev_pid=`/`next_pid=` payload of a switch line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchFields {
    pub prev_tid: u32,
    pub next_tid: u32,
}

/// Byte cursor over one line.
///
/// Positions only ever stop on ASCII bytes, so slicing `line` at them is
/// always on a char boundary.
struct LineCursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    fn skip_to_digit(&mut self) -> bool {
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                return true;
            }
            self.pos += 1;
        }
        false
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn take_digits(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.line[start..self.pos]
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, TraceParseError> {
    value.parse::<u32>().map_err(|_| TraceParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse the `<pid>/<tid> [<cpu>]` header of an event line.
///
/// Leading non-digit text is skipped. A missing or malformed cpu is not an
/// error; it only yields `cpu: None`.
pub fn parse_header(line: &str) -> Result<Header, TraceParseError> {
    let mut cursor = LineCursor::new(line);

    if !cursor.skip_to_digit() {
        return Err(TraceParseError::MissingPid);
    }
    let pid = parse_u32("pid", cursor.take_digits())?;

    if !cursor.eat(b'/') {
        return Err(TraceParseError::MissingTidDelimiter);
    }
    let tid_str = cursor.take_digits();
    if tid_str.is_empty() {
        return Err(TraceParseError::MissingTid);
    }
    let tid = parse_u32("tid", tid_str)?;

    cursor.skip_whitespace();
    let cpu = if cursor.eat(b'[') {
        let digits = cursor.take_digits();
        if cursor.eat(b']') {
            digits.parse::<u32>().ok()
        } else {
            None
        }
    } else {
        None
    };

    Ok(Header { pid, tid, cpu })
}

/// Value following `marker`, up to the next whitespace or end of line
fn keyed_u32(line: &str, marker: &str, field: &'static str) -> Result<u32, TraceParseError> {
    let start = line
        .find(marker)
        .map(|pos| pos + marker.len())
        .ok_or(TraceParseError::MissingField(field))?;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(rest.len());
    parse_u32(field, &rest[..end])
}

/// Parse the `prev_pid=` and `next_pid=` fields of a switch line
pub fn parse_switch_fields(line: &str) -> Result<SwitchFields, TraceParseError> {
    let prev_tid = keyed_u32(line, PREV_PID_MARKER, "prev_pid")?;
    let next_tid = keyed_u32(line, NEXT_PID_MARKER, "next_pid")?;
    Ok(SwitchFields { prev_tid, next_tid })
}

/// Parse an indented `<hex address> <symbol>` stack line
pub fn parse_frame(line: &str) -> Result<Frame, TraceParseError> {
    let trimmed = line.trim_start();
    let (addr, rest) = match trimmed.find(|c: char| c == ' ' || c == '\t') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
        None => (trimmed, ""),
    };

    let hex = addr.strip_prefix("0x").unwrap_or(addr);
    if hex.is_empty() {
        return Err(TraceParseError::InvalidAddress(addr.to_string()));
    }
    let address = u64::from_str_radix(hex, 16)
        .map_err(|_| TraceParseError::InvalidAddress(addr.to_string()))?;

    let symbol = rest.trim();
    let symbol = if symbol.is_empty() {
        UNRESOLVED_SYMBOL
    } else {
        symbol
    };

    Ok(Frame::new(address, symbol))
}
