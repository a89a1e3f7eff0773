//! Incremental event parser over trace lines.
//!
//! [`EventParser`] is fed one line at a time and hands back whatever events
//! that line completed. A sample event is only complete once its stack block
//! ends, so a sample is emitted on the blank line (or whatever line) that
//! terminates it, or on [`EventParser::finish`] at end of stream.

use super::event::{ContextSwitch, Event, SampleEvent};
use super::tokenizer::{
    parse_frame, parse_header, parse_switch_fields, EventMatcher, LineKind,
};
use crate::utils::config::{DEFAULT_SAMPLE_EVENT, DEFAULT_SWITCH_EVENT};
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::utils::error::TraceParseError;
use std::collections::VecDeque;
use std::io::{self, BufRead};

#[derive(Debug)]
enum State {
    Idle,
    /// Inside the call chain printed under a switch line; frames are ignored
    InSwitch,
    InSample(SampleEvent),
}

/// Line-at-a-time state machine turning trace text into [`Event`]s
#[derive(Debug)]
pub struct EventParser {
    matcher: EventMatcher,
    state: State,
    line_no: u64,
    ready: Vec<Event>,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new(DEFAULT_SWITCH_EVENT, DEFAULT_SAMPLE_EVENT)
    }
}

impl EventParser {
    pub fn new(switch_event: &str, sample_event: &str) -> Self {
        Self {
            matcher: EventMatcher::new(switch_event, sample_event),
            state: State::Idle,
            line_no: 0,
            ready: Vec::new(),
        }
    }

    /// Number of lines fed so far
    pub fn lines_seen(&self) -> u64 {
        self.line_no
    }

    /// Feed the next line (without its trailing newline).
    ///
    /// Returns the events this line completed: usually none or one, two when a
    /// line both terminates a sample block and is itself a switch line.
    pub fn feed_line<S: DiagnosticSink>(
        &mut self,
        line: &str,
        sink: &mut S,
    ) -> std::vec::Drain<'_, Event> {
        self.line_no += 1;
        self.ready.clear();
        self.step(line, sink);
        self.ready.drain(..)
    }

    /// Flush a sample block left open at end of stream
    pub fn finish(&mut self) -> Option<Event> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::InSample(sample) => Some(Event::Sample(sample)),
            _ => None,
        }
    }

    fn step<S: DiagnosticSink>(&mut self, line: &str, sink: &mut S) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::InSample(mut sample) => {
                if line.trim().is_empty() {
                    self.ready.push(Event::Sample(sample));
                    return;
                }
                match parse_frame(line) {
                    Ok(frame) => {
                        sample.frames.push(frame);
                        self.state = State::InSample(sample);
                        return;
                    }
                    Err(_) => {
                        // block ended without a blank line; this may be the next header
                        self.ready.push(Event::Sample(sample));
                    }
                }
            }
            State::InSwitch => {
                if line.trim().is_empty() {
                    return;
                }
                if parse_frame(line).is_ok() {
                    self.state = State::InSwitch;
                    return;
                }
            }
            State::Idle => {}
        }

        self.classify(line, sink);
    }

    fn classify<S: DiagnosticSink>(&mut self, line: &str, sink: &mut S) {
        match self.matcher.classify(line) {
            LineKind::Blank | LineKind::Comment | LineKind::Other => {}
            LineKind::Switch => match parse_switch(line) {
                Ok(switch) => {
                    self.ready.push(Event::ContextSwitch(switch));
                    self.state = State::InSwitch;
                }
                Err(e) => sink.report(
                    Diagnostic::warning(DiagnosticKind::MalformedSwitch(e.to_string()))
                        .at_line(self.line_no)
                        .with_context(line),
                ),
            },
            LineKind::Sample => match parse_header(line) {
                Ok(header) => {
                    self.state = State::InSample(SampleEvent {
                        pid: header.pid,
                        tid: header.tid,
                        cpu: header.cpu,
                        frames: Vec::new(),
                    });
                }
                Err(e) => sink.report(
                    Diagnostic::warning(DiagnosticKind::MalformedSample(e.to_string()))
                        .at_line(self.line_no)
                        .with_context(line),
                ),
            },
        }
    }
}

fn parse_switch(line: &str) -> Result<ContextSwitch, TraceParseError> {
    let header = parse_header(line)?;
    let fields = parse_switch_fields(line)?;
    Ok(ContextSwitch {
        pid: header.pid,
        tid: header.tid,
        cpu: header.cpu,
        prev_tid: fields.prev_tid,
        next_tid: fields.next_tid,
    })
}

/// Read one line, decoding lossily and stripping the line terminator.
///
/// Returns `Ok(false)` at end of stream.
pub fn read_trace_line<R: BufRead>(
    reader: &mut R,
    raw: &mut Vec<u8>,
    line: &mut String,
) -> io::Result<bool> {
    raw.clear();
    line.clear();
    if reader.read_until(b'\n', raw)? == 0 {
        return Ok(false);
    }
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }
    line.push_str(&String::from_utf8_lossy(raw));
    Ok(true)
}

/// Iterator of events over a buffered reader, for single-threaded use
pub struct EventStream<R, S> {
    reader: R,
    parser: EventParser,
    sink: S,
    pending: VecDeque<Event>,
    raw: Vec<u8>,
    line: String,
    done: bool,
}

impl<R: BufRead, S: DiagnosticSink> EventStream<R, S> {
    pub fn new(reader: R, parser: EventParser, sink: S) -> Self {
        Self {
            reader,
            parser,
            sink,
            pending: VecDeque::new(),
            raw: Vec::new(),
            line: String::new(),
            done: false,
        }
    }

    /// Give back the sink once the stream is no longer needed
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<R: BufRead, S: DiagnosticSink> Iterator for EventStream<R, S> {
    type Item = io::Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match read_trace_line(&mut self.reader, &mut self.raw, &mut self.line) {
                Ok(true) => {
                    let events = self.parser.feed_line(&self.line, &mut self.sink);
                    self.pending.extend(events);
                }
                Ok(false) => {
                    self.done = true;
                    self.pending.extend(self.parser.finish());
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Convenience: parse a whole in-memory trace into events
pub fn parse_events<S: DiagnosticSink>(text: &str, sink: &mut S) -> Vec<Event> {
    let mut parser = EventParser::default();
    let mut events = Vec::new();
    for line in text.lines() {
        events.extend(parser.feed_line(line, sink));
    }
    events.extend(parser.finish());
    events
}
