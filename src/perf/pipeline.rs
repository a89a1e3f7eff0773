//! Reader/accounting thread pair over a bounded line queue.
//!
//! The reader thread only moves bytes: it splits the trace into lines and
//! ships them in batches. The accounting thread owns the parser, the
//! [`Ingest`] state and the diagnostic sink, so nothing is shared between the
//! two apart from the channel. The caller learns the result through a
//! single-use completion channel.

use crate::aggregator::{Ingest, IngestOptions, IngestSnapshot};
use crate::parser::{read_trace_line, EventParser};
use crate::utils::config::{CHANNEL_CAPACITY, LINE_BATCH_SIZE, READ_BUFFER_SIZE};
use crate::utils::diagnostics::DiagnosticSink;
use crate::utils::error::IngestError;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};
use std::io::{self, BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

/// What the reader hands to the accounting thread
#[derive(Debug)]
enum Chunk {
    Lines(Vec<String>),
    /// Terminal: the read failed and no more lines follow
    Failed(io::Error),
}

/// Finished ingest plus the sink that collected its diagnostics
#[derive(Debug)]
pub struct IngestOutcome<S> {
    pub snapshot: IngestSnapshot,
    pub sink: S,
    pub lines: u64,
}

type Completion<S> = Result<IngestOutcome<S>, IngestError>;

/// Running pipeline; call [`IngestHandle::wait`] once the source is drained
pub struct IngestHandle<S> {
    reader: JoinHandle<()>,
    accounting: JoinHandle<()>,
    done: Receiver<Completion<S>>,
}

/// Start the reader and accounting threads over `source`
pub fn spawn_ingest<R, S>(
    source: R,
    options: IngestOptions,
    sink: S,
) -> Result<IngestHandle<S>, IngestError>
where
    R: Read + Send + 'static,
    S: DiagnosticSink + Send + 'static,
{
    let (line_tx, line_rx) = bounded::<Chunk>(CHANNEL_CAPACITY);
    let (done_tx, done_rx) = bounded::<Completion<S>>(1);

    let accounting = thread::Builder::new()
        .name("ingest-accounting".to_string())
        .spawn(move || account(line_rx, done_tx, options, sink))
        .map_err(IngestError::Spawn)?;

    let reader = thread::Builder::new()
        .name("ingest-reader".to_string())
        .spawn(move || read_lines(BufReader::with_capacity(READ_BUFFER_SIZE, source), line_tx))
        .map_err(IngestError::Spawn)?;

    Ok(IngestHandle {
        reader,
        accounting,
        done: done_rx,
    })
}

impl<S> IngestHandle<S> {
    /// Block until accounting has finished
    pub fn wait(self) -> Result<IngestOutcome<S>, IngestError> {
        let completion = self.done.recv();
        let reader = self.reader.join();
        let accounting = self.accounting.join();

        if reader.is_err() || accounting.is_err() {
            return Err(IngestError::Panicked);
        }
        completion.map_err(|_| IngestError::Disconnected)?
    }
}

fn read_lines<R: BufRead>(mut reader: R, tx: Sender<Chunk>) {
    let mut raw = Vec::new();
    let mut line = String::new();
    let mut batch = Vec::with_capacity(LINE_BATCH_SIZE);
    let mut batches = 0u64;

    loop {
        match read_trace_line(&mut reader, &mut raw, &mut line) {
            Ok(true) => {
                batch.push(std::mem::take(&mut line));
                if batch.len() == LINE_BATCH_SIZE {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(LINE_BATCH_SIZE));
                    if tx.send(Chunk::Lines(full)).is_err() {
                        return;
                    }
                    batches += 1;
                }
            }
            Ok(false) => break,
            Err(e) => {
                if !batch.is_empty() {
                    let _ = tx.send(Chunk::Lines(batch));
                }
                let _ = tx.send(Chunk::Failed(e));
                return;
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(Chunk::Lines(batch));
        batches += 1;
    }
    debug!("Reader finished after {} batches", batches);
}

fn account<S: DiagnosticSink>(
    rx: Receiver<Chunk>,
    done: Sender<Completion<S>>,
    options: IngestOptions,
    mut sink: S,
) {
    let mut parser = options.parser();
    let mut ingest = Ingest::new(options);

    for chunk in rx {
        match chunk {
            Chunk::Lines(lines) => {
                for line in &lines {
                    feed(&mut parser, &mut ingest, line, &mut sink);
                }
            }
            Chunk::Failed(e) => {
                let _ = done.send(Err(IngestError::Read(e)));
                return;
            }
        }
    }

    let _ = done.send(Ok(complete(parser, ingest, sink)));
}

fn feed<S: DiagnosticSink>(
    parser: &mut EventParser,
    ingest: &mut Ingest,
    line: &str,
    sink: &mut S,
) {
    let events = parser.feed_line(line, sink);
    for event in events {
        ingest.handle(event, sink);
    }
}

fn complete<S: DiagnosticSink>(
    mut parser: EventParser,
    mut ingest: Ingest,
    mut sink: S,
) -> IngestOutcome<S> {
    if let Some(event) = parser.finish() {
        ingest.handle(event, &mut sink);
    }
    let lines = parser.lines_seen();
    let snapshot = ingest.finish();
    info!(
        "Ingested {} lines: {} switches, {} samples",
        lines,
        snapshot.stats().switches,
        snapshot.stats().samples
    );
    IngestOutcome {
        snapshot,
        sink,
        lines,
    }
}

/// Single-threaded ingest of an in-process reader
pub fn ingest_reader<R: BufRead, S: DiagnosticSink>(
    mut reader: R,
    options: IngestOptions,
    mut sink: S,
) -> Result<IngestOutcome<S>, IngestError> {
    let mut parser = options.parser();
    let mut ingest = Ingest::new(options);
    let mut raw = Vec::new();
    let mut line = String::new();

    while read_trace_line(&mut reader, &mut raw, &mut line).map_err(IngestError::Read)? {
        feed(&mut parser, &mut ingest, &line, &mut sink);
    }
    Ok(complete(parser, ingest, sink))
}
