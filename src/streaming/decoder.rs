//! Incremental decoder for `data:`-framed streaming responses.
//!
//! # Responsibilities
//! - Reassemble lines across arbitrary chunk boundaries
//! - Turn each `data:` record into a content delta
//! - Emit exactly one final event, on `[DONE]` or at end of input
//!
//! # Design Decisions
//! - Bytes are buffered, not text, so a UTF-8 sequence split across two
//!   chunks decodes intact
//! - A malformed record is logged and skipped; it never aborts the stream
//! - Pure state machine: no I/O, no async, driven by the streaming client

use crate::streaming::types::{estimate_tokens, ChatCompletionChunk, StreamEnd, StreamEvent};

/// Payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest line kept while waiting for its newline. Longer lines are
/// discarded as malformed.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

enum Line {
    Skip,
    Delta(StreamEvent),
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete line.
    pending: Vec<u8>,
    text: String,
    finish_reason: Option<String>,
    finished: bool,
    malformed: usize,
    /// Dropping the rest of an over-long line.
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns the events completed by it.
    ///
    /// After the final event has been produced further input is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            match self.decode_line(&line) {
                Line::Skip => {}
                Line::Delta(event) => events.push(event),
                Line::Done => {
                    events.push(self.final_event(StreamEnd::Done));
                    self.pending.clear();
                    return events;
                }
            }
        }

        if self.pending.len() > MAX_LINE_BYTES {
            if !self.discarding {
                self.malformed += 1;
                tracing::warn!(limit = MAX_LINE_BYTES, "Discarding over-long stream line");
            }
            self.pending.clear();
            self.discarding = true;
        }
        events
    }

    /// Signal end of input.
    ///
    /// Processes a trailing unterminated line, then returns the final event
    /// unless one was already produced.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.pending);
        let line = if self.discarding { Line::Skip } else { self.decode_line(&rest) };
        let end = match line {
            Line::Skip => StreamEnd::Closed,
            Line::Delta(event) => {
                events.push(event);
                StreamEnd::Closed
            }
            Line::Done => StreamEnd::Done,
        };
        if end == StreamEnd::Closed {
            tracing::debug!(chars = self.char_count(), "Stream closed without [DONE]");
        }
        events.push(self.final_event(end));
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Characters accumulated so far.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Number of records skipped as unparseable.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    fn decode_line(&mut self, raw: &[u8]) -> Line {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data:") else {
            return Line::Skip;
        };
        let payload = payload.trim_start();

        if payload == DONE_SENTINEL {
            return Line::Done;
        }
        if payload.is_empty() {
            return Line::Skip;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.malformed += 1;
                tracing::warn!(error = %e, payload = %payload, "Skipping malformed stream record");
                return Line::Skip;
            }
        };

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Line::Skip;
        };
        if choice.finish_reason.is_some() {
            self.finish_reason.clone_from(&choice.finish_reason);
        }

        match choice.delta.content {
            Some(content) if !content.is_empty() => {
                self.text.push_str(&content);
                Line::Delta(StreamEvent::Delta {
                    content,
                    token_estimate: estimate_tokens(&self.text),
                    finish_reason: choice.finish_reason,
                })
            }
            _ => Line::Skip,
        }
    }

    fn final_event(&mut self, end: StreamEnd) -> StreamEvent {
        self.finished = true;
        StreamEvent::Final {
            text: self.text.clone(),
            token_estimate: estimate_tokens(&self.text),
            finish_reason: self.finish_reason.clone(),
            end,
        }
    }
}
