//! Newline-delimited JSON transport: bytes in, ordered events out.

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use encoding_rs::{CoderResult, Decoder, UTF_8};
use futures_util::{Stream, StreamExt};
use research_core::Event;
use research_logging::{research_debug, research_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{StreamEnd, TransportError};

#[derive(Debug, Clone, Default)]
pub struct StreamSettings {
    /// Fail the stream when no event arrives for this long.
    pub max_silence: Option<Duration>,
}

/// Receives parsed events one at a time, in arrival order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Incremental NDJSON parser. Text is decoded statefully, so a UTF-8
/// sequence split across chunks decodes the same as an unsplit one.
pub struct NdjsonDecoder {
    decoder: Decoder,
    buffer: String,
    skipped: usize,
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder(),
            buffer: String::new(),
            skipped: 0,
        }
    }

    /// Decodes a chunk and returns the events of every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.decode(chunk, false);
        self.drain_lines()
    }

    /// Ends the input. A trailing fragment without a newline is incomplete
    /// and dropped; returns how many bytes of text were dropped.
    pub fn finish(mut self) -> usize {
        self.decode(&[], true);
        let dropped = self.buffer.len();
        if dropped > 0 {
            research_debug!("dropping {} bytes of unterminated trailing text", dropped);
        }
        dropped
    }

    /// Forgets buffered text, e.g. after cancellation.
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.decoder = UTF_8.new_decoder();
    }

    /// Number of malformed lines skipped so far.
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn decode(&mut self, mut chunk: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(chunk.len())
                .unwrap_or_else(|| chunk.len().saturating_mul(3).saturating_add(4));
            self.buffer.reserve(needed);
            let (result, read, _replaced) =
                self.decoder
                    .decode_to_string(chunk, &mut self.buffer, last);
            chunk = &chunk[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<Event> {
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete
            .split('\n')
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    fn parse_line(&mut self, line: &str) -> Option<Event> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return None;
        }
        match Event::from_line(line) {
            Ok(event) => Some(event),
            Err(err) => {
                self.skipped += 1;
                research_warn!("skipping event line: {}", err);
                None
            }
        }
    }
}

/// Parses a complete NDJSON body. The final line counts even without a
/// trailing newline, since the body ended normally.
pub fn parse_ndjson(body: &[u8]) -> Vec<Event> {
    let mut decoder = NdjsonDecoder::new();
    let mut events = decoder.feed(body);
    if !body.ends_with(b"\n") {
        events.extend(decoder.feed(b"\n"));
    }
    events
}

/// Reads `stream` to its end, emitting each parsed event to `sink` before
/// reading further. The stream is dropped (and its connection released) on
/// every return path.
pub async fn pump<S, E>(
    mut stream: S,
    cancel: &CancellationToken,
    settings: &StreamSettings,
    sink: &dyn EventSink,
) -> Result<StreamEnd, TransportError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut decoder = NdjsonDecoder::new();
    let mut last_event = Instant::now();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                decoder.discard();
                return Ok(StreamEnd::Cancelled);
            }
            next = next_chunk(&mut stream, settings.max_silence, last_event) => next,
        };

        match next {
            Err(limit) => return Err(TransportError::Silence(limit)),
            Ok(None) => {
                decoder.finish();
                return Ok(StreamEnd::Closed);
            }
            Ok(Some(Err(err))) => return Err(TransportError::Io(err.to_string())),
            Ok(Some(Ok(chunk))) => {
                // A read that completed after cancellation is discarded.
                if cancel.is_cancelled() {
                    decoder.discard();
                    return Ok(StreamEnd::Cancelled);
                }
                let events = decoder.feed(&chunk);
                if !events.is_empty() {
                    last_event = Instant::now();
                }
                for event in events {
                    sink.emit(event);
                }
            }
        }
    }
}

async fn next_chunk<S>(
    stream: &mut S,
    max_silence: Option<Duration>,
    last_event: Instant,
) -> Result<Option<S::Item>, Duration>
where
    S: Stream + Unpin,
{
    match max_silence {
        Some(limit) => tokio::time::timeout_at(last_event + limit, stream.next())
            .await
            .map_err(|_| limit),
        None => Ok(stream.next().await),
    }
}
