// SPDX-License-Identifier: Apache-2.0

//! Chunked-feeding harness shared by the integration tests.

#![allow(dead_code)]

use netparse::{
    HttpEvent, HttpParser, JsonEvent, JsonParser, MsgpackEvent, MsgpackParser, ParseError, Step,
};

/// A parser driven the way a network caller would drive it.
pub trait Feed {
    type Owned: PartialEq + core::fmt::Debug;

    fn feed(&mut self, buf: &[u8], eof: bool) -> Result<Step<Self::Owned>, ParseError>;

    /// Bytes following the event that the caller must skip itself.
    fn skip_after(event: &Self::Owned) -> usize;

    fn is_done(&self) -> bool;
}

/// Owned JSON event.
#[derive(Debug, Clone, PartialEq)]
pub enum Json {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Key(String),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Feed for JsonParser {
    type Owned = Json;

    fn feed(&mut self, buf: &[u8], eof: bool) -> Result<Step<Json>, ParseError> {
        Ok(match self.next(buf, eof)? {
            Step::Ready(n, event) => Step::Ready(
                n,
                match event {
                    JsonEvent::ObjectStart => Json::ObjectStart,
                    JsonEvent::ObjectEnd => Json::ObjectEnd,
                    JsonEvent::ArrayStart => Json::ArrayStart,
                    JsonEvent::ArrayEnd => Json::ArrayEnd,
                    JsonEvent::Key(s) => Json::Key(s.to_string()),
                    JsonEvent::String(s) => Json::String(s.to_string()),
                    JsonEvent::Number(v) => Json::Number(v),
                    JsonEvent::True => Json::Bool(true),
                    JsonEvent::False => Json::Bool(false),
                    JsonEvent::Null => Json::Null,
                },
            ),
            Step::Skip(n) => Step::Skip(n),
            Step::Pending => Step::Pending,
        })
    }

    fn skip_after(_: &Json) -> usize {
        0
    }

    fn is_done(&self) -> bool {
        JsonParser::is_done(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Http {
    Request(String, String, u8),
    Response(u8, u16, String),
    Field(String, String),
    BodyStart(usize, bool),
    Chunk(usize),
    BodyEnd,
    TrailerEnd,
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Feed for HttpParser {
    type Owned = Http;

    fn feed(&mut self, buf: &[u8], _eof: bool) -> Result<Step<Http>, ParseError> {
        Ok(match self.next(buf)? {
            Step::Ready(n, event) => Step::Ready(
                n,
                match event {
                    HttpEvent::Request {
                        method,
                        uri,
                        version,
                    } => Http::Request(text(method), text(uri), version),
                    HttpEvent::Response {
                        version,
                        status,
                        reason,
                    } => Http::Response(version, status, text(reason)),
                    HttpEvent::Field { name, value } => Http::Field(text(name), text(value)),
                    HttpEvent::BodyStart {
                        content_length,
                        chunked,
                    } => Http::BodyStart(content_length, chunked),
                    HttpEvent::Chunk { length } => Http::Chunk(length),
                    HttpEvent::BodyEnd => Http::BodyEnd,
                    HttpEvent::TrailerEnd => Http::TrailerEnd,
                },
            ),
            Step::Skip(n) => Step::Skip(n),
            Step::Pending => Step::Pending,
        })
    }

    fn skip_after(event: &Http) -> usize {
        match event {
            Http::Chunk(length) => *length,
            _ => 0,
        }
    }

    fn is_done(&self) -> bool {
        HttpParser::is_done(self)
    }
}

impl Feed for MsgpackParser {
    type Owned = MsgpackEvent;

    fn feed(&mut self, buf: &[u8], eof: bool) -> Result<Step<MsgpackEvent>, ParseError> {
        self.next(buf, eof)
    }

    fn skip_after(event: &MsgpackEvent) -> usize {
        event.payload_len()
    }

    fn is_done(&self) -> bool {
        MsgpackParser::is_done(self)
    }
}

/// Outcome of a complete chunked run.
#[derive(Debug, PartialEq)]
pub struct Run<E> {
    pub events: Vec<E>,
    pub consumed: usize,
}

/// Feeds `input` in pieces whose sizes come from `sizes`, cycling through it.
///
/// Consumed bytes are dropped from the front of a pending buffer and
/// payloads announced by events are skipped, exactly as a socket reader would.
pub fn drive<P: Feed>(
    parser: &mut P,
    input: &[u8],
    sizes: &[usize],
) -> Result<Run<P::Owned>, ParseError> {
    let mut pending: Vec<u8> = Vec::new();
    let mut fed = 0;
    let mut owed = 0;
    let mut consumed = 0;
    let mut events = Vec::new();
    let mut sizes = sizes.iter().copied().filter(|&s| s > 0).cycle();

    while !parser.is_done() {
        let skip = owed.min(pending.len());
        pending.drain(..skip);
        owed -= skip;
        consumed += skip;

        let eof = fed == input.len();
        let step = if owed > 0 {
            Step::Pending
        } else {
            parser.feed(&pending, eof)?
        };
        match step {
            Step::Ready(n, event) => {
                pending.drain(..n);
                consumed += n;
                owed = P::skip_after(&event);
                events.push(event);
            }
            Step::Skip(n) => {
                pending.drain(..n);
                consumed += n;
            }
            Step::Pending => {
                assert!(!eof, "parser wants more input after {consumed} bytes at eof");
                let size = sizes.next().unwrap_or(input.len());
                let end = fed.saturating_add(size).min(input.len());
                pending.extend_from_slice(&input[fed..end]);
                fed = end;
            }
        }
    }

    Ok(Run {
        events,
        consumed: consumed + owed,
    })
}

/// Feeds the whole input at once.
pub fn drive_whole<P: Feed>(parser: &mut P, input: &[u8]) -> Result<Run<P::Owned>, ParseError> {
    drive(parser, input, &[input.len().max(1)])
}
