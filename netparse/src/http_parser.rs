// SPDX-License-Identifier: Apache-2.0

use core::ops::Range;

use crate::header_map::HeaderMap;
use crate::parse_error::ParseError;
use crate::shared::{byte_class, find_class, scan_class, ByteClass, Step};

pub const MAX_METHOD: usize = 32;
pub const MAX_URI: usize = 8192;
pub const MAX_REASON: usize = 256;
pub const MAX_FIELD: usize = 256;
pub const MAX_VALUE: usize = 1024;

/// Consecutive calls without progress before the parser gives up.
const MAX_STALLED: u32 = 64;

const VERSION_PREFIX: &[u8] = b"HTTP/1.";
const CRLF: &[u8] = b"\r\n";

// Each class lists the bytes that end a scan.
const METHOD_STOP: ByteClass = byte_class(&[(0x00, b'@'), (b'[', b'`'), (b'{', 0xFF)]);
const URI_STOP: ByteClass = byte_class(&[(0x00, b' '), (0x7F, 0xFF)]);
const NAME_STOP: ByteClass = byte_class(&[
    (0x00, b' '),
    (b'"', b'"'),
    (b'(', b')'),
    (b'/', b'/'),
    (b':', b'@'),
    (b'[', b']'),
    (b'{', b'{'),
    (b'}', b'}'),
]);
const LWS: ByteClass = byte_class(&[(b'\t', b'\t'), (b' ', b' ')]);
const CR: ByteClass = byte_class(&[(b'\r', b'\r')]);

/// Which side of the exchange the parser reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpKind {
    Request,
    Response,
}

/// Length limits and capture mode for an [`HttpParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub max_method: usize,
    pub max_uri: usize,
    pub max_reason: usize,
    pub max_field: usize,
    pub max_value: usize,
    /// Store fields in a [`HeaderMap`] instead of reporting them.
    pub capture: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_method: MAX_METHOD,
            max_uri: MAX_URI,
            max_reason: MAX_REASON,
            max_field: MAX_FIELD,
            max_value: MAX_VALUE,
            capture: false,
        }
    }
}

impl HttpConfig {
    pub fn with_max_method(mut self, max: usize) -> Self {
        self.max_method = max;
        self
    }

    pub fn with_max_uri(mut self, max: usize) -> Self {
        self.max_uri = max;
        self
    }

    pub fn with_max_reason(mut self, max: usize) -> Self {
        self.max_reason = max;
        self
    }

    pub fn with_max_field(mut self, max: usize) -> Self {
        self.max_field = max;
        self
    }

    pub fn with_max_value(mut self, max: usize) -> Self {
        self.max_value = max;
        self
    }

    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }
}

/// Events produced by [`HttpParser::next`]. Slices borrow the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpEvent<'b> {
    Request {
        method: &'b [u8],
        uri: &'b [u8],
        /// Minor version: 0 or 1 for `HTTP/1.0` and `HTTP/1.1`.
        version: u8,
    },
    Response {
        version: u8,
        status: u16,
        reason: &'b [u8],
    },
    Field {
        name: &'b [u8],
        value: &'b [u8],
    },
    /// Headers are complete.
    ///
    /// For a non-chunked message the parser is done and the caller reads
    /// `content_length` body bytes itself.
    BodyStart {
        content_length: usize,
        chunked: bool,
    },
    /// A chunk of `length` bytes follows; the caller skips them.
    Chunk { length: usize },
    /// The terminating zero-length chunk. Trailer fields may follow.
    BodyEnd,
    /// Blank line after the trailers. The message is complete.
    TrailerEnd,
}

/// Renders the event as the line it was parsed from, with non-printable
/// bytes escaped. Framing events get a short description.
impl core::fmt::Display for HttpEvent<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            HttpEvent::Request {
                method,
                uri,
                version,
            } => write!(
                f,
                "{} {} HTTP/1.{version}",
                method.escape_ascii(),
                uri.escape_ascii()
            ),
            HttpEvent::Response {
                version,
                status,
                reason,
            } => write!(f, "HTTP/1.{version} {status} {}", reason.escape_ascii()),
            HttpEvent::Field { name, value } => {
                write!(f, "{}: {}", name.escape_ascii(), value.escape_ascii())
            }
            HttpEvent::BodyStart { chunked: true, .. } => f.write_str("body (chunked)"),
            HttpEvent::BodyStart { content_length, .. } => {
                write!(f, "body ({content_length} bytes)")
            }
            HttpEvent::Chunk { length } => write!(f, "chunk ({length} bytes)"),
            HttpEvent::BodyEnd => f.write_str("body end"),
            HttpEvent::TrailerEnd => f.write_str("trailer end"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Method,
    Uri,
    RequestVersion,
    RequestEol,
    ResponseVersion,
    ResponseSep,
    Status,
    Reason,
    Field,
    FieldName,
    FieldLws,
    FieldValue,
    ChunkSize,
    ChunkEol,
    ChunkDataEol,
    Done,
}

enum FieldScan {
    Field(usize),
    End(usize),
    Pending,
}

/// Resumable HTTP/1.x message parser.
///
/// Each call takes the unconsumed input. After [`Step::Pending`] the caller
/// appends more data and presents the same bytes again; offsets already
/// validated are not scanned twice.
#[derive(Debug)]
pub struct HttpParser {
    config: HttpConfig,
    kind: HttpKind,
    state: State,
    /// Progress through the current token.
    off: usize,
    /// Start of the second part of a token: URI, reason or field value.
    mark: usize,
    /// Method or field name.
    first: Range<usize>,
    /// URI or field value.
    second: Range<usize>,
    version: u8,
    status: u16,
    content_length: usize,
    chunk_len: usize,
    chunked: bool,
    trailers: bool,
    stalled: u32,
    headers: Option<HeaderMap>,
    error: Option<ParseError>,
}

impl HttpParser {
    pub fn request() -> Self {
        Self::with_config(HttpKind::Request, HttpConfig::default())
    }

    pub fn response() -> Self {
        Self::with_config(HttpKind::Response, HttpConfig::default())
    }

    /// Request parser that stores fields in a [`HeaderMap`].
    pub fn request_capture() -> Self {
        Self::with_config(HttpKind::Request, HttpConfig::default().with_capture(true))
    }

    /// Response parser that stores fields in a [`HeaderMap`].
    pub fn response_capture() -> Self {
        Self::with_config(HttpKind::Response, HttpConfig::default().with_capture(true))
    }

    pub fn with_config(kind: HttpKind, config: HttpConfig) -> Self {
        Self {
            config,
            kind,
            state: Self::initial_state(kind),
            off: 0,
            mark: 0,
            first: 0..0,
            second: 0..0,
            version: 0,
            status: 0,
            content_length: 0,
            chunk_len: 0,
            chunked: false,
            trailers: false,
            stalled: 0,
            headers: config.capture.then(HeaderMap::new),
            error: None,
        }
    }

    fn initial_state(kind: HttpKind) -> State {
        match kind {
            HttpKind::Request => State::Method,
            HttpKind::Response => State::ResponseVersion,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn is_response(&self) -> bool {
        self.kind == HttpKind::Response
    }

    /// True once the message is complete or an error occurred.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn last_error(&self) -> Option<ParseError> {
        self.error
    }

    /// Captured headers, when capture is enabled.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// Takes the captured headers, leaving an empty map in their place.
    pub fn steal_headers(&mut self) -> Option<HeaderMap> {
        self.headers.as_mut().map(core::mem::take)
    }

    /// Prepares for the next message on the same connection.
    ///
    /// Limits and capture mode are kept; captured headers are cleared.
    pub fn reset(&mut self) {
        let mut headers = self.headers.take();
        if let Some(map) = headers.as_mut() {
            map.clear();
        }
        *self = Self {
            headers,
            ..Self::with_config(self.kind, self.config)
        };
    }

    /// Parses the next token from `buf`.
    pub fn next<'b>(&mut self, buf: &'b [u8]) -> Result<Step<HttpEvent<'b>>, ParseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.state == State::Done {
            return Err(ParseError::State);
        }
        if buf.is_empty() {
            return Ok(Step::Pending);
        }

        if self.off > buf.len() {
            return Err(self.fail(ParseError::State));
        }

        self.stalled += 1;
        let scanned = self.off;
        let step = match self.advance(buf) {
            Ok(step) => step,
            Err(err) => return Err(self.fail(err)),
        };
        if step.consumed() > 0 || self.off > scanned {
            self.stalled = 0;
        } else if self.stalled > MAX_STALLED {
            return Err(self.fail(ParseError::TooShort));
        }
        Ok(step)
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        log::debug!(
            "http parser failed in {:?} at offset {}: {}",
            self.state,
            self.off,
            err
        );
        self.state = State::Done;
        self.error = Some(err);
        err
    }

    fn advance<'b>(&mut self, buf: &'b [u8]) -> Result<Step<HttpEvent<'b>>, ParseError> {
        match self.state {
            State::Method | State::Uri | State::RequestVersion | State::RequestEol => {
                self.parse_request_line(buf)
            }
            State::ResponseVersion | State::ResponseSep | State::Status | State::Reason => {
                self.parse_response_line(buf)
            }
            State::Field | State::FieldName | State::FieldLws | State::FieldValue => {
                self.parse_fields(buf)
            }
            State::ChunkSize | State::ChunkEol | State::ChunkDataEol => self.parse_chunk(buf),
            State::Done => Err(ParseError::State),
        }
    }

    fn complete<'b>(&mut self, event: HttpEvent<'b>, next: State) -> Step<HttpEvent<'b>> {
        let consumed = self.off;
        self.off = 0;
        self.state = next;
        Step::Ready(consumed, event)
    }

    fn parse_request_line<'b>(
        &mut self,
        buf: &'b [u8],
    ) -> Result<Step<HttpEvent<'b>>, ParseError> {
        loop {
            match self.state {
                State::Method => {
                    let Some(end) =
                        self.run_then(buf, &METHOD_STOP, b' ', 0, self.config.max_method)?
                    else {
                        return Ok(Step::Pending);
                    };
                    if end == 0 {
                        return Err(ParseError::Syntax);
                    }
                    self.first = 0..end;
                    self.mark = self.off;
                    self.state = State::Uri;
                }
                State::Uri => {
                    let Some(end) =
                        self.run_then(buf, &URI_STOP, b' ', self.mark, self.config.max_uri)?
                    else {
                        return Ok(Step::Pending);
                    };
                    if end == self.mark {
                        return Err(ParseError::Syntax);
                    }
                    self.second = self.mark..end;
                    self.state = State::RequestVersion;
                }
                State::RequestVersion => {
                    if !self.expect_version(buf)? {
                        return Ok(Step::Pending);
                    }
                    self.state = State::RequestEol;
                }
                State::RequestEol => {
                    if !self.expect_prefix(buf, CRLF)? {
                        return Ok(Step::Pending);
                    }
                    let event = HttpEvent::Request {
                        method: &buf[self.first.clone()],
                        uri: &buf[self.second.clone()],
                        version: self.version,
                    };
                    return Ok(self.complete(event, State::Field));
                }
                _ => return Err(ParseError::State),
            }
        }
    }

    fn parse_response_line<'b>(
        &mut self,
        buf: &'b [u8],
    ) -> Result<Step<HttpEvent<'b>>, ParseError> {
        loop {
            match self.state {
                State::ResponseVersion => {
                    if !self.expect_version(buf)? {
                        return Ok(Step::Pending);
                    }
                    self.state = State::ResponseSep;
                }
                State::ResponseSep => {
                    if !self.expect_prefix(buf, b" ")? {
                        return Ok(Step::Pending);
                    }
                    self.status = 0;
                    self.mark = self.off;
                    self.state = State::Status;
                }
                State::Status => {
                    loop {
                        let Some(&b) = buf.get(self.off) else {
                            return Ok(Step::Pending);
                        };
                        self.off += 1;
                        match b {
                            b' ' if self.off - 1 > self.mark => break,
                            b'0'..=b'9' => {
                                self.status = self
                                    .status
                                    .checked_mul(10)
                                    .and_then(|s| s.checked_add((b - b'0') as u16))
                                    .ok_or(ParseError::Size)?;
                            }
                            _ => return Err(ParseError::Syntax),
                        }
                    }
                    self.mark = self.off;
                    self.state = State::Reason;
                }
                State::Reason => {
                    let Some(end) = self.line_end(buf, self.mark, self.config.max_reason)? else {
                        return Ok(Step::Pending);
                    };
                    let event = HttpEvent::Response {
                        version: self.version,
                        status: self.status,
                        reason: &buf[self.mark..end],
                    };
                    return Ok(self.complete(event, State::Field));
                }
                _ => return Err(ParseError::State),
            }
        }
    }

    /// Parses fields until one is reported or the header block ends.
    ///
    /// With capture enabled, fields go into the map and parsing continues;
    /// running out of input after capturing reports the captured bytes as skipped.
    fn parse_fields<'b>(&mut self, buf: &'b [u8]) -> Result<Step<HttpEvent<'b>>, ParseError> {
        let mut base = 0;
        loop {
            let line = &buf[base..];
            match self.parse_field(line)? {
                FieldScan::Pending if base > 0 => return Ok(Step::Skip(base)),
                FieldScan::Pending => return Ok(Step::Pending),
                FieldScan::End(n) => {
                    self.off = base + n;
                    let step = if self.trailers {
                        self.complete(HttpEvent::TrailerEnd, State::Done)
                    } else {
                        log::trace!(
                            "http body start: content_length={} chunked={}",
                            self.content_length,
                            self.chunked
                        );
                        let next = if self.chunked {
                            self.mark = 0;
                            State::ChunkSize
                        } else {
                            State::Done
                        };
                        let event = HttpEvent::BodyStart {
                            content_length: self.content_length,
                            chunked: self.chunked,
                        };
                        self.complete(event, next)
                    };
                    return Ok(step);
                }
                FieldScan::Field(n) => {
                    let name = &line[self.first.clone()];
                    let value = &line[self.second.clone()];
                    if let Some(map) = self.headers.as_mut() {
                        map.put(name, value)?;
                    }
                    self.scrape(name, value)?;
                    if self.headers.is_none() {
                        return Ok(Step::Ready(n, HttpEvent::Field { name, value }));
                    }
                    base += n;
                }
            }
        }
    }

    fn parse_field(&mut self, line: &[u8]) -> Result<FieldScan, ParseError> {
        loop {
            match self.state {
                State::Field => {
                    let Some(head) = line.get(self.off..self.off + CRLF.len()) else {
                        return Ok(FieldScan::Pending);
                    };
                    if head == CRLF {
                        self.off += CRLF.len();
                        let n = self.off;
                        self.off = 0;
                        return Ok(FieldScan::End(n));
                    }
                    self.state = State::FieldName;
                }
                State::FieldName => {
                    let Some(end) =
                        self.run_then(line, &NAME_STOP, b':', 0, self.config.max_field)?
                    else {
                        return Ok(FieldScan::Pending);
                    };
                    if end == 0 {
                        return Err(ParseError::Syntax);
                    }
                    self.first = 0..end;
                    self.mark = self.off;
                    self.state = State::FieldLws;
                }
                State::FieldLws => match scan_class(line, self.off, &LWS) {
                    Some(i) => {
                        self.off = i;
                        self.mark = i;
                        self.state = State::FieldValue;
                    }
                    None => {
                        self.off = line.len();
                        if self.off - self.mark > self.config.max_value {
                            return Err(ParseError::Size);
                        }
                        return Ok(FieldScan::Pending);
                    }
                },
                State::FieldValue => {
                    let Some(end) = self.line_end(line, self.mark, self.config.max_value)? else {
                        return Ok(FieldScan::Pending);
                    };
                    self.second = self.mark..end;
                    let n = self.off;
                    self.off = 0;
                    self.state = State::Field;
                    return Ok(FieldScan::Field(n));
                }
                _ => return Err(ParseError::State),
            }
        }
    }

    /// Picks up body framing from the header block.
    fn scrape(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
        if self.trailers || self.content_length != 0 {
            return Ok(());
        }
        if name.eq_ignore_ascii_case(b"content-length") {
            if value.is_empty() {
                return Err(ParseError::Syntax);
            }
            let mut len: usize = 0;
            for &b in value {
                if !b.is_ascii_digit() {
                    return Err(ParseError::Syntax);
                }
                len = len
                    .checked_mul(10)
                    .and_then(|len| len.checked_add((b - b'0') as usize))
                    .ok_or(ParseError::Size)?;
            }
            self.content_length = len;
        } else if name.eq_ignore_ascii_case(b"transfer-encoding")
            && value.eq_ignore_ascii_case(b"chunked")
        {
            self.chunked = true;
        }
        Ok(())
    }

    fn parse_chunk<'b>(&mut self, buf: &'b [u8]) -> Result<Step<HttpEvent<'b>>, ParseError> {
        loop {
            match self.state {
                State::ChunkSize => {
                    loop {
                        let Some(&b) = buf.get(self.off) else {
                            return Ok(Step::Pending);
                        };
                        let Some(digit) = (b as char).to_digit(16) else {
                            break;
                        };
                        self.chunk_len = self
                            .chunk_len
                            .checked_mul(16)
                            .and_then(|len| len.checked_add(digit as usize))
                            .ok_or(ParseError::Size)?;
                        self.off += 1;
                    }
                    if self.off == self.mark {
                        return Err(ParseError::Syntax);
                    }
                    self.state = State::ChunkEol;
                }
                State::ChunkEol => {
                    if !self.expect_prefix(buf, CRLF)? {
                        return Ok(Step::Pending);
                    }
                    let length = core::mem::take(&mut self.chunk_len);
                    if length == 0 {
                        log::trace!("http body end");
                        self.trailers = true;
                        return Ok(self.complete(HttpEvent::BodyEnd, State::Field));
                    }
                    log::trace!("http chunk: {} bytes", length);
                    return Ok(self.complete(HttpEvent::Chunk { length }, State::ChunkDataEol));
                }
                State::ChunkDataEol => {
                    if !self.expect_prefix(buf, CRLF)? {
                        return Ok(Step::Pending);
                    }
                    self.mark = self.off;
                    self.state = State::ChunkSize;
                }
                _ => return Err(ParseError::State),
            }
        }
    }

    /// Scans a run outside `stop` that must end with `term`.
    ///
    /// Returns the index of `term`, or `None` when the buffer ends first.
    fn run_then(
        &mut self,
        buf: &[u8],
        stop: &ByteClass,
        term: u8,
        start: usize,
        max: usize,
    ) -> Result<Option<usize>, ParseError> {
        match find_class(buf, self.off, stop) {
            None => {
                self.off = buf.len();
                if self.off - start > max {
                    return Err(ParseError::Size);
                }
                Ok(None)
            }
            Some(i) => {
                if buf[i] != term {
                    return Err(ParseError::Syntax);
                }
                if i - start > max {
                    return Err(ParseError::Size);
                }
                self.off = i + 1;
                Ok(Some(i))
            }
        }
    }

    /// Scans to CRLF, returning the index of the CR.
    fn line_end(
        &mut self,
        buf: &[u8],
        start: usize,
        max: usize,
    ) -> Result<Option<usize>, ParseError> {
        let (cr, done) = match find_class(buf, self.off, &CR) {
            None => (buf.len(), false),
            // CR is the last byte; look at it again next time
            Some(cr) if cr + 1 == buf.len() => (cr, false),
            Some(cr) if buf[cr + 1] != b'\n' => return Err(ParseError::Syntax),
            Some(cr) => (cr, true),
        };
        if cr - start > max {
            return Err(ParseError::Size);
        }
        if !done {
            self.off = cr;
            return Ok(None);
        }
        self.off = cr + CRLF.len();
        Ok(Some(cr))
    }

    /// Matches a fixed prefix, failing as soon as an available byte differs.
    fn expect_prefix(&mut self, buf: &[u8], prefix: &[u8]) -> Result<bool, ParseError> {
        let avail = buf.get(self.off..).ok_or(ParseError::State)?;
        let n = avail.len().min(prefix.len());
        if avail[..n] != prefix[..n] {
            return Err(ParseError::Syntax);
        }
        if n < prefix.len() {
            return Ok(false);
        }
        self.off += n;
        Ok(true)
    }

    /// Matches `HTTP/1.` and the minor version digit.
    fn expect_version(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        let start = self.off;
        if !self.expect_prefix(buf, VERSION_PREFIX)? {
            return Ok(false);
        }
        let Some(&digit) = buf.get(self.off) else {
            self.off = start;
            return Ok(false);
        };
        if !digit.is_ascii_digit() {
            return Err(ParseError::Syntax);
        }
        self.version = digit - b'0';
        self.off += 1;
        Ok(true)
    }
}
