// SPDX-License-Identifier: Apache-2.0

use alloc::string::String;

use crate::bitstack::BoundedBitStack;
use crate::parse_error::ParseError;
use crate::shared::{byte_class, find_class, scan_class, ByteClass, Step};
use crate::utf8::{self, Utf8Buffer};

/// Deepest object/array nesting accepted.
pub const MAX_DEPTH: usize = 64;
/// Default limit on the raw length of one string or key.
pub const MAX_STRING: usize = 262144;
/// Longest run of number characters accepted.
pub const MAX_NUMBER: usize = 511;

const WHITESPACE: ByteClass = byte_class(&[(b' ', b' '), (b'\t', b'\n'), (b'\r', b'\r')]);

const NUMBER: ByteClass = byte_class(&[
    (b'+', b'+'),
    (b'-', b'.'),
    (b'0', b'9'),
    (b'E', b'E'),
    (b'e', b'e'),
]);

/// Stops a string scan: quote, backslash, control bytes and DEL.
const STRING_STOP: ByteClass = byte_class(&[
    (0x00, 0x1F),
    (b'"', b'"'),
    (b'\\', b'\\'),
    (0x7F, 0x7F),
]);

/// As [`STRING_STOP`], plus every non-ASCII byte so it can be validated.
const STRING_STOP_STRICT: ByteClass = byte_class(&[
    (0x00, 0x1F),
    (b'"', b'"'),
    (b'\\', b'\\'),
    (0x7F, 0xFF),
]);

/// Runtime settings for a [`JsonParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonConfig {
    /// Longest raw string or key, in input bytes.
    pub max_string: usize,
    /// Validate multi-byte UTF-8 as it is scanned rather than when the string completes.
    pub strict: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            max_string: MAX_STRING,
            strict: false,
        }
    }
}

impl JsonConfig {
    pub fn with_max_string(mut self, max_string: usize) -> Self {
        self.max_string = max_string;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// String content of a key or value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonStr<'a> {
    /// Slice of the input; the string had no escapes.
    Borrowed(&'a str),
    /// Unescaped copy held in the parser's scratch buffer.
    Unescaped(&'a str),
}

impl<'a> JsonStr<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            JsonStr::Borrowed(s) | JsonStr::Unescaped(s) => s,
        }
    }
}

impl core::ops::Deref for JsonStr<'_> {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for JsonStr<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Events produced by [`JsonParser::next`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonEvent<'a> {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Key(JsonStr<'a>),
    String(JsonStr<'a>),
    Number(f64),
    True,
    False,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Literal {
    True,
    False,
    Null,
}

impl Literal {
    /// Bytes expected after the first letter.
    const fn suffix(&self) -> &'static [u8] {
        match self {
            Literal::True => b"rue",
            Literal::False => b"alse",
            Literal::Null => b"ull",
        }
    }

    const fn token(&self) -> Token {
        match self {
            Literal::True => Token::True,
            Literal::False => Token::False,
            Literal::Null => Token::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Any,
    Key,
    String,
    Number,
    Literal(Literal),
    ArrayFirst,
    ArrayNext,
    ObjectFirst,
    ObjectKey,
    ObjectSep,
    ObjectNext,
    Done,
}

/// Completed token, before it is tied to the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Key(Text),
    String(Text),
    Number(f64),
    True,
    False,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Text {
    Borrowed { start: usize, end: usize },
    Unescaped,
}

#[derive(Debug)]
enum Scan {
    Token(usize, Token),
    Skip(usize),
    Pending,
}

/// Resumable parser for a single JSON value.
///
/// Feed it the unconsumed part of the input. After [`Step::Pending`], call
/// again with the same bytes plus whatever arrived since; the parser resumes
/// from where it stopped instead of rescanning. Pass `eof = true` once no
/// more input will follow.
///
/// ```
/// use netparse::{JsonEvent, JsonParser, Step};
///
/// let mut parser = JsonParser::new();
/// let input = br#"{"id": 7}"#;
///
/// let mut pos = 0;
/// let mut numbers = 0;
/// while !parser.is_done() {
///     match parser.next(&input[pos..], true).unwrap() {
///         Step::Ready(n, event) => {
///             if let JsonEvent::Number(v) = event {
///                 assert_eq!(v, 7.0);
///                 numbers += 1;
///             }
///             pos += n;
///         }
///         Step::Skip(n) => pos += n,
///         Step::Pending => unreachable!("eof was set"),
///     }
/// }
/// assert_eq!(numbers, 1);
/// assert_eq!(pos, input.len());
/// ```
#[derive(Debug)]
pub struct JsonParser {
    config: JsonConfig,
    state: State,
    /// Progress through the current token, relative to the start of the buffer.
    off: usize,
    /// Start of the string content or number being scanned.
    mark: usize,
    /// The current string has escapes and lives in `utf8`.
    escaped: bool,
    stack: BoundedBitStack<u64, MAX_DEPTH>,
    utf8: Utf8Buffer,
    error: Option<ParseError>,
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonParser {
    pub fn new() -> Self {
        Self::with_config(JsonConfig::default())
    }

    pub fn with_config(config: JsonConfig) -> Self {
        Self {
            config,
            state: State::Any,
            off: 0,
            mark: 0,
            escaped: false,
            stack: BoundedBitStack::new(),
            utf8: Utf8Buffer::new(),
            error: None,
        }
    }

    pub fn config(&self) -> &JsonConfig {
        &self.config
    }

    /// True once the top-level value has completed or an error occurred.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// The terminal error, if the parser failed.
    pub fn last_error(&self) -> Option<ParseError> {
        self.error
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Prepares for a new value, keeping the configuration and scratch allocation.
    pub fn reset(&mut self) {
        self.state = State::Any;
        self.off = 0;
        self.mark = 0;
        self.escaped = false;
        self.stack.clear();
        self.utf8.reset();
        self.error = None;
    }

    /// Takes the scratch buffer, which holds the most recent unescaped string.
    pub fn steal_string(&mut self) -> Result<String, ParseError> {
        self.utf8.steal_string()
    }

    /// Parses the next token from `buf`.
    ///
    /// `buf` must start at the first byte not yet consumed. Events borrow from
    /// `buf` or from the parser and are valid until the next call.
    pub fn next<'a>(
        &'a mut self,
        buf: &'a [u8],
        eof: bool,
    ) -> Result<Step<JsonEvent<'a>>, ParseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.state == State::Done {
            return Err(ParseError::State);
        }
        if self.off > buf.len() {
            return Err(self.fail(ParseError::State));
        }
        let scan = match self.advance(buf, eof) {
            Ok(scan) => scan,
            Err(err) => return Err(self.fail(err)),
        };
        Ok(match scan {
            Scan::Token(n, token) => Step::Ready(n, self.event(buf, token)?),
            Scan::Skip(n) => Step::Skip(n),
            Scan::Pending => Step::Pending,
        })
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        log::debug!(
            "json parser failed in {:?} at offset {}: {}",
            self.state,
            self.off,
            err
        );
        self.state = State::Done;
        self.error = Some(err);
        err
    }

    fn event<'a>(&'a mut self, buf: &'a [u8], token: Token) -> Result<JsonEvent<'a>, ParseError> {
        Ok(match token {
            Token::ObjectStart => JsonEvent::ObjectStart,
            Token::ObjectEnd => JsonEvent::ObjectEnd,
            Token::ArrayStart => JsonEvent::ArrayStart,
            Token::ArrayEnd => JsonEvent::ArrayEnd,
            Token::Key(text) => JsonEvent::Key(self.text(buf, text)?),
            Token::String(text) => JsonEvent::String(self.text(buf, text)?),
            Token::Number(n) => JsonEvent::Number(n),
            Token::True => JsonEvent::True,
            Token::False => JsonEvent::False,
            Token::Null => JsonEvent::Null,
        })
    }

    fn text<'a>(&'a mut self, buf: &'a [u8], text: Text) -> Result<JsonStr<'a>, ParseError> {
        match text {
            Text::Borrowed { start, end } => match core::str::from_utf8(&buf[start..end]) {
                Ok(s) => Ok(JsonStr::Borrowed(s)),
                Err(_) => Err(self.fail(ParseError::Encoding)),
            },
            Text::Unescaped => {
                if let Some(err) = self.utf8.as_str().err() {
                    return Err(self.fail(err));
                }
                self.utf8.as_str().map(JsonStr::Unescaped)
            }
        }
    }

    fn advance(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        if buf.is_empty() {
            return if eof {
                Err(ParseError::Syntax)
            } else {
                Ok(Scan::Pending)
            };
        }
        match self.state {
            State::Any => self.parse_any(buf, eof),
            State::Key | State::String => self.parse_string(buf, eof),
            State::Number => self.parse_number(buf, eof),
            State::Literal(literal) => self.parse_literal(buf, eof, literal),
            State::ArrayFirst | State::ArrayNext => self.parse_array(buf, eof),
            State::ObjectFirst | State::ObjectKey | State::ObjectSep | State::ObjectNext => {
                self.parse_object(buf, eof)
            }
            State::Done => Err(ParseError::State),
        }
    }

    fn complete(&mut self, consumed: usize, token: Token, next: State) -> Scan {
        self.state = next;
        self.off = 0;
        Scan::Token(consumed, token)
    }

    /// State that follows a completed value.
    fn after_value(&self) -> State {
        match self.stack.top() {
            None => State::Done,
            Some(true) => State::ObjectNext,
            Some(false) => State::ArrayNext,
        }
    }

    /// Moves `off` to the next significant byte.
    ///
    /// `None` means the buffer ended in whitespace; the caller reports it as skipped.
    fn skip_whitespace(&mut self, buf: &[u8], eof: bool) -> Result<Option<usize>, ParseError> {
        match scan_class(buf, self.off, &WHITESPACE) {
            Some(i) => {
                self.off = i;
                Ok(Some(i))
            }
            None if eof => Err(ParseError::Syntax),
            None => {
                self.off = 0;
                Ok(None)
            }
        }
    }

    fn parse_any(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        let Some(i) = self.skip_whitespace(buf, eof)? else {
            return Ok(Scan::Skip(buf.len()));
        };
        match buf[i] {
            b'{' => {
                self.stack.push(true)?;
                Ok(self.complete(i + 1, Token::ObjectStart, State::ObjectFirst))
            }
            b'[' => {
                self.stack.push(false)?;
                Ok(self.complete(i + 1, Token::ArrayStart, State::ArrayFirst))
            }
            b'"' => {
                self.begin_string(i + 1, State::String);
                self.parse_string(buf, eof)
            }
            b'-' | b'.' | b'0'..=b'9' => {
                self.mark = i;
                self.off = i + 1;
                self.state = State::Number;
                self.parse_number(buf, eof)
            }
            b't' => self.begin_literal(buf, eof, i, Literal::True),
            b'f' => self.begin_literal(buf, eof, i, Literal::False),
            b'n' => self.begin_literal(buf, eof, i, Literal::Null),
            _ => Err(ParseError::Syntax),
        }
    }

    fn begin_literal(
        &mut self,
        buf: &[u8],
        eof: bool,
        at: usize,
        literal: Literal,
    ) -> Result<Scan, ParseError> {
        self.off = at + 1;
        self.state = State::Literal(literal);
        self.parse_literal(buf, eof, literal)
    }

    fn parse_literal(
        &mut self,
        buf: &[u8],
        eof: bool,
        literal: Literal,
    ) -> Result<Scan, ParseError> {
        let suffix = literal.suffix();
        let avail = &buf[self.off.min(buf.len())..];
        let n = avail.len().min(suffix.len());
        if avail[..n] != suffix[..n] {
            return Err(ParseError::Syntax);
        }
        if n < suffix.len() {
            return if eof {
                Err(ParseError::Syntax)
            } else {
                Ok(Scan::Pending)
            };
        }
        let end = self.off + suffix.len();
        let next = self.after_value();
        Ok(self.complete(end, literal.token(), next))
    }

    fn parse_number(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        let end = match scan_class(buf, self.off, &NUMBER) {
            Some(end) => end,
            None => {
                self.off = buf.len();
                if self.off - self.mark > MAX_NUMBER {
                    return Err(ParseError::Size);
                }
                if !eof {
                    return Ok(Scan::Pending);
                }
                buf.len()
            }
        };
        if end - self.mark > MAX_NUMBER {
            return Err(ParseError::Size);
        }
        // number bytes are ASCII by construction
        let text = core::str::from_utf8(&buf[self.mark..end]).map_err(|_| ParseError::Syntax)?;
        let value: f64 = text.parse().map_err(|_| ParseError::Syntax)?;
        let next = self.after_value();
        Ok(self.complete(end, Token::Number(value), next))
    }

    fn begin_string(&mut self, content_start: usize, state: State) {
        self.utf8.reset();
        self.escaped = false;
        self.mark = content_start;
        self.off = content_start;
        self.state = state;
    }

    fn parse_string(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        let stop = if self.config.strict {
            &STRING_STOP_STRICT
        } else {
            &STRING_STOP
        };
        loop {
            let found = find_class(buf, self.off, stop);
            let end = found.unwrap_or(buf.len());
            if end - self.mark > self.config.max_string {
                return Err(ParseError::Size);
            }
            if self.escaped {
                self.utf8.add_raw(&buf[self.off..end])?;
            }
            self.off = end;

            let Some(i) = found else {
                return if eof {
                    Err(ParseError::Syntax)
                } else {
                    Ok(Scan::Pending)
                };
            };

            let byte = buf[i];
            if byte == b'"' {
                let text = if self.escaped {
                    Text::Unescaped
                } else {
                    Text::Borrowed {
                        start: self.mark,
                        end: i,
                    }
                };
                return Ok(if self.state == State::Key {
                    self.complete(i + 1, Token::Key(text), State::ObjectSep)
                } else {
                    let next = self.after_value();
                    self.complete(i + 1, Token::String(text), next)
                });
            }

            if byte == b'\\' && !self.escaped {
                self.escaped = true;
                self.utf8.add_raw(&buf[self.mark..i])?;
            }

            let used = if self.escaped {
                self.utf8.json_decode_next(&buf[i..])
            } else if byte < 0x20 || byte == 0x7F {
                Err(ParseError::Syntax)
            } else {
                utf8::validate_char(&buf[i..])
            };
            match used {
                Ok(n) => self.off = i + n,
                Err(ParseError::TooShort) if !eof => return Ok(Scan::Pending),
                Err(ParseError::TooShort) if byte == b'\\' => return Err(ParseError::Escape),
                Err(ParseError::TooShort) => return Err(ParseError::Encoding),
                Err(err) => return Err(err),
            }
        }
    }

    fn parse_array(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        let Some(i) = self.skip_whitespace(buf, eof)? else {
            return Ok(Scan::Skip(buf.len()));
        };
        match (self.state, buf[i]) {
            (_, b']') => self.close(i, false),
            (State::ArrayFirst, _) => {
                self.state = State::Any;
                self.parse_any(buf, eof)
            }
            (State::ArrayNext, b',') => {
                self.off = i + 1;
                self.state = State::Any;
                self.parse_any(buf, eof)
            }
            _ => Err(ParseError::Syntax),
        }
    }

    fn parse_object(&mut self, buf: &[u8], eof: bool) -> Result<Scan, ParseError> {
        loop {
            let Some(i) = self.skip_whitespace(buf, eof)? else {
                return Ok(Scan::Skip(buf.len()));
            };
            match (self.state, buf[i]) {
                (State::ObjectFirst | State::ObjectNext, b'}') => return self.close(i, true),
                (State::ObjectFirst | State::ObjectKey, b'"') => {
                    self.begin_string(i + 1, State::Key);
                    return self.parse_string(buf, eof);
                }
                (State::ObjectSep, b':') => {
                    self.off = i + 1;
                    self.state = State::Any;
                    return self.parse_any(buf, eof);
                }
                (State::ObjectNext, b',') => {
                    self.off = i + 1;
                    self.state = State::ObjectKey;
                }
                _ => return Err(ParseError::Syntax),
            }
        }
    }

    /// Closes the innermost container at `buf[i]`.
    fn close(&mut self, i: usize, object: bool) -> Result<Scan, ParseError> {
        if !self.stack.pop_if(object) {
            return Err(ParseError::Syntax);
        }
        let token = if object {
            Token::ObjectEnd
        } else {
            Token::ArrayEnd
        };
        let next = self.after_value();
        Ok(self.complete(i + 1, token, next))
    }
}
