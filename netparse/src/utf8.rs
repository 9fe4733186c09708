// SPDX-License-Identifier: Apache-2.0

//! UTF-8 codec backed by an owned, growable byte buffer.
//!
//! The JSON parser uses it to materialize string content that contains
//! escapes. Every append operation validates its input and reports how many
//! *input* bytes it used, so a streaming caller can step through a slice one
//! logical unit at a time:
//!
//! ```
//! use netparse::{ParseError, Utf8Buffer};
//!
//! let mut u = Utf8Buffer::new();
//! assert_eq!(u.json_decode_next(br"\u00e9"), Ok(6));
//! assert_eq!(u.as_bytes(), "é".as_bytes());
//!
//! // a truncated escape asks for more input instead of failing
//! assert_eq!(u.json_decode_next(br"\u00"), Err(ParseError::TooShort));
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use crate::parse_error::ParseError;
use crate::shared::{byte_class, find_class, ByteClass};

/// Capacity below which growth doubles; above it grows in blocks of this size.
pub const MAX_POWER_OF_2: usize = 16384;

/// Bytes that need attention in JSON string content.
const JSON_SPECIAL: ByteClass = byte_class(&[
    (0x00, 0x1F),
    (b'"', b'"'),
    (b'\\', b'\\'),
    (0x7F, 0xFF),
]);

#[derive(Debug, Default, Clone)]
pub struct Utf8Buffer {
    buf: Vec<u8>,
}

impl Utf8Buffer {
    /// Creates an empty buffer. Nothing is allocated until the first append.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Views the contents as text.
    pub fn as_str(&self) -> Result<&str, ParseError> {
        core::str::from_utf8(&self.buf).map_err(|_| ParseError::Encoding)
    }

    /// Empties the buffer but keeps its allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Moves the contents out, leaving an empty unallocated buffer behind.
    pub fn steal(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buf)
    }

    /// Like [`Utf8Buffer::steal`], checked as text.
    pub fn steal_string(&mut self) -> Result<String, ParseError> {
        String::from_utf8(self.steal()).map_err(|_| ParseError::Encoding)
    }

    /// Makes room for `extra` more bytes plus a terminator.
    ///
    /// Capacity rounds up to the next power of two while small, then to the
    /// next multiple of [`MAX_POWER_OF_2`].
    pub fn ensure(&mut self, extra: usize) -> Result<(), ParseError> {
        let need = self
            .buf
            .len()
            .checked_add(extra)
            .and_then(|n| n.checked_add(1))
            .ok_or(ParseError::Size)?;
        if need <= self.buf.capacity() {
            return Ok(());
        }
        let cap = if need < MAX_POWER_OF_2 {
            need.next_power_of_two()
        } else {
            ((need - 1) / MAX_POWER_OF_2 + 1) * MAX_POWER_OF_2
        };
        self.buf
            .try_reserve_exact(cap - self.buf.len())
            .map_err(|_| ParseError::System)
    }

    /// Appends bytes verbatim.
    pub fn add_raw(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        self.ensure(src.len())?;
        self.buf.extend_from_slice(src);
        Ok(src.len())
    }

    /// Appends one code point as 1 to 4 bytes, returning the encoded width.
    pub fn add_codepoint(&mut self, cp: u32) -> Result<usize, ParseError> {
        if is_surrogate(cp) {
            return Err(ParseError::Surrogate);
        }
        let ch = char::from_u32(cp).ok_or(ParseError::Codepoint)?;
        let mut tmp = [0u8; 4];
        self.add_raw(ch.encode_utf8(&mut tmp).as_bytes())
    }

    /// Validates the character at the start of `src` and appends it.
    ///
    /// Returns the number of bytes taken from `src`. A valid but incomplete
    /// sequence is [`ParseError::TooShort`].
    pub fn add_char(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let (_, width) = decode_char(src)?;
        self.add_raw(&src[..width])
    }

    /// Decodes one JSON string unit (an escape or a character) from `src`.
    ///
    /// Returns the number of input bytes used. Raw control bytes are a
    /// syntax error since JSON requires them escaped.
    pub fn json_decode_next(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        match src.first().copied() {
            None => Err(ParseError::TooShort),
            Some(b) if b < 0x20 || b == 0x7F => Err(ParseError::Syntax),
            Some(b'\\') => self.unescape(src),
            Some(_) => self.add_char(src),
        }
    }

    /// Decodes a whole slice of JSON string content, returning bytes appended.
    pub fn json_decode(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let start = self.buf.len();
        let mut pos = 0;
        while let Some(special) = find_class(src, pos, &JSON_SPECIAL) {
            self.add_raw(&src[pos..special])?;
            pos = special + self.json_decode_next(&src[special..])?;
        }
        self.add_raw(&src[pos..])?;
        Ok(self.buf.len() - start)
    }

    /// Escapes one unit of `src` for a JSON string, returning input bytes used.
    pub fn json_encode_next(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let Some(&b) = src.first() else {
            return Err(ParseError::TooShort);
        };
        let simple: &[u8] = match b {
            b'"' => br#"\""#,
            b'\\' => br"\\",
            0x08 => br"\b",
            0x0C => br"\f",
            b'\n' => br"\n",
            b'\r' => br"\r",
            b'\t' => br"\t",
            0x00..=0x1F | 0x7F => {
                let hex = b"0123456789abcdef";
                let esc = [
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    hex[(b >> 4) as usize],
                    hex[(b & 0xF) as usize],
                ];
                self.add_raw(&esc)?;
                return Ok(1);
            }
            _ => return self.add_char(src),
        };
        self.add_raw(simple)?;
        Ok(1)
    }

    /// Escapes a whole slice for a JSON string, returning bytes appended.
    pub fn json_encode(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let start = self.buf.len();
        let mut pos = 0;
        while let Some(special) = find_class(src, pos, &JSON_SPECIAL) {
            self.add_raw(&src[pos..special])?;
            pos = special + self.json_encode_next(&src[special..])?;
        }
        self.add_raw(&src[pos..])?;
        Ok(self.buf.len() - start)
    }

    fn unescape(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let Some(&kind) = src.get(1) else {
            return Err(ParseError::TooShort);
        };
        let simple = match kind {
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'"' => b'"',
            b'/' => b'/',
            b'\\' => b'\\',
            b'u' => return self.unescape_unicode(src),
            _ => return Err(ParseError::Escape),
        };
        self.add_raw(&[simple])?;
        Ok(2)
    }

    fn unescape_unicode(&mut self, src: &[u8]) -> Result<usize, ParseError> {
        let hi = hex4(src, 2)?;
        if is_low_surrogate(hi) {
            return Err(ParseError::Surrogate);
        }
        if !is_high_surrogate(hi) {
            self.add_codepoint(hi)?;
            return Ok(6);
        }

        // a high surrogate must be followed directly by \uDC00..\uDFFF
        if src.get(6).is_some_and(|&b| b != b'\\') || src.get(7).is_some_and(|&b| b != b'u') {
            return Err(ParseError::Surrogate);
        }
        let lo = hex4(src, 8)?;
        if !is_low_surrogate(lo) {
            return Err(ParseError::Surrogate);
        }
        self.add_codepoint(combine_surrogate_pair(hi, lo))?;
        Ok(12)
    }
}

/// Width of the valid character at the start of `src`, without copying it.
pub(crate) fn validate_char(src: &[u8]) -> Result<usize, ParseError> {
    decode_char(src).map(|(_, width)| width)
}

/// Decodes the first code point in `src`.
pub fn codepoint(src: &[u8]) -> Result<u32, ParseError> {
    decode_char(src).map(|(cp, _)| cp)
}

/// Expected width of a sequence given its lead byte, or 0 if the lead is invalid.
const fn char_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Allowed range for the byte right after `lead`.
///
/// Tighter than 80..BF for leads that could start an overlong form, a
/// surrogate, or a value above U+10FFFF.
const fn second_byte_range(lead: u8) -> (u8, u8) {
    match lead {
        0xE0 => (0xA0, 0xBF),
        0xED => (0x80, 0x9F),
        0xF0 => (0x90, 0xBF),
        0xF4 => (0x80, 0x8F),
        _ => (0x80, 0xBF),
    }
}

fn decode_char(src: &[u8]) -> Result<(u32, usize), ParseError> {
    let Some(&lead) = src.first() else {
        return Err(ParseError::TooShort);
    };
    let width = char_width(lead);
    if width == 0 {
        return Err(ParseError::Encoding);
    }
    // bytes that are present must be valid before a short input can be reported
    for (i, &b) in src.iter().enumerate().take(width).skip(1) {
        let (lo, hi) = if i == 1 {
            second_byte_range(lead)
        } else {
            (0x80, 0xBF)
        };
        if b < lo || b > hi {
            return Err(ParseError::Encoding);
        }
    }
    if src.len() < width {
        return Err(ParseError::TooShort);
    }
    let mut cp = match width {
        1 => lead as u32,
        2 => (lead & 0x1F) as u32,
        3 => (lead & 0x0F) as u32,
        _ => (lead & 0x07) as u32,
    };
    for &b in &src[1..width] {
        cp = (cp << 6) | (b & 0x3F) as u32;
    }
    Ok((cp, width))
}

/// Reads four hex digits at `src[at..at + 4]`.
fn hex4(src: &[u8], at: usize) -> Result<u32, ParseError> {
    let digits = src.get(at..at + 4);
    // validate whatever is present first so garbage fails fast
    let present = src.get(at..).unwrap_or(&[]);
    let mut value = 0u32;
    for &b in present.iter().take(4) {
        value = (value << 4) | hex_digit(b)?;
    }
    match digits {
        Some(_) => Ok(value),
        None => Err(ParseError::TooShort),
    }
}

fn hex_digit(byte: u8) -> Result<u32, ParseError> {
    match byte {
        b'0'..=b'9' => Ok((byte - b'0') as u32),
        b'a'..=b'f' => Ok((byte - b'a' + 10) as u32),
        b'A'..=b'F' => Ok((byte - b'A' + 10) as u32),
        _ => Err(ParseError::Escape),
    }
}

fn is_surrogate(cp: u32) -> bool {
    (0xD800..=0xDFFF).contains(&cp)
}

fn is_high_surrogate(cp: u32) -> bool {
    (0xD800..=0xDBFF).contains(&cp)
}

fn is_low_surrogate(cp: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&cp)
}

fn combine_surrogate_pair(high: u32, low: u32) -> u32 {
    0x10000 + ((high & 0x3FF) << 10) + (low & 0x3FF)
}
