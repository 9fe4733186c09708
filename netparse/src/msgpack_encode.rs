// SPDX-License-Identifier: Apache-2.0

//! MessagePack tag encoders.
//!
//! Every encoder picks the shortest tag for its value, writes it to the front
//! of `buf` and returns the number of bytes written. Payloads of strings,
//! binaries and extensions are appended by the caller. A buffer of
//! [`TAG_MAX`] bytes is always large enough.

use crate::msgpack_parser::MsgpackEvent;
use crate::parse_error::ParseError;

/// Longest tag any encoder writes.
pub const TAG_MAX: usize = 9;

const FIXINT_MIN: i64 = -32;
const FIXUINT_MAX: u64 = 0x7f;
const FIXSTR_MAX: u32 = 31;
const FIXCOLLECTION_MAX: u32 = 15;

fn write(buf: &mut [u8], tag: u8, body: &[u8]) -> Result<usize, ParseError> {
    let len = 1 + body.len();
    let out = buf.get_mut(..len).ok_or(ParseError::Size)?;
    out[0] = tag;
    out[1..].copy_from_slice(body);
    Ok(len)
}

/// Writes a tag followed by a length of 1, 2 or 4 bytes, choosing the first
/// width that fits.
fn write_len(buf: &mut [u8], tags: [u8; 3], len: u32) -> Result<usize, ParseError> {
    if let Ok(len) = u8::try_from(len) {
        write(buf, tags[0], &[len])
    } else if let Ok(len) = u16::try_from(len) {
        write(buf, tags[1], &len.to_be_bytes())
    } else {
        write(buf, tags[2], &len.to_be_bytes())
    }
}

pub fn encode_nil(buf: &mut [u8]) -> Result<usize, ParseError> {
    write(buf, 0xc0, &[])
}

pub fn encode_false(buf: &mut [u8]) -> Result<usize, ParseError> {
    write(buf, 0xc2, &[])
}

pub fn encode_true(buf: &mut [u8]) -> Result<usize, ParseError> {
    write(buf, 0xc3, &[])
}

pub fn encode_bool(buf: &mut [u8], value: bool) -> Result<usize, ParseError> {
    if value {
        encode_true(buf)
    } else {
        encode_false(buf)
    }
}

/// Non-negative values are written with the unsigned encodings.
pub fn encode_signed(buf: &mut [u8], value: i64) -> Result<usize, ParseError> {
    if value >= 0 {
        return encode_unsigned(buf, value as u64);
    }
    if value >= FIXINT_MIN {
        write(buf, value as u8, &[])
    } else if let Ok(v) = i8::try_from(value) {
        write(buf, 0xd0, &v.to_be_bytes())
    } else if let Ok(v) = i16::try_from(value) {
        write(buf, 0xd1, &v.to_be_bytes())
    } else if let Ok(v) = i32::try_from(value) {
        write(buf, 0xd2, &v.to_be_bytes())
    } else {
        write(buf, 0xd3, &value.to_be_bytes())
    }
}

pub fn encode_unsigned(buf: &mut [u8], value: u64) -> Result<usize, ParseError> {
    if value <= FIXUINT_MAX {
        write(buf, value as u8, &[])
    } else if let Ok(v) = u8::try_from(value) {
        write(buf, 0xcc, &[v])
    } else if let Ok(v) = u16::try_from(value) {
        write(buf, 0xcd, &v.to_be_bytes())
    } else if let Ok(v) = u32::try_from(value) {
        write(buf, 0xce, &v.to_be_bytes())
    } else {
        write(buf, 0xcf, &value.to_be_bytes())
    }
}

pub fn encode_float(buf: &mut [u8], value: f32) -> Result<usize, ParseError> {
    write(buf, 0xca, &value.to_be_bytes())
}

pub fn encode_double(buf: &mut [u8], value: f64) -> Result<usize, ParseError> {
    write(buf, 0xcb, &value.to_be_bytes())
}

pub fn encode_string(buf: &mut [u8], len: u32) -> Result<usize, ParseError> {
    if len <= FIXSTR_MAX {
        write(buf, 0xa0 | len as u8, &[])
    } else {
        write_len(buf, [0xd9, 0xda, 0xdb], len)
    }
}

/// Binary lengths always take at least one length byte.
pub fn encode_binary(buf: &mut [u8], len: u32) -> Result<usize, ParseError> {
    write_len(buf, [0xc4, 0xc5, 0xc6], len)
}

pub fn encode_array(buf: &mut [u8], count: u32) -> Result<usize, ParseError> {
    encode_collection(buf, 0x90, [0xdc, 0xdd], count)
}

pub fn encode_map(buf: &mut [u8], count: u32) -> Result<usize, ParseError> {
    encode_collection(buf, 0x80, [0xde, 0xdf], count)
}

fn encode_collection(
    buf: &mut [u8],
    fix: u8,
    tags: [u8; 2],
    count: u32,
) -> Result<usize, ParseError> {
    if count <= FIXCOLLECTION_MAX {
        write(buf, fix | count as u8, &[])
    } else if let Ok(count) = u16::try_from(count) {
        write(buf, tags[0], &count.to_be_bytes())
    } else {
        write(buf, tags[1], &count.to_be_bytes())
    }
}

/// Writes an extension header. Negative types are reserved.
pub fn encode_ext(buf: &mut [u8], ty: i8, len: u32) -> Result<usize, ParseError> {
    if ty < 0 {
        return Err(ParseError::Syntax);
    }
    let ty = ty as u8;
    let fixed = match len {
        1 => Some(0xd4),
        2 => Some(0xd5),
        4 => Some(0xd6),
        8 => Some(0xd7),
        16 => Some(0xd8),
        _ => None,
    };
    if let Some(tag) = fixed {
        return write(buf, tag, &[ty]);
    }

    let mut body = [0u8; 5];
    let (tag, width) = if let Ok(len) = u8::try_from(len) {
        body[0] = len;
        (0xc7, 1)
    } else if let Ok(len) = u16::try_from(len) {
        body[..2].copy_from_slice(&len.to_be_bytes());
        (0xc8, 2)
    } else {
        body[..4].copy_from_slice(&len.to_be_bytes());
        (0xc9, 4)
    };
    body[width] = ty;
    write(buf, tag, &body[..=width])
}

/// Re-encodes a decoded event. End events have no encoding and write nothing.
///
/// Extension events with a negative type, such as the `-1` timestamp, are
/// rejected with [`ParseError::Syntax`] like [`encode_ext`] does, so they
/// cannot be round-tripped through this function.
pub fn encode_event(buf: &mut [u8], event: &MsgpackEvent) -> Result<usize, ParseError> {
    match *event {
        MsgpackEvent::Map(count) => encode_map(buf, count),
        MsgpackEvent::Array(count) => encode_array(buf, count),
        MsgpackEvent::MapEnd | MsgpackEvent::ArrayEnd => Ok(0),
        MsgpackEvent::Nil => encode_nil(buf),
        MsgpackEvent::True => encode_true(buf),
        MsgpackEvent::False => encode_false(buf),
        MsgpackEvent::Signed(v) => encode_signed(buf, v),
        MsgpackEvent::Unsigned(v) => encode_unsigned(buf, v),
        MsgpackEvent::Float(v) => encode_float(buf, v),
        MsgpackEvent::Double(v) => encode_double(buf, v),
        MsgpackEvent::String(len) => encode_string(buf, len),
        MsgpackEvent::Binary(len) => encode_binary(buf, len),
        MsgpackEvent::Ext { ty, len } => encode_ext(buf, ty, len),
    }
}
