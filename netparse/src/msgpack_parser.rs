// SPDX-License-Identifier: Apache-2.0

use crate::bitstack::BoundedBitStack;
use crate::parse_error::ParseError;
use crate::shared::Step;

/// Deepest map/array nesting accepted.
pub const MSGPACK_MAX_DEPTH: usize = 24;

/// Events produced by [`MsgpackParser::next`].
///
/// String, binary and extension events carry only the payload length. The
/// payload follows the consumed bytes and the caller skips it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MsgpackEvent {
    Map(u32),
    Array(u32),
    MapEnd,
    ArrayEnd,
    Nil,
    True,
    False,
    /// Always negative; non-negative values decode as [`MsgpackEvent::Unsigned`].
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    Double(f64),
    String(u32),
    Binary(u32),
    Ext { ty: i8, len: u32 },
}

impl MsgpackEvent {
    /// Payload bytes that follow this event's encoding.
    pub fn payload_len(&self) -> usize {
        match self {
            MsgpackEvent::String(len) | MsgpackEvent::Binary(len) => *len as usize,
            MsgpackEvent::Ext { len, .. } => *len as usize,
            _ => 0,
        }
    }
}

/// Resumable MessagePack decoder for a single top-level value.
///
/// Each aggregate is reported as a start event carrying its element count.
/// Once the last element has been seen, the next call reports the matching
/// end event without consuming input.
#[derive(Debug)]
pub struct MsgpackParser {
    /// true for a map level.
    stack: BoundedBitStack<u32, MSGPACK_MAX_DEPTH>,
    /// Elements left per level; a map entry counts twice.
    counts: [u64; MSGPACK_MAX_DEPTH],
    /// Aggregate that just completed and still owes its end event.
    closing: Option<bool>,
    done: bool,
    error: Option<ParseError>,
}

impl Default for MsgpackParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgpackParser {
    pub fn new() -> Self {
        Self {
            stack: BoundedBitStack::new(),
            counts: [0; MSGPACK_MAX_DEPTH],
            closing: None,
            done: false,
            error: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True once the top-level value is complete or an error occurred.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn last_error(&self) -> Option<ParseError> {
        self.error
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// True when the next value read is a map key.
    pub fn is_key(&self) -> bool {
        let depth = self.stack.depth();
        self.closing.is_none()
            && self.stack.top() == Some(true)
            && self.counts[depth - 1] % 2 == 0
    }

    /// Decodes the next tag from `buf`.
    ///
    /// With `eof` set, a tag or payload that does not fit in `buf` is a
    /// syntax error rather than a request for more input.
    pub fn next(&mut self, buf: &[u8], eof: bool) -> Result<Step<MsgpackEvent>, ParseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.done {
            return Err(ParseError::State);
        }

        if let Some(map) = self.closing.take() {
            self.value_complete();
            let event = if map {
                MsgpackEvent::MapEnd
            } else {
                MsgpackEvent::ArrayEnd
            };
            return Ok(Step::Ready(0, event));
        }

        if buf.is_empty() {
            return if eof {
                Err(self.fail(ParseError::Syntax))
            } else {
                Ok(Step::Pending)
            };
        }

        let (consumed, event) = match decode(buf, eof) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Ok(Step::Pending),
            Err(err) => return Err(self.fail(err)),
        };
        let opened = match event {
            MsgpackEvent::Map(count) => self.open(true, u64::from(count) * 2),
            MsgpackEvent::Array(count) => self.open(false, u64::from(count)),
            _ => {
                self.value_complete();
                Ok(())
            }
        };
        if let Err(err) = opened {
            return Err(self.fail(err));
        }
        Ok(Step::Ready(consumed, event))
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        log::debug!(
            "msgpack parser failed at depth {}: {}",
            self.stack.depth(),
            err
        );
        self.done = true;
        self.error = Some(err);
        err
    }

    fn open(&mut self, map: bool, count: u64) -> Result<(), ParseError> {
        self.stack.push(map)?;
        self.counts[self.stack.depth() - 1] = count;
        if count == 0 {
            self.close();
        }
        Ok(())
    }

    fn close(&mut self) {
        let map = self.stack.top() == Some(true);
        self.stack.pop_if(map);
        self.closing = Some(map);
    }

    /// Counts one finished value against the enclosing aggregate.
    fn value_complete(&mut self) {
        let depth = self.stack.depth();
        if depth == 0 {
            self.done = true;
            return;
        }
        self.counts[depth - 1] -= 1;
        if self.counts[depth - 1] == 0 {
            self.close();
        }
    }
}

/// Returns the `N` bytes after the tag, or `None` when more input may still arrive.
fn take<const N: usize>(buf: &[u8], eof: bool) -> Result<Option<[u8; N]>, ParseError> {
    match buf.get(1..1 + N) {
        Some(bytes) => Ok(bytes.try_into().ok()),
        None if eof => Err(ParseError::Syntax),
        None => Ok(None),
    }
}

/// With `eof` set, the payload must be entirely present.
fn check_payload(buf: &[u8], eof: bool, header: usize, len: u32) -> Result<(), ParseError> {
    if !eof {
        return Ok(());
    }
    let len = usize::try_from(len).map_err(|_| ParseError::Size)?;
    match header.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        Some(_) => Err(ParseError::Syntax),
        None => Err(ParseError::Size),
    }
}

fn signed(value: i64) -> MsgpackEvent {
    if value < 0 {
        MsgpackEvent::Signed(value)
    } else {
        MsgpackEvent::Unsigned(value as u64)
    }
}

fn decode(buf: &[u8], eof: bool) -> Result<Option<(usize, MsgpackEvent)>, ParseError> {
    macro_rules! take {
        ($n:literal) => {
            match take::<$n>(buf, eof)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            }
        };
    }

    let tag = buf[0];
    let decoded = match tag {
        0x00..=0x7f => (1, MsgpackEvent::Unsigned(u64::from(tag))),
        0x80..=0x8f => (1, MsgpackEvent::Map(u32::from(tag & 0x0f))),
        0x90..=0x9f => (1, MsgpackEvent::Array(u32::from(tag & 0x0f))),
        0xa0..=0xbf => {
            let len = u32::from(tag & 0x1f);
            check_payload(buf, eof, 1, len)?;
            (1, MsgpackEvent::String(len))
        }
        0xc0 => (1, MsgpackEvent::Nil),
        0xc1 => return Err(ParseError::Syntax),
        0xc2 => (1, MsgpackEvent::False),
        0xc3 => (1, MsgpackEvent::True),
        0xc4..=0xc6 => {
            let (header, len) = match tag {
                0xc4 => (2, u32::from(take!(1)[0])),
                0xc5 => (3, u32::from(u16::from_be_bytes(take!(2)))),
                _ => (5, u32::from_be_bytes(take!(4))),
            };
            check_payload(buf, eof, header, len)?;
            (header, MsgpackEvent::Binary(len))
        }
        0xc7..=0xc9 => {
            let (header, len, ty) = match tag {
                0xc7 => {
                    let [len, ty] = take!(2);
                    (3, u32::from(len), ty)
                }
                0xc8 => {
                    let [a, b, ty] = take!(3);
                    (4, u32::from(u16::from_be_bytes([a, b])), ty)
                }
                _ => {
                    let [a, b, c, d, ty] = take!(5);
                    (6, u32::from_be_bytes([a, b, c, d]), ty)
                }
            };
            check_payload(buf, eof, header, len)?;
            (header, MsgpackEvent::Ext { ty: ty as i8, len })
        }
        0xca => (5, MsgpackEvent::Float(f32::from_be_bytes(take!(4)))),
        0xcb => (9, MsgpackEvent::Double(f64::from_be_bytes(take!(8)))),
        0xcc => (2, MsgpackEvent::Unsigned(u64::from(take!(1)[0]))),
        0xcd => (3, MsgpackEvent::Unsigned(u64::from(u16::from_be_bytes(take!(2))))),
        0xce => (5, MsgpackEvent::Unsigned(u64::from(u32::from_be_bytes(take!(4))))),
        0xcf => (9, MsgpackEvent::Unsigned(u64::from_be_bytes(take!(8)))),
        0xd0 => (2, signed(i64::from(take!(1)[0] as i8))),
        0xd1 => (3, signed(i64::from(i16::from_be_bytes(take!(2))))),
        0xd2 => (5, signed(i64::from(i32::from_be_bytes(take!(4))))),
        0xd3 => (9, signed(i64::from_be_bytes(take!(8)))),
        0xd4..=0xd8 => {
            let [ty] = take!(1);
            let len = if tag == 0xd8 { 16 } else { 1 << (tag & 0x03) };
            check_payload(buf, eof, 2, len)?;
            (2, MsgpackEvent::Ext { ty: ty as i8, len })
        }
        0xd9..=0xdb => {
            let (header, len) = match tag {
                0xd9 => (2, u32::from(take!(1)[0])),
                0xda => (3, u32::from(u16::from_be_bytes(take!(2)))),
                _ => (5, u32::from_be_bytes(take!(4))),
            };
            check_payload(buf, eof, header, len)?;
            (header, MsgpackEvent::String(len))
        }
        0xdc => (3, MsgpackEvent::Array(u32::from(u16::from_be_bytes(take!(2))))),
        0xdd => (5, MsgpackEvent::Array(u32::from_be_bytes(take!(4)))),
        0xde => (3, MsgpackEvent::Map(u32::from(u16::from_be_bytes(take!(2))))),
        0xdf => (5, MsgpackEvent::Map(u32::from_be_bytes(take!(4)))),
        0xe0..=0xff => (1, MsgpackEvent::Signed(i64::from(tag as i8))),
    };
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use test_log::test;

    /// Decodes a complete value, skipping payloads like a caller would.
    fn collect(input: &[u8]) -> Result<(Vec<MsgpackEvent>, usize), ParseError> {
        let mut parser = MsgpackParser::new();
        let mut events = Vec::new();
        let mut pos = 0;
        while !parser.is_done() {
            match parser.next(&input[pos..], true)? {
                Step::Ready(n, event) => {
                    pos += n + event.payload_len();
                    events.push(event);
                }
                Step::Skip(n) => pos += n,
                Step::Pending => panic!("pending with eof set"),
            }
        }
        Ok((events, pos))
    }

    #[test]
    fn test_scalars() {
        let cases: &[(&[u8], MsgpackEvent)] = &[
            (&[0x05], MsgpackEvent::Unsigned(5)),
            (&[0xff], MsgpackEvent::Signed(-1)),
            (&[0xe0], MsgpackEvent::Signed(-32)),
            (&[0xc0], MsgpackEvent::Nil),
            (&[0xc2], MsgpackEvent::False),
            (&[0xc3], MsgpackEvent::True),
            (&[0xcc, 0xff], MsgpackEvent::Unsigned(255)),
            (&[0xcd, 0x01, 0x00], MsgpackEvent::Unsigned(256)),
            (&[0xd0, 0x80], MsgpackEvent::Signed(-128)),
            (&[0xd1, 0xff, 0x7f], MsgpackEvent::Signed(-129)),
            (&[0xca, 0x3f, 0xc0, 0x00, 0x00], MsgpackEvent::Float(1.5)),
            (
                &[0xcb, 0x3f, 0xf3, 0xae, 0x14, 0x7a, 0xe1, 0x47, 0xae],
                MsgpackEvent::Double(1.23),
            ),
        ];
        for (input, expected) in cases {
            let (events, consumed) = collect(input).unwrap();
            assert_eq!(events, [*expected], "{input:02x?}");
            assert_eq!(consumed, input.len());
        }
    }

    #[test]
    fn test_non_negative_signed_is_unsigned() {
        assert_eq!(collect(&[0xd0, 0x05]).unwrap().0, [MsgpackEvent::Unsigned(5)]);
        assert_eq!(
            collect(&[0xd3, 0, 0, 0, 0, 0, 0, 0x01, 0x00]).unwrap().0,
            [MsgpackEvent::Unsigned(256)]
        );
    }

    #[test]
    fn test_nested() {
        // [{"k": "v"}]
        let input = [0x91, 0x81, 0xa1, b'k', 0xa1, b'v'];
        let (events, consumed) = collect(&input).unwrap();
        assert_eq!(
            events,
            [
                MsgpackEvent::Array(1),
                MsgpackEvent::Map(1),
                MsgpackEvent::String(1),
                MsgpackEvent::String(1),
                MsgpackEvent::MapEnd,
                MsgpackEvent::ArrayEnd,
            ]
        );
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_end_events_consume_nothing() {
        let mut parser = MsgpackParser::new();
        assert_eq!(
            parser.next(&[0x90, 0xc0], true).unwrap(),
            Step::Ready(1, MsgpackEvent::Array(0))
        );
        assert!(!parser.is_done());
        assert_eq!(
            parser.next(&[0xc0], true).unwrap(),
            Step::Ready(0, MsgpackEvent::ArrayEnd)
        );
        assert!(parser.is_done());
        assert_eq!(parser.next(&[0xc0], true), Err(ParseError::State));
    }

    #[test]
    fn test_is_key() {
        let mut parser = MsgpackParser::new();
        assert!(!parser.is_key());
        parser.next(&[0x82], false).unwrap();
        assert!(parser.is_key());
        parser.next(&[0x01], false).unwrap();
        assert!(!parser.is_key());
        parser.next(&[0x92], false).unwrap();
        assert!(!parser.is_key());
        parser.next(&[0xc0], false).unwrap();
        parser.next(&[0xc0], false).unwrap();
        assert_eq!(parser.next(&[], false).unwrap().event(), Some(&MsgpackEvent::ArrayEnd));
        assert!(parser.is_key());
    }

    #[test]
    fn test_truncated_input() {
        let mut parser = MsgpackParser::new();
        assert_eq!(parser.next(&[0xcd, 0x01], false).unwrap(), Step::Pending);
        assert_eq!(
            parser.next(&[0xcd, 0x01, 0x02], false).unwrap(),
            Step::Ready(3, MsgpackEvent::Unsigned(0x0102))
        );

        assert_eq!(collect(&[0xcd, 0x01]), Err(ParseError::Syntax));
        assert_eq!(collect(&[0x91]), Err(ParseError::Syntax));
        assert_eq!(collect(&[]), Err(ParseError::Syntax));
    }

    #[test]
    fn test_payload_not_consumed() {
        let mut parser = MsgpackParser::new();
        // payload may still be in flight without eof
        assert_eq!(
            parser.next(&[0xa5, b'h'], false).unwrap(),
            Step::Ready(1, MsgpackEvent::String(5))
        );

        let mut parser = MsgpackParser::new();
        assert_eq!(parser.next(&[0xa5, b'h'], true), Err(ParseError::Syntax));
        assert_eq!(parser.last_error(), Some(ParseError::Syntax));

        let ext = [0xc7, 0x03, 0x05, 1, 2, 3];
        let (events, consumed) = collect(&ext).unwrap();
        assert_eq!(events, [MsgpackEvent::Ext { ty: 5, len: 3 }]);
        assert_eq!(consumed, ext.len());

        let fixext = [0xd6, 0xff, 1, 2, 3, 4];
        let (events, _) = collect(&fixext).unwrap();
        assert_eq!(events, [MsgpackEvent::Ext { ty: -1, len: 4 }]);
    }

    #[test]
    fn test_largest_declared_payload() {
        let mut parser = MsgpackParser::new();
        let str32 = [0xdb, 0xff, 0xff, 0xff, 0xff, b'x'];
        assert_eq!(parser.next(&str32, true), Err(ParseError::Syntax));

        let mut parser = MsgpackParser::new();
        assert_eq!(
            parser.next(&str32, false).unwrap(),
            Step::Ready(5, MsgpackEvent::String(u32::MAX))
        );
    }

    #[test]
    fn test_reserved_tag() {
        assert_eq!(collect(&[0xc1]), Err(ParseError::Syntax));
        assert_eq!(collect(&[0x91, 0xc1]), Err(ParseError::Syntax));
    }

    #[test]
    fn test_depth_limit() {
        let mut input = Vec::new();
        input.extend(core::iter::repeat(0x91).take(MSGPACK_MAX_DEPTH));
        input.push(0xc0);
        let (events, _) = collect(&input).unwrap();
        assert_eq!(events.len(), MSGPACK_MAX_DEPTH * 2 + 1);

        input.insert(0, 0x91);
        assert_eq!(collect(&input), Err(ParseError::Stack));
    }

    #[test]
    fn test_reset() {
        let mut parser = MsgpackParser::new();
        assert_eq!(parser.next(&[0xc1], true), Err(ParseError::Syntax));
        assert_eq!(parser.next(&[0xc0], true), Err(ParseError::Syntax));
        parser.reset();
        assert_eq!(parser.next(&[0xc0], true).unwrap(), Step::Ready(1, MsgpackEvent::Nil));
        assert!(parser.is_done());
    }
}
