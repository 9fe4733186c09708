// SPDX-License-Identifier: Apache-2.0

//! Resumable, incremental parsers for network byte streams.
//!
//! Three parsers share one calling convention:
//!
//! - [`HttpParser`] for HTTP/1.x request and response heads, chunked framing
//!   and trailers;
//! - [`JsonParser`] for a single JSON value;
//! - [`MsgpackParser`] for a single MessagePack value, with stateless
//!   encoders in [`msgpack_encode`].
//!
//! Each `next` call receives the input that has not been consumed yet and
//! returns a [`Step`]:
//!
//! - [`Step::Ready`]`(n, event)`: a token completed. Drop `n` bytes from the
//!   front of the input.
//! - [`Step::Skip`]`(n)`: `n` bytes were absorbed without producing an event.
//! - [`Step::Pending`]: more input is needed. Present the same bytes again,
//!   followed by whatever arrives next. Bytes already validated are not
//!   rescanned.
//!
//! Errors are terminal. A parser that failed keeps returning the same
//! [`ParseError`] until it is reset.
//!
//! ```
//! use netparse::{HttpEvent, HttpParser, Step};
//!
//! let mut parser = HttpParser::request();
//! let mut input = Vec::new();
//! input.extend_from_slice(b"GET /status HT");
//! assert!(parser.next(&input).unwrap().is_pending());
//!
//! input.extend_from_slice(b"TP/1.1\r\nHost: example.com\r\n\r\n");
//! let step = parser.next(&input).unwrap();
//! assert_eq!(
//!     step,
//!     Step::Ready(
//!         22,
//!         HttpEvent::Request {
//!             method: b"GET",
//!             uri: b"/status",
//!             version: 1
//!         }
//!     )
//! );
//! ```
//!
//! # Features
//!
//! - `std`: implements `std::error::Error` for [`ParseError`]. The crate is
//!   `no_std` with `alloc` otherwise.
//!
//! # Logging
//!
//! Parsers report failures through the [`log`] facade at `debug` level and
//! HTTP body framing at `trace` level. No logger is installed.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod bitstack;
pub use bitstack::{BitStack, BoundedBitStack};

mod parse_error;
pub use parse_error::{strerror, ParseError};

mod shared;
pub use shared::Step;

pub mod utf8;
pub use utf8::{codepoint, Utf8Buffer};

mod json_parser;
pub use json_parser::{
    JsonConfig, JsonEvent, JsonParser, JsonStr, MAX_DEPTH, MAX_NUMBER, MAX_STRING,
};

mod header_map;
pub use header_map::{HeaderEntry, HeaderMap};

mod http_parser;
pub use http_parser::{
    HttpConfig, HttpEvent, HttpKind, HttpParser, MAX_FIELD, MAX_METHOD, MAX_REASON, MAX_URI,
    MAX_VALUE,
};

mod msgpack_parser;
pub use msgpack_parser::{MsgpackEvent, MsgpackParser, MSGPACK_MAX_DEPTH};

pub mod msgpack_encode;
pub use msgpack_encode::{
    encode_array, encode_binary, encode_bool, encode_double, encode_event, encode_ext,
    encode_false, encode_float, encode_map, encode_nil, encode_signed, encode_string,
    encode_true, encode_unsigned, TAG_MAX,
};
