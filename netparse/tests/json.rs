// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{drive, drive_whole, Json};
use netparse::{JsonConfig, JsonEvent, JsonParser, JsonStr, ParseError, Step, MAX_DEPTH};
use test_log::test;

fn parse(input: &[u8]) -> Result<Vec<Json>, ParseError> {
    drive_whole(&mut JsonParser::new(), input).map(|run| run.events)
}

fn string(text: &str) -> Json {
    Json::String(text.into())
}

fn key(text: &str) -> Json {
    Json::Key(text.into())
}

#[test]
fn test_document_events() {
    let events = parse(br#"{"a": [1, -2.5e3, "x"], "b": {"c": null}, "d": true}"#).unwrap();
    assert_eq!(
        events,
        vec![
            Json::ObjectStart,
            key("a"),
            Json::ArrayStart,
            Json::Number(1.0),
            Json::Number(-2500.0),
            string("x"),
            Json::ArrayEnd,
            key("b"),
            Json::ObjectStart,
            key("c"),
            Json::Null,
            Json::ObjectEnd,
            key("d"),
            Json::Bool(true),
            Json::ObjectEnd,
        ]
    );
}

#[test]
fn test_escapes_and_surrogates() {
    let events = parse(r#"["tab\there", "é€", "😀", "\/\\\""]"#.as_bytes()).unwrap();
    assert_eq!(
        events[1..5],
        [
            string("tab\there"),
            string("\u{e9}\u{20ac}"),
            string("\u{1F600}"),
            string("/\\\""),
        ]
    );
}

#[test]
fn test_borrowed_and_unescaped() {
    let mut parser = JsonParser::new();
    let input = br#"["plain", "esc\naped"]"#;
    assert_eq!(parser.next(input, true), Ok(Step::Ready(1, JsonEvent::ArrayStart)));

    let rest = &input[1..];
    match parser.next(rest, true).unwrap() {
        Step::Ready(n, JsonEvent::String(JsonStr::Borrowed(s))) => {
            assert_eq!(s, "plain");
            assert_eq!(n, 7);
        }
        step => panic!("unexpected {step:?}"),
    }

    let rest = &rest[7..];
    match parser.next(rest, true).unwrap() {
        Step::Ready(_, JsonEvent::String(JsonStr::Unescaped(s))) => assert_eq!(s, "esc\naped"),
        step => panic!("unexpected {step:?}"),
    }
    assert_eq!(parser.steal_string().unwrap(), "esc\naped");
}

#[test]
fn test_escape_split_across_reads() {
    let input = r#""😀 and \n""#.as_bytes();
    for split in 1..input.len() {
        let run = drive(&mut JsonParser::new(), input, &[split]).unwrap();
        assert_eq!(run.events, vec![string("\u{1F600} and \n")], "split {split}");
    }
}

#[test]
fn test_nesting_limit() {
    let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
    assert_eq!(parse(ok.as_bytes()).unwrap().len(), 2 * MAX_DEPTH);

    let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
    assert_eq!(parse(deep.as_bytes()), Err(ParseError::Stack));

    let mixed = "{\"k\":".repeat(MAX_DEPTH + 1);
    assert_eq!(parse(mixed.as_bytes()), Err(ParseError::Stack));
}

#[test]
fn test_string_limit() {
    let config = JsonConfig::default().with_max_string(8);
    let fits = br#"["12345678"]"#;
    let run = drive_whole(&mut JsonParser::with_config(config), fits).unwrap();
    assert_eq!(run.events[1], string("12345678"));

    let over = br#"["123456789"]"#;
    for size in [1, 4, usize::MAX] {
        let result = drive(&mut JsonParser::with_config(config), over, &[size]);
        assert_eq!(result, Err(ParseError::Size), "size {size}");
    }

    // fails as soon as the ninth content byte is visible, before the closing quote
    let mut parser = JsonParser::with_config(config);
    assert_eq!(parser.next(b"\"12345678", false), Ok(Step::Pending));
    assert_eq!(parser.next(b"\"123456789", false), Err(ParseError::Size));
}

#[test]
fn test_number_limit() {
    let long = format!("[{}]", "1".repeat(512));
    assert_eq!(parse(long.as_bytes()), Err(ParseError::Size));
    let fits = format!("[{}]", "1".repeat(511));
    assert!(parse(fits.as_bytes()).is_ok());
}

#[test]
fn test_strict_rejects_bad_utf8_early() {
    let input = b"[\"ab\xff";
    let mut strict = JsonParser::with_config(JsonConfig::default().with_strict(true));
    assert_eq!(strict.next(input, false), Ok(Step::Ready(1, JsonEvent::ArrayStart)));
    assert_eq!(strict.next(&input[1..], false), Err(ParseError::Encoding));

    let mut lenient = JsonParser::new();
    assert_eq!(lenient.next(input, false), Ok(Step::Ready(1, JsonEvent::ArrayStart)));
    assert_eq!(lenient.next(&input[1..], false), Ok(Step::Pending));
    let closed = b"\"ab\xff\"]";
    assert_eq!(lenient.next(closed, false), Err(ParseError::Encoding));
}

#[test]
fn test_errors_are_terminal() {
    let mut parser = JsonParser::new();
    assert_eq!(parser.next(b"[1 2]", true), Ok(Step::Ready(1, JsonEvent::ArrayStart)));
    assert_eq!(parser.next(b"1 2]", true), Ok(Step::Ready(1, JsonEvent::Number(1.0))));
    assert_eq!(parser.next(b" 2]", true), Err(ParseError::Syntax));
    assert!(parser.is_done());
    assert_eq!(parser.next(b"]", true), Err(ParseError::Syntax));
    assert_eq!(parser.last_error(), Some(ParseError::Syntax));

    parser.reset();
    assert_eq!(parser.next(b"null", true), Ok(Step::Ready(4, JsonEvent::Null)));
    assert_eq!(parser.next(b"null", true), Err(ParseError::State));
    assert_eq!(parser.last_error(), None);
}

macro_rules! malformed {
    ($($name:ident: $input:expr => $err:ident,)*) => {
        $(
            paste::paste! {
                #[test]
                fn [<test_malformed_ $name>]() {
                    let result = parse($input);
                    assert_eq!(result, Err(ParseError::$err), "input {:?}", $input);
                }
            }
        )*
    };
}

malformed! {
    empty: b"" => Syntax,
    only_whitespace: b" \n\t" => Syntax,
    trailing_comma_array: b"[1,]" => Syntax,
    trailing_comma_object: br#"{"a":1,}"# => Syntax,
    missing_colon: br#"{"a" 1}"# => Syntax,
    missing_comma: b"[1 2]" => Syntax,
    numeric_key: b"{1:2}" => Syntax,
    mismatched_close: b"[1}" => Syntax,
    unterminated_string: br#"["abc"# => Syntax,
    unterminated_array: b"[1, 2" => Syntax,
    control_in_string: b"[\"a\x01\"]" => Syntax,
    bad_literal: b"[nul]" => Syntax,
    bad_number: b"[1e]" => Syntax,
    bad_escape: br#"["\x"]"# => Escape,
    short_unicode_escape: br#"["\u12"]"# => Escape,
    lone_high_surrogate: br#"["\uD800"]"# => Surrogate,
    lone_low_surrogate: br#"["\uDC00"]"# => Surrogate,
    invalid_utf8: b"[\"\xc3\x28\"]" => Encoding,
}
