//! Unit tests for the newline-delimited JSON codec.
//!
//! Tests size clamping, line splitting across partial reads, oversized line
//! recovery, and EOF handling.

use bytes::BytesMut;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;

use super::*;
use crate::message::{Payload, Request, Response};

fn decode_all(codec: &mut JsonLineCodec, buf: &mut BytesMut) -> Vec<DecodedLine> {
    let mut lines = Vec::new();
    while let Some(line) = codec.decode(buf).expect("decode should not fail") {
        lines.push(line);
    }
    lines
}

#[rstest]
#[case(1, MIN_MESSAGE_SIZE)]
#[case(MIN_MESSAGE_SIZE, MIN_MESSAGE_SIZE)]
#[case(4096, 4096)]
#[case(MAX_MESSAGE_SIZE + 1, MAX_MESSAGE_SIZE)]
fn codec_clamps_max_message_size(#[case] requested: usize, #[case] expected: usize) {
    assert_eq!(JsonLineCodec::new(requested).max_message_size(), expected);
}

#[test]
fn encode_appends_single_newline() {
    let frame = encode(&Request::new("ping", Payload::none())).expect("encode");
    assert_eq!(frame.as_ref(), b"{\"type\":\"ping\"}\n");
}

#[test]
fn decode_waits_for_terminator() {
    let mut codec = JsonLineCodec::default();
    let mut buf = BytesMut::from(&b"{\"type\":"[..]);
    assert!(codec.decode(&mut buf).expect("decode").is_none());

    buf.extend_from_slice(b"\"ping\"}\n");
    let line = codec
        .decode(&mut buf)
        .expect("decode")
        .expect("complete line")
        .expect("line within limit");
    assert_eq!(line.as_ref(), b"{\"type\":\"ping\"}");
    assert!(buf.is_empty());
}

#[test]
fn decode_splits_multiple_lines_in_one_read() {
    let mut codec = JsonLineCodec::default();
    let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}\n{\"c\""[..]);
    let lines = decode_all(&mut codec, &mut buf);
    assert_eq!(lines.len(), 2);
    assert_eq!(buf.as_ref(), b"{\"c\"");
}

#[test]
fn oversized_line_is_reported_and_framing_recovers() {
    let mut codec = JsonLineCodec::new(MIN_MESSAGE_SIZE);
    let big = "x".repeat(MIN_MESSAGE_SIZE * 3);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(big.as_bytes());

    // Nothing is yielded until the newline arrives, and nothing is buffered.
    assert!(codec.decode(&mut buf).expect("decode").is_none());
    assert!(buf.is_empty());

    buf.extend_from_slice(b"yy\n{\"type\":\"ping\"}\n");
    let lines = decode_all(&mut codec, &mut buf);
    assert_eq!(
        lines,
        vec![
            Err(FramingError::MessageTooLarge {
                size: MIN_MESSAGE_SIZE * 3 + 2,
                max: MIN_MESSAGE_SIZE,
            }),
            Ok(Bytes::from_static(b"{\"type\":\"ping\"}")),
        ]
    );
}

#[test]
fn oversized_complete_line_is_rejected_before_parse() {
    let mut codec = JsonLineCodec::new(MIN_MESSAGE_SIZE);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[b'{'; MIN_MESSAGE_SIZE + 1]);
    buf.extend_from_slice(b"\n");
    let line = codec
        .decode(&mut buf)
        .expect("decode")
        .expect("complete line");
    assert_eq!(
        line,
        Err(FramingError::MessageTooLarge {
            size: MIN_MESSAGE_SIZE + 1,
            max: MIN_MESSAGE_SIZE,
        })
    );
}

#[test]
fn line_at_exact_limit_is_accepted() {
    let mut codec = JsonLineCodec::new(MIN_MESSAGE_SIZE);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[b' '; MIN_MESSAGE_SIZE]);
    buf.extend_from_slice(b"\n");
    let line = codec
        .decode(&mut buf)
        .expect("decode")
        .expect("complete line");
    assert!(line.is_ok());
}

#[test]
fn decode_eof_with_empty_buffer_returns_none() {
    let mut codec = JsonLineCodec::default();
    let mut buf = BytesMut::new();
    let result = codec.decode_eof(&mut buf);
    assert!(
        matches!(result, Ok(None)),
        "clean close should return Ok(None), got {result:?}"
    );
}

#[test]
fn decode_eof_mid_line_reports_partial_bytes() {
    let mut codec = JsonLineCodec::default();
    let mut buf = BytesMut::from(&b"{\"type\""[..]);
    let err = codec.decode_eof(&mut buf).expect_err("partial line at EOF");
    assert!(matches!(
        err,
        CodecError::Eof(EofError::MidLine { bytes_received: 7 })
    ));
}

#[test]
fn decode_message_rejects_invalid_json() {
    let err = decode_message::<Request>(b"not json").expect_err("invalid json");
    assert!(matches!(err, CodecError::MalformedMessage(_)));
}

#[test]
fn decode_message_requires_type_field() {
    let err = decode_message::<Request>(b"{\"payload\":{}}").expect_err("missing type");
    assert!(matches!(err, CodecError::MalformedMessage(_)));
}

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        ".*".prop_map(serde_json::Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z\\n\"]{0,6}", inner, 0..4)
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn requests_and_responses_survive_framing(
        request_type in "[a-z_\\n]{1,16}",
        payload in json_value(),
        data in json_value(),
        message in ".+",
    ) {
        let request = Request::new(
            request_type,
            Payload::from_value(&payload).expect("payload serializes"),
        );
        let responses = [Response::success(data), Response::failure(message)];

        let mut buf = BytesMut::new();
        let mut codec = JsonLineCodec::new(MAX_MESSAGE_SIZE);
        codec.encode(&request, &mut buf).expect("encode request");
        for response in &responses {
            codec.encode(response, &mut buf).expect("encode response");
        }

        let lines = decode_all(&mut codec, &mut buf);
        prop_assert_eq!(lines.len(), 3);
        let decoded: Request =
            decode_message(lines[0].as_ref().expect("request line")).expect("request parses");
        prop_assert_eq!(decoded, request);
        for (line, expected) in lines[1..].iter().zip(&responses) {
            let decoded: Response =
                decode_message(line.as_ref().expect("response line")).expect("response parses");
            prop_assert_eq!(&decoded, expected);
        }
    }
}

#[test]
fn null_payload_is_omitted_on_the_wire() {
    let request = Request::new("list_schools", Payload::from_value(&json!(null)).expect("null"));
    let frame = encode(&request).expect("encode");
    assert_eq!(frame.as_ref(), b"{\"type\":\"list_schools\"}\n");

    let decoded: Request =
        decode_message(b"{\"type\":\"list_schools\",\"payload\":null}").expect("parse");
    assert!(decoded.payload().is_empty());
}
