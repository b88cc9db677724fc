// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format tests: length-prefix framing and JSON encoding.

use super::*;

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&serde_json::json!({"type": "probe"})).expect("encode failed");
    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(json_str.starts_with('{'), "should be JSON object: {}", json_str);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello cluster";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original).await.expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"frame data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(u32::MAX).to_be_bytes());
    buffer.extend_from_slice(b"junk");

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message(&mut cursor).await.expect_err("should reject oversized frame");
    assert!(matches!(err, ProtocolError::TooLarge(_)));
}

#[tokio::test]
async fn typed_frame_roundtrip() {
    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Ping {
        seq: u32,
    }

    let mut buffer = Vec::new();
    write_frame(&mut buffer, &Ping { seq: 7 }).await.expect("write failed");

    let mut cursor = std::io::Cursor::new(buffer);
    let back: Ping = read_frame(&mut cursor).await.expect("read failed");
    assert_eq!(back, Ping { seq: 7 });
}

#[tokio::test]
async fn truncated_message_is_an_io_error() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, b"complete message").await.expect("write failed");
    buffer.truncate(buffer.len() - 4);

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message(&mut cursor).await.expect_err("should fail on truncation");
    assert!(matches!(err, ProtocolError::Io(_)));
}
