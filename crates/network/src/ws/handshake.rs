// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! HTTP -> WebSocket upgrade.
//!
//! The request is accepted as soon as it carries a `Sec-WebSocket-Key`;
//! method, `Upgrade`, `Connection`, `Host` and `Sec-WebSocket-Version` are
//! not checked.

use std::collections::HashMap;

use base64::{Engine, prelude::BASE64_STANDARD};
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

/// RFC 6455 GUID appended to the client key.
const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const KEY_HEADER: &str = "sec-websocket-key";

/// Offset just past the `\r\n\r\n` that terminates the request head.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
	let pattern = b"\r\n\r\n";
	buf.windows(4).position(|w| w == pattern).map(|i| i + 4)
}

/// Collects `Name: Value` lines into a map keyed by lower-cased name.
///
/// Lines that do not have that shape, the request line included, are skipped.
pub fn parse_headers(raw: &str) -> HashMap<String, String> {
	raw.split("\r\n").filter_map(|line| split_header(line.trim())).collect()
}

fn split_header(line: &str) -> Option<(String, String)> {
	let end = line.find(char::is_whitespace)?;
	let name = line[..end].strip_suffix(':')?;
	if name.is_empty() || !line[end..].starts_with(' ') {
		return None;
	}
	Some((name.to_ascii_lowercase(), line[end + 1..].to_string()))
}

/// `base64(sha1(key ++ GUID))`
pub fn compute_accept_key(key: &str) -> String {
	let mut sha1 = Sha1::new();
	sha1.update(key.as_bytes());
	sha1.update(GUID.as_bytes());
	BASE64_STANDARD.encode(sha1.finalize())
}

/// Builds the `101 Switching Protocols` answer to the request head in `raw`.
pub fn build_response(raw: &[u8]) -> Result<Vec<u8>, HandshakeError> {
	let request = String::from_utf8_lossy(raw);
	let headers = parse_headers(&request);

	let key = headers.get(KEY_HEADER).ok_or(HandshakeError::MissingKey)?;
	let accept = compute_accept_key(key);

	let response = format!(
		"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
		accept
	);
	Ok(response.into_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;

	const REQUEST: &str = "GET /chat HTTP/1.1\r\n\
		Host: server.example.com\r\n\
		Upgrade: websocket\r\n\
		Connection: Upgrade\r\n\
		Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
		Sec-WebSocket-Version: 13\r\n\r\n";

	#[test]
	fn test_accept_key_rfc_vector() {
		assert_eq!(compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
	}

	#[test]
	fn test_build_response() {
		let response = build_response(REQUEST.as_bytes()).unwrap();
		assert_eq!(
			String::from_utf8(response).unwrap(),
			"HTTP/1.1 101 Switching Protocols\r\n\
			 Upgrade: websocket\r\n\
			 Connection: Upgrade\r\n\
			 Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
		);
	}

	#[test]
	fn test_missing_key() {
		let request = "GET / HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\r\n";
		assert_eq!(build_response(request.as_bytes()), Err(HandshakeError::MissingKey));
	}

	#[test]
	fn test_key_alone_is_enough() {
		let request = "garbage line\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
		assert!(build_response(request.as_bytes()).is_ok());
	}

	#[test]
	fn test_header_names_are_case_insensitive() {
		let request = "GET / HTTP/1.1\r\nsec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
		let response = String::from_utf8(build_response(request.as_bytes()).unwrap()).unwrap();
		assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
	}

	#[test]
	fn test_parse_headers_skips_unmatched_lines() {
		let headers = parse_headers("GET / HTTP/1.1\r\nHost: example.com:8080\r\nNoColon\r\nBad:value\r\n: empty\r\n");
		assert_eq!(headers.len(), 1);
		assert_eq!(headers.get("host").map(String::as_str), Some("example.com:8080"));
	}

	#[test]
	fn test_parse_headers_trims_lines() {
		let headers = parse_headers("  Upgrade: websocket  \r\n");
		assert_eq!(headers.get("upgrade").map(String::as_str), Some("websocket"));
	}

	#[test]
	fn test_find_header_end() {
		assert_eq!(find_header_end(REQUEST.as_bytes()), Some(REQUEST.len()));
		assert_eq!(find_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);

		let mut with_body = REQUEST.as_bytes().to_vec();
		with_body.extend_from_slice(&[0x81, 0x80]);
		assert_eq!(find_header_end(&with_body), Some(REQUEST.len()));
	}
}
