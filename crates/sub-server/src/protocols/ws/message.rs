// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! JSON envelopes exchanged with chat clients.
//!
//! Inbound: `{"name": "...", "message": "..."}`.
//! Outbound: system notices, user messages and error replies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, error::Category};
use thiserror::Error;

/// A chat line sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
	pub name: String,
	pub message: String,
}

/// Frame payload broadcast to every open connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Notice {
	#[serde(rename = "system")]
	System {
		message: String,
	},
	#[serde(rename = "usermsg")]
	UserMessage {
		name: String,
		message: String,
	},
}

impl Notice {
	pub fn connected(remote: &str) -> Self {
		Notice::System {
			message: format!("{} connected", remote),
		}
	}

	pub fn disconnected(remote: &str) -> Self {
		Notice::System {
			message: format!("{} disconnected", remote),
		}
	}

	/// User message with both fields HTML-escaped.
	pub fn user(message: &ChatMessage) -> Self {
		Notice::UserMessage {
			name: escape_html(&message.name),
			message: escape_html(&message.message),
		}
	}
}

/// Error reply sent to the offending connection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
	pub error: String,
}

#[derive(Debug, Error)]
pub enum MessageError {
	#[error("Message size exceeds buffer limit of {limit} bytes.")]
	OversizedMessage {
		limit: usize,
	},

	#[error("Invalid JSON format")]
	InvalidJson(#[source] serde_json::Error),

	#[error("Invalid message format")]
	InvalidMessageFormat(#[source] serde_json::Error),
}

impl MessageError {
	pub fn reply(&self) -> ErrorReply {
		ErrorReply {
			error: self.to_string(),
		}
	}
}

/// Parses a decoded frame payload into a [`ChatMessage`].
///
/// Malformed JSON (invalid UTF-8 included) is [`MessageError::InvalidJson`];
/// well-formed JSON without string `name` and `message` fields is
/// [`MessageError::InvalidMessageFormat`].
pub fn parse_message(payload: &[u8]) -> Result<ChatMessage, MessageError> {
	// Going through a map keeps `["a", "b"]` from matching the struct positionally
	let object: Map<String, Value> = serde_json::from_slice(payload).map_err(|e| match e.classify() {
		Category::Data => MessageError::InvalidMessageFormat(e),
		Category::Io | Category::Syntax | Category::Eof => MessageError::InvalidJson(e),
	})?;
	ChatMessage::deserialize(Value::Object(object)).map_err(MessageError::InvalidMessageFormat)
}

/// Replaces `& < > " '` with HTML entities.
pub fn escape_html(input: &str) -> String {
	let mut escaped = String::with_capacity(input.len());
	for c in input.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#039;"),
			c => escaped.push(c),
		}
	}
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_message() {
		let message = parse_message(br#"{"name":"a","message":"hi"}"#).unwrap();
		assert_eq!(
			message,
			ChatMessage {
				name: "a".to_string(),
				message: "hi".to_string()
			}
		);
	}

	#[test]
	fn test_parse_message_ignores_extra_fields() {
		let message = parse_message(br#"{"name":"a","message":"hi","color":"red"}"#).unwrap();
		assert_eq!(message.name, "a");
	}

	#[test]
	fn test_invalid_json() {
		for payload in [&b"{not json"[..], b"", b"{\"name\":\"a\",", b"\xff\xfe", br#"{"name":"a","message":"b"} x"#] {
			assert!(
				matches!(parse_message(payload), Err(MessageError::InvalidJson(_))),
				"{:?}",
				String::from_utf8_lossy(payload)
			);
		}
	}

	#[test]
	fn test_invalid_message_format() {
		for payload in [
			&br#"{"name":"a"}"#[..],
			br#"{"message":"hi"}"#,
			br#"{}"#,
			br#"{"name":null,"message":"hi"}"#,
			br#"{"name":1,"message":"hi"}"#,
			br#""just a string""#,
			br#"[1,2]"#,
			br#"["a","b"]"#,
			b"null",
		] {
			assert!(
				matches!(parse_message(payload), Err(MessageError::InvalidMessageFormat(_))),
				"{:?}",
				String::from_utf8_lossy(payload)
			);
		}
	}

	#[test]
	fn test_error_replies() {
		let invalid_json = parse_message(b"{not json").unwrap_err();
		assert_eq!(serde_json::to_string(&invalid_json.reply()).unwrap(), r#"{"error":"Invalid JSON format"}"#);

		let invalid_format = parse_message(b"{}").unwrap_err();
		assert_eq!(
			serde_json::to_string(&invalid_format.reply()).unwrap(),
			r#"{"error":"Invalid message format"}"#
		);

		let oversized = MessageError::OversizedMessage {
			limit: 65535,
		};
		assert_eq!(
			serde_json::to_string(&oversized.reply()).unwrap(),
			r#"{"error":"Message size exceeds buffer limit of 65535 bytes."}"#
		);
	}

	#[test]
	fn test_notice_shapes() {
		assert_eq!(
			serde_json::to_string(&Notice::connected("127.0.0.1")).unwrap(),
			r#"{"type":"system","message":"127.0.0.1 connected"}"#
		);
		assert_eq!(
			serde_json::to_string(&Notice::disconnected("127.0.0.1")).unwrap(),
			r#"{"type":"system","message":"127.0.0.1 disconnected"}"#
		);

		let message = parse_message(br#"{"name":"a","message":"hi"}"#).unwrap();
		assert_eq!(
			serde_json::to_string(&Notice::user(&message)).unwrap(),
			r#"{"type":"usermsg","name":"a","message":"hi"}"#
		);
	}

	#[test]
	fn test_user_notice_is_escaped() {
		let message = parse_message(br#"{"name":"<b>bob</b>","message":"a & 'b' \"c\""}"#).unwrap();
		assert_eq!(
			Notice::user(&message),
			Notice::UserMessage {
				name: "&lt;b&gt;bob&lt;/b&gt;".to_string(),
				message: "a &amp; &#039;b&#039; &quot;c&quot;".to_string(),
			}
		);
	}

	#[test]
	fn test_escape_html_passthrough() {
		assert_eq!(escape_html("plain text ünïcode"), "plain text ünïcode");
		assert_eq!(escape_html(""), "");
	}
}
