// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use thiserror::Error;

/// Failure to decode an inbound client frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
	#[error("frame truncated: expected {expected} bytes, got {actual}")]
	Truncated {
		expected: usize,
		actual: usize,
	},

	#[error("client frame is not masked")]
	Unmasked,

	#[error("frame payload length {0} exceeds addressable memory")]
	TooLarge(u64),
}

/// Failure to answer an HTTP upgrade request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
	#[error("missing Sec-WebSocket-Key header")]
	MissingKey,

	#[error("handshake request exceeds {limit} bytes")]
	HeaderTooLarge {
		limit: usize,
	},
}
