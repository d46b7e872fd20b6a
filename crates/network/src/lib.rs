// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Wire-level building blocks for the wsrelay server.
//!
//! Nothing in this crate touches a socket. [`ws::frame`] turns payloads into
//! RFC 6455 frames and back, [`ws::handshake`] turns an HTTP upgrade request
//! into the `101 Switching Protocols` response.

pub mod error;
pub mod ws;

pub use error::{FrameError, HandshakeError};
pub use ws::{
	frame::{FrameHeader, apply_mask, decode, encode, parse_header},
	handshake::{build_response, compute_accept_key, find_header_end, parse_headers},
};
