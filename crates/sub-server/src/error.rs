// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::io;

use thiserror::Error;
use wsrelay_network::{FrameError, HandshakeError};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Per-connection failure. Every variant ends with the connection closed.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("handshake failed: {0}")]
	Handshake(#[from] HandshakeError),

	#[error("invalid frame: {0}")]
	Frame(#[from] FrameError),

	#[error("connection closed by peer")]
	ConnectionClosed,

	#[error("declared frame of {0} bytes is too large to skip")]
	FrameTooLarge(usize),

	#[error("outbound buffer overflow")]
	BufferOverflow,

	#[error("unknown connection")]
	UnknownConnection,
}

/// Failure that prevents the server from running.
#[derive(Debug, Error)]
pub enum ServerError {
	#[error("invalid bind address {addr}: {source}")]
	InvalidAddress {
		addr: String,
		#[source]
		source: io::Error,
	},

	#[error("bind address {0} did not resolve")]
	Unresolved(String),

	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: io::Error,
	},

	#[error("failed to set up poller: {0}")]
	Poll(#[source] io::Error),

	#[error("failed to spawn worker thread: {0}")]
	Spawn(#[source] io::Error),
}
