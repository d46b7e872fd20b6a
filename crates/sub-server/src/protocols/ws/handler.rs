// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::io::{self, Read};

use mio::Token;
use wsrelay_network::{HandshakeError, build_response, decode, find_header_end, parse_header};

use super::{
	broadcast::{broadcast, disconnect, reply},
	message::{MessageError, Notice, parse_message},
};
use crate::{
	config::ServerConfig,
	core::{ConnectionState, Registry},
	error::{ProtocolError, ProtocolResult},
};

/// Drives a connection through the upgrade and routes its frames.
#[derive(Clone, Debug)]
pub struct WebSocketHandler {
	max_buffer_size: usize,
	max_handshake_bytes: usize,
	max_discard_bytes: usize,
}

impl WebSocketHandler {
	pub fn new(config: &ServerConfig) -> Self {
		Self {
			max_buffer_size: config.max_buffer_size,
			max_handshake_bytes: config.max_handshake_bytes,
			max_discard_bytes: config.max_discard_bytes,
		}
	}

	pub fn handle_read(&self, registry: &mut Registry, token: Token) {
		let Some(state) = registry.get(token).map(|conn| conn.state()) else {
			return;
		};

		match state {
			ConnectionState::Connecting => match self.handle_handshake_read(registry, token) {
				Ok(true) => self.handle_ws_read(registry, token),
				Ok(false) => {}
				Err(e) => {
					tracing::warn!("Handshake with {:?} failed: {}", token, e);
					disconnect(registry, token);
				}
			},
			ConnectionState::Open => self.handle_ws_read(registry, token),
			ConnectionState::Closed => {}
		}
	}

	pub fn handle_write(&self, registry: &mut Registry, token: Token) {
		if let Err(e) = registry.flush(token) {
			tracing::debug!("Write to {:?} failed: {}", token, e);
		}
	}

	/// Reads the upgrade request. Returns `true` once the connection is open.
	fn handle_handshake_read(&self, registry: &mut Registry, token: Token) -> ProtocolResult<bool> {
		let conn = registry.get_mut(token).ok_or(ProtocolError::UnknownConnection)?;
		let mut buf = [0u8; 2048];

		let header_end = loop {
			match conn.stream().read(&mut buf) {
				Ok(0) => return Err(ProtocolError::ConnectionClosed),
				Ok(n) => {
					conn.buffer_mut().extend_from_slice(&buf[..n]);
					if let Some(end) = find_header_end(conn.buffer()) {
						break end;
					}
					if conn.buffer().len() > self.max_handshake_bytes {
						return Err(HandshakeError::HeaderTooLarge {
							limit: self.max_handshake_bytes,
						}
						.into());
					}
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(ProtocolError::Io(e)),
			}
		};

		let response = build_response(&conn.buffer()[..header_end])?;
		// Anything after the request head is already frame data
		conn.buffer_mut().drain(..header_end);
		let remote = conn.remote_ip();

		// Open only once the response is out
		registry.send(token, &response)?;
		if let Some(conn) = registry.get_mut(token) {
			conn.set_state(ConnectionState::Open);
		}
		tracing::info!("New connection from {}", remote);

		broadcast(registry, &Notice::connected(&remote));
		Ok(true)
	}

	/// Reads until the socket would block, routing every complete frame.
	fn handle_ws_read(&self, registry: &mut Registry, token: Token) {
		let mut buf = [0u8; 8192];
		let mut closed = false;

		if let Err(e) = self.process_frames(registry, token) {
			self.protocol_violation(registry, token, e);
			return;
		}

		loop {
			let Some(conn) = registry.get_mut(token) else {
				return;
			};

			match conn.stream().read(&mut buf) {
				Ok(0) => {
					closed = true;
					break;
				}
				Ok(n) => {
					conn.buffer_mut().extend_from_slice(&buf[..n]);
					if let Err(e) = self.process_frames(registry, token) {
						self.protocol_violation(registry, token, e);
						return;
					}
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					tracing::debug!("Read from {:?} failed: {}", token, e);
					closed = true;
					break;
				}
			}
		}

		if closed {
			disconnect(registry, token);
		}
	}

	/// Consumes complete frames from the connection buffer.
	fn process_frames(&self, registry: &mut Registry, token: Token) -> ProtocolResult<()> {
		loop {
			let conn = registry.get_mut(token).ok_or(ProtocolError::UnknownConnection)?;

			if conn.discard() > 0 && conn.skip_discarded() > 0 {
				return Ok(());
			}

			let Some(header) = parse_header(conn.buffer())? else {
				return Ok(());
			};

			let frame_len = header.frame_len();
			if frame_len > self.max_buffer_size {
				let oversized = MessageError::OversizedMessage {
					limit: self.max_buffer_size,
				};

				if frame_len > self.max_discard_bytes {
					reply(registry, token, &oversized);
					return Err(ProtocolError::FrameTooLarge(frame_len));
				}

				conn.set_discard(frame_len);
				tracing::debug!("Frame of {} bytes from {:?} exceeds buffer limit", frame_len, token);
				reply(registry, token, &oversized);
				continue;
			}

			if conn.buffer().len() < frame_len {
				return Ok(());
			}

			let raw: Vec<u8> = conn.buffer_mut().drain(..frame_len).collect();
			let payload = decode(&raw)?;
			self.route(registry, token, &payload);
		}
	}

	fn route(&self, registry: &mut Registry, token: Token, payload: &[u8]) {
		match parse_message(payload) {
			Ok(message) => {
				tracing::debug!("Message from {}: {}", message.name, message.message);
				broadcast(registry, &Notice::user(&message));
			}
			Err(e) => {
				tracing::debug!("Rejected message from {:?}: {}", token, e);
				reply(registry, token, &e);
			}
		}
	}

	fn protocol_violation(&self, registry: &mut Registry, token: Token, error: ProtocolError) {
		match error {
			ProtocolError::UnknownConnection => {}
			e => {
				tracing::warn!("Closing {:?}: {}", token, e);
				disconnect(registry, token);
			}
		}
	}
}
