// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::VecDeque,
	io::{self, Write},
	net::SocketAddr,
};

use mio::{Token, net::TcpStream};

use crate::error::{ProtocolError, ProtocolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// Accepted, upgrade request not yet answered.
	Connecting,
	Open,
	Closed,
}

pub struct Connection {
	stream: TcpStream,
	peer: SocketAddr,
	token: Token,
	state: ConnectionState,
	/// Request head while connecting, unread frame bytes once open.
	buffer: Vec<u8>,
	/// Bytes of a rejected oversized frame still to be skipped.
	discard: usize,
	/// Set when a write failed; the worker disconnects it after the iteration.
	failed: bool,
	outbox: VecDeque<Vec<u8>>,
	outbox_bytes: usize,
	max_outbox_bytes: usize,
	/// Whether the stream is currently registered for writable readiness.
	write_interest: bool,
}

impl Connection {
	pub fn new(stream: TcpStream, peer: SocketAddr, token: Token, max_outbox_bytes: usize) -> Self {
		Self {
			stream,
			peer,
			token,
			state: ConnectionState::Connecting,
			buffer: Vec::with_capacity(1024),
			discard: 0,
			failed: false,
			outbox: VecDeque::new(),
			outbox_bytes: 0,
			max_outbox_bytes,
			write_interest: false,
		}
	}

	pub fn token(&self) -> Token {
		self.token
	}

	pub fn peer(&self) -> SocketAddr {
		self.peer
	}

	/// Address used in system notices.
	pub fn remote_ip(&self) -> String {
		self.peer.ip().to_string()
	}

	pub fn state(&self) -> ConnectionState {
		self.state
	}

	pub fn set_state(&mut self, state: ConnectionState) {
		self.state = state;
	}

	pub fn is_open(&self) -> bool {
		self.state == ConnectionState::Open
	}

	pub fn stream(&mut self) -> &mut TcpStream {
		&mut self.stream
	}

	pub fn buffer(&self) -> &[u8] {
		&self.buffer
	}

	pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
		&mut self.buffer
	}

	pub fn discard(&self) -> usize {
		self.discard
	}

	pub fn set_discard(&mut self, discard: usize) {
		self.discard = discard;
	}

	/// Drops up to `discard` buffered bytes and returns how many remain to skip.
	pub fn skip_discarded(&mut self) -> usize {
		let n = self.discard.min(self.buffer.len());
		self.buffer.drain(..n);
		self.discard -= n;
		self.discard
	}

	pub fn is_failed(&self) -> bool {
		self.failed
	}

	pub fn mark_failed(&mut self) {
		self.failed = true;
	}

	pub fn has_pending_writes(&self) -> bool {
		!self.outbox.is_empty()
	}

	pub fn outbox_bytes(&self) -> usize {
		self.outbox_bytes
	}

	pub(crate) fn write_interest(&self) -> bool {
		self.write_interest
	}

	pub(crate) fn set_write_interest(&mut self, write_interest: bool) {
		self.write_interest = write_interest;
	}

	/// Writes `frame` now if nothing is queued ahead of it, queueing whatever
	/// the socket does not take.
	pub fn enqueue(&mut self, frame: &[u8]) -> ProtocolResult<()> {
		if self.state == ConnectionState::Closed {
			return Err(ProtocolError::ConnectionClosed);
		}

		let mut rest = frame;
		if self.outbox.is_empty() {
			let written = write_some(&mut self.stream, rest)?;
			rest = &rest[written..];
			if rest.is_empty() {
				return Ok(());
			}
		}

		if self.outbox_bytes + rest.len() > self.max_outbox_bytes {
			return Err(ProtocolError::BufferOverflow);
		}

		self.outbox_bytes += rest.len();
		self.outbox.push_back(rest.to_vec());
		Ok(())
	}

	/// Writes queued frames until the socket would block.
	pub fn flush(&mut self) -> ProtocolResult<()> {
		while let Some(front) = self.outbox.front_mut() {
			let written = write_some(&mut self.stream, front)?;
			self.outbox_bytes = self.outbox_bytes.saturating_sub(written);

			if written == front.len() {
				self.outbox.pop_front();
			} else {
				front.drain(..written);
				break;
			}
		}
		Ok(())
	}
}

fn write_some(stream: &mut TcpStream, data: &[u8]) -> ProtocolResult<usize> {
	let mut written = 0;
	while written < data.len() {
		match stream.write(&data[written..]) {
			Ok(0) => return Err(ProtocolError::ConnectionClosed),
			Ok(n) => written += n,
			Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
			Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(ProtocolError::Io(e)),
		}
	}
	Ok(written)
}
