// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Set of live client connections owned by the worker.
//!
//! Connections live in a slab; the slab key plus [`TOKEN_BASE`] is the mio
//! token the stream is registered under. The listening socket is not stored
//! here, it is recognised by the reserved [`LISTENER`] token.

use std::{io, net::SocketAddr};

use mio::{Interest, Token, net::TcpStream};
use slab::Slab;

use super::{Connection, ConnectionState};
use crate::error::{ProtocolError, ProtocolResult};

pub const LISTENER: Token = Token(0);
pub const WAKE_TOKEN: Token = Token(1);
pub const TOKEN_BASE: usize = 2;

pub struct Registry {
	poll: mio::Registry,
	connections: Slab<Connection>,
	max_outbox_bytes: usize,
}

impl Registry {
	pub fn new(poll: mio::Registry, max_outbox_bytes: usize) -> Self {
		Self {
			poll,
			connections: Slab::new(),
			max_outbox_bytes,
		}
	}

	/// Registers `stream` for readable readiness and stores it as connecting.
	pub fn add(&mut self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<Token> {
		let entry = self.connections.vacant_entry();
		let token = Token(TOKEN_BASE + entry.key());

		self.poll.register(&mut stream, token, Interest::READABLE)?;

		entry.insert(Connection::new(stream, peer, token, self.max_outbox_bytes));
		Ok(token)
	}

	/// Removes the connection; dropping the returned value closes its socket.
	///
	/// Removing an unknown token is a no-op.
	pub fn remove(&mut self, token: Token) -> Option<Connection> {
		let key = Self::key(token)?;
		let mut conn = self.connections.try_remove(key)?;

		if let Err(e) = self.poll.deregister(conn.stream()) {
			tracing::debug!("Failed to deregister connection {:?}: {}", token, e);
		}
		conn.set_state(ConnectionState::Closed);
		Some(conn)
	}

	pub fn is_listener(&self, token: Token) -> bool {
		token == LISTENER
	}

	pub fn contains(&self, token: Token) -> bool {
		Self::key(token).is_some_and(|key| self.connections.contains(key))
	}

	pub fn get(&self, token: Token) -> Option<&Connection> {
		self.connections.get(Self::key(token)?)
	}

	pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
		self.connections.get_mut(Self::key(token)?)
	}

	/// Snapshot of every client connection.
	pub fn all(&self) -> Vec<Token> {
		self.connections.iter().map(|(_, conn)| conn.token()).collect()
	}

	/// Snapshot of the connections that take part in broadcasts.
	pub fn open(&self) -> Vec<Token> {
		self.connections
			.iter()
			.filter(|(_, conn)| conn.is_open() && !conn.is_failed())
			.map(|(_, conn)| conn.token())
			.collect()
	}

	/// Connections whose last write failed.
	pub fn failed(&self) -> Vec<Token> {
		self.connections.iter().filter(|(_, conn)| conn.is_failed()).map(|(_, conn)| conn.token()).collect()
	}

	pub fn len(&self) -> usize {
		self.connections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.connections.is_empty()
	}

	pub fn open_count(&self) -> usize {
		self.connections.iter().filter(|(_, conn)| conn.is_open()).count()
	}

	/// Writes `frame` to the connection. On failure the connection is marked
	/// failed and skipped by later broadcasts.
	pub fn send(&mut self, token: Token, frame: &[u8]) -> ProtocolResult<()> {
		let key = Self::key(token).ok_or(ProtocolError::UnknownConnection)?;
		let conn = self.connections.get_mut(key).ok_or(ProtocolError::UnknownConnection)?;

		let result = conn.enqueue(frame).and_then(|_| Self::update_interest(&self.poll, conn));
		if result.is_err() {
			conn.mark_failed();
		}
		result
	}

	/// Drains queued frames after writable readiness.
	pub fn flush(&mut self, token: Token) -> ProtocolResult<()> {
		let key = Self::key(token).ok_or(ProtocolError::UnknownConnection)?;
		let conn = self.connections.get_mut(key).ok_or(ProtocolError::UnknownConnection)?;

		let result = conn.flush().and_then(|_| Self::update_interest(&self.poll, conn));
		if result.is_err() {
			conn.mark_failed();
		}
		result
	}

	fn update_interest(poll: &mio::Registry, conn: &mut Connection) -> ProtocolResult<()> {
		let wanted = conn.has_pending_writes();
		if wanted == conn.write_interest() {
			return Ok(());
		}

		let interest = if wanted {
			Interest::READABLE | Interest::WRITABLE
		} else {
			Interest::READABLE
		};
		let token = conn.token();
		poll.reregister(conn.stream(), token, interest)?;
		conn.set_write_interest(wanted);
		Ok(())
	}

	fn key(token: Token) -> Option<usize> {
		token.0.checked_sub(TOKEN_BASE)
	}
}
