// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	io,
	net::SocketAddr,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use mio::{
	Events, Interest, Poll,
	event::Event,
	net::{TcpListener, TcpStream},
};

use super::{
	Registry,
	registry::{LISTENER, WAKE_TOKEN},
};
use crate::{
	config::ServerConfig,
	error::ServerError,
	protocols::ws::{WebSocketHandler, disconnect},
};

/// Single-threaded readiness loop owning the listener and every connection.
pub struct Worker {
	poll: Poll,
	listener: TcpListener,
	config: ServerConfig,
	shutdown: Arc<AtomicBool>,
	active_connections: Arc<AtomicUsize>,
	handler: WebSocketHandler,
}

impl Worker {
	pub fn new(
		poll: Poll,
		std_listener: std::net::TcpListener,
		config: ServerConfig,
		shutdown: Arc<AtomicBool>,
		active_connections: Arc<AtomicUsize>,
	) -> Self {
		let listener = TcpListener::from_std(std_listener);
		let handler = WebSocketHandler::new(&config);

		Self {
			poll,
			listener,
			config,
			shutdown,
			active_connections,
			handler,
		}
	}

	/// Runs until the shutdown flag is raised.
	pub fn run(&mut self) -> Result<(), ServerError> {
		let mut events = Events::with_capacity(self.config.network.events_capacity);

		self.poll.registry().register(&mut self.listener, LISTENER, Interest::READABLE).map_err(ServerError::Poll)?;

		let mut registry =
			Registry::new(self.poll.registry().try_clone().map_err(ServerError::Poll)?, self.config.network.max_outbox_bytes);

		loop {
			if self.shutdown.load(Ordering::Relaxed) {
				break;
			}

			if let Err(e) = self.poll.poll(&mut events, Some(self.config.poll_timeout)) {
				if e.kind() == io::ErrorKind::Interrupted {
					continue;
				}
				tracing::warn!("Poll error: {}", e);
				continue;
			}

			if events.is_empty() {
				tracing::trace!("No readiness within {:?}", self.config.poll_timeout);
				continue;
			}

			for event in events.iter() {
				match event.token() {
					LISTENER => self.handle_accept(&mut registry),
					WAKE_TOKEN => {
						// woken for shutdown, checked at the top of the loop
					}
					_ => self.handle_connection_event(&mut registry, event),
				}
			}

			Self::reap_failed(&mut registry);
			self.active_connections.store(registry.open_count(), Ordering::Relaxed);
		}

		// Clean up connections on shutdown
		for token in registry.all() {
			registry.remove(token);
		}
		self.active_connections.store(0, Ordering::Relaxed);

		Ok(())
	}

	fn handle_accept(&mut self, registry: &mut Registry) {
		loop {
			match self.listener.accept() {
				Ok((stream, peer)) => {
					if let Err(e) = self.on_accept(registry, stream, peer) {
						tracing::warn!("Failed to register connection from {}: {}", peer, e);
					}
				}
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					tracing::warn!("Unable to accept new connection: {}", e);
					break;
				}
			}
		}
	}

	fn on_accept(&self, registry: &mut Registry, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
		stream.set_nodelay(self.config.network.nodelay)?;
		let token = registry.add(stream, peer)?;
		tracing::debug!("Accepted {} as {:?}", peer, token);
		Ok(())
	}

	fn handle_connection_event(&self, registry: &mut Registry, event: &Event) {
		let token = event.token();

		if event.is_readable() || event.is_read_closed() || event.is_error() {
			self.handler.handle_read(registry, token);
		}

		if event.is_writable() && registry.contains(token) {
			self.handler.handle_write(registry, token);
		}
	}

	/// Disconnects every connection a write failed on. Each disconnect
	/// broadcasts, which may fail further connections, so repeat until none
	/// are left.
	fn reap_failed(registry: &mut Registry) {
		loop {
			let failed = registry.failed();
			if failed.is_empty() {
				break;
			}
			for token in failed {
				disconnect(registry, token);
			}
		}
	}
}
