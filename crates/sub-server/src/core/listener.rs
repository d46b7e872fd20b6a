// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	net::{SocketAddr, TcpListener, ToSocketAddrs},
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	thread::{self, JoinHandle},
};

use mio::{Poll, Waker};
use socket2::{Domain, Protocol, Socket, Type};

use super::{registry::WAKE_TOKEN, worker::Worker};
use crate::{
	config::{NetworkConfig, ServerConfig},
	error::ServerError,
};

/// Handle to a running server.
///
/// Dropping the handle stops the worker and closes every connection.
pub struct Listener {
	worker: Option<JoinHandle<Result<(), ServerError>>>,
	shutdown: Arc<AtomicBool>,
	waker: Waker,
	local_addr: SocketAddr,
	active_connections: Arc<AtomicUsize>,
}

impl Listener {
	/// Binds the listening socket and starts the worker thread.
	///
	/// Bind and poller failures are returned before any connection is served.
	pub fn start(config: ServerConfig) -> Result<Self, ServerError> {
		let addr = resolve(&config.bind_addr)?;

		let listener = Self::create_listener(addr, &config.network).map_err(|source| ServerError::Bind {
			addr: config.bind_addr.clone(),
			source,
		})?;
		let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
			addr: config.bind_addr.clone(),
			source,
		})?;

		let poll = Poll::new().map_err(ServerError::Poll)?;
		let waker = Waker::new(poll.registry(), WAKE_TOKEN).map_err(ServerError::Poll)?;

		let shutdown = Arc::new(AtomicBool::new(false));
		let active_connections = Arc::new(AtomicUsize::new(0));

		let mut worker =
			Worker::new(poll, listener, config, Arc::clone(&shutdown), Arc::clone(&active_connections));
		let handle = thread::Builder::new()
			.name("ws-worker".to_string())
			.spawn(move || worker.run())
			.map_err(ServerError::Spawn)?;

		tracing::info!("WebSocket server started on {}", local_addr);

		Ok(Self {
			worker: Some(handle),
			shutdown,
			waker,
			local_addr,
			active_connections,
		})
	}

	fn create_listener(addr: SocketAddr, network: &NetworkConfig) -> std::io::Result<TcpListener> {
		let domain = match addr {
			SocketAddr::V4(_) => Domain::IPV4,
			SocketAddr::V6(_) => Domain::IPV6,
		};

		let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
		if network.reuse_port {
			socket.set_reuse_port(true)?;
		}

		socket.set_reuse_address(true)?;
		socket.set_nonblocking(true)?;
		socket.bind(&addr.into())?;
		socket.listen(network.backlog)?;

		Ok(socket.into())
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Actual bound port, useful when binding to port 0.
	pub fn port(&self) -> u16 {
		self.local_addr.port()
	}

	/// Connections that completed the handshake and are still registered.
	pub fn active_connections(&self) -> usize {
		self.active_connections.load(Ordering::Relaxed)
	}

	/// Blocks until the worker exits.
	pub fn wait(mut self) -> Result<(), ServerError> {
		match self.worker.take() {
			Some(handle) => match handle.join() {
				Ok(result) => result,
				Err(panic) => std::panic::resume_unwind(panic),
			},
			None => Ok(()),
		}
	}

	pub fn stop(self) {
		drop(self);
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Err(e) = self.waker.wake() {
			tracing::warn!("Failed to wake worker for shutdown: {}", e);
		}

		if let Some(handle) = self.worker.take() {
			// Best effort join - ignore errors during drop
			let _ = handle.join();
		}
	}
}

fn resolve(bind_addr: &str) -> Result<SocketAddr, ServerError> {
	bind_addr
		.to_socket_addrs()
		.map_err(|source| ServerError::InvalidAddress {
			addr: bind_addr.to_string(),
			source,
		})?
		.next()
		.ok_or_else(|| ServerError::Unresolved(bind_addr.to_string()))
}
