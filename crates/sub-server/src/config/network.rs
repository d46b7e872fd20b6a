// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Socket level settings.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
	/// Set `SO_REUSEPORT` on the listening socket.
	pub reuse_port: bool,
	/// Set `TCP_NODELAY` on accepted connections.
	pub nodelay: bool,
	/// Outbound bytes a connection may have queued before it is dropped.
	pub max_outbox_bytes: usize,
	/// Capacity of the readiness event buffer.
	pub events_capacity: usize,
	/// Backlog passed to `listen(2)`.
	pub backlog: i32,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			reuse_port: false,
			nodelay: true,
			max_outbox_bytes: 1 << 20,
			events_capacity: 1024,
			backlog: 1024,
		}
	}
}
