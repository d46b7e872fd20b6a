// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use super::NetworkConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Configuration of a wsrelay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
	pub bind_addr: String,
	/// Upper bound on a single readiness wait. Idle iterations are harmless.
	pub poll_timeout: Duration,
	/// Largest inbound frame, header included, that is accepted.
	pub max_buffer_size: usize,
	/// Largest HTTP upgrade request head that is accepted.
	pub max_handshake_bytes: usize,
	/// Oversized frames up to this size are skipped, larger ones close the connection.
	pub max_discard_bytes: usize,
	pub network: NetworkConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind_addr: DEFAULT_BIND_ADDR.to_string(),
			poll_timeout: Duration::from_secs(10),
			max_buffer_size: 65535,
			max_handshake_bytes: 16 * 1024,
			max_discard_bytes: 16 * 1024 * 1024,
			network: NetworkConfig::default(),
		}
	}
}

impl ServerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
		self.bind_addr = bind_addr.into();
		self
	}

	pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
		self.poll_timeout = poll_timeout;
		self
	}

	pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
		self.max_buffer_size = max_buffer_size;
		self
	}

	pub fn with_max_handshake_bytes(mut self, max_handshake_bytes: usize) -> Self {
		self.max_handshake_bytes = max_handshake_bytes;
		self
	}

	pub fn with_max_discard_bytes(mut self, max_discard_bytes: usize) -> Self {
		self.max_discard_bytes = max_discard_bytes;
		self
	}

	pub fn with_network(mut self, network: NetworkConfig) -> Self {
		self.network = network;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ServerConfig::default();
		assert_eq!(config.bind_addr, "0.0.0.0:8080");
		assert_eq!(config.poll_timeout, Duration::from_secs(10));
		assert_eq!(config.max_buffer_size, 65535);
		assert!(config.max_handshake_bytes >= 1024);
		assert!(config.max_discard_bytes > config.max_buffer_size);
	}

	#[test]
	fn test_builder() {
		let config = ServerConfig::new()
			.with_bind_addr("127.0.0.1:0")
			.with_poll_timeout(Duration::from_millis(20))
			.with_max_buffer_size(1024)
			.with_max_handshake_bytes(2048)
			.with_max_discard_bytes(4096)
			.with_network(NetworkConfig {
				max_outbox_bytes: 512,
				..NetworkConfig::default()
			});
		assert_eq!(config.bind_addr, "127.0.0.1:0");
		assert_eq!(config.poll_timeout, Duration::from_millis(20));
		assert_eq!(config.max_buffer_size, 1024);
		assert_eq!(config.max_handshake_bytes, 2048);
		assert_eq!(config.max_discard_bytes, 4096);
		assert_eq!(config.network.max_outbox_bytes, 512);
		assert!(config.network.nodelay);
	}
}
