// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use mio::Token;
use serde::Serialize;
use wsrelay_network::encode;

use super::message::{MessageError, Notice};
use crate::core::Registry;

/// Sends `notice` to every open connection, the originator included.
///
/// The frame is encoded once. Failed writes are logged and otherwise ignored;
/// the worker disconnects those connections after the current iteration.
/// Returns the number of connections the frame was handed to.
pub fn broadcast(registry: &mut Registry, notice: &Notice) -> usize {
	let Some(frame) = encode_json(notice) else {
		return 0;
	};

	let mut delivered = 0;
	for token in registry.open() {
		match registry.send(token, &frame) {
			Ok(()) => delivered += 1,
			Err(e) => tracing::debug!("Broadcast to {:?} failed: {}", token, e),
		}
	}
	delivered
}

/// Sends an error reply to `token` alone.
pub fn reply(registry: &mut Registry, token: Token, error: &MessageError) {
	let Some(frame) = encode_json(&error.reply()) else {
		return;
	};

	if let Err(e) = registry.send(token, &frame) {
		tracing::debug!("Error reply to {:?} failed: {}", token, e);
	}
}

/// Announces the departure of `token` and removes it, closing its socket.
///
/// The notice goes out before removal, so the departing peer is still among
/// its recipients. Connections that never finished the handshake are removed
/// silently.
pub fn disconnect(registry: &mut Registry, token: Token) {
	let Some(conn) = registry.get(token) else {
		return;
	};
	let was_open = conn.is_open();
	let remote = conn.remote_ip();

	if was_open {
		broadcast(registry, &Notice::disconnected(&remote));
	}

	if registry.remove(token).is_some() {
		if was_open {
			tracing::info!("Client disconnected: {}", remote);
		} else {
			tracing::debug!("Dropped {} before handshake completed", remote);
		}
	}
}

fn encode_json<T: Serialize>(value: &T) -> Option<Vec<u8>> {
	match serde_json::to_vec(value) {
		Ok(payload) => Some(encode(&payload)),
		Err(e) => {
			tracing::warn!("Failed to serialize outbound message: {}", e);
			None
		}
	}
}
