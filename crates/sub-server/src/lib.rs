// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Readiness-driven WebSocket chat relay.
//!
//! A single worker thread owns a mio poller, the listening socket and every
//! client connection. Accepted connections are upgraded through the HTTP
//! handshake, after which each `{"name", "message"}` text frame a client
//! sends is broadcast to all open connections.
//!
//! # Example
//!
//! ```no_run
//! use wsrelay_sub_server::{Listener, ServerConfig};
//!
//! let listener = Listener::start(ServerConfig::default().with_bind_addr("127.0.0.1:8080"))?;
//! listener.wait()?;
//! # Ok::<(), wsrelay_sub_server::ServerError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocols;

pub use config::{NetworkConfig, ServerConfig};
pub use self::core::{Connection, ConnectionState, Listener, Registry, Worker};
pub use error::{ProtocolError, ProtocolResult, ServerError};
pub use protocols::ws::{ChatMessage, ErrorReply, MessageError, Notice, WebSocketHandler};
