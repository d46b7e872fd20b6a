// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Chat protocol spoken over upgraded connections.

pub mod broadcast;
pub mod handler;
pub mod message;

pub use broadcast::{broadcast, disconnect, reply};
pub use handler::WebSocketHandler;
pub use message::{ChatMessage, ErrorReply, MessageError, Notice, escape_html, parse_message};
