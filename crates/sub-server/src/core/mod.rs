// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

pub mod connection;
pub mod listener;
pub mod registry;
pub mod worker;

pub use connection::{Connection, ConnectionState};
pub use listener::Listener;
pub use registry::Registry;
pub use worker::Worker;
