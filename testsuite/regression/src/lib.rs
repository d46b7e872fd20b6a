// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Blocking WebSocket client and server fixtures shared by the regression tests.

use std::{
	io::{ErrorKind, Read, Write},
	net::{SocketAddr, TcpStream},
	thread,
	time::{Duration, Instant},
};

use serde_json::Value;
use wsrelay_network::{apply_mask, compute_accept_key, encode, find_header_end};
use wsrelay_sub_server::{Listener, ServerConfig};

pub const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const MASK: [u8; 4] = [0x11, 0x22, 0x33, 0x44];
const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

pub fn config() -> ServerConfig {
	ServerConfig::default().with_bind_addr("127.0.0.1:0").with_poll_timeout(Duration::from_millis(50))
}

pub fn start() -> Listener {
	start_with(config())
}

pub fn start_with(config: ServerConfig) -> Listener {
	Listener::start(config).unwrap()
}

pub fn upgrade_request() -> String {
	format!(
		"GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n\r\n",
		KEY
	)
}

/// Client-side masked text frame.
pub fn masked_frame(payload: &[u8]) -> Vec<u8> {
	let unmasked = encode(payload);
	let header_len = unmasked.len() - payload.len();

	let mut frame = Vec::with_capacity(unmasked.len() + MASK.len());
	frame.extend_from_slice(&unmasked[..header_len]);
	frame[1] |= 0x80;
	frame.extend_from_slice(&MASK);
	frame.extend_from_slice(payload);
	apply_mask(&mut frame[header_len + MASK.len()..], MASK);
	frame
}

pub fn wait_until(mut condition: impl FnMut() -> bool) {
	let deadline = Instant::now() + TIMEOUT;
	while !condition() {
		assert!(Instant::now() < deadline, "condition not met within {:?}", TIMEOUT);
		thread::sleep(Duration::from_millis(10));
	}
}

/// Minimal blocking WebSocket client.
pub struct Client {
	stream: TcpStream,
	buf: Vec<u8>,
}

impl Client {
	/// Connects and completes the upgrade; nothing after the 101 is consumed.
	pub fn connect(addr: SocketAddr) -> Self {
		Self::connect_with(addr, &[])
	}

	/// Like [`Client::connect`], sending `early` in the same write as the request.
	pub fn connect_with(addr: SocketAddr, early: &[u8]) -> Self {
		let mut stream = TcpStream::connect(addr).unwrap();
		stream.set_read_timeout(Some(TIMEOUT)).unwrap();

		let mut request = upgrade_request().into_bytes();
		request.extend_from_slice(early);
		stream.write_all(&request).unwrap();

		let mut client = Self {
			stream,
			buf: Vec::new(),
		};

		let end = loop {
			if let Some(end) = find_header_end(&client.buf) {
				break end;
			}
			client.fill();
		};
		let head = String::from_utf8(client.buf.drain(..end).collect()).unwrap();
		assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"), "{head}");
		assert!(head.contains(&format!("Sec-WebSocket-Accept: {}\r\n", compute_accept_key(KEY))));

		client
	}

	pub fn send_text(&mut self, text: &str) {
		self.send_raw(&masked_frame(text.as_bytes()));
	}

	pub fn send_raw(&mut self, bytes: &[u8]) {
		self.stream.write_all(bytes).unwrap();
	}

	/// Next server frame as text.
	pub fn recv(&mut self) -> String {
		loop {
			if let Some((header_len, payload_len)) = Self::server_header(&self.buf) {
				if self.buf.len() >= header_len + payload_len {
					assert_eq!(self.buf[0], 0x81, "expected a final text frame");
					let frame: Vec<u8> = self.buf.drain(..header_len + payload_len).collect();
					return String::from_utf8(frame[header_len..].to_vec()).unwrap();
				}
			}
			self.fill();
		}
	}

	pub fn recv_json(&mut self) -> Value {
		serde_json::from_str(&self.recv()).unwrap()
	}

	/// Asserts no frame arrives for a short while.
	pub fn assert_silent(&mut self) {
		assert!(Self::server_header(&self.buf).is_none(), "unexpected buffered frame");

		self.stream.set_read_timeout(Some(QUIET)).unwrap();
		let mut chunk = [0u8; 1024];
		match self.stream.read(&mut chunk) {
			Ok(0) => panic!("connection closed"),
			Ok(n) => panic!("unexpected {} bytes: {:?}", n, String::from_utf8_lossy(&chunk[..n])),
			Err(e) => assert!(matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut), "{e}"),
		}
		self.stream.set_read_timeout(Some(TIMEOUT)).unwrap();
	}

	/// Waits for the server to close the connection.
	pub fn assert_closed(&mut self) {
		let mut chunk = [0u8; 1024];
		loop {
			match self.stream.read(&mut chunk) {
				Ok(0) => return,
				Ok(_) => continue,
				Err(e) if e.kind() == ErrorKind::ConnectionReset => return,
				Err(e) => panic!("connection not closed: {e}"),
			}
		}
	}

	fn fill(&mut self) {
		let mut chunk = [0u8; 8192];
		let n = self.stream.read(&mut chunk).unwrap();
		assert!(n > 0, "connection closed while waiting for data");
		self.buf.extend_from_slice(&chunk[..n]);
	}

	fn server_header(buf: &[u8]) -> Option<(usize, usize)> {
		if buf.len() < 2 {
			return None;
		}
		match buf[1] & 0x7f {
			126 if buf.len() >= 4 => Some((4, u16::from_be_bytes([buf[2], buf[3]]) as usize)),
			127 if buf.len() >= 10 => {
				let mut len = [0u8; 8];
				len.copy_from_slice(&buf[2..10]);
				Some((10, u64::from_be_bytes(len) as usize))
			}
			126 | 127 => None,
			len => Some((2, len as usize)),
		}
	}
}

pub fn connected() -> Value {
	serde_json::json!({"type": "system", "message": "127.0.0.1 connected"})
}

pub fn disconnected() -> Value {
	serde_json::json!({"type": "system", "message": "127.0.0.1 disconnected"})
}

/// Connects `n` clients one after another, draining every connect notice.
pub fn connect_all(addr: SocketAddr, n: usize) -> Vec<Client> {
	let mut clients: Vec<Client> = Vec::with_capacity(n);
	for _ in 0..n {
		clients.push(Client::connect(addr));
		for client in clients.iter_mut() {
			assert_eq!(client.recv_json(), connected());
		}
	}
	clients
}
