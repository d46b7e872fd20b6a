// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	io::{ErrorKind, Read, Write},
	net::TcpStream,
	time::Duration,
};

use regression::*;
use serde_json::json;
use wsrelay_network::encode;
use wsrelay_sub_server::NetworkConfig;

#[test]
fn test_connect_announces_to_new_client() {
	let server = start();
	let mut client = Client::connect(server.local_addr());

	assert_eq!(client.recv_json(), connected());
	client.assert_silent();
	wait_until(|| server.active_connections() == 1);
}

#[test]
fn test_message_reaches_every_client_once() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 3);

	clients[0].send_text(r#"{"name":"alice","message":"hello"}"#);

	let expected = json!({"type": "usermsg", "name": "alice", "message": "hello"});
	for client in clients.iter_mut() {
		assert_eq!(client.recv_json(), expected);
		client.assert_silent();
	}
}

#[test]
fn test_message_is_escaped() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	clients[1].send_text(r#"{"name":"<b>","message":"a & 'b' \"c\""}"#);

	assert_eq!(
		clients[0].recv(),
		r#"{"type":"usermsg","name":"&lt;b&gt;","message":"a &amp; &#039;b&#039; &quot;c&quot;"}"#
	);
}

#[test]
fn test_invalid_json_replies_to_sender_only() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	clients[0].send_text("{not json");

	assert_eq!(clients[0].recv_json(), json!({"error": "Invalid JSON format"}));
	clients[1].assert_silent();

	// still usable afterwards
	clients[0].send_text(r#"{"name":"a","message":"b"}"#);
	assert_eq!(clients[1].recv_json()["type"], "usermsg");
}

#[test]
fn test_invalid_message_format_replies_to_sender_only() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	clients[1].send_text(r#"{"name":"only"}"#);

	assert_eq!(clients[1].recv_json(), json!({"error": "Invalid message format"}));
	clients[0].assert_silent();
}

#[test]
fn test_disconnect_notifies_remaining_clients_once() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 3);
	wait_until(|| server.active_connections() == 3);

	drop(clients.pop());

	for client in clients.iter_mut() {
		assert_eq!(client.recv_json(), disconnected());
		client.assert_silent();
	}
	wait_until(|| server.active_connections() == 2);
}

#[test]
fn test_missing_key_closes_without_response() {
	let server = start();
	let mut observer = Client::connect(server.local_addr());
	assert_eq!(observer.recv_json(), connected());

	let mut stream = TcpStream::connect(server.local_addr()).unwrap();
	stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\r\n").unwrap();

	let received = read_to_close(&mut stream);
	assert!(received.is_empty(), "{:?}", String::from_utf8_lossy(&received));

	// never opened, so nothing to announce
	observer.assert_silent();
	assert_eq!(server.active_connections(), 1);
}

/// Reads until the server closes `stream`, returning everything it sent.
fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
	stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
	let mut received = Vec::new();
	let mut chunk = [0u8; 1024];
	loop {
		match stream.read(&mut chunk) {
			Ok(0) => return received,
			Ok(n) => received.extend_from_slice(&chunk[..n]),
			Err(e) if e.kind() == ErrorKind::ConnectionReset => return received,
			Err(e) => panic!("connection not closed: {e}"),
		}
	}
}

#[test]
fn test_oversized_handshake_closes_without_response() {
	let server = start();
	let mut observer = Client::connect(server.local_addr());
	assert_eq!(observer.recv_json(), connected());

	let mut stream = TcpStream::connect(server.local_addr()).unwrap();
	let mut request = b"GET / HTTP/1.1\r\nHost: localhost\r\n".to_vec();
	while request.len() <= 20 * 1024 {
		request.extend_from_slice(b"X-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
	}
	// the server may hang up before the whole head is written
	let _ = stream.write_all(&request);

	let received = read_to_close(&mut stream);
	assert!(received.is_empty(), "{:?}", String::from_utf8_lossy(&received));

	observer.assert_silent();
	assert_eq!(server.active_connections(), 1);
}

#[test]
fn test_slow_reader_is_dropped_and_announced() {
	let network = NetworkConfig {
		max_outbox_bytes: 64 * 1024,
		..NetworkConfig::default()
	};
	let server = start_with(config().with_network(network));
	let mut clients = connect_all(server.local_addr(), 2);
	wait_until(|| server.active_connections() == 2);

	// clients[0] stops reading; its kernel buffers and then its queue fill up
	let text = "z".repeat(60_000);
	let message = format!(r#"{{"name":"a","message":"{}"}}"#, text);
	let mut dropped = false;
	for _ in 0..2_000 {
		clients[1].send_text(&message);
		let reply = clients[1].recv_json();
		if reply == disconnected() {
			dropped = true;
			break;
		}
		assert_eq!(reply["type"], "usermsg");
	}

	assert!(dropped, "slow reader was never dropped");
	// echo of the message sent after the drop
	assert_eq!(clients[1].recv_json()["type"], "usermsg");
	wait_until(|| server.active_connections() == 1);

	clients[1].send_text(r#"{"name":"a","message":"still here"}"#);
	assert_eq!(clients[1].recv_json()["message"], "still here");
	clients[1].assert_silent();
}

#[test]
fn test_unskippable_frame_closes_sender() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	let mut header = vec![0x81, 0xff];
	header.extend_from_slice(&u64::MAX.to_be_bytes());
	header.extend_from_slice(&[1, 2, 3, 4]);
	clients[0].send_raw(&header);

	assert_eq!(
		clients[0].recv_json(),
		json!({"error": "Message size exceeds buffer limit of 65535 bytes."})
	);
	clients[0].assert_closed();

	assert_eq!(clients[1].recv_json(), disconnected());
	clients[1].assert_silent();
	wait_until(|| server.active_connections() == 1);
}

#[test]
fn test_oversized_message_is_rejected_and_stream_recovers() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	let name = "x".repeat(70_000);
	clients[0].send_text(&format!(r#"{{"name":"{}","message":"big"}}"#, name));

	assert_eq!(
		clients[0].recv_json(),
		json!({"error": "Message size exceeds buffer limit of 65535 bytes."})
	);
	clients[1].assert_silent();

	clients[0].send_text(r#"{"name":"a","message":"after"}"#);
	let expected = json!({"type": "usermsg", "name": "a", "message": "after"});
	assert_eq!(clients[0].recv_json(), expected);
	assert_eq!(clients[1].recv_json(), expected);
}

#[test]
fn test_medium_message_uses_extended_length() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	let text = "y".repeat(1_000);
	clients[0].send_text(&format!(r#"{{"name":"a","message":"{}"}}"#, text));

	for client in clients.iter_mut() {
		assert_eq!(client.recv_json()["message"], text.as_str());
	}
}

#[test]
fn test_frame_split_across_writes() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 1);

	let frame = masked_frame(br#"{"name":"a","message":"slow"}"#);
	for byte in &frame {
		clients[0].send_raw(std::slice::from_ref(byte));
		std::thread::sleep(Duration::from_millis(1));
	}

	assert_eq!(clients[0].recv_json()["message"], "slow");
}

#[test]
fn test_two_frames_in_one_write() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	let mut bytes = masked_frame(br#"{"name":"a","message":"one"}"#);
	bytes.extend(masked_frame(br#"{"name":"a","message":"two"}"#));
	clients[0].send_raw(&bytes);

	for client in clients.iter_mut() {
		assert_eq!(client.recv_json()["message"], "one");
		assert_eq!(client.recv_json()["message"], "two");
	}
}

#[test]
fn test_frame_sent_with_handshake() {
	let server = start();
	let mut client =
		Client::connect_with(server.local_addr(), &masked_frame(br#"{"name":"a","message":"early"}"#));

	assert_eq!(client.recv_json(), connected());
	assert_eq!(client.recv_json()["message"], "early");
}

#[test]
fn test_unmasked_frame_closes_sender() {
	let server = start();
	let mut clients = connect_all(server.local_addr(), 2);

	clients[0].send_raw(&encode(br#"{"name":"a","message":"bare"}"#));

	clients[0].assert_closed();
	assert_eq!(clients[1].recv_json(), disconnected());
	clients[1].assert_silent();
	wait_until(|| server.active_connections() == 1);
}
