// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! RFC 6455 frame encoding and decoding.
//!
//! Only single, unfragmented frames are handled. Outbound frames are always
//! final text frames sent unmasked; inbound client frames must be masked.

use crate::error::FrameError;

/// FIN=1, RSV=0, opcode=1 (text)
const FINAL_TEXT: u8 = 0x81;

const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Decoded fixed part of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
	pub fin: bool,
	pub opcode: u8,
	pub mask: Option<[u8; 4]>,
	/// Bytes occupied by the header, masking key included.
	pub header_len: usize,
	pub payload_len: usize,
}

impl FrameHeader {
	/// Total size of the frame on the wire.
	pub fn frame_len(&self) -> usize {
		self.header_len.saturating_add(self.payload_len)
	}
}

/// Wraps `payload` in a final text frame.
pub fn encode(payload: &[u8]) -> Vec<u8> {
	let payload_len = payload.len();
	let mut frame = Vec::with_capacity(payload_len + 10);

	frame.push(FINAL_TEXT);

	if payload_len <= 125 {
		frame.push(payload_len as u8);
	} else if payload_len <= u16::MAX as usize {
		frame.push(LEN_16);
		frame.extend_from_slice(&(payload_len as u16).to_be_bytes());
	} else {
		frame.push(LEN_64);
		frame.extend_from_slice(&(payload_len as u64).to_be_bytes());
	}

	// Server frames are not masked
	frame.extend_from_slice(payload);
	frame
}

/// Parses the frame header at the start of `data`.
///
/// Returns `Ok(None)` while the buffer does not yet hold the complete header.
pub fn parse_header(data: &[u8]) -> Result<Option<FrameHeader>, FrameError> {
	match read_header(data) {
		Ok(header) => Ok(Some(header)),
		Err(FrameError::Truncated {
			..
		}) => Ok(None),
		Err(e) => Err(e),
	}
}

/// Unmasks the client frame at the start of `raw` and returns its payload.
///
/// FIN, RSV and opcode are not inspected. Bytes past the declared payload
/// length are not part of the frame and are ignored.
pub fn decode(raw: &[u8]) -> Result<Vec<u8>, FrameError> {
	let header = read_header(raw)?;
	let mask = header.mask.ok_or(FrameError::Unmasked)?;

	let end = header.frame_len();
	if raw.len() < end {
		return Err(FrameError::Truncated {
			expected: end,
			actual: raw.len(),
		});
	}

	let mut payload = raw[header.header_len..end].to_vec();
	apply_mask(&mut payload, mask);
	Ok(payload)
}

/// XORs `payload` in place with the repeating 4-byte `key`.
///
/// Masking and unmasking are the same operation.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
	for (i, byte) in payload.iter_mut().enumerate() {
		*byte ^= key[i % 4];
	}
}

fn read_header(data: &[u8]) -> Result<FrameHeader, FrameError> {
	if data.len() < 2 {
		return Err(FrameError::Truncated {
			expected: 2,
			actual: data.len(),
		});
	}

	let fin = data[0] & 0x80 != 0;
	let opcode = data[0] & 0x0F;
	let masked = data[1] & 0x80 != 0;

	let (payload_len, mut header_len) = match data[1] & 0x7F {
		LEN_16 => {
			ensure(data, 4)?;
			(u16::from_be_bytes([data[2], data[3]]) as u64, 4)
		}
		LEN_64 => {
			ensure(data, 10)?;
			let mut len = [0u8; 8];
			len.copy_from_slice(&data[2..10]);
			(u64::from_be_bytes(len), 10)
		}
		len => (len as u64, 2),
	};

	let payload_len = usize::try_from(payload_len).map_err(|_| FrameError::TooLarge(payload_len))?;

	let mask = if masked {
		ensure(data, header_len + 4)?;
		let key = [data[header_len], data[header_len + 1], data[header_len + 2], data[header_len + 3]];
		header_len += 4;
		Some(key)
	} else {
		None
	};

	Ok(FrameHeader {
		fin,
		opcode,
		mask,
		header_len,
		payload_len,
	})
}

fn ensure(data: &[u8], expected: usize) -> Result<(), FrameError> {
	if data.len() < expected {
		return Err(FrameError::Truncated {
			expected,
			actual: data.len(),
		});
	}
	Ok(())
}
