// storefront/src/rcon/packet.rs

//! Remote console packet framing.
//!
//! Every packet is little-endian: `i32 length`, `i32 request id`,
//! `i32 type`, the body bytes, then two NUL bytes. `length` counts
//! everything after itself.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Request id echoed by the server when the password was wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Request id, type and the two terminator bytes.
pub const MIN_FRAME_LEN: usize = 4 + 4 + 2;
/// Upper bound on the length field; anything larger is treated as garbage.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
  #[error("packet truncated: needed {needed} bytes, got {available}")]
  Truncated { needed: usize, available: usize },

  #[error("invalid packet length {0}")]
  InvalidLength(i64),

  #[error("packet body is not terminated by two NUL bytes")]
  MissingTerminator,

  #[error("{0} unexpected bytes after the packet")]
  TrailingBytes(usize),

  #[error("packet body of {0} bytes is too large")]
  BodyTooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
  pub id: i32,
  pub kind: i32,
  pub body: String,
}

impl Packet {
  pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
    Self {
      id,
      kind,
      body: body.into(),
    }
  }

  pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
    let body = self.body.as_bytes();
    let length = MIN_FRAME_LEN + body.len();
    if length > MAX_FRAME_LEN {
      return Err(PacketError::BodyTooLarge(body.len()));
    }

    let mut buf = vec![0u8; 4 + length];
    LittleEndian::write_i32(&mut buf[0..4], length as i32);
    LittleEndian::write_i32(&mut buf[4..8], self.id);
    LittleEndian::write_i32(&mut buf[8..12], self.kind);
    buf[12..12 + body.len()].copy_from_slice(body);
    // The last two bytes stay zero.
    Ok(buf)
  }

  /// Decodes exactly one complete frame, length prefix included.
  pub fn decode(buf: &[u8]) -> Result<Packet, PacketError> {
    if buf.len() < 4 {
      return Err(PacketError::Truncated {
        needed: 4,
        available: buf.len(),
      });
    }
    let length = frame_length(&buf[0..4])?;
    let rest = &buf[4..];
    if rest.len() < length {
      return Err(PacketError::Truncated {
        needed: 4 + length,
        available: buf.len(),
      });
    }
    if rest.len() > length {
      return Err(PacketError::TrailingBytes(rest.len() - length));
    }
    decode_payload(rest)
  }
}

/// Reads and validates the length prefix.
pub fn frame_length(header: &[u8]) -> Result<usize, PacketError> {
  if header.len() < 4 {
    return Err(PacketError::Truncated {
      needed: 4,
      available: header.len(),
    });
  }
  let raw = LittleEndian::read_i32(&header[0..4]);
  if raw < MIN_FRAME_LEN as i32 || raw as i64 > MAX_FRAME_LEN as i64 {
    return Err(PacketError::InvalidLength(raw as i64));
  }
  Ok(raw as usize)
}

/// Decodes the bytes that follow the length prefix.
pub fn decode_payload(payload: &[u8]) -> Result<Packet, PacketError> {
  if payload.len() < MIN_FRAME_LEN {
    return Err(PacketError::Truncated {
      needed: MIN_FRAME_LEN,
      available: payload.len(),
    });
  }
  let (head, terminator) = payload.split_at(payload.len() - 2);
  if terminator != [0, 0] {
    return Err(PacketError::MissingTerminator);
  }
  let id = LittleEndian::read_i32(&head[0..4]);
  let kind = LittleEndian::read_i32(&head[4..8]);
  // Server output is display text; a stray invalid byte should not fail a delivery.
  let body = String::from_utf8_lossy(&head[8..]).into_owned();
  Ok(Packet { id, kind, body })
}
