// storefront/src/rcon/client.rs

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::packet::{self, Packet, PacketError, AUTH_FAILED_ID, SERVERDATA_AUTH, SERVERDATA_EXECCOMMAND};

#[derive(Debug, Error)]
pub enum RconError {
  #[error("remote console I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("remote console did not answer within {0:?}")]
  Timeout(Duration),

  #[error("remote console is not connected")]
  NotConnected,

  #[error("malformed remote console packet: {0}")]
  Decode(#[from] PacketError),

  #[error("remote console answered request {got} while {expected} was outstanding")]
  UnexpectedResponse { expected: i32, got: i32 },
}

/// One connection to a game server's remote console.
///
/// Strictly one request in flight: every call writes a packet and waits for
/// exactly one reply. Request ids are local to the client.
#[derive(Debug)]
pub struct RconClient {
  stream: Option<TcpStream>,
  last_request_id: i32,
  timeout: Duration,
}

impl RconClient {
  pub fn new(timeout: Duration) -> Self {
    Self {
      stream: None,
      last_request_id: 0,
      timeout,
    }
  }

  pub fn is_connected(&self) -> bool {
    self.stream.is_some()
  }

  fn next_request_id(&mut self) -> i32 {
    self.last_request_id = self.last_request_id.checked_add(1).unwrap_or(1);
    self.last_request_id
  }

  /// Opens the socket and authenticates.
  ///
  /// Returns `Ok(false)` when the server rejects the password. The socket is
  /// only kept when authentication succeeded; on timeout it is dropped with
  /// the handshake future.
  #[instrument(name = "rcon::connect", skip(self, password), err(Display))]
  pub async fn connect(&mut self, host: &str, port: u16, password: &str) -> Result<bool, RconError> {
    self.close().await;
    let request_id = self.next_request_id();
    let auth = Packet::new(request_id, SERVERDATA_AUTH, password);
    let limit = self.timeout;

    let handshake = async {
      let mut stream = TcpStream::connect((host, port)).await?;
      write_packet(&mut stream, &auth).await?;
      let reply = read_packet(&mut stream).await?;
      Ok::<_, RconError>((stream, reply))
    };

    let (stream, reply) = match timeout(limit, handshake).await {
      Ok(result) => result?,
      Err(_) => {
        warn!("Remote console handshake timed out after {:?}.", limit);
        return Err(RconError::Timeout(limit));
      }
    };

    if reply.id == AUTH_FAILED_ID {
      warn!("Remote console rejected the password.");
      return Ok(false);
    }
    if reply.id != request_id {
      return Err(RconError::UnexpectedResponse {
        expected: request_id,
        got: reply.id,
      });
    }

    info!("Authenticated with remote console.");
    self.stream = Some(stream);
    Ok(true)
  }

  /// Executes one command and returns the server's reply text.
  #[instrument(name = "rcon::send_command", skip(self), err(Display))]
  pub async fn send_command(&mut self, command: &str) -> Result<String, RconError> {
    if self.stream.is_none() {
      return Err(RconError::NotConnected);
    }
    let request_id = self.next_request_id();
    let packet = Packet::new(request_id, SERVERDATA_EXECCOMMAND, command);
    let limit = self.timeout;
    let Some(stream) = self.stream.as_mut() else {
      return Err(RconError::NotConnected);
    };

    let result = match timeout(limit, exchange(stream, &packet)).await {
      Ok(result) => result,
      Err(_) => Err(RconError::Timeout(limit)),
    };

    match result {
      Ok(reply) if reply.id == request_id => {
        debug!(response_len = reply.body.len(), "Command acknowledged.");
        Ok(reply.body)
      }
      Ok(reply) => {
        self.close().await;
        Err(RconError::UnexpectedResponse {
          expected: request_id,
          got: reply.id,
        })
      }
      Err(e) => {
        // The stream state is unknown after a failed exchange.
        self.close().await;
        Err(e)
      }
    }
  }

  pub async fn close(&mut self) {
    if let Some(mut stream) = self.stream.take() {
      if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Remote console socket shutdown reported an error.");
      }
    }
  }
}

async fn exchange(stream: &mut TcpStream, packet: &Packet) -> Result<Packet, RconError> {
  write_packet(stream, packet).await?;
  read_packet(stream).await
}

pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &Packet) -> Result<(), RconError> {
  let bytes = packet.encode()?;
  writer.write_all(&bytes).await?;
  writer.flush().await?;
  Ok(())
}

pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, RconError> {
  let mut header = [0u8; 4];
  reader.read_exact(&mut header).await.map_err(|e| truncated(e, 4))?;
  let length = packet::frame_length(&header)?;
  let mut payload = vec![0u8; length];
  reader
    .read_exact(&mut payload)
    .await
    .map_err(|e| truncated(e, 4 + length))?;
  Ok(packet::decode_payload(&payload)?)
}

fn truncated(err: std::io::Error, needed: usize) -> RconError {
  if err.kind() == std::io::ErrorKind::UnexpectedEof {
    RconError::Decode(PacketError::Truncated { needed, available: 0 })
  } else {
    RconError::Io(err)
  }
}
