// storefront/tests/rcon_client_tests.rs

mod common;
use common::*;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use axis_store::config::RconSettings;
use axis_store::rcon::client::{read_packet, write_packet};
use axis_store::rcon::packet::{AUTH_FAILED_ID, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE};
use axis_store::rcon::{CommandExecutor, Packet, RconClient, RconError, RconExecutor};

const PASSWORD: &str = "hunter2";

#[derive(Clone, Copy)]
enum ServerMode {
  /// Accepts the password and echoes commands back.
  Echo,
  /// Rejects every password.
  RejectAuth,
  /// Accepts the connection and never answers.
  Silent,
}

/// Single-connection console server. Resolves to the commands it received.
async fn spawn_server(mode: ServerMode) -> (u16, JoinHandle<Vec<String>>) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  let handle = tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut received = Vec::new();
    if let ServerMode::Silent = mode {
      tokio::time::sleep(Duration::from_secs(5)).await;
      return received;
    }

    let auth = read_packet(&mut socket).await.unwrap();
    assert_eq!(auth.kind, SERVERDATA_AUTH);
    let accepted = matches!(mode, ServerMode::Echo) && auth.body == PASSWORD;
    let reply_id = if accepted { auth.id } else { AUTH_FAILED_ID };
    write_packet(&mut socket, &Packet::new(reply_id, SERVERDATA_AUTH_RESPONSE, ""))
      .await
      .unwrap();
    if !accepted {
      return received;
    }

    while let Ok(request) = read_packet(&mut socket).await {
      received.push(request.body.clone());
      let reply = Packet::new(request.id, SERVERDATA_RESPONSE_VALUE, format!("ran: {}", request.body));
      if write_packet(&mut socket, &reply).await.is_err() {
        break;
      }
    }
    received
  });
  (port, handle)
}

#[tokio::test]
async fn test_authenticates_and_runs_commands() {
  setup_tracing();
  let (port, server) = spawn_server(ServerMode::Echo).await;

  let mut client = RconClient::new(Duration::from_secs(2));
  assert!(client.connect("127.0.0.1", port, PASSWORD).await.unwrap());
  assert!(client.is_connected());

  let reply = client.send_command("eco give Steve123 100").await.unwrap();
  assert_eq!(reply, "ran: eco give Steve123 100");
  let reply = client.send_command("list").await.unwrap();
  assert_eq!(reply, "ran: list");

  client.close().await;
  assert!(!client.is_connected());
  assert_eq!(server.await.unwrap(), vec!["eco give Steve123 100", "list"]);
}

#[tokio::test]
async fn test_wrong_password_is_reported_not_raised() {
  setup_tracing();
  let (port, server) = spawn_server(ServerMode::RejectAuth).await;

  let mut client = RconClient::new(Duration::from_secs(2));
  assert!(!client.connect("127.0.0.1", port, "wrong").await.unwrap());
  assert!(!client.is_connected());
  assert!(matches!(client.send_command("list").await, Err(RconError::NotConnected)));
  assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn test_silent_server_times_out() {
  setup_tracing();
  let (port, server) = spawn_server(ServerMode::Silent).await;

  let mut client = RconClient::new(Duration::from_millis(200));
  let err = client.connect("127.0.0.1", port, PASSWORD).await.unwrap_err();
  assert!(matches!(err, RconError::Timeout(_)), "got {:?}", err);
  assert!(!client.is_connected());
  server.abort();
}

#[tokio::test]
async fn test_refused_connection_is_an_io_error() {
  setup_tracing();
  // Bind then drop to get a port nobody listens on.
  let port = {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
  };
  let mut client = RconClient::new(Duration::from_secs(2));
  assert!(matches!(
    client.connect("127.0.0.1", port, PASSWORD).await,
    Err(RconError::Io(_))
  ));
}

fn settings(port: u16, password: &str) -> Option<RconSettings> {
  Some(RconSettings {
    host: "127.0.0.1".to_string(),
    port,
    password: password.to_string(),
    timeout: Duration::from_secs(2),
  })
}

#[tokio::test]
async fn test_executor_turns_console_replies_into_outcomes() {
  setup_tracing();
  let (port, server) = spawn_server(ServerMode::Echo).await;
  let outcome = RconExecutor::new(settings(port, PASSWORD))
    .execute("lp user Steve123 parent addtemp mythic 30d")
    .await;
  assert!(outcome.success, "{}", outcome.message);
  assert_eq!(outcome.message, "ran: lp user Steve123 parent addtemp mythic 30d");
  assert_eq!(server.await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_executor_reports_auth_failure_as_outcome() {
  setup_tracing();
  let (port, _server) = spawn_server(ServerMode::RejectAuth).await;
  let outcome = RconExecutor::new(settings(port, "nope")).execute("list").await;
  assert!(!outcome.success);
  assert!(outcome.message.contains("authentication failed"));
}
