use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ferron_common::logging::ErrorLogger;
use ferron_store::model::Stream;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;

const IDLE_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_DATAGRAM: usize = 65_507;

/// Serves one UDP `Stream` row: NATs each client `(addr, port)` to its own
/// upstream-facing socket, relaying replies back. A mapping is dropped
/// after 120 s of inactivity in either direction.
pub async fn serve_udp_stream(stream: Stream, mut shutdown: oneshot::Receiver<()>, error_logger: ErrorLogger) {
  let listener = match UdpSocket::bind(("0.0.0.0", stream.listen_port)).await {
    Ok(socket) => Arc::new(socket),
    Err(err) => {
      error_logger.log(format!("failed to bind UDP stream on port {}: {err}", stream.listen_port));
      return;
    }
  };

  let sessions: Arc<Mutex<HashMap<SocketAddr, Arc<UdpSocket>>>> = Arc::new(Mutex::new(HashMap::new()));
  let mut buffer = vec![0u8; MAX_DATAGRAM];

  loop {
    let (len, client_addr) = tokio::select! {
      _ = &mut shutdown => break,
      received = listener.recv_from(&mut buffer) => {
        match received {
          Ok(pair) => pair,
          Err(_) => continue,
        }
      }
    };

    let upstream_socket = {
      let mut sessions = sessions.lock().await;
      if let Some(existing) = sessions.get(&client_addr) {
        existing.clone()
      } else {
        match UdpSocket::bind("0.0.0.0:0").await {
          Ok(socket) => {
            if let Err(err) = socket.connect((stream.forward_host.as_str(), stream.forward_port)).await {
              error_logger.log(format!("UDP stream could not reach upstream: {err}"));
              continue;
            }
            let socket = Arc::new(socket);
            sessions.insert(client_addr, socket.clone());
            spawn_reply_relay(
              socket.clone(),
              listener.clone(),
              client_addr,
              sessions.clone(),
              error_logger.clone(),
            );
            socket
          }
          Err(err) => {
            error_logger.log(format!("UDP stream failed to open upstream socket: {err}"));
            continue;
          }
        }
      }
    };

    let _ = upstream_socket.send(&buffer[..len]).await;
  }
}

fn spawn_reply_relay(
  upstream_socket: Arc<UdpSocket>,
  listener: Arc<UdpSocket>,
  client_addr: SocketAddr,
  sessions: Arc<Mutex<HashMap<SocketAddr, Arc<UdpSocket>>>>,
  error_logger: ErrorLogger,
) {
  tokio::spawn(async move {
    let mut buffer = vec![0u8; MAX_DATAGRAM];
    loop {
      match timeout(IDLE_TIMEOUT, upstream_socket.recv(&mut buffer)).await {
        Ok(Ok(len)) => {
          if let Err(err) = listener.send_to(&buffer[..len], client_addr).await {
            error_logger.log(format!("UDP stream reply to {client_addr} failed: {err}"));
          }
        }
        Ok(Err(_)) | Err(_) => break,
      }
    }
    sessions.lock().await.remove(&client_addr);
  });
}
