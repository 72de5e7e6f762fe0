mod tcp;
mod udp;

use std::collections::HashMap;
use std::sync::Arc;

use ferron_common::logging::ErrorLogger;
use ferron_store::model::{Stream, StreamProtocol};
use tokio::sync::Mutex;

pub use tcp::serve_tcp_stream;
pub use udp::serve_udp_stream;

/// The Stream Forwarder: opens/closes raw TCP and UDP
/// listeners to track the snapshot's `Stream` rows, diffing on every
/// Publisher reconcile by `(protocol, listen_port)`.
pub struct StreamForwarder {
  error_logger: ErrorLogger,
  running: Mutex<HashMap<u16, RunningStream>>,
}

struct RunningStream {
  stream: Stream,
  shutdown: tokio::sync::oneshot::Sender<()>,
}

impl StreamForwarder {
  pub fn new(error_logger: ErrorLogger) -> Self {
    Self {
      error_logger,
      running: Mutex::new(HashMap::new()),
    }
  }

  /// Computes the `(protocol, listen_port)` diff between the previous and
  /// next snapshot's Streams and opens/closes listeners accordingly.
  /// Entries whose forward target changed are closed then reopened.
  pub fn apply_diff(self: &Arc<Self>, _previous: &HashMap<u16, Stream>, next: &HashMap<u16, Stream>) {
    let forwarder = self.clone();
    let next = next.clone();
    tokio::spawn(async move {
      let mut running = forwarder.running.lock().await;

      let stale_ports: Vec<u16> = running
        .iter()
        .filter(|(port, running_stream)| match next.get(port) {
          Some(stream) => {
            stream.protocol != running_stream.stream.protocol
              || stream.forward_host != running_stream.stream.forward_host
              || stream.forward_port != running_stream.stream.forward_port
          }
          None => true,
        })
        .map(|(port, _)| *port)
        .collect();

      for port in stale_ports {
        if let Some(running_stream) = running.remove(&port) {
          let _ = running_stream.shutdown.send(());
        }
      }

      for (port, stream) in next.iter() {
        if running.contains_key(port) {
          continue;
        }
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let stream_config = stream.clone();
        let error_logger = forwarder.error_logger.clone();
        match stream.protocol {
          StreamProtocol::Tcp => {
            tokio::spawn(serve_tcp_stream(stream_config, shutdown_rx, error_logger));
          }
          StreamProtocol::Udp => {
            tokio::spawn(serve_udp_stream(stream_config, shutdown_rx, error_logger));
          }
        }
        running.insert(
          *port,
          RunningStream {
            stream: stream.clone(),
            shutdown: shutdown_tx,
          },
        );
      }
    });
  }
}
