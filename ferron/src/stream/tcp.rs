use std::time::Duration;

use ferron_common::logging::ErrorLogger;
use ferron_store::model::Stream;
use tokio::io::copy_bidirectional;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::timeout;

const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Serves one TCP `Stream` row: accepts on `listen_port`, splices each
/// connection to `forward_host:forward_port` until either side closes.
pub async fn serve_tcp_stream(stream: Stream, mut shutdown: oneshot::Receiver<()>, error_logger: ErrorLogger) {
  let listener = match TcpListener::bind(("0.0.0.0", stream.listen_port)).await {
    Ok(listener) => listener,
    Err(err) => {
      error_logger.log(format!("failed to bind TCP stream on port {}: {err}", stream.listen_port));
      return;
    }
  };

  let mut connections = JoinSet::new();

  loop {
    tokio::select! {
      _ = &mut shutdown => break,
      accepted = listener.accept() => {
        let Ok((inbound, _addr)) = accepted else { continue };
        let forward_host = stream.forward_host.clone();
        let forward_port = stream.forward_port;
        let error_logger = error_logger.clone();
        connections.spawn(async move {
          let mut inbound = inbound;
          match tokio::net::TcpStream::connect((forward_host.as_str(), forward_port)).await {
            Ok(mut outbound) => {
              if let Err(err) = copy_bidirectional(&mut inbound, &mut outbound).await {
                error_logger.log(format!("TCP stream to {forward_host}:{forward_port} ended: {err}"));
              }
            }
            Err(err) => {
              error_logger.log(format!("TCP stream failed to reach {forward_host}:{forward_port}: {err}"));
            }
          }
        });
      }
    }
  }

  let _ = timeout(DRAIN_GRACE, async {
    while connections.join_next().await.is_some() {}
  })
  .await;
  connections.abort_all();
}
