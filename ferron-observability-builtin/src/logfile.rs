use std::{path::Path, sync::Arc, time::Duration};

use async_channel::Sender;
use chrono::{DateTime, Local};
use ferron_common::{
  logging::LogMessage,
  observability::ObservabilityBackend,
};
use tokio::io::{AsyncWriteExt, BufWriter};

/// The structured access/error log file sink. Spec.md §6 names
/// `./logs/access.log`; the error log is a second, independently optional
/// file. Writes are buffered and flushed on a 100ms tick so request handling
/// never blocks on file I/O.
pub struct LogFileObservabilityBackend {
  cancel_token: tokio_util::sync::CancellationToken,
  logging_tx: Sender<LogMessage>,
}

impl LogFileObservabilityBackend {
  /// Opens (append, create-if-missing) the access and/or error log files and
  /// starts the background writer task.
  pub async fn open(access_log_path: Option<&Path>, error_log_path: Option<&Path>) -> std::io::Result<Self> {
    let cancel_token = tokio_util::sync::CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let (logging_tx, logging_rx) = async_channel::unbounded::<LogMessage>();

    let log_file = match access_log_path {
      Some(path) => {
        if let Some(parent) = path.parent() {
          tokio::fs::create_dir_all(parent).await.ok();
        }
        Some(tokio::fs::OpenOptions::new().append(true).create(true).open(path).await?)
      }
      None => None,
    };
    let error_log_file = match error_log_path {
      Some(path) => {
        if let Some(parent) = path.parent() {
          tokio::fs::create_dir_all(parent).await.ok();
        }
        Some(tokio::fs::OpenOptions::new().append(true).create(true).open(path).await?)
      }
      None => None,
    };

    let log_file_wrapped = log_file.map(|f| Arc::new(tokio::sync::Mutex::new(BufWriter::with_capacity(131072, f))));
    let error_log_file_wrapped = error_log_file.map(|f| Arc::new(tokio::sync::Mutex::new(BufWriter::with_capacity(131072, f))));

    let log_file_for_flush = log_file_wrapped.clone();
    let error_log_file_for_flush = error_log_file_wrapped.clone();
    tokio::task::spawn(async move {
      let mut interval = tokio::time::interval(Duration::from_millis(100));
      loop {
        interval.tick().await;
        if let Some(file) = log_file_for_flush.clone() {
          let mut locked = file.lock().await;
          locked.flush().await.unwrap_or_default();
        }
        if let Some(file) = error_log_file_for_flush.clone() {
          let mut locked = file.lock().await;
          locked.flush().await.unwrap_or_default();
        }
      }
    });

    tokio::task::spawn(async move {
      while let Ok(message) = tokio::select! {
        message = logging_rx.recv() => message,
        _ = cancel_token_clone.cancelled() => return,
      } {
        let (mut message, is_error) = message.get_message();
        let file = if is_error { error_log_file_wrapped.clone() } else { log_file_wrapped.clone() };
        if let Some(file) = file {
          tokio::task::spawn(async move {
            let mut locked = file.lock().await;
            if is_error {
              let now: DateTime<Local> = Local::now();
              let formatted_time = now.format("%Y-%m-%d %H:%M:%S").to_string();
              message = format!("[{formatted_time}]: {message}");
            }
            message.push('\n');
            if let Err(e) = locked.write(message.as_bytes()).await {
              eprintln!("Failed to write to log file: {e}");
            }
          });
        }
      }
    });

    Ok(Self {
      cancel_token,
      logging_tx,
    })
  }
}

impl ObservabilityBackend for LogFileObservabilityBackend {
  fn get_log_channel(&self) -> Option<Sender<LogMessage>> {
    Some(self.logging_tx.clone())
  }
}

impl Drop for LogFileObservabilityBackend {
  fn drop(&mut self) {
    self.cancel_token.cancel();
  }
}

/// Formats one request as an Apache Combined Log Format line, the access log's
/// `./logs/access.log` wire contract.
#[allow(clippy::too_many_arguments)]
pub fn format_combined_log(
  remote_addr: &str,
  auth_user: Option<&str>,
  method: &str,
  path_and_query: &str,
  version: &str,
  status: u16,
  bytes: u64,
  referer: Option<&str>,
  user_agent: Option<&str>,
) -> String {
  let now: DateTime<Local> = Local::now();
  let timestamp = now.format("%d/%b/%Y:%H:%M:%S %z").to_string();
  format!(
    "{remote_addr} - {} [{timestamp}] \"{method} {path_and_query} {version}\" {status} {bytes} \"{}\" \"{}\"",
    auth_user.unwrap_or("-"),
    referer.unwrap_or("-"),
    user_agent.unwrap_or("-"),
  )
}
