use async_channel::Sender;

/// A message destined for either the access log or the error log.
pub struct LogMessage {
  message: String,
  is_error: bool,
}

impl LogMessage {
  pub fn new(message: impl Into<String>, is_error: bool) -> Self {
    Self {
      message: message.into(),
      is_error,
    }
  }

  /// Consumes the message, returning its text and whether it belongs in the error log.
  pub fn get_message(self) -> (String, bool) {
    (self.message, self.is_error)
  }
}

/// Handed to each filter so it can emit error-log lines without knowing
/// whether a log sink is even configured.
#[derive(Clone)]
pub struct ErrorLogger {
  sender: Option<Sender<LogMessage>>,
}

impl ErrorLogger {
  pub fn new(sender: Option<Sender<LogMessage>>) -> Self {
    Self { sender }
  }

  pub fn none() -> Self {
    Self { sender: None }
  }

  /// Queues an error-log line. Silently dropped if no sink is attached or the
  /// sink is backed up; error logging must never block request handling.
  pub fn log(&self, message: impl Into<String>) {
    if let Some(sender) = &self.sender {
      let _ = sender.try_send(LogMessage::new(message, true));
    }
  }
}
