use async_channel::Sender;

use crate::logging::LogMessage;

/// A sink that can receive log lines. The Statistics Collector and the
/// access/error log file writer both implement this so the bin crate can
/// fan a single `LogMessage` out to whichever sinks are active.
pub trait ObservabilityBackend {
  /// Obtains the channel for logging, if this backend accepts log lines.
  fn get_log_channel(&self) -> Option<Sender<LogMessage>> {
    None
  }
}

/// The set of observability backend channels currently wired up.
#[derive(Clone, Default)]
pub struct ObservabilityBackendChannels {
  /// Log channels
  pub log_channels: Vec<Sender<LogMessage>>,
}

impl ObservabilityBackendChannels {
  /// Creates an empty instance of `ObservabilityBackendChannels`
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a log channel to the observability backend channels
  pub fn add_log_channel(&mut self, channel: Sender<LogMessage>) {
    self.log_channels.push(channel);
  }
}
