use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ferron, a programmable reverse proxy. Virtual hosts, streams, access
/// lists, and TLS certificates are all configured at runtime through the
/// Admin API (`0.0.0.0:81`) — this CLI only controls where the process
/// keeps its state.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
  /// Directory holding the persistent store, certificate materials, and the
  /// ACME account cache. Created on first run.
  #[arg(long, default_value = "./data")]
  pub data_dir: PathBuf,

  /// Scratch directory for certificate-issuance material, matching the
  /// conventional Let's Encrypt client layout.
  #[arg(long, default_value = "/etc/letsencrypt")]
  pub config_dir: PathBuf,

  /// Directory `./logs/access.log` and the error log are written under.
  #[arg(long, default_value = "./logs")]
  pub log_dir: PathBuf,

  /// Directory the admin listener serves static UI assets from.
  #[arg(long, default_value = "./static")]
  pub static_dir: PathBuf,

  #[command(subcommand)]
  pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Runs the proxy. The default when no subcommand is given.
  Run,
  /// Hashes a password in the format the Users table expects, the same
  /// format the standalone `ferron-passwd` tool produces, as a convenience
  /// for seeding the first admin user without a running Admin API.
  HashPassword {
    password: String,
  },
}
