//! Shared types used at the seams between the `ferron` bin crate and the
//! built-in filter/DNS-provider/observability crates: the Filter Chain
//! trait, the DNS-01 provider trait, the log message plumbing, and the
//! observability backend trait.

pub mod acme;
pub mod dns;
pub mod error;
pub mod logging;
pub mod modules;
pub mod observability;
pub mod reconcile;
