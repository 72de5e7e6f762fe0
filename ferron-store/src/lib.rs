//! Persistent Store (component 1 of SPEC_FULL.md): the durable record of
//! hosts, locations, headers, streams, access lists, certificates, DNS
//! providers, users and audit events. SQLite via `sqlx`, mirroring the
//! query-builder style of the pack's Postgres-backed admin service but
//! swapped to a single local file, since this store has no cluster to serve.

pub mod model;
mod store;

pub use store::{NewHost, NewLocation, NewStream, Store};
