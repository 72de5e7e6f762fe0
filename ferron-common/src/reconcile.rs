/// The seam the Admin API mutates through without depending on the `ferron`
/// bin crate directly (which would be a dependency cycle, since the bin
/// crate depends on `ferron-admin-api`). Every mutating Admin API endpoint
/// calls `trigger()` after its Store write commits, so the running proxy
/// picks up the change.
pub trait ReconcileHandle: Send + Sync {
  /// Requests a reconcile. Non-blocking: the actual rebuild happens on the
  /// Publisher's background loop, possibly coalesced with other pending
  /// requests.
  fn trigger(&self);
}
