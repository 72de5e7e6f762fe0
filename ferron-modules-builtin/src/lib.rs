//! The six built-in filters that make up the fixed request-handling chain
//! plus the ACME challenge responder that runs
//! ahead of Host resolution and so lives outside the `Filter` trait.

mod access_control;
mod acme_challenge;
mod force_https;
mod location_match;
mod redirect;
mod trusted_proxy;
mod upstream_dispatch;
mod util;

pub use access_control::AccessControlFilter;
pub use acme_challenge::try_serve_challenge;
pub use force_https::ForceHttpsFilter;
pub use location_match::LocationMatchFilter;
pub use redirect::RedirectFilter;
pub use trusted_proxy::TrustedProxyFilter;
pub use upstream_dispatch::UpstreamDispatchFilter;
