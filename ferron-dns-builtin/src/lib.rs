//! DNS-01 ACME challenge provider plugins: `cloudflare`, `route53`,
//! `digitalocean`, `google`.

mod cloudflare;
mod digitalocean;
mod google;
mod route53;

pub use cloudflare::*;
pub use digitalocean::*;
pub use google::*;
pub use route53::*;
