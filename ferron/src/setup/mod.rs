mod cli;
mod tls;

pub use cli::*;
pub use tls::*;
