mod error_pages;
mod hostname_radix_tree;

pub use error_pages::*;
pub use hostname_radix_tree::*;

/// The web server software identifier
pub const SERVER_SOFTWARE: &str = "Ferron";
