mod logfile;
mod stats;

pub use logfile::*;
pub use stats::*;
