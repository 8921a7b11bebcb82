//! Query options, filtering and cursor-based execution

pub mod executor;
pub mod filter;
pub mod options;

pub use filter::*;
pub use options::*;
