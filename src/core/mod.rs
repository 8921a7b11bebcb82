//! Core data types and models

pub mod record;
pub mod temporal;

pub use record::*;
pub use temporal::*;
