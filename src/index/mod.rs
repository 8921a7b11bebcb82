//! Timestamp indexing and the in-memory indexed store

pub mod store;
pub mod temporal;

pub use store::IndexedStore;
pub use temporal::*;
