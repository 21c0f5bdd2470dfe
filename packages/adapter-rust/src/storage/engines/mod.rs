//! [`ItemStore`](crate::traits::ItemStore) implementations.

pub mod memory;

pub use memory::MemoryStore;
