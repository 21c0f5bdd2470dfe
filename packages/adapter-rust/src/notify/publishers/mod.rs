//! [`Publisher`](crate::traits::Publisher) implementations.

pub mod memory;
pub mod null;

pub use memory::MemoryPublisher;
pub use null::NullPublisher;
