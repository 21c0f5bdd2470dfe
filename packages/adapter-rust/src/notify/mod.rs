//! Change notification: message formatting, attribute layering, and
//! publisher implementations.

pub mod message;
pub mod notifier;
pub mod publishers;

pub use message::*;
pub use notifier::Notifier;
pub use publishers::{MemoryPublisher, NullPublisher};
