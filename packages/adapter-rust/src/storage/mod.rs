//! Store-facing types and the in-memory store engine.
//!
//! - [`WriteCondition`]: predicates for conditional puts
//! - [`ReadQuery`] / [`Page`]: query and scan requests and their results
//! - [`WriteRequest`] / [`BatchWriteOutput`]: batch write plumbing
//! - [`MemoryStore`]: a [`DashMap`](dashmap::DashMap)-backed
//!   [`ItemStore`](crate::traits::ItemStore)

pub mod condition;
pub mod engines;
pub mod query;
pub mod request;

pub use condition::*;
pub use engines::*;
pub use query::*;
pub use request::*;
