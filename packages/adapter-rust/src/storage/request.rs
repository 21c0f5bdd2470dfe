//! Batch write request and response types.

use itemshape_core::Item;

/// One entry of a batch write call.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Unconditional put of a full item.
    Put(Item),
    /// Delete by primary key.
    Delete(Item),
}

impl WriteRequest {
    /// The item (for puts) or key (for deletes) carried by the request.
    #[must_use]
    pub fn payload(&self) -> &Item {
        match self {
            WriteRequest::Put(item) | WriteRequest::Delete(item) => item,
        }
    }
}

/// Result of a batch write call.
///
/// Requests the store did not get to are handed back unchanged so the
/// caller can retry exactly that leftover set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<WriteRequest>,
}
