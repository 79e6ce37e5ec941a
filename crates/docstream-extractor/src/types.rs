//! Outcome types returned by the extractor

use serde_json::Value;

/// What one call to `process_chunk` produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutcome {
    /// A fence opened during this chunk (UI may start showing a preview)
    pub block_opened: bool,

    /// A complete object decoded during this chunk
    pub object: Option<Value>,
}

impl ChunkOutcome {
    /// Nothing happened: no fence opened, no object decoded
    pub fn is_empty(&self) -> bool {
        !self.block_opened && self.object.is_none()
    }
}
