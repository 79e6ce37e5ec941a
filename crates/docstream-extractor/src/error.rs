//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The stream ended inside a fence whose content could not be recovered
    #[error("Unparseable JSON block ({bytes} bytes): {reason}")]
    UnparseableBlock {
        /// Size of the buffered block
        bytes: usize,
        /// Last parse error reported by serde_json
        reason: String,
    },
}
