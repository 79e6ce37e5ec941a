//! docstream Extractor
//!
//! Incrementally decodes the single fenced JSON block a generation service
//! embeds in its streamed answer.
//!
//! # Overview
//!
//! The model writes free text and, somewhere in it, one block of the form
//!
//! ~~~text
//! ```json
//! { ... }
//! ```
//! ~~~
//!
//! Text arrives in arbitrary slices that may split the fence markers or the
//! JSON itself. [`IncrementalExtractor`] keeps only the text seen since the
//! fence opened and re-parses it when a closing fence appears, falling back
//! to a tolerant [`repair_json`] pass for truncation artifacts.
//!
//! # Example Usage
//!
//! ```
//! use docstream_extractor::{ExtractorConfig, IncrementalExtractor};
//!
//! let mut extractor = IncrementalExtractor::new(ExtractorConfig::default());
//!
//! let first = extractor.process_chunk("Result:\n```json\n{\"a\": 1, \"b\": [1,2");
//! assert!(first.block_opened);
//! assert!(first.object.is_none());
//!
//! let second = extractor.process_chunk(",3]}\n```");
//! assert_eq!(second.object.unwrap()["b"][2], 3);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod repair;
mod types;

pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::IncrementalExtractor;
pub use repair::repair_json;
pub use types::ChunkOutcome;
