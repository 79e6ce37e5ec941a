//! Identifiers used across the orchestrator

use std::fmt;

/// Caller-supplied identifier of a document submitted for analysis
///
/// Opaque to docstream; unique among concurrently active tasks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a raw document identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier announced by the generation service for one run
///
/// Only used to request cancellation of that run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamTaskId(String);

impl UpstreamTaskId {
    /// Parse an upstream task id, rejecting blank values
    ///
    /// # Examples
    ///
    /// ```
    /// use docstream_domain::UpstreamTaskId;
    ///
    /// assert!(UpstreamTaskId::parse("task-42").is_some());
    /// assert!(UpstreamTaskId::parse("  ").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any string with a non-whitespace character is a valid upstream id
        #[test]
        fn test_upstream_id_accepts_non_blank(raw in "[a-zA-Z0-9-]{1,40}") {
            let parsed = UpstreamTaskId::parse(&raw);
            prop_assert_eq!(parsed.map(|id| id.as_str().to_string()), Some(raw));
        }
    }
}
