//! Identity types for rooms and clients.

use std::fmt;

/// Identifies a shared document and therefore its room.
///
/// A valid id is a single, non-empty path segment: it travels in the
/// upgrade URL and is used as a directory name by
/// [`DirectoryContentProvider`](crate::DirectoryContentProvider), so
/// separators and dot segments are refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    /// Validates and wraps a raw id. Returns `None` if it is empty, is
    /// `.` or `..`, or contains a path separator.
    pub fn parse(raw: &str) -> Option<Self> {
        let invalid = raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\']);
        if invalid {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one connected client within the process.
///
/// The gateway derives it from the transport's connection id, so it is
/// unique for the lifetime of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_accepts_plain_segments() {
        let id = DocumentId::parse("doc-42").unwrap();
        assert_eq!(id.as_str(), "doc-42");
        assert_eq!(id.to_string(), "doc-42");
    }

    #[test]
    fn test_document_id_rejects_empty_and_traversal() {
        for raw in ["", ".", "..", "a/b", "a\\b", "/"] {
            assert!(DocumentId::parse(raw).is_none(), "{raw:?} accepted");
        }
    }

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId(7).to_string(), "client-7");
    }
}
