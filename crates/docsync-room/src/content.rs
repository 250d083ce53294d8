//! Content lookup for seeding new rooms.
//!
//! docsync doesn't own documents; the surrounding application does. It
//! defines the [`ContentProvider`] trait: a single async method that takes
//! a [`DocumentId`] and returns the document's plaintext and title. The
//! registry calls it once, when a room is created.
//!
//! Two implementations ship with the crate:
//! - [`MemoryContentProvider`] — a fixed map, for tests and demos.
//! - [`DirectoryContentProvider`] — reads `<root>/<id>/<title>.md`, the
//!   layout of a share directory on disk.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::DocumentId;

/// A document as the content provider returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Plaintext content (markdown).
    pub text: String,
    /// Display title.
    pub title: String,
}

impl Document {
    /// Creates a document.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: title.into(),
        }
    }
}

/// Errors a content provider can report.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// No document exists for this id.
    #[error("document {0} not found")]
    NotFound(DocumentId),

    /// Reading the document failed.
    #[error("failed to read document {id}: {source}")]
    Io {
        id: DocumentId,
        #[source]
        source: io::Error,
    },

    /// The backing store could not be reached.
    #[error("content provider unavailable: {0}")]
    Unavailable(String),
}

impl ContentError {
    /// Returns `true` for [`ContentError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Looks up the current content of a document.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the provider lives inside the registry,
///   which is shared across every connection task.
/// - The returned future is `Send` so lookups can run on any worker
///   thread.
pub trait ContentProvider: Send + Sync + 'static {
    /// Returns the document for `id`, or [`ContentError::NotFound`].
    fn lookup(
        &self,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Document, ContentError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryContentProvider
// ---------------------------------------------------------------------------

/// A [`ContentProvider`] backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentProvider {
    documents: HashMap<DocumentId, Document>,
}

impl MemoryContentProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document, builder style.
    pub fn with_document(mut self, id: DocumentId, document: Document) -> Self {
        self.insert(id, document);
        self
    }

    /// Adds or replaces a document.
    pub fn insert(&mut self, id: DocumentId, document: Document) {
        self.documents.insert(id, document);
    }
}

impl ContentProvider for MemoryContentProvider {
    async fn lookup(&self, id: &DocumentId) -> Result<Document, ContentError> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(id.clone()))
    }
}

// ---------------------------------------------------------------------------
// DirectoryContentProvider
// ---------------------------------------------------------------------------

/// A [`ContentProvider`] that reads markdown files from a share directory.
///
/// Each document lives in its own directory named after its id, holding
/// one `.md` file whose stem is the title:
///
/// ```text
/// <root>/
///   doc-42/
///     Meeting notes.md
/// ```
///
/// If a directory holds several `.md` files, the first by name is used.
///
/// The markdown is seeded exactly as stored. Image links keep their local
/// paths; rewriting them to URLs served elsewhere is up to whatever
/// writes the share directory, or a custom [`ContentProvider`].
#[derive(Debug, Clone)]
pub struct DirectoryContentProvider {
    root: PathBuf,
}

impl DirectoryContentProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the share directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentProvider for DirectoryContentProvider {
    async fn lookup(&self, id: &DocumentId) -> Result<Document, ContentError> {
        let dir = self.root.join(id.as_str());
        let io_err = |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                ContentError::NotFound(id.clone())
            } else {
                ContentError::Io {
                    id: id.clone(),
                    source,
                }
            }
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
        let mut markdown = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                markdown.push(path);
            }
        }
        markdown.sort();

        let path = markdown
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::NotFound(id.clone()))?;
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = tokio::fs::read_to_string(&path).await.map_err(io_err)?;

        tracing::debug!(document_id = %id, %title, bytes = text.len(), "read document");
        Ok(Document { text, title })
    }
}
