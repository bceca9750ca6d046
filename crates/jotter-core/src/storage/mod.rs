//! Storage abstractions for note content.
//!
//! The note store talks to a [`NoteStorage`] backend keyed by note id and
//! version. [`FileStorage`] keeps flat files on disk; [`MemoryStorage`] keeps
//! everything in-process.

mod fs;
mod memory;

pub use fs::FileStorage;
pub use memory::MemoryStorage;

use crate::models::{NoteId, NoteVersionInfo};
use crate::Result;

/// Raw content of one stored record plus its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub content: String,
    /// Unix ms
    pub modified_at: i64,
}

/// Storage operations shared across note backends.
///
/// Every note has a root record mirroring its latest content and one immutable
/// record per version.
pub trait NoteStorage: Send + Sync {
    /// Whether the root record for `id` exists.
    fn exists(&self, id: &NoteId) -> Result<bool>;

    /// Whether the record for a specific version exists.
    fn version_exists(&self, id: &NoteId, version: u32) -> Result<bool>;

    /// Read the root record, or a specific version when `version` is set.
    fn get(&self, id: &NoteId, version: Option<u32>) -> Result<Option<StoredContent>>;

    /// Write `content` as `version`, then replace the root record with it.
    ///
    /// Returns the write time in Unix ms.
    fn put(&self, id: &NoteId, version: u32, content: &str) -> Result<i64>;

    /// All version records for `id`, ascending by version.
    fn list(&self, id: &NoteId) -> Result<Vec<NoteVersionInfo>>;

    /// Remove the root record and every version. Absent notes are a no-op.
    fn delete(&self, id: &NoteId) -> Result<()>;

    /// Move the root record and every version from `id` to `new_id`.
    fn rename(&self, id: &NoteId, new_id: &NoteId) -> Result<()>;
}
