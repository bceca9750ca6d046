//! Shared note service wrapper used by async callers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Note, NoteId, NoteVersionInfo};
use crate::storage::{FileStorage, MemoryStorage};
use crate::store::NoteStore;
use crate::Result;

/// Thread-safe, cheaply clonable handle over a [`NoteStore`].
///
/// Store operations do blocking file I/O, so every call is moved onto the
/// tokio blocking pool.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<NoteStore>,
    data_dir: Option<PathBuf>,
}

impl NoteService {
    /// Open a file-backed note service rooted at `data_dir`.
    pub async fn open_path(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let root = data_dir.clone();
        let storage = tokio::task::spawn_blocking(move || FileStorage::open(root)).await??;
        tracing::info!("Note data directory: {}", data_dir.display());
        Ok(Self {
            store: Arc::new(NoteStore::new(storage)),
            data_dir: Some(data_dir),
        })
    }

    /// Open an in-memory note service (primarily for tests).
    pub fn in_memory() -> Self {
        Self::from_store(NoteStore::new(MemoryStorage::new()))
    }

    /// Wrap an already constructed store.
    pub fn from_store(store: NoteStore) -> Self {
        Self {
            store: Arc::new(store),
            data_dir: None,
        }
    }

    /// Data directory when file-backed.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&NoteStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store)).await?
    }

    pub async fn generate_new_id(&self) -> Result<NoteId> {
        self.run(NoteStore::generate_new_id).await
    }

    pub async fn has_note(&self, id: &NoteId) -> Result<bool> {
        let id = id.clone();
        self.run(move |store| store.has_note(&id)).await
    }

    pub async fn has_note_version(&self, id: &NoteId, version: u32) -> Result<bool> {
        let id = id.clone();
        self.run(move |store| store.has_note_version(&id, version))
            .await
    }

    pub async fn get_note(&self, id: &NoteId, version: Option<u32>) -> Result<Note> {
        let id = id.clone();
        self.run(move |store| store.get_note(&id, version)).await
    }

    pub async fn get_current_version(&self, id: &NoteId) -> Result<u32> {
        let id = id.clone();
        self.run(move |store| store.get_current_version(&id)).await
    }

    pub async fn update_note(&self, id: &NoteId, content: String) -> Result<Note> {
        let id = id.clone();
        self.run(move |store| store.update_note(&id, &content))
            .await
    }

    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let id = id.clone();
        self.run(move |store| store.delete_note(&id)).await
    }

    pub async fn rename_note(&self, id: &NoteId, new_id: String) -> Result<()> {
        let id = id.clone();
        self.run(move |store| store.rename_note(&id, &new_id))
            .await
    }

    pub async fn get_note_history(&self, id: &NoteId) -> Result<Vec<NoteVersionInfo>> {
        let id = id.clone();
        self.run(move |store| store.get_note_history(&id)).await
    }
}
