//! Buffered drafts.
//!
//! Clients that stream every edit post them as drafts. Each note being
//! drafted gets an autosave task that turns bursts of edits into a single
//! version once input goes quiet, or after the maximum wait.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use jotter_core::debounce::{spawn_autosave, AutosaveHandle, SaveDebouncer};
use jotter_core::models::MAX_CONTENT_BYTES;
use jotter_core::services::NoteService;
use jotter_core::{Note, NoteId};

pub struct DraftTable {
    notes: NoteService,
    debouncer: SaveDebouncer,
    handles: Mutex<HashMap<NoteId, AutosaveHandle>>,
}

impl DraftTable {
    pub fn new(notes: NoteService, debouncer: SaveDebouncer) -> Self {
        Self {
            notes,
            debouncer,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Queue the full current content of `id`.
    pub fn push(&self, id: &NoteId, content: String) -> jotter_core::Result<()> {
        if content.len() > MAX_CONTENT_BYTES {
            return Err(jotter_core::Error::ContentTooLarge {
                size: content.len(),
                limit: MAX_CONTENT_BYTES,
            });
        }

        let mut handles = self.table();
        if handles.get(id).is_some_and(AutosaveHandle::is_finished) {
            if let Some(stopped) = handles.remove(id) {
                let id = id.clone();
                tokio::spawn(async move {
                    if let Err(error) = stopped.finish().await {
                        tracing::warn!(note = %id, "Draft autosave stopped: {error}");
                    }
                });
            }
        }
        handles
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(note = %id, "Started draft autosave");
                spawn_autosave(self.notes.clone(), id.clone(), self.debouncer.clone())
            })
            .edit(content)
    }

    /// Save any buffered draft of `id` now and stop its autosave task.
    pub async fn flush(&self, id: &NoteId) -> jotter_core::Result<Option<Note>> {
        let handle = self.table().remove(id);
        match handle {
            Some(handle) => handle.finish().await,
            None => Ok(None),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<NoteId, AutosaveHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
