//! Versioned note store.
//!
//! Maps note ids to versioned content on a [`NoteStorage`] backend. Every
//! update appends version `current + 1` and then replaces the root record, so
//! versions stay contiguous from 1 and the root always mirrors the latest one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;

use crate::models::{
    Note, NoteId, NoteVersionInfo, GENERATED_ID_ALPHABET, GENERATED_ID_LENGTH, MAX_CONTENT_BYTES,
};
use crate::storage::NoteStorage;
use crate::{Error, Result};

/// Attempts made by [`NoteStore::generate_new_id`] before giving up.
pub const ID_SELECTION_ATTEMPTS: u32 = 10;

type LockTable = HashMap<NoteId, Arc<Mutex<()>>>;

/// Note store over any storage backend.
///
/// Writers touching the same id are serialized through a per-id lock table;
/// reads take no lock.
pub struct NoteStore {
    storage: Box<dyn NoteStorage>,
    locks: Mutex<LockTable>,
}

impl NoteStore {
    pub fn new(storage: impl NoteStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Pick a random unused id.
    pub fn generate_new_id(&self) -> Result<NoteId> {
        self.generate_new_id_with(&mut rand::thread_rng())
    }

    /// Pick a random unused id using the given RNG.
    ///
    /// Candidates that collide with an existing note or a reserved route name
    /// are redrawn, up to [`ID_SELECTION_ATTEMPTS`] draws in total.
    pub fn generate_new_id_with<R: Rng>(&self, rng: &mut R) -> Result<NoteId> {
        for attempt in 1..=ID_SELECTION_ATTEMPTS {
            let candidate: String = (0..GENERATED_ID_LENGTH)
                .map(|_| {
                    char::from(GENERATED_ID_ALPHABET[rng.gen_range(0..GENERATED_ID_ALPHABET.len())])
                })
                .collect();
            let Ok(id) = NoteId::parse(&candidate) else {
                continue;
            };
            if self.storage.exists(&id)? {
                tracing::debug!(attempt, candidate = %id, "Generated id collided");
                continue;
            }
            return Ok(id);
        }
        tracing::error!(
            attempts = ID_SELECTION_ATTEMPTS,
            "Exhausted attempts selecting a new note id"
        );
        Err(Error::IdSelectionExhausted {
            attempts: ID_SELECTION_ATTEMPTS,
        })
    }

    pub fn has_note(&self, id: &NoteId) -> Result<bool> {
        self.storage.exists(id)
    }

    pub fn has_note_version(&self, id: &NoteId, version: u32) -> Result<bool> {
        self.storage.version_exists(id, version)
    }

    /// Read the latest content, or a specific version when `version` is set.
    ///
    /// The latest content is read from the newest version record, which is
    /// immutable, so the returned version always matches its content even
    /// while a writer appends a newer one.
    pub fn get_note(&self, id: &NoteId, version: Option<u32>) -> Result<Note> {
        let version = match version {
            Some(version) => version,
            None => match self.get_current_version(id)? {
                0 => return Err(Error::NotFound(id.to_string())),
                current => current,
            },
        };
        let stored = self
            .storage
            .get(id, Some(version))?
            .ok_or_else(|| Error::NotFound(format!("{id} (version {version})")))?;
        Ok(Note {
            id: id.clone(),
            version,
            modified_at: stored.modified_at,
            content: stored.content,
        })
    }

    /// Highest version present for `id`, or 0 when there is none.
    pub fn get_current_version(&self, id: &NoteId) -> Result<u32> {
        Ok(self
            .storage
            .list(id)?
            .last()
            .map_or(0, |info| info.version))
    }

    /// Append a new version with `content` and make it current.
    pub fn update_note(&self, id: &NoteId, content: &str) -> Result<Note> {
        if content.len() > MAX_CONTENT_BYTES {
            return Err(Error::ContentTooLarge {
                size: content.len(),
                limit: MAX_CONTENT_BYTES,
            });
        }

        self.with_note_locks(&[id], || {
            let version = self
                .get_current_version(id)?
                .checked_add(1)
                .ok_or_else(|| Error::InvalidInput(format!("{id} has too many versions")))?;
            let modified_at = self.storage.put(id, version, content)?;
            tracing::info!(note = %id, version, bytes = content.len(), "Saved note version");
            Ok(Note {
                id: id.clone(),
                version,
                modified_at,
                content: content.to_string(),
            })
        })
    }

    /// Remove a note and its whole history. Unknown ids are a no-op.
    pub fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.with_note_locks(&[id], || {
            self.storage.delete(id)?;
            tracing::info!(note = %id, "Deleted note");
            Ok(())
        })
    }

    /// Move a note and its history to `new_id`.
    ///
    /// Unknown source ids are a silent no-op. An existing target is never
    /// overwritten.
    pub fn rename_note(&self, id: &NoteId, new_id: &str) -> Result<()> {
        let new_id = NoteId::parse(new_id)?;
        if &new_id == id {
            return Ok(());
        }

        self.with_note_locks(&[id, &new_id], || {
            if !self.storage.exists(id)? && self.storage.list(id)?.is_empty() {
                tracing::debug!(note = %id, "Rename of unknown note ignored");
                return Ok(());
            }
            if self.storage.exists(&new_id)? || !self.storage.list(&new_id)?.is_empty() {
                return Err(Error::InvalidInput(format!("note {new_id} already exists")));
            }
            self.storage.rename(id, &new_id)?;
            tracing::info!(note = %id, new_id = %new_id, "Renamed note");
            Ok(())
        })
    }

    /// Every stored version of `id`, ascending.
    pub fn get_note_history(&self, id: &NoteId) -> Result<Vec<NoteVersionInfo>> {
        self.storage.list(id)
    }

    fn with_note_locks<T>(&self, ids: &[&NoteId], f: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let locks: Vec<(NoteId, Arc<Mutex<()>>)> = {
            let mut table = self.lock_table();
            ids.into_iter()
                .map(|id| (id.clone(), Arc::clone(table.entry(id.clone()).or_default())))
                .collect()
        };

        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = locks
                .iter()
                .map(|(_, lock)| lock.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };

        let mut table = self.lock_table();
        for (id, lock) in &locks {
            // Only the table and this call still hold the lock.
            if Arc::strong_count(lock) == 2 {
                table.remove(id);
            }
        }
        result
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
