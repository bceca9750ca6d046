//! In-process note storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::{NoteStorage, StoredContent};
use crate::models::{NoteId, NoteVersionInfo};
use crate::util::unix_millis_now;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MemoryNote {
    root: Option<StoredContent>,
    versions: BTreeMap<u32, StoredContent>,
}

/// Note storage kept entirely in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    notes: RwLock<HashMap<NoteId, MemoryNote>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<NoteId, MemoryNote>) -> T) -> T {
        let guard = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<NoteId, MemoryNote>) -> T) -> T {
        let mut guard = self.notes.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl NoteStorage for MemoryStorage {
    fn exists(&self, id: &NoteId) -> Result<bool> {
        Ok(self.read(|notes| notes.get(id).is_some_and(|note| note.root.is_some())))
    }

    fn version_exists(&self, id: &NoteId, version: u32) -> Result<bool> {
        Ok(self.read(|notes| {
            notes
                .get(id)
                .is_some_and(|note| note.versions.contains_key(&version))
        }))
    }

    fn get(&self, id: &NoteId, version: Option<u32>) -> Result<Option<StoredContent>> {
        Ok(self.read(|notes| {
            let note = notes.get(id)?;
            match version {
                Some(version) => note.versions.get(&version).cloned(),
                None => note.root.clone(),
            }
        }))
    }

    fn put(&self, id: &NoteId, version: u32, content: &str) -> Result<i64> {
        let modified_at = unix_millis_now();
        self.write(|notes| {
            let note = notes.entry(id.clone()).or_default();
            if note.versions.contains_key(&version) {
                return Err(Error::InvalidInput(format!(
                    "version {version} of {id} already exists"
                )));
            }
            let stored = StoredContent {
                content: content.to_string(),
                modified_at,
            };
            note.versions.insert(version, stored.clone());
            note.root = Some(stored);
            Ok(modified_at)
        })
    }

    fn list(&self, id: &NoteId) -> Result<Vec<NoteVersionInfo>> {
        Ok(self.read(|notes| {
            notes
                .get(id)
                .map(|note| {
                    note.versions
                        .iter()
                        .map(|(version, stored)| NoteVersionInfo {
                            version: *version,
                            modified_at: stored.modified_at,
                            size_bytes: stored.content.len() as u64,
                        })
                        .collect()
                })
                .unwrap_or_default()
        }))
    }

    fn delete(&self, id: &NoteId) -> Result<()> {
        self.write(|notes| {
            notes.remove(id);
        });
        Ok(())
    }

    fn rename(&self, id: &NoteId, new_id: &NoteId) -> Result<()> {
        self.write(|notes| {
            if let Some(note) = notes.remove(id) {
                notes.insert(new_id.clone(), note);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> NoteId {
        NoteId::parse(value).unwrap()
    }

    #[test]
    fn put_updates_root_and_keeps_versions() {
        let storage = MemoryStorage::new();
        storage.put(&id("abcde"), 1, "one").unwrap();
        storage.put(&id("abcde"), 2, "two").unwrap();

        assert_eq!(storage.get(&id("abcde"), None).unwrap().unwrap().content, "two");
        assert_eq!(
            storage.get(&id("abcde"), Some(1)).unwrap().unwrap().content,
            "one"
        );
        assert_eq!(storage.list(&id("abcde")).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let storage = MemoryStorage::new();
        storage.put(&id("abcde"), 1, "one").unwrap();
        assert!(storage.put(&id("abcde"), 1, "again").is_err());
    }

    #[test]
    fn delete_and_rename_of_missing_note_are_noops() {
        let storage = MemoryStorage::new();
        storage.delete(&id("abcde")).unwrap();
        storage.rename(&id("abcde"), &id("fghjk")).unwrap();
        assert!(!storage.exists(&id("fghjk")).unwrap());
    }
}
