//! Flat-file note storage.
//!
//! Layout under the data directory:
//!
//! ```text
//! {root}/{id}                        latest content
//! {root}/_versions/{id}/{version}    one file per version
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{NoteStorage, StoredContent};
use crate::models::{NoteId, NoteVersionInfo};
use crate::util::system_time_millis;
use crate::{Error, Result};

const VERSIONS_DIR: &str = "_versions";

/// Note storage backed by plain files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(VERSIONS_DIR))?;
        tracing::debug!(root = %root.display(), "Opened file note storage");
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn note_path(&self, id: &NoteId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn versions_dir(&self, id: &NoteId) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(id.as_str())
    }

    fn version_path(&self, id: &NoteId, version: u32) -> PathBuf {
        self.versions_dir(id).join(version.to_string())
    }

    fn read(path: &Path) -> Result<Option<StoredContent>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let modified_at = system_time_millis(fs::metadata(path)?.modified()?);
        Ok(Some(StoredContent {
            content,
            modified_at,
        }))
    }

    fn write_temp(dir: &Path, content: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        Ok(file)
    }
}

fn is_file(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}

fn ignore_not_found(result: io::Result<()>) -> Result<()> {
    match result {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error.into()),
        _ => Ok(()),
    }
}

impl NoteStorage for FileStorage {
    fn exists(&self, id: &NoteId) -> Result<bool> {
        is_file(&self.note_path(id))
    }

    fn version_exists(&self, id: &NoteId, version: u32) -> Result<bool> {
        is_file(&self.version_path(id, version))
    }

    fn get(&self, id: &NoteId, version: Option<u32>) -> Result<Option<StoredContent>> {
        match version {
            Some(version) => Self::read(&self.version_path(id, version)),
            None => Self::read(&self.note_path(id)),
        }
    }

    fn put(&self, id: &NoteId, version: u32, content: &str) -> Result<i64> {
        let versions_dir = self.versions_dir(id);
        fs::create_dir_all(&versions_dir)?;

        // Versions are immutable: never clobber an existing version file.
        Self::write_temp(&versions_dir, content)?
            .persist_noclobber(self.version_path(id, version))
            .map_err(|error| Error::Io(error.error))?;

        // The root file is swapped in with an atomic rename.
        let note_path = self.note_path(id);
        Self::write_temp(&self.root, content)?
            .persist(&note_path)
            .map_err(|error| Error::Io(error.error))?;

        Ok(system_time_millis(fs::metadata(&note_path)?.modified()?))
    }

    fn list(&self, id: &NoteId) -> Result<Vec<NoteVersionInfo>> {
        let entries = match fs::read_dir(self.versions_dir(id)) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(version) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            versions.push(NoteVersionInfo {
                version,
                modified_at: system_time_millis(metadata.modified()?),
                size_bytes: metadata.len(),
            });
        }
        versions.sort_by_key(|info| info.version);
        Ok(versions)
    }

    fn delete(&self, id: &NoteId) -> Result<()> {
        ignore_not_found(fs::remove_file(self.note_path(id)))?;
        ignore_not_found(fs::remove_dir_all(self.versions_dir(id)))
    }

    /// Moves the history first so a failure leaves the note whole under
    /// one id: a failed history move changes nothing, and a failed root move
    /// puts the history back.
    fn rename(&self, id: &NoteId, new_id: &NoteId) -> Result<()> {
        let (versions_from, versions_to) = (self.versions_dir(id), self.versions_dir(new_id));
        let moved_versions = match fs::rename(&versions_from, &versions_to) {
            Ok(()) => true,
            Err(error) if error.kind() == io::ErrorKind::NotFound => false,
            Err(error) => return Err(error.into()),
        };

        let moved_root = fs::rename(self.note_path(id), self.note_path(new_id));
        if let Err(error) = ignore_not_found(moved_root) {
            if moved_versions {
                if let Err(rollback) = fs::rename(&versions_to, &versions_from) {
                    tracing::error!(
                        note = %id,
                        new_id = %new_id,
                        "Failed to restore history after rename error: {rollback}"
                    );
                }
            }
            return Err(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn id(value: &str) -> NoteId {
        NoteId::parse(value).unwrap()
    }

    #[test]
    fn put_writes_root_and_version_files() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "hello").unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("abcde")).unwrap(),
            "hello"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("_versions/abcde/1")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn put_refuses_to_overwrite_a_version() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "first").unwrap();

        assert!(storage.put(&id("abcde"), 1, "second").is_err());
        assert_eq!(
            storage.get(&id("abcde"), Some(1)).unwrap().unwrap().content,
            "first"
        );
    }

    #[test]
    fn list_skips_foreign_entries() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "a").unwrap();
        storage.put(&id("abcde"), 2, "bb").unwrap();
        fs::write(tmp.path().join("_versions/abcde/notes.txt"), "x").unwrap();

        let versions = storage.list(&id("abcde")).unwrap();
        let summary: Vec<(u32, u64)> = versions
            .iter()
            .map(|info| (info.version, info.size_bytes))
            .collect();
        assert_eq!(summary, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn list_sorts_numerically() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        for version in 1..=11 {
            storage.put(&id("abcde"), version, "x").unwrap();
        }
        let versions: Vec<u32> = storage
            .list(&id("abcde"))
            .unwrap()
            .into_iter()
            .map(|info| info.version)
            .collect();
        assert_eq!(versions, (1..=11).collect::<Vec<_>>());
    }

    #[test]
    fn missing_note_reads_as_none() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        assert!(!storage.exists(&id("nope")).unwrap());
        assert!(storage.get(&id("nope"), None).unwrap().is_none());
        assert!(storage.list(&id("nope")).unwrap().is_empty());
        storage.delete(&id("nope")).unwrap();
    }

    #[test]
    fn rename_moves_files() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "hello").unwrap();
        storage.rename(&id("abcde"), &id("fghjk")).unwrap();

        assert!(!tmp.path().join("abcde").exists());
        assert!(!tmp.path().join("_versions/abcde").exists());
        assert!(storage.exists(&id("fghjk")).unwrap());
        assert!(storage.version_exists(&id("fghjk"), 1).unwrap());
    }

    #[test]
    fn rename_onto_leftover_history_leaves_note_in_place() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "hello").unwrap();
        let leftover = tmp.path().join("_versions/fghjk");
        fs::create_dir_all(&leftover).unwrap();
        fs::write(leftover.join("notes.txt"), "stray").unwrap();
        assert!(storage.list(&id("fghjk")).unwrap().is_empty());

        assert!(storage.rename(&id("abcde"), &id("fghjk")).is_err());
        assert!(storage.exists(&id("abcde")).unwrap());
        assert!(storage.version_exists(&id("abcde"), 1).unwrap());
        assert!(!storage.exists(&id("fghjk")).unwrap());
    }

    #[test]
    fn failed_root_move_restores_history() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::open(tmp.path()).unwrap();
        storage.put(&id("abcde"), 1, "hello").unwrap();
        // A non-empty directory in the root file's place blocks the move.
        fs::create_dir_all(tmp.path().join("fghjk/inner")).unwrap();

        assert!(storage.rename(&id("abcde"), &id("fghjk")).is_err());
        assert_eq!(storage.get(&id("abcde"), None).unwrap().unwrap().content, "hello");
        assert!(storage.version_exists(&id("abcde"), 1).unwrap());
        assert!(!tmp.path().join("_versions/fghjk").exists());
    }
}
