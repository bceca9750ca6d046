//! Note model

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest note content accepted by the store (2.5 MiB).
pub const MAX_CONTENT_BYTES: usize = 2_621_440;

/// Characters used for generated ids. Visually ambiguous glyphs
/// (`0 1 2 5 6 8 i l o`) are left out.
pub const GENERATED_ID_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz3479";

/// Length of generated ids.
pub const GENERATED_ID_LENGTH: usize = 5;

/// Ids that collide with HTTP routes and can never name a note.
pub const RESERVED_IDS: &[&str] = &[
    "share",
    "shared",
    "history",
    "rename",
    "render",
    "languages",
    "healthz",
    "static",
    "new",
];

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("Invalid id regex")
});

/// A validated note identifier.
///
/// Ids are alphanumeric with `-` and `_` separators, start with an
/// alphanumeric character and are at most 64 characters long. Reserved route
/// names are rejected here, before an id can reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId(String);

impl NoteId {
    /// Parse and validate a note id.
    pub fn parse(value: &str) -> Result<Self> {
        if !ID_PATTERN.is_match(value) {
            return Err(Error::InvalidId(value.to_string()));
        }
        if RESERVED_IDS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(value))
        {
            return Err(Error::ReservedId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NoteId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NoteId> for String {
    fn from(id: NoteId) -> Self {
        id.0
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A note at a specific version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Note identifier
    pub id: NoteId,
    /// Version number, starting at 1
    pub version: u32,
    /// Time the version was written (Unix ms)
    pub modified_at: i64,
    /// Plain text content
    pub content: String,
}

impl Note {
    /// Size of the content in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

/// One entry of a note's version history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteVersionInfo {
    pub version: u32,
    /// Unix ms
    pub modified_at: i64,
    pub size_bytes: u64,
}
