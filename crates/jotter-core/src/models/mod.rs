//! Data models for Jotter

mod note;

pub use note::{
    Note, NoteId, NoteVersionInfo, GENERATED_ID_ALPHABET, GENERATED_ID_LENGTH,
    MAX_CONTENT_BYTES, RESERVED_IDS,
};
