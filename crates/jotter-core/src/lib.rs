//! jotter-core - Core library for Jotter
//!
//! This crate contains the note model, the versioned note store and its
//! storage backends, and the background render worker used by the Jotter
//! server to produce shared views and editor previews.

pub mod debounce;
pub mod error;
pub mod models;
pub mod render;
pub mod services;
pub mod share;
pub mod storage;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId, NoteVersionInfo};
pub use store::NoteStore;
