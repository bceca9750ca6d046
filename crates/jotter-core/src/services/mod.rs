//! Async service wrappers shared by the server and background tasks.

mod notes;

pub use notes::NoteService;
