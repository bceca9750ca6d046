//! Per-note sequencing of editor previews.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jotter_core::render::RenderSequencer;
use jotter_core::NoteId;

/// One [`RenderSequencer`] per note being previewed, so a newer preview of a
/// note supersedes older ones still queued on the worker.
#[derive(Default)]
pub struct PreviewSequencers {
    sequencers: Mutex<HashMap<NoteId, Arc<RenderSequencer>>>,
}

impl PreviewSequencers {
    pub fn for_note(&self, id: &NoteId) -> Arc<RenderSequencer> {
        Arc::clone(self.table().entry(id.clone()).or_default())
    }

    /// Drop the sequencer of a note that was deleted or renamed.
    pub fn forget(&self, id: &NoteId) {
        self.table().remove(id);
    }

    fn table(&self) -> MutexGuard<'_, HashMap<NoteId, Arc<RenderSequencer>>> {
        self.sequencers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
