//! Debounced autosave.
//!
//! Rapid edits are coalesced into a single save once input goes quiet, but a
//! save is never held back longer than a maximum buffering window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::models::{Note, NoteId};
use crate::services::NoteService;
use crate::{Error, Result};

/// Quiet period used by the editor.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(750);
/// Longest time an unsaved edit may be buffered.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5);

/// Save scheduling state machine.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    quiet_period: Duration,
    max_wait: Duration,
    first_pending: Option<Instant>,
    last_input: Option<Instant>,
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD, DEFAULT_MAX_WAIT)
    }
}

impl SaveDebouncer {
    #[must_use]
    pub const fn new(quiet_period: Duration, max_wait: Duration) -> Self {
        Self {
            quiet_period,
            max_wait,
            first_pending: None,
            last_input: None,
        }
    }

    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Note an edit at `now`.
    pub fn record_input(&mut self, now: Instant) {
        self.first_pending.get_or_insert(now);
        self.last_input = Some(now);
    }

    pub const fn is_pending(&self) -> bool {
        self.first_pending.is_some()
    }

    /// When the pending edit must be saved, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        let first = self.first_pending?;
        let last = self.last_input?;
        Some((last + self.quiet_period).min(first + self.max_wait))
    }

    /// Returns `true` (and clears the pending state) when a save is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {
                self.first_pending = None;
                self.last_input = None;
                true
            }
            _ => false,
        }
    }
}

/// Handle to a running autosave task for one note.
pub struct AutosaveHandle {
    edits: mpsc::UnboundedSender<String>,
    task: JoinHandle<Result<Option<Note>>>,
}

impl AutosaveHandle {
    /// Submit the full current content of the note.
    pub fn edit(&self, content: impl Into<String>) -> Result<()> {
        self.edits
            .send(content.into())
            .map_err(|_| Error::Task("autosave task has stopped".to_string()))
    }

    /// Whether the task has stopped, which only happens early when a save
    /// failed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Flush any pending edit and stop. Returns the last note saved.
    pub async fn finish(self) -> Result<Option<Note>> {
        drop(self.edits);
        self.task.await?
    }
}

/// Start an autosave loop saving `id` through `service`.
pub fn spawn_autosave(service: NoteService, id: NoteId, debouncer: SaveDebouncer) -> AutosaveHandle {
    let (edits, queue) = mpsc::unbounded_channel();
    let task = tokio::spawn(autosave_loop(service, id, debouncer, queue));
    AutosaveHandle { edits, task }
}

async fn autosave_loop(
    service: NoteService,
    id: NoteId,
    mut debouncer: SaveDebouncer,
    mut queue: mpsc::UnboundedReceiver<String>,
) -> Result<Option<Note>> {
    let mut latest: Option<String> = None;
    let mut saved = None;

    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            edit = queue.recv() => match edit {
                Some(content) => {
                    latest = Some(content);
                    debouncer.record_input(Instant::now());
                }
                None => break,
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.poll(Instant::now()) {
                    if let Some(content) = latest.take() {
                        saved = Some(service.update_note(&id, content).await?);
                    }
                }
            }
        }
    }

    if let Some(content) = latest.take() {
        tracing::debug!(note = %id, "Flushing pending edit");
        saved = Some(service.update_note(&id, content).await?);
    }
    Ok(saved)
}
