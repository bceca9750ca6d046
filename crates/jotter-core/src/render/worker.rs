//! Dedicated render thread and its client handle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::code::CodeHighlighter;
use super::markdown::MarkdownRenderer;
use super::protocol::{RenderOutput, RenderRequest, RenderResponse};
use super::sequence::RenderSequencer;
use crate::{Error, Result};

/// Lazily loaded rendering library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    CodeHighlighter,
    Markdown,
}

/// Lifecycle of a single render request on the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Loading(Library),
    Ready,
    Rendering,
    Responded,
}

#[derive(Default)]
struct WorkerCounters {
    code_loads: AtomicU64,
    markdown_loads: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of worker activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub code_loads: u64,
    pub markdown_loads: u64,
    pub rendered: u64,
    pub failed: u64,
}

struct Job {
    request: RenderRequest,
    reply: oneshot::Sender<RenderResponse>,
}

/// Handle to a render thread. Clones share the same thread and queue.
///
/// Requests are processed one at a time in arrival order. The thread exits
/// once every handle has been dropped.
#[derive(Clone)]
pub struct RenderWorker {
    jobs: mpsc::UnboundedSender<Job>,
    counters: Arc<WorkerCounters>,
}

impl RenderWorker {
    /// Start a new worker thread with nothing loaded yet.
    pub fn spawn() -> Result<Self> {
        let (jobs, queue) = mpsc::unbounded_channel();
        let counters = Arc::new(WorkerCounters::default());
        let state = WorkerState::new(Arc::clone(&counters));

        thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || state.run(queue))?;
        tracing::debug!("Render worker started");

        Ok(Self { jobs, counters })
    }

    /// Queue a request and wait for its response.
    ///
    /// Never fails: a worker that is gone yields an error response.
    pub async fn render(&self, request: RenderRequest) -> RenderResponse {
        let (reply, response) = oneshot::channel();
        let job = Job {
            request: request.clone(),
            reply,
        };
        if self.jobs.send(job).is_err() {
            return shut_down(request);
        }
        response.await.unwrap_or_else(|_| shut_down(request))
    }

    /// Render and apply the result only if no newer request was issued through
    /// `sequencer` in the meantime. Stale responses come back as `None`.
    pub async fn render_sequenced(
        &self,
        sequencer: &RenderSequencer,
        request: RenderRequest,
    ) -> Option<RenderResponse> {
        let sequence = sequencer.issue();
        let response = self.render(request).await;
        let accepted = sequencer.accept(sequence, response);
        if accepted.is_none() {
            tracing::trace!(sequence, "Discarded stale render response");
        }
        accepted
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            code_loads: self.counters.code_loads.load(Ordering::Relaxed),
            markdown_loads: self.counters.markdown_loads.load(Ordering::Relaxed),
            rendered: self.counters.rendered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

fn shut_down(request: RenderRequest) -> RenderResponse {
    RenderResponse::Error {
        request,
        message: "render worker has shut down".to_string(),
    }
}

/// Per-worker library cache. Lives on the worker thread only.
struct WorkerState {
    code: Option<CodeHighlighter>,
    markdown: Option<MarkdownRenderer>,
    counters: Arc<WorkerCounters>,
}

impl WorkerState {
    const fn new(counters: Arc<WorkerCounters>) -> Self {
        Self {
            code: None,
            markdown: None,
            counters,
        }
    }

    fn run(mut self, mut queue: mpsc::UnboundedReceiver<Job>) {
        while let Some(Job { request, reply }) = queue.blocking_recv() {
            let kind = request.kind();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle(&request)))
                .unwrap_or_else(|_| Err(Error::Render(format!("{kind} renderer panicked"))));

            let response = match outcome {
                Ok(output) => {
                    self.counters.rendered.fetch_add(1, Ordering::Relaxed);
                    RenderResponse::Rendered { request, output }
                }
                Err(error) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(request = kind, "Render failed: {error}");
                    RenderResponse::Error {
                        request,
                        message: error.to_string(),
                    }
                }
            };
            // The caller may have stopped waiting; that is not an error.
            let _ = reply.send(response);
            trace_phase(kind, RenderPhase::Responded);
            trace_phase(kind, RenderPhase::Idle);
        }
        tracing::debug!("Render worker stopped");
    }

    fn handle(&mut self, request: &RenderRequest) -> Result<RenderOutput> {
        let kind = request.kind();
        match request {
            RenderRequest::RenderCode {
                content,
                language,
                mode,
            } => {
                let highlighter = self.code_highlighter(kind);
                trace_phase(kind, RenderPhase::Rendering);
                highlighter
                    .highlight(content, language.as_deref(), *mode)
                    .map(RenderOutput::Code)
            }
            RenderRequest::RenderMarkdown { content } => {
                let markdown = self.markdown(kind);
                trace_phase(kind, RenderPhase::Rendering);
                Ok(RenderOutput::Markdown(markdown.render(content)))
            }
            RenderRequest::ListCodeLanguages => {
                let highlighter = self.code_highlighter(kind);
                trace_phase(kind, RenderPhase::Rendering);
                Ok(RenderOutput::Languages(highlighter.languages()))
            }
        }
    }

    fn code_highlighter(&mut self, kind: &'static str) -> &CodeHighlighter {
        let counters = &self.counters;
        self.code.get_or_insert_with(|| {
            trace_phase(kind, RenderPhase::Loading(Library::CodeHighlighter));
            counters.code_loads.fetch_add(1, Ordering::Relaxed);
            let highlighter = CodeHighlighter::load();
            tracing::info!("Loaded code highlighter");
            trace_phase(kind, RenderPhase::Ready);
            highlighter
        })
    }

    fn markdown(&mut self, kind: &'static str) -> &MarkdownRenderer {
        let counters = &self.counters;
        self.markdown.get_or_insert_with(|| {
            trace_phase(kind, RenderPhase::Loading(Library::Markdown));
            counters.markdown_loads.fetch_add(1, Ordering::Relaxed);
            let markdown = MarkdownRenderer::load();
            trace_phase(kind, RenderPhase::Ready);
            markdown
        })
    }
}

fn trace_phase(request: &'static str, phase: RenderPhase) {
    tracing::trace!(request, ?phase, "Render phase");
}
