//! Background rendering of note content.
//!
//! A [`RenderWorker`] owns a dedicated thread that turns raw note content into
//! highlighted code or HTML from markdown. The heavy libraries are loaded the
//! first time a request needs them and then cached for the worker's lifetime.

mod code;
mod markdown;
mod protocol;
mod sequence;
mod worker;

pub use code::CodeHighlighter;
pub use markdown::MarkdownRenderer;
pub use protocol::{
    CodeLanguage, ColorMode, HighlightedCode, RenderOutput, RenderRequest, RenderResponse,
};
pub use sequence::RenderSequencer;
pub use worker::{Library, RenderPhase, RenderWorker, WorkerStats};
