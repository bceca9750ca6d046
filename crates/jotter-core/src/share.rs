//! Read-only shared views of a note.
//!
//! A shared note is never persisted: it is the tuple (id, version, format,
//! mode) encoded in the share path and rendered on request.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Note, NoteId};
use crate::render::{RenderOutput, RenderRequest, RenderWorker};
use crate::util::escape_html;
use crate::{Error, Result};

pub use crate::render::ColorMode;

/// How shared content is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Plaintext,
    Markdown,
    Code,
}

impl RenderFormat {
    pub const ALL: [Self; 3] = [Self::Plaintext, Self::Markdown, Self::Code];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::Markdown => "markdown",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" | "text" => Ok(Self::Plaintext),
            "markdown" | "md" => Ok(Self::Markdown),
            "code" => Ok(Self::Code),
            other => Err(Error::InvalidInput(format!("unknown render format: {other}"))),
        }
    }
}

/// A share link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedNote {
    pub note_id: NoteId,
    /// Pinned version; `None` follows the latest content.
    pub version: Option<u32>,
    pub format: RenderFormat,
    pub mode: ColorMode,
}

impl SharedNote {
    #[must_use]
    pub const fn new(
        note_id: NoteId,
        version: Option<u32>,
        format: RenderFormat,
        mode: ColorMode,
    ) -> Self {
        Self {
            note_id,
            version,
            format,
            mode,
        }
    }

    /// Every format/mode combination for one note.
    #[must_use]
    pub fn all_for(note_id: &NoteId, version: Option<u32>) -> Vec<Self> {
        RenderFormat::ALL
            .iter()
            .flat_map(|format| {
                ColorMode::ALL
                    .iter()
                    .map(move |mode| Self::new(note_id.clone(), version, *format, *mode))
            })
            .collect()
    }

    /// Server-relative path of the shared view.
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = format!("/shared/{}/{}/{}", self.note_id, self.format, self.mode);
        if let Some(version) = self.version {
            let _ = write!(path, "?version={version}");
        }
        path
    }

    /// Absolute URL when a public base URL is known, else the path.
    #[must_use]
    pub fn url(&self, base_url: Option<&str>) -> String {
        match base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), self.path()),
            None => self.path(),
        }
    }

    /// Render `note` as an HTML fragment in this view's format.
    pub async fn render(&self, note: &Note, worker: &RenderWorker) -> Result<String> {
        let request = match self.format {
            RenderFormat::Plaintext => {
                return Ok(format!(
                    "<pre class=\"plaintext\">{}</pre>",
                    escape_html(&note.content)
                ));
            }
            RenderFormat::Markdown => RenderRequest::RenderMarkdown {
                content: note.content.clone(),
            },
            RenderFormat::Code => RenderRequest::RenderCode {
                content: note.content.clone(),
                language: None,
                mode: self.mode,
            },
        };

        match worker.render(request).await.into_output()? {
            RenderOutput::Markdown(html) => Ok(format!("<article class=\"markdown\">{html}</article>")),
            RenderOutput::Code(code) => Ok(format!(
                "<div class=\"code\" data-language=\"{}\">{}</div>",
                escape_html(&code.language),
                code.value
            )),
            RenderOutput::Languages(_) => Err(Error::Render(
                "unexpected language list for a shared view".to_string(),
            )),
        }
    }
}
