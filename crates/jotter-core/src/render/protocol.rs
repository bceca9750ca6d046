//! Request/response messages exchanged with the render worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Light or dark presentation of rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub const ALL: [Self; 2] = [Self::Light, Self::Dark];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Name of the bundled highlighting theme used for this mode.
    #[must_use]
    pub const fn theme_name(self) -> &'static str {
        match self {
            Self::Light => "InspiredGitHub",
            Self::Dark => "base16-ocean.dark",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(Error::InvalidInput(format!("unknown color mode: {other}"))),
        }
    }
}

/// A message posted to the render worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderRequest {
    /// Highlight source code. Without a usable language the worker detects one.
    RenderCode {
        content: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        mode: ColorMode,
    },
    /// Convert markdown to HTML.
    RenderMarkdown { content: String },
    /// Enumerate the languages the highlighter knows.
    ListCodeLanguages,
}

impl RenderRequest {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RenderCode { .. } => "RENDER_CODE",
            Self::RenderMarkdown { .. } => "RENDER_MARKDOWN",
            Self::ListCodeLanguages => "LIST_CODE_LANGUAGES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedCode {
    /// Language actually used, lowercase
    pub language: String,
    /// Highlighted HTML
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLanguage {
    pub name: String,
    pub aliases: Vec<String>,
}

/// Successful worker output, one shape per request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum RenderOutput {
    Code(HighlightedCode),
    Markdown(String),
    Languages(Vec<CodeLanguage>),
}

/// Worker reply. The original request is echoed so callers can correlate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderResponse {
    Rendered {
        request: RenderRequest,
        output: RenderOutput,
    },
    Error {
        request: RenderRequest,
        message: String,
    },
}

impl RenderResponse {
    #[must_use]
    pub const fn request(&self) -> &RenderRequest {
        match self {
            Self::Rendered { request, .. } | Self::Error { request, .. } => request,
        }
    }

    /// Convert into the output, turning an error response into [`Error::Render`].
    pub fn into_output(self) -> Result<RenderOutput> {
        match self {
            Self::Rendered { output, .. } => Ok(output),
            Self::Error { message, .. } => Err(Error::Render(message)),
        }
    }
}
