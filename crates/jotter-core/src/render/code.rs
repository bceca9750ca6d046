//! Syntax highlighting backed by syntect's bundled syntaxes and themes.

use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use super::protocol::{CodeLanguage, ColorMode, HighlightedCode};
use crate::{Error, Result};

/// Keyword probes tried when neither the caller nor the first line names a
/// language. First match wins.
const CONTENT_PROBES: &[(&str, &str)] = &[
    ("<?php", "php"),
    ("<!doctype html", "html"),
    ("<html", "html"),
    ("#include <", "c++"),
    ("fn main(", "rust"),
    ("impl ", "rust"),
    ("package main", "go"),
    ("func ", "go"),
    ("def ", "python"),
    ("import java.", "java"),
    ("public class ", "java"),
    ("function ", "javascript"),
    ("const ", "javascript"),
    ("select ", "sql"),
    ("#!/bin/", "bash"),
];

/// Loaded syntax and theme sets.
pub struct CodeHighlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl CodeHighlighter {
    /// Load the bundled syntax definitions and themes. This is the expensive
    /// step the render worker defers until the first code request.
    pub fn load() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    /// Highlight `content` as HTML.
    ///
    /// An unknown or missing `language` falls back to detection; detection
    /// falls back to plain text, so this only fails if highlighting itself
    /// fails.
    pub fn highlight(
        &self,
        content: &str,
        language: Option<&str>,
        mode: ColorMode,
    ) -> Result<HighlightedCode> {
        let requested = language
            .map(str::trim)
            .filter(|language| !language.is_empty())
            .and_then(|language| {
                self.syntaxes
                    .find_syntax_by_token(language)
                    .map(|syntax| (syntax, language.to_ascii_lowercase()))
            });
        if requested.is_none() {
            if let Some(language) = language {
                tracing::debug!(language, "Unknown language, detecting instead");
            }
        }
        let (syntax, language) = requested.unwrap_or_else(|| {
            let syntax = self.detect(content);
            (syntax, syntax.name.to_ascii_lowercase())
        });

        let theme = self.themes.themes.get(mode.theme_name()).ok_or_else(|| {
            Error::Render(format!("missing highlight theme {}", mode.theme_name()))
        })?;
        let value = highlighted_html_for_string(content, &self.syntaxes, syntax, theme)
            .map_err(|error| Error::Render(error.to_string()))?;

        Ok(HighlightedCode { language, value })
    }

    /// Known languages sorted by name; aliases are the file extensions each
    /// syntax claims.
    pub fn languages(&self) -> Vec<CodeLanguage> {
        let mut languages: Vec<CodeLanguage> = self
            .syntaxes
            .syntaxes()
            .iter()
            .map(|syntax| CodeLanguage {
                name: syntax.name.clone(),
                aliases: syntax.file_extensions.clone(),
            })
            .collect();
        languages.sort_by_key(|language| language.name.to_ascii_lowercase());
        languages
    }

    fn detect(&self, content: &str) -> &SyntaxReference {
        if let Some(syntax) = self.syntaxes.find_syntax_by_first_line(content) {
            return syntax;
        }

        let lowered = content.to_ascii_lowercase();
        CONTENT_PROBES
            .iter()
            .filter(|(needle, _)| lowered.contains(needle))
            .find_map(|(_, token)| self.syntaxes.find_syntax_by_token(token))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }
}
