//! Server-rendered HTML pages.

use std::fmt::Write as _;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use jotter_core::debounce::SaveDebouncer;
use jotter_core::share::{ColorMode, SharedNote};
use jotter_core::util::escape_html;
use jotter_core::{NoteId, NoteVersionInfo};

const STYLE: &str = r"
body { font-family: system-ui, sans-serif; margin: 0; padding: 1rem 2rem; }
body.dark { background: #1e1e1e; color: #ddd; }
body.dark a { color: #8ab4f8; }
nav a { margin-right: 1rem; }
textarea { width: 100%; height: 70vh; font-family: ui-monospace, monospace; font-size: 14px; }
table { border-collapse: collapse; }
td, th { padding: 0.2rem 0.8rem; text-align: left; }
pre { white-space: pre-wrap; }
#status { color: #888; }
";

/// Editor script: debounced autosave with a maximum buffering window, and a
/// rendered preview that only ever shows the response to the latest request.
/// Expects `NOTE_ID`, `QUIET_MS` and `MAX_WAIT_MS` to be defined first.
const EDITOR_SCRIPT: &str = r"
const editor = document.getElementById('text');
const status = document.getElementById('status');
const previewFormat = document.getElementById('preview-format');
const previewLanguage = document.getElementById('preview-language');
const preview = document.getElementById('preview');
let firstPending = null, timer = null;
let previewSeq = 0, previewTimer = null;
function save() {
  firstPending = null; clearTimeout(timer); timer = null;
  fetch(location.pathname, {
    method: 'POST',
    headers: {'Content-Type': 'application/json', 'Accept': 'application/json'},
    body: JSON.stringify({text: editor.value}),
  }).then(r => r.json()).then(r => {
    status.textContent = r.error ? r.error : 'saved version ' + r.version;
  });
}
function renderPreview() {
  const seq = ++previewSeq;
  const format = previewFormat.value;
  if (format === 'none') { preview.innerHTML = ''; return; }
  const request = format === 'markdown'
    ? {type: 'RENDER_MARKDOWN', content: editor.value}
    : {type: 'RENDER_CODE', content: editor.value, language: previewLanguage.value || null};
  fetch('/render', {
    method: 'POST',
    headers: {'Content-Type': 'application/json', 'Accept': 'application/json'},
    body: JSON.stringify(Object.assign({seq: seq, note: NOTE_ID}, request)),
  }).then(r => r.status === 204 ? null : r.json()).then(r => {
    if (!r || r.seq !== previewSeq) return;
    if (r.type === 'ERROR') { preview.textContent = r.message; return; }
    preview.innerHTML = r.output.kind === 'markdown' ? r.output.data : r.output.data.value;
  });
}
function schedulePreview() {
  clearTimeout(previewTimer);
  previewTimer = setTimeout(renderPreview, 150);
}
editor.addEventListener('input', () => {
  const now = Date.now();
  if (firstPending === null) firstPending = now;
  clearTimeout(timer);
  const wait = Math.max(0, Math.min(QUIET_MS, firstPending + MAX_WAIT_MS - now));
  timer = setTimeout(save, wait);
  status.textContent = 'editing';
  schedulePreview();
});
previewFormat.addEventListener('change', renderPreview);
previewLanguage.addEventListener('change', renderPreview);
fetch('/languages').then(r => r.json()).then(languages => {
  const list = document.getElementById('languages');
  for (const language of languages) {
    const option = document.createElement('option');
    option.value = language.name;
    list.appendChild(option);
  }
});
";

fn layout(title: &str, mode: ColorMode, body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title><style>{STYLE}</style></head>\
         <body class=\"{}\">{body}</body></html>\n",
        escape_html(title),
        mode.as_str()
    )
}

fn format_time(unix_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(unix_ms)
        .map_or_else(|| unix_ms.to_string(), |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Editor for a note. An unknown id shows an empty editor; nothing is written
/// until the first save.
pub fn editor_page(
    id: &NoteId,
    content: &str,
    version: Option<u32>,
    debouncer: &SaveDebouncer,
) -> String {
    let status = version.map_or_else(
        || "new note".to_string(),
        |version| format!("version {version}"),
    );
    // The newline after <textarea> is swallowed by the HTML parser, so content
    // starting with a newline keeps it.
    let body = format!(
        "<nav><a href=\"/\">new</a><a href=\"/{id}/history\">history</a>\
         <a href=\"/share/{id}\">share</a></nav>\
         <form method=\"post\" action=\"/{id}\">\
         <textarea id=\"text\" name=\"text\" autofocus>\n{}</textarea>\
         <p><button type=\"submit\">save</button> <span id=\"status\">{status}</span></p></form>\
         <p><label>preview <select id=\"preview-format\">\
         <option value=\"none\">none</option><option value=\"markdown\">markdown</option>\
         <option value=\"code\">code</option></select></label> \
         <input id=\"preview-language\" list=\"languages\" placeholder=\"language (auto)\">\
         <datalist id=\"languages\"></datalist></p><div id=\"preview\"></div>\
         <script>const NOTE_ID = \"{id}\", QUIET_MS = {}, MAX_WAIT_MS = {};{EDITOR_SCRIPT}</script>",
        escape_html(content),
        debouncer.quiet_period().as_millis(),
        debouncer.max_wait().as_millis(),
    );
    layout(id.as_str(), ColorMode::Light, &body)
}

/// Read-only view of a specific version.
pub fn version_page(id: &NoteId, version: u32, content: &str) -> String {
    let body = format!(
        "<nav><a href=\"/{id}\">edit</a><a href=\"/{id}/history\">history</a>\
         <a href=\"/share/{id}/{version}\">share</a></nav>\
         <h1>{id} &middot; version {version}</h1><pre>\n{}</pre>",
        escape_html(content)
    );
    layout(&format!("{id} v{version}"), ColorMode::Light, &body)
}

pub fn history_page(id: &NoteId, history: &[NoteVersionInfo]) -> String {
    let mut rows = String::new();
    for info in history {
        let _ = write!(
            rows,
            "<tr><td><a href=\"/{id}/{version}\">{version}</a></td><td>{}</td><td>{}</td></tr>",
            format_time(info.modified_at),
            info.size_bytes,
            version = info.version,
        );
    }
    let body = format!(
        "<nav><a href=\"/{id}\">edit</a></nav><h1>History of {id}</h1>\
         <table><tr><th>version</th><th>modified</th><th>bytes</th></tr>{rows}</table>"
    );
    layout(&format!("{id} history"), ColorMode::Light, &body)
}

pub fn share_page(id: &NoteId, links: &[(SharedNote, String)]) -> String {
    let mut items = String::new();
    for (shared, url) in links {
        let _ = write!(
            items,
            "<li><a href=\"{url}\">{} ({})</a></li>",
            shared.format,
            shared.mode,
            url = escape_html(url),
        );
    }
    let body = format!("<nav><a href=\"/{id}\">edit</a></nav><h1>Share {id}</h1><ul>{items}</ul>");
    layout(&format!("share {id}"), ColorMode::Light, &body)
}

pub fn shared_page(shared: &SharedNote, rendered: &str) -> String {
    layout(shared.note_id.as_str(), shared.mode, rendered)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1><p>{}</p><p><a href=\"/\">start a new note</a></p>",
        status,
        escape_html(message)
    );
    layout(&status.to_string(), ColorMode::Light, &body)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use jotter_core::share::RenderFormat;

    fn id() -> NoteId {
        NoteId::parse("abcde").unwrap()
    }

    #[test]
    fn editor_escapes_content() {
        let page = editor_page(&id(), "</textarea><script>", Some(2), &SaveDebouncer::default());
        assert!(page.contains("&lt;/textarea&gt;&lt;script&gt;"));
        assert!(page.contains("version 2"));
    }

    #[test]
    fn new_note_editor_is_empty() {
        let page = editor_page(&id(), "", None, &SaveDebouncer::default());
        assert!(page.contains("autofocus>\n</textarea>"));
        assert!(page.contains("new note"));
    }

    #[test]
    fn editor_keeps_leading_newline() {
        let page = editor_page(&id(), "\nfoo", Some(1), &SaveDebouncer::default());
        assert!(page.contains("autofocus>\n\nfoo</textarea>"));

        let page = version_page(&id(), 1, "\nfoo");
        assert!(page.contains("<pre>\n\nfoo</pre>"));
    }

    #[test]
    fn editor_script_uses_configured_timing_and_preview() {
        let debouncer = SaveDebouncer::new(Duration::from_millis(200), Duration::from_secs(3));
        let page = editor_page(&id(), "", None, &debouncer);
        assert!(page.contains("const NOTE_ID = \"abcde\", QUIET_MS = 200, MAX_WAIT_MS = 3000;"));
        assert!(page.contains("id=\"preview-format\""));
        assert!(page.contains("fetch('/render'"));
        assert!(page.contains("r.seq !== previewSeq"));
    }

    #[test]
    fn history_links_every_version() {
        let history = [
            NoteVersionInfo {
                version: 1,
                modified_at: 0,
                size_bytes: 5,
            },
            NoteVersionInfo {
                version: 2,
                modified_at: 1_000,
                size_bytes: 11,
            },
        ];
        let page = history_page(&id(), &history);
        assert!(page.contains("href=\"/abcde/1\""));
        assert!(page.contains("href=\"/abcde/2\""));
        assert!(page.contains("1970-01-01 00:00:01 UTC"));
    }

    #[test]
    fn shared_page_uses_color_mode() {
        let shared = SharedNote::new(id(), None, RenderFormat::Markdown, ColorMode::Dark);
        let page = shared_page(&shared, "<p>hi</p>");
        assert!(page.contains("<body class=\"dark\"><p>hi</p></body>"));
    }
}
