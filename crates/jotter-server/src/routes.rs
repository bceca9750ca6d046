use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use jotter_core::debounce::SaveDebouncer;
use jotter_core::render::{
    CodeLanguage, RenderOutput, RenderRequest, RenderResponse, RenderWorker, WorkerStats,
};
use jotter_core::services::NoteService;
use jotter_core::share::{ColorMode, RenderFormat, SharedNote};
use jotter_core::{Note, NoteId, NoteVersionInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::drafts::DraftTable;
use crate::error::{AppError, Negotiate, NegotiatedError};
use crate::negotiate::ResponseFormat;
use crate::pages;
use crate::preview::PreviewSequencers;

type HandlerResult = Result<Response, NegotiatedError>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    notes: NoteService,
    renderer: RenderWorker,
    previews: Arc<PreviewSequencers>,
    drafts: Arc<DraftTable>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, notes: NoteService, renderer: RenderWorker) -> Self {
        let drafts = Arc::new(DraftTable::new(notes.clone(), config.debouncer()));
        Self {
            config,
            notes,
            renderer,
            previews: Arc::default(),
            drafts,
        }
    }

    /// Save buffered drafts of `id` before it is written, moved or removed
    /// another way.
    async fn settle_drafts(&self, id: &NoteId) -> jotter_core::Result<()> {
        if let Some(note) = self.drafts.flush(id).await? {
            tracing::debug!(note = %id, version = note.version, "Flushed draft");
        }
        Ok(())
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/", get(new_note))
        .route("/healthz", get(healthz))
        .route("/languages", get(list_languages))
        .route("/render", post(render))
        .route("/share/{id}", get(share_links).post(create_share_link))
        .route(
            "/share/{id}/{version}",
            get(share_version_links).post(create_version_share_link),
        )
        .route("/shared/{id}/{format}/{mode}", get(shared_view))
        .route("/{id}", get(get_note).post(update_note).delete(delete_note))
        .route("/{id}/history", get(note_history))
        .route("/{id}/draft", post(push_draft))
        .route("/{id}/rename", post(rename_note))
        .route("/{id}/{version}", get(get_note_version))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    renderer: WorkerStats,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        renderer: state.renderer.stats(),
    })
}

/// Allocate an id without writing anything; the note is created on first save.
async fn new_note(State(state): State<AppState>, format: ResponseFormat) -> HandlerResult {
    let id = state.notes.generate_new_id().await.negotiated(format)?;
    tracing::debug!(note = %id, "Allocated new note id");
    Ok(Redirect::to(&format!("/{id}")).into_response())
}

async fn list_languages(State(state): State<AppState>) -> Result<Json<Vec<CodeLanguage>>, AppError> {
    match state
        .renderer
        .render(RenderRequest::ListCodeLanguages)
        .await
        .into_output()?
    {
        RenderOutput::Languages(languages) => Ok(Json(languages)),
        _ => Err(AppError::internal("render worker returned the wrong output")),
    }
}

/// A render request with optional preview bookkeeping.
#[derive(Debug, Deserialize)]
struct RenderEnvelope {
    /// Client sequence number, echoed back so the client can drop responses
    /// to requests it has since superseded.
    seq: Option<u64>,
    /// Note being previewed. Older pending previews of the same note are
    /// answered with 204 instead of a body.
    note: Option<NoteId>,
    #[serde(flatten)]
    request: RenderRequest,
}

#[derive(Debug, Serialize)]
struct RenderReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    #[serde(flatten)]
    response: RenderResponse,
}

/// Editor preview endpoint. Worker failures are reported in the response
/// body, not as an HTTP error.
async fn render(State(state): State<AppState>, Json(envelope): Json<RenderEnvelope>) -> Response {
    let RenderEnvelope { seq, note, request } = envelope;
    let response = match note {
        Some(note) => {
            let sequencer = state.previews.for_note(&note);
            let Some(response) = state.renderer.render_sequenced(&sequencer, request).await else {
                tracing::debug!(note = %note, "Dropped superseded preview");
                return StatusCode::NO_CONTENT.into_response();
            };
            response
        }
        None => state.renderer.render(request).await,
    };
    Json(RenderReply { seq, response }).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedNote {
    id: NoteId,
    version: u32,
    modified_at: i64,
}

impl From<&Note> for SavedNote {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            version: note.version,
            modified_at: note.modified_at,
        }
    }
}

fn parse_id(raw: &str) -> Result<NoteId, AppError> {
    Ok(NoteId::parse(raw)?)
}

fn parse_version(raw: &str) -> Result<u32, AppError> {
    raw.parse::<u32>()
        .ok()
        .filter(|version| *version > 0)
        .ok_or_else(|| AppError::bad_request(format!("version must be a positive integer: {raw}")))
}

fn plain(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn note_response(
    note: Note,
    format: ResponseFormat,
    pinned: bool,
    debouncer: &SaveDebouncer,
) -> Response {
    match format {
        ResponseFormat::Json => Json(note).into_response(),
        ResponseFormat::Plain => plain(note.content),
        ResponseFormat::Html if pinned => {
            Html(pages::version_page(&note.id, note.version, &note.content)).into_response()
        }
        ResponseFormat::Html => {
            Html(pages::editor_page(
                &note.id,
                &note.content,
                Some(note.version),
                debouncer,
            ))
            .into_response()
        }
    }
}

async fn get_note(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    match state.notes.get_note(&id, None).await {
        Ok(note) => Ok(note_response(note, format, false, &state.config.debouncer())),
        Err(jotter_core::Error::NotFound(_)) if format == ResponseFormat::Html => Ok(Html(
            pages::editor_page(&id, "", None, &state.config.debouncer()),
        )
        .into_response()),
        Err(error) => Err(error).negotiated(format),
    }
}

async fn get_note_version(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path((id, version)): Path<(String, String)>,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let version = parse_version(&version).negotiated(format)?;
    let note = state
        .notes
        .get_note(&id, Some(version))
        .await
        .negotiated(format)?;
    Ok(note_response(note, format, true, &state.config.debouncer()))
}

async fn note_history(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let history = state.notes.get_note_history(&id).await.negotiated(format)?;
    Ok(match format {
        ResponseFormat::Html => Html(pages::history_page(&id, &history)).into_response(),
        ResponseFormat::Json | ResponseFormat::Plain => {
            Json::<Vec<NoteVersionInfo>>(history).into_response()
        }
    })
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenameBody {
    #[serde(rename = "newId", alias = "new_id")]
    new_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ShareBody {
    format: Option<String>,
    mode: Option<String>,
}

fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|value| value.starts_with("application/json"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

/// Decode a JSON or form-encoded body.
fn parse_body<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, AppError> {
    if is_json(headers) {
        serde_json::from_slice(body)
            .map_err(|error| AppError::bad_request(format!("invalid JSON body: {error}")))
    } else {
        serde_urlencoded::from_bytes(body)
            .map_err(|error| AppError::bad_request(format!("invalid form body: {error}")))
    }
}

fn update_text(headers: &HeaderMap, body: &Bytes) -> Result<String, AppError> {
    if content_type(headers).is_some_and(|value| value.starts_with("text/plain")) {
        return String::from_utf8(body.to_vec())
            .map_err(|_| AppError::bad_request("body must be UTF-8 text"));
    }
    parse_body::<UpdateBody>(headers, body)?
        .text
        .ok_or_else(|| AppError::bad_request("missing text field"))
}

async fn update_note(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let text = update_text(&headers, &body).negotiated(format)?;
    state.settle_drafts(&id).await.negotiated(format)?;
    let note = state.notes.update_note(&id, text).await.negotiated(format)?;
    tracing::info!(
        endpoint = "update_note",
        note = %note.id,
        version = note.version,
        bytes = note.size_bytes(),
        "Updated note"
    );
    Ok(match format {
        ResponseFormat::Json => Json(SavedNote::from(&note)).into_response(),
        ResponseFormat::Html => Redirect::to(&format!("/{}", note.id)).into_response(),
        ResponseFormat::Plain => plain(format!("saved {} version {}\n", note.id, note.version)),
    })
}

async fn delete_note(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    state.settle_drafts(&id).await.negotiated(format)?;
    state.notes.delete_note(&id).await.negotiated(format)?;
    state.previews.forget(&id);
    tracing::info!(endpoint = "delete_note", note = %id, "Deleted note");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Buffer an edit; it is saved once edits go quiet.
async fn push_draft(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let text = update_text(&headers, &body).negotiated(format)?;
    state.drafts.push(&id, text).negotiated(format)?;

    Ok(match format {
        ResponseFormat::Json => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "id": id, "pending": true })),
        )
            .into_response(),
        ResponseFormat::Html | ResponseFormat::Plain => {
            (StatusCode::ACCEPTED, plain("pending\n".to_string())).into_response()
        }
    })
}

async fn rename_note(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let new_id = parse_body::<RenameBody>(&headers, &body)
        .and_then(|body| {
            body.new_id
                .ok_or_else(|| AppError::bad_request("missing newId field"))
        })
        .negotiated(format)?;
    state.settle_drafts(&id).await.negotiated(format)?;
    state
        .notes
        .rename_note(&id, new_id.clone())
        .await
        .negotiated(format)?;
    state.previews.forget(&id);
    tracing::info!(endpoint = "rename_note", note = %id, new_id = %new_id, "Renamed note");

    Ok(match format {
        ResponseFormat::Json => Json(serde_json::json!({ "id": new_id })).into_response(),
        ResponseFormat::Html => Redirect::to(&format!("/{new_id}")).into_response(),
        ResponseFormat::Plain => plain(format!("{new_id}\n")),
    })
}

#[derive(Debug, Serialize)]
struct ShareLink {
    #[serde(flatten)]
    shared: SharedNote,
    url: String,
}

fn share_link(state: &AppState, shared: SharedNote) -> ShareLink {
    let url = shared.url(state.config.public_base_url.as_deref());
    ShareLink { shared, url }
}

async fn ensure_shareable(
    state: &AppState,
    id: &NoteId,
    version: Option<u32>,
) -> Result<(), AppError> {
    let exists = match version {
        Some(version) => state.notes.has_note_version(id, version).await?,
        None => state.notes.has_note(id).await?,
    };
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(id.to_string()))
    }
}

async fn list_share_links(
    state: AppState,
    format: ResponseFormat,
    id: &str,
    version: Option<&str>,
) -> HandlerResult {
    let id = parse_id(id).negotiated(format)?;
    let version = version.map(parse_version).transpose().negotiated(format)?;
    ensure_shareable(&state, &id, version).await.negotiated(format)?;

    let links: Vec<ShareLink> = SharedNote::all_for(&id, version)
        .into_iter()
        .map(|shared| share_link(&state, shared))
        .collect();
    Ok(match format {
        ResponseFormat::Json => Json(links).into_response(),
        ResponseFormat::Html => {
            let pairs: Vec<(SharedNote, String)> = links
                .into_iter()
                .map(|link| (link.shared, link.url))
                .collect();
            Html(pages::share_page(&id, &pairs)).into_response()
        }
        ResponseFormat::Plain => plain(
            links
                .iter()
                .map(|link| format!("{}\n", link.url))
                .collect(),
        ),
    })
}

async fn create_share(
    state: AppState,
    format: ResponseFormat,
    id: &str,
    version: Option<&str>,
    headers: &HeaderMap,
    body: &Bytes,
) -> HandlerResult {
    let id = parse_id(id).negotiated(format)?;
    let version = version.map(parse_version).transpose().negotiated(format)?;
    let request = if body.is_empty() {
        ShareBody::default()
    } else {
        parse_body::<ShareBody>(headers, body).negotiated(format)?
    };
    let render_format = request
        .format
        .as_deref()
        .map_or(Ok(RenderFormat::Markdown), str::parse)
        .negotiated(format)?;
    let mode = request
        .mode
        .as_deref()
        .map_or(Ok(ColorMode::Light), str::parse)
        .negotiated(format)?;
    ensure_shareable(&state, &id, version).await.negotiated(format)?;

    let link = share_link(&state, SharedNote::new(id, version, render_format, mode));
    tracing::info!(endpoint = "create_share", url = %link.url, "Created share link");
    Ok(match format {
        ResponseFormat::Json => (StatusCode::CREATED, Json(link)).into_response(),
        ResponseFormat::Html => Redirect::to(&link.shared.path()).into_response(),
        ResponseFormat::Plain => plain(format!("{}\n", link.url)),
    })
}

async fn share_links(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
) -> HandlerResult {
    list_share_links(state, format, &id, None).await
}

async fn share_version_links(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path((id, version)): Path<(String, String)>,
) -> HandlerResult {
    list_share_links(state, format, &id, Some(&version)).await
}

async fn create_share_link(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    create_share(state, format, &id, None, &headers, &body).await
}

async fn create_version_share_link(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path((id, version)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    create_share(state, format, &id, Some(&version), &headers, &body).await
}

#[derive(Debug, Deserialize)]
struct SharedQuery {
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct SharedView {
    #[serde(flatten)]
    shared: SharedNote,
    html: String,
}

async fn shared_view(
    State(state): State<AppState>,
    format: ResponseFormat,
    Path((id, render_format, mode)): Path<(String, String, String)>,
    Query(query): Query<SharedQuery>,
) -> HandlerResult {
    let id = parse_id(&id).negotiated(format)?;
    let version = query
        .version
        .as_deref()
        .map(parse_version)
        .transpose()
        .negotiated(format)?;
    let render_format = render_format.parse::<RenderFormat>().negotiated(format)?;
    let mode = mode.parse::<ColorMode>().negotiated(format)?;

    let note = state.notes.get_note(&id, version).await.negotiated(format)?;
    let shared = SharedNote::new(id, version, render_format, mode);
    let html = shared
        .render(&note, &state.renderer)
        .await
        .negotiated(format)?;

    Ok(match format {
        ResponseFormat::Json => Json(SharedView { shared, html }).into_response(),
        ResponseFormat::Html | ResponseFormat::Plain => {
            Html(pages::shared_page(&shared, &html)).into_response()
        }
    })
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::test_config;

    async fn test_app() -> (Router, TempDir) {
        test_app_with(|_| {}).await
    }

    async fn test_app_with(configure: impl FnOnce(&mut AppConfig)) -> (Router, TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path().join("data"));
        configure(&mut config);
        let config = Arc::new(config);
        let notes = NoteService::open_path(&config.data_dir).await.unwrap();
        let renderer = RenderWorker::spawn().unwrap();
        (app_router(AppState::new(config, notes, renderer)), tmp)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    fn get(uri: &str, accept: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn save(app: &Router, id: &str, text: &str) -> Value {
        let (status, _, body) = send(app, post_json(&format!("/{id}"), &serde_json::json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        serde_json::from_str(&body).unwrap()
    }

    #[tokio::test]
    async fn update_and_fetch_versions() {
        let (app, _tmp) = test_app().await;
        assert_eq!(save(&app, "abcde", "hello").await["version"], 1);
        assert_eq!(save(&app, "abcde", "hello world").await["version"], 2);

        let (status, _, body) = send(&app, get("/abcde", "text/plain")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello world");

        let (_, _, body) = send(&app, get("/abcde/1", "application/json")).await;
        let note: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(note["content"], "hello");
        assert_eq!(note["version"], 1);

        let (_, _, body) = send(&app, get("/abcde/history", "application/json")).await;
        let history: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[1]["sizeBytes"], 11);
    }

    #[tokio::test]
    async fn form_post_redirects_browsers() {
        let (app, _tmp) = test_app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/abcde")
            .header(header::ACCEPT, "text/html")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("text=hi+there"))
            .unwrap();
        let (status, headers, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "/abcde");

        let (_, _, body) = send(&app, get("/abcde", "text/plain")).await;
        assert_eq!(body, "hi there");
    }

    #[tokio::test]
    async fn unknown_note_is_lazy_for_browsers_and_404_otherwise() {
        let (app, tmp) = test_app().await;
        let (status, _, body) = send(&app, get("/fghjk", "text/html")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("new note"));
        assert!(!tmp.path().join("data").join("fghjk").exists());

        let (status, _, body) = send(&app, get("/fghjk", "application/json")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: Value = serde_json::from_str(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("fghjk"));
    }

    #[tokio::test]
    async fn root_redirects_to_fresh_id() {
        let (app, _tmp) = test_app().await;
        let (status, headers, _) = send(&app, get("/", "text/html")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = headers[header::LOCATION].to_str().unwrap();
        assert_eq!(location.len(), 6);
        assert!(NoteId::parse(&location[1..]).is_ok());
    }

    #[tokio::test]
    async fn invalid_input_is_400() {
        let (app, _tmp) = test_app().await;
        let (status, _, _) = send(&app, post_json("/abcde", &serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, get("/abcde/0", "application/json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(&app, get("/shared/render/code/dark", "text/plain")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("reserved"));

        let big = "a".repeat(jotter_core::models::MAX_CONTENT_BYTES + 1);
        let (status, _, _) = send(&app, post_json("/abcde", &serde_json::json!({ "text": big }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_and_rename() {
        let (app, _tmp) = test_app().await;
        save(&app, "abcde", "one").await;
        save(&app, "abcde", "two").await;

        let (status, _, body) = send(
            &app,
            post_json("/abcde/rename", &serde_json::json!({ "newId": "fghjk" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let (_, _, body) = send(&app, get("/fghjk/history", "application/json")).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 2);

        let (status, _, _) = send(
            &app,
            post_json("/fghjk/rename", &serde_json::json!({ "newId": "no way" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("DELETE")
            .uri("/fghjk")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(&app, get("/fghjk", "text/plain")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn share_links_and_shared_view() {
        let (app, _tmp) = test_app().await;
        save(&app, "abcde", "# Title\n\nbody").await;

        let (status, _, body) = send(&app, get("/share/abcde", "application/json")).await;
        assert_eq!(status, StatusCode::OK);
        let links: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(links.as_array().unwrap().len(), 6);

        let (status, _, body) = send(
            &app,
            post_json(
                "/share/abcde/1",
                &serde_json::json!({ "format": "markdown", "mode": "dark" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let link: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(link["url"], "/shared/abcde/markdown/dark?version=1");

        let (status, _, body) = send(&app, get("/shared/abcde/markdown/dark?version=1", "text/html")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Title</h1>"));
        assert!(body.contains("class=\"dark\""));

        let (status, _, _) = send(&app, get("/shared/abcde/pdf/dark", "text/html")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, get("/share/abcde/9", "application/json")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn render_endpoint_and_languages() {
        let (app, _tmp) = test_app().await;
        let (status, _, body) = send(
            &app,
            post_json(
                "/render",
                &serde_json::json!({
                    "type": "RENDER_CODE",
                    "content": "def f(): pass",
                    "language": "python"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let response: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(response["type"], "RENDERED");
        assert_eq!(response["output"]["data"]["language"], "python");
        assert!(response.get("seq").is_none());

        let (status, _, body) = send(&app, get("/languages", "application/json")).await;
        assert_eq!(status, StatusCode::OK);
        let languages: Value = serde_json::from_str(&body).unwrap();
        assert!(!languages.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn render_echoes_client_sequence() {
        let (app, _tmp) = test_app().await;
        let (status, _, body) = send(
            &app,
            post_json(
                "/render",
                &serde_json::json!({
                    "seq": 7,
                    "note": "abcde",
                    "type": "RENDER_MARKDOWN",
                    "content": "# Title"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let response: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(response["seq"], 7);
        assert_eq!(response["request"]["type"], "RENDER_MARKDOWN");
        assert_eq!(response["output"]["data"], "<h1>Title</h1>\n");
    }

    #[tokio::test]
    async fn superseded_preview_gets_no_body() {
        let (app, _tmp) = test_app().await;
        let preview = |content: &str| {
            post_json(
                "/render",
                &serde_json::json!({
                    "note": "abcde",
                    "type": "RENDER_CODE",
                    "content": content
                }),
            )
        };

        let (first, second) = tokio::join!(
            send(&app, preview("a = 1")),
            send(&app, preview("a = 12")),
        );
        let mut statuses = [first.0, second.0];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::NO_CONTENT]);

        // Previews of another note are sequenced on their own.
        let (status, _, _) = send(
            &app,
            post_json(
                "/render",
                &serde_json::json!({ "note": "fghjk", "type": "RENDER_MARKDOWN", "content": "x" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    fn post_text(uri: &str, text: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(text.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn drafts_flush_before_an_explicit_save() {
        let (app, _tmp) = test_app().await;
        for text in ["d", "dr", "draft"] {
            let (status, _, body) = send(&app, post_text("/abcde/draft", text)).await;
            assert_eq!(status, StatusCode::ACCEPTED);
            assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["pending"], true);
        }
        let (status, _, _) = send(&app, get("/abcde", "application/json")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(save(&app, "abcde", "final").await["version"], 2);
        let (_, _, body) = send(&app, get("/abcde/1", "text/plain")).await;
        assert_eq!(body, "draft");
    }

    #[tokio::test]
    async fn quiet_drafts_are_saved_without_a_request() {
        let (app, _tmp) = test_app_with(|config| {
            config.autosave_quiet = std::time::Duration::from_millis(10);
            config.autosave_max_wait = std::time::Duration::from_millis(100);
        })
        .await;
        let (status, _, _) = send(&app, post_text("/abcde/draft", "hello")).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let mut body = String::new();
        for _ in 0..100 {
            let (status, _, text) = send(&app, get("/abcde", "text/plain")).await;
            if status == StatusCode::OK {
                body = text;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn deleting_a_drafted_note_does_not_resurrect_it() {
        let (app, _tmp) = test_app().await;
        send(&app, post_text("/abcde/draft", "pending")).await;

        let request = Request::builder()
            .method("DELETE")
            .uri("/abcde")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(&app, get("/abcde/history", "application/json")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, get("/abcde", "application/json")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_draft_is_400() {
        let (app, _tmp) = test_app().await;
        let big = "a".repeat(jotter_core::models::MAX_CONTENT_BYTES + 1);
        let (status, _, _) = send(&app, post_text("/abcde/draft", &big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
