//! Browser UI and JSON API over HTTP.
//!
//! Serves the server-rendered page from [`crate::view::html`] and the form
//! endpoints it posts to. Every action is a thin call into the shared
//! [`Session`]; failures are already in the session's error banner, so form
//! posts simply redirect back to the page. Uploads and selections posted from
//! the form run on a background task, and the page refreshes until they land.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The page (`?q=` filters the index, `?find=` highlights notes) |
//! | `GET`  | `/api/state` | Session state, loading state, current error |
//! | `POST` | `/upload` | Multipart upload (`file` field), then analysis |
//! | `POST` | `/sections/{id}/select` | Select a section, generating notes if needed |
//! | `POST` | `/reset` | Forget the document |
//! | `POST` | `/theme` | Toggle dark mode |
//! | `POST` | `/error/dismiss` | Hide the error banner |
//! | `GET`  | `/download` | The original upload, byte for byte |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Requests sent with `Accept: application/json` get JSON instead of a
//! redirect. Failures use:
//!
//! ```json
//! { "error": { "code": "validation", "message": "Invalid file type. ..." } }
//! ```
//!
//! Codes: `validation` (400), `read_error` (400), `bad_request` (400),
//! `not_found` (404), `configuration` (503), `ai_error` (502).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::NoteError;
use crate::intake::validate_mime;
use crate::models::{LoadingState, SessionState, UploadedFile};
use crate::session::{SelectOutcome, Session, UploadOutcome};
use crate::view::html::{filter_query, render_page, PageContext};
use crate::view::{build_screen, Screen, UiFilters};

/// Request bodies above this size are refused by the HTTP layer. The 20MB
/// upload guidance itself is not enforced.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<Session>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config, session: Arc<Session>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, model = %session.model_name(), "server listening");
    println!("NoteOrbit listening on http://{}", bind_addr);
    axum::serve(listener, router(session)).await?;
    Ok(())
}

/// All routes, ready to serve.
pub fn router(session: Arc<Session>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_page))
        .route("/api/state", get(handle_state))
        .route("/upload", post(handle_upload))
        .route("/sections/{id}/select", post(handle_select))
        .route("/reset", post(handle_reset))
        .route("/theme", post(handle_theme))
        .route("/error/dismiss", post(handle_dismiss))
        .route("/download", get(handle_download))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(AppState { session })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<NoteError> for AppError {
    fn from(err: NoteError) -> Self {
        let (status, code) = match &err {
            NoteError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            NoteError::Read { .. } => (StatusCode::BAD_REQUEST, "read_error"),
            NoteError::Configuration(_) => (StatusCode::SERVICE_UNAVAILABLE, "configuration"),
            NoteError::Ai { .. } => (StatusCode::BAD_GATEWAY, "ai_error"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.user_message(),
        }
    }
}

// ============ Helpers ============

#[derive(Debug, Default, Deserialize)]
struct FilterParams {
    q: Option<String>,
    find: Option<String>,
}

impl FilterParams {
    fn into_filters(self) -> UiFilters {
        UiFilters {
            index_search: self.q.unwrap_or_default(),
            note_find: self.find.unwrap_or_default(),
        }
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

/// JSON result for API clients, redirect back to the page for forms.
fn respond(
    headers: &HeaderMap,
    filters: &UiFilters,
    result: Result<serde_json::Value, AppError>,
) -> Response {
    if wants_json(headers) {
        match result {
            Ok(value) => Json(serde_json::json!({ "result": value })).into_response(),
            Err(e) => e.into_response(),
        }
    } else {
        Redirect::to(&format!("/{}", filter_query(filters))).into_response()
    }
}

// ============ GET / ============

async fn handle_page(
    State(app): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Html<String> {
    let filters = params.into_filters();
    let state = app.session.snapshot();
    let loading = app.session.loading();
    let error = app.session.current_error();
    let screen = build_screen(&state, loading, &filters);
    Html(render_page(&PageContext {
        state: &state,
        screen: &screen,
        filters: &filters,
        loading,
        error: error.as_deref(),
        model_name: app.session.model_name(),
    }))
}

// ============ GET /api/state ============

#[derive(Serialize)]
struct StateResponse {
    state: SessionState,
    loading: LoadingState,
    error: Option<String>,
    screen: Screen,
}

async fn handle_state(
    State(app): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Json<StateResponse> {
    let filters = params.into_filters();
    let state = app.session.snapshot();
    let loading = app.session.loading();
    let screen = build_screen(&state, loading, &filters);
    Json(StateResponse {
        state,
        loading,
        error: app.session.current_error(),
        screen,
    })
}

// ============ POST /upload ============

/// JSON clients wait for the analysis. Form posts start it in the background
/// and redirect at once, so the page shows the busy screen while it runs.
async fn handle_upload(
    State(app): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let filters = UiFilters::default();
    let file = match read_file_field(&app.session, multipart).await {
        Ok(file) => file,
        Err(e) => return respond(&headers, &filters, Err(e)),
    };

    if !wants_json(&headers) {
        app.session.upload_in_background(file);
        return respond(&headers, &filters, Ok(serde_json::Value::Null));
    }

    let result = app
        .session
        .upload(file)
        .await
        .map(|outcome| match outcome {
            UploadOutcome::Loaded { sections } => serde_json::json!({ "sections": sections }),
            UploadOutcome::Discarded => serde_json::json!({ "sections": 0, "discarded": true }),
        })
        .map_err(AppError::from);
    respond(&headers, &filters, result)
}

async fn read_file_field(
    session: &Session,
    mut multipart: Multipart,
) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let declared = field.content_type().unwrap_or_default().to_string();

        let mime_type = match validate_mime(&declared) {
            Ok(m) => m,
            Err(e) => {
                session.raise(&e);
                return Err(e.into());
            }
        };

        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                let err = NoteError::Read {
                    path: name,
                    reason: e.to_string(),
                };
                session.raise(&err);
                return Err(err.into());
            }
        };

        return Ok(UploadedFile::from_bytes(name, mime_type, &bytes));
    }
    Err(bad_request("multipart body has no `file` field"))
}

// ============ POST /sections/{id}/select ============

/// Same split as upload: forms get the skeleton screen while notes generate.
async fn handle_select(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FilterParams>,
    headers: HeaderMap,
) -> Response {
    let filters = params.into_filters();
    if !wants_json(&headers) {
        app.session.select_in_background(&id);
        return respond(&headers, &filters, Ok(serde_json::Value::Null));
    }

    let result = app
        .session
        .select(&id)
        .await
        .map(|outcome| {
            let label = match outcome {
                SelectOutcome::Cached => "cached",
                SelectOutcome::Generated { superseded: false } => "generated",
                SelectOutcome::Generated { superseded: true } => "generated_superseded",
                SelectOutcome::AlreadyInFlight => "in_flight",
                SelectOutcome::NothingToGenerate => "nothing_to_generate",
                SelectOutcome::Discarded => "discarded",
            };
            serde_json::json!({ "outcome": label })
        })
        .map_err(AppError::from);
    respond(&headers, &filters, result)
}

// ============ Simple commands ============

async fn handle_reset(State(app): State<AppState>, headers: HeaderMap) -> Response {
    app.session.reset();
    respond(&headers, &UiFilters::default(), Ok(serde_json::json!("reset")))
}

async fn handle_theme(
    State(app): State<AppState>,
    Query(params): Query<FilterParams>,
    headers: HeaderMap,
) -> Response {
    let dark = app.session.toggle_theme();
    respond(
        &headers,
        &params.into_filters(),
        Ok(serde_json::json!({ "isDarkMode": dark })),
    )
}

async fn handle_dismiss(
    State(app): State<AppState>,
    Query(params): Query<FilterParams>,
    headers: HeaderMap,
) -> Response {
    app.session.dismiss_error();
    respond(&headers, &params.into_filters(), Ok(serde_json::Value::Null))
}

// ============ GET /download ============

async fn handle_download(State(app): State<AppState>) -> Result<Response, AppError> {
    let export = app
        .session
        .download()
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| not_found("no document loaded"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export.name.replace(['"', '\\'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, export.mime_type.as_str().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
        .into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
