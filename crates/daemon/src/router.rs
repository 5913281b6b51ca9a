//! HTTP routes for browsing, viewing, downloading and uploading.
//!
//! This module maps requests onto the file share core. Every raw path from
//! the URL goes through the [`PathResolver`] before anything touches the
//! filesystem, and every failure is rendered as a JSON [`ErrorMessage`].
//! Escapes and missing paths produce byte-identical 404 responses.

use std::fs;
use std::io;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use protocol::messages::{ErrorCode, ErrorMessage};
use protocol::UploadSummary;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ShareConfig;
use crate::files::{
    ArchiveJob, ArchiveStreamer, ConfinedPath, DirectoryLister, FileError, PathResolver,
    Previewer, RelativePath, Root, UploadSink,
};

/// Multipart field carrying uploaded files.
pub const UPLOAD_FIELD: &str = "files";

/// Message returned for both missing and out-of-root paths.
pub const NOT_FOUND_MESSAGE: &str = "not found";

/// Errors that can occur while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// File operation error.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// Malformed or oversized multipart body.
    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// The HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RouterError::File(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            RouterError::File(FileError::NotADirectory(_) | FileError::NotAFile(_)) => {
                StatusCode::BAD_REQUEST
            }
            RouterError::File(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RouterError::Multipart(e) => e.status(),
            RouterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error to a protocol ErrorMessage.
    ///
    /// Messages never include absolute paths.
    pub fn to_error_message(&self) -> ErrorMessage {
        let (code, message) = match self {
            RouterError::File(e) if e.is_not_found() => {
                (ErrorCode::NotFound, NOT_FOUND_MESSAGE.to_string())
            }
            RouterError::File(FileError::NotADirectory(_)) => {
                (ErrorCode::InvalidRequest, "not a directory".to_string())
            }
            RouterError::File(FileError::NotAFile(_)) => {
                (ErrorCode::InvalidRequest, "not a file".to_string())
            }
            RouterError::File(_) | RouterError::Internal(_) => {
                (ErrorCode::InternalError, "internal error".to_string())
            }
            RouterError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (ErrorCode::PayloadTooLarge, e.body_text())
            }
            RouterError::Multipart(e) => (ErrorCode::InvalidRequest, e.body_text()),
        };

        ErrorMessage { code, message }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RouterError::File(FileError::PathEscape(path)) => {
                debug!(path = %path, "Answering path escape as not found");
            }
            _ if status.is_server_error() => error!(error = %self, "Request failed"),
            _ => debug!(error = %self, status = %status, "Request rejected"),
        }
        (status, Json(self.to_error_message())).into_response()
    }
}

/// Shared handler state: one instance of each core component.
#[derive(Debug, Clone)]
pub struct AppState {
    resolver: PathResolver,
    lister: DirectoryLister,
    previewer: Previewer,
    archiver: ArchiveStreamer,
    uploads: UploadSink,
    upload_limit: usize,
}

impl AppState {
    /// Build the components for an opened root.
    pub fn new(root: Root, share: &ShareConfig) -> Self {
        let resolver = PathResolver::new(root);
        Self {
            lister: DirectoryLister::new(resolver.clone()),
            previewer: Previewer::new(share.preview_bytes),
            archiver: ArchiveStreamer::new(resolver.clone(), share.zip_spool_bytes()),
            uploads: UploadSink::new(),
            upload_limit: share.max_upload_usize(),
            resolver,
        }
    }

    /// The path resolver.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// The largest accepted request body in bytes.
    pub fn upload_limit(&self) -> usize {
        self.upload_limit
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_limit;

    Router::new()
        .route("/", get(browse_root))
        .route("/browse", get(browse_root))
        .route("/browse/{*path}", get(browse_path))
        .route("/view/{*path}", get(view))
        .route("/file/{*path}", get(serve_file))
        .route("/download", get(download_root))
        .route("/download/{*path}", get(download_path))
        .route("/upload", post(upload_root))
        .route("/upload/{*path}", post(upload_path))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, RouterError>
where
    F: FnOnce() -> Result<T, FileError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RouterError::Internal(e.to_string()))?
        .map_err(RouterError::from)
}

/// Percent-encode a path for use in a `Location` header.
///
/// Dot segments are encoded too so clients do not collapse them before the
/// resolver sees the path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "." => "%2E".to_string(),
            ".." => "%2E%2E".to_string(),
            _ => urlencoding::encode(s).into_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn browse_location(path: &str) -> String {
    let encoded = encode_path(path);
    if encoded.is_empty() {
        "/".to_string()
    } else {
        format!("/browse/{}", encoded)
    }
}

fn view_location(path: &RelativePath) -> String {
    format!("/view/{}", encode_path(path.as_str()))
}

/// `Content-Disposition: attachment` with an ASCII fallback and a UTF-8 name.
fn attachment(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

// ============================================================================
// Browsing
// ============================================================================

enum Browse {
    Listing(protocol::DirectoryListing),
    File(RelativePath),
}

async fn browse_root(State(state): State<AppState>) -> Result<Response, RouterError> {
    browse(state, String::new()).await
}

async fn browse_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, RouterError> {
    browse(state, path).await
}

async fn browse(state: AppState, raw: String) -> Result<Response, RouterError> {
    let outcome = blocking(move || {
        let target = state.resolver.resolve(&raw)?;
        match state.lister.list(&target) {
            Ok(listing) => Ok(Browse::Listing(listing.to_protocol())),
            Err(FileError::NotADirectory(_)) => Ok(Browse::File(target.relative().clone())),
            Err(e) => Err(e),
        }
    })
    .await?;

    Ok(match outcome {
        Browse::Listing(listing) => Json(listing).into_response(),
        Browse::File(path) => Redirect::to(&view_location(&path)).into_response(),
    })
}

// ============================================================================
// Viewing
// ============================================================================

async fn view(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Response, RouterError> {
    let requested = raw.clone();
    let result = blocking(move || {
        let target = state.resolver.resolve(&raw)?;
        state.previewer.preview(&target)
    })
    .await;

    match result {
        Ok(preview) => Ok(Json(preview).into_response()),
        // Directories get listed; missing and escaping paths both end in the
        // same 404 from the browse route.
        Err(RouterError::File(e)) if e.is_not_found() || matches!(e, FileError::NotAFile(_)) => {
            Ok(Redirect::to(&browse_location(&requested)).into_response())
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Files and downloads
// ============================================================================

/// Serve a confined regular file with range and conditional support.
async fn send_file(file: &ConfinedPath, request: Request) -> Response {
    let response = match ServeFile::new(file.as_path()).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    response.map(Body::new)
}

async fn serve_file(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    request: Request,
) -> Result<Response, RouterError> {
    let file = blocking(move || {
        let target = state.resolver.resolve(&raw)?;
        if fs::metadata(target.as_path())?.is_dir() {
            return Err(FileError::NotAFile(target.as_path().to_path_buf()));
        }
        Ok(target)
    })
    .await?;

    Ok(send_file(&file, request).await)
}

async fn download_root(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, RouterError> {
    download(state, String::new(), request).await
}

async fn download_path(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    request: Request,
) -> Result<Response, RouterError> {
    download(state, raw, request).await
}

async fn download(state: AppState, raw: String, request: Request) -> Result<Response, RouterError> {
    let resolver = state.resolver.clone();
    let (target, is_dir) = blocking(move || {
        let target = resolver.resolve(&raw)?;
        let is_dir = fs::metadata(target.as_path())?.is_dir();
        Ok((target, is_dir))
    })
    .await?;

    if is_dir {
        return Ok(archive_response(&state.archiver, target));
    }

    let name = target
        .relative()
        .file_name()
        .map(str::to_string)
        .or_else(|| target.file_name())
        .unwrap_or_default();

    let mut response = send_file(&target, request).await;
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(CONTENT_DISPOSITION, attachment(&name));
    }
    info!(path = %target.relative(), "Sending file download");
    Ok(response)
}

/// Stream a directory as a ZIP. Dropping the body cancels the job.
fn archive_response(archiver: &ArchiveStreamer, dir: ConfinedPath) -> Response {
    let cancel = CancellationToken::new();
    let job = ArchiveJob::with_cancellation(dir, cancel.clone());
    let file_name = job.file_name();
    info!(path = %job.source().relative(), archive = %file_name, "Streaming archive");

    let chunks = archiver.spawn_stream(job);
    let body = stream::unfold(
        (chunks, cancel.drop_guard()),
        |(mut chunks, guard)| async move {
            let chunk = chunks.recv().await?;
            Some((chunk, (chunks, guard)))
        },
    );

    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONTENT_DISPOSITION, attachment(&file_name)),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

// ============================================================================
// Uploads
// ============================================================================

async fn upload_root(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadSummary>, RouterError> {
    upload(state, String::new(), multipart).await
}

async fn upload_path(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadSummary>, RouterError> {
    upload(state, raw, multipart).await
}

async fn upload(
    state: AppState,
    raw: String,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>, RouterError> {
    let resolver = state.resolver.clone();
    let dir = blocking(move || resolver.resolve_for_create(&raw)).await?;
    let mut batch = state.uploads.begin(&dir).await?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let declared = field.file_name().unwrap_or_default().to_string();
        let reader = StreamReader::new(field.map(|chunk| chunk.map_err(io::Error::other)));
        tokio::pin!(reader);
        batch.save_item(&declared, reader).await;
    }

    let summary = batch.finish();
    if summary.failed > 0 {
        warn!(
            path = %dir.relative(),
            failed = summary.failed,
            "Upload batch had failed items"
        );
    }
    info!(
        path = %dir.relative(),
        saved = summary.saved,
        skipped = summary.skipped,
        "Upload batch complete"
    );
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_not_found_and_escape_render_identically() {
        let escape = RouterError::File(FileError::PathEscape("../../etc".to_string()));
        let missing = RouterError::File(FileError::NotFound("nope".to_string()));

        assert_eq!(escape.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(escape.to_error_message(), missing.to_error_message());
        assert_eq!(escape.to_error_message().message, NOT_FOUND_MESSAGE);
    }

    #[test]
    fn test_kind_mismatch_is_bad_request() {
        let not_dir = RouterError::File(FileError::NotADirectory(PathBuf::from("/srv/share/a")));
        let not_file = RouterError::File(FileError::NotAFile(PathBuf::from("/srv/share/b")));

        assert_eq!(not_dir.status(), StatusCode::BAD_REQUEST);
        assert_eq!(not_file.status(), StatusCode::BAD_REQUEST);
        assert_eq!(not_dir.to_error_message().code, ErrorCode::InvalidRequest);
        assert!(!not_dir.to_error_message().message.contains("/srv"));
    }

    #[test]
    fn test_io_is_internal_error() {
        let err = RouterError::File(FileError::Io(io::Error::other("disk on fire")));

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.to_error_message();
        assert_eq!(message.code, ErrorCode::InternalError);
        assert!(!message.message.contains("disk on fire"));
    }

    #[test]
    fn test_locations_are_encoded() {
        assert_eq!(browse_location(""), "/");
        assert_eq!(browse_location("docs/my notes"), "/browse/docs/my%20notes");
        assert_eq!(browse_location("../../etc"), "/browse/%2E%2E/%2E%2E/etc");
        assert_eq!(
            view_location(&RelativePath::parse("a/b c/ü.txt").unwrap()),
            "/view/a/b%20c/%C3%BC.txt"
        );
    }

    #[test]
    fn test_attachment_header() {
        let plain = attachment("report.txt");
        assert_eq!(
            plain.to_str().unwrap(),
            "attachment; filename=\"report.txt\"; filename*=UTF-8''report.txt"
        );

        let unicode = attachment("résumé \"final\".pdf");
        assert_eq!(
            unicode.to_str().unwrap(),
            "attachment; filename=\"r_sum_ _final_.pdf\"; \
             filename*=UTF-8''r%C3%A9sum%C3%A9%20%22final%22.pdf"
        );
    }
}
