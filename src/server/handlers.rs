//! Request handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::analysis::{fold, normalize_hint, AnalysisOutcome};
use crate::signature::SignatureLocator;

/// Fields collected from a multipart upload.
#[derive(Debug, Default)]
struct Upload {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    document_type: Option<String>,
    keywords: Vec<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn multipart_error(e: MultipartError) -> Response {
    error_response(e.status(), e.body_text())
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, Response> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload.file = Some(bytes.to_vec());
            }
            "document_type" => {
                upload.document_type = Some(field.text().await.map_err(multipart_error)?);
            }
            "keywords" => {
                // Either one comma-separated field or the field repeated.
                let text = field.text().await.map_err(multipart_error)?;
                upload.keywords.extend(
                    text.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string),
                );
            }
            _ => {}
        }
    }
    Ok(upload)
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "PDF analysis service online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn analyze_content(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    let Some(file) = upload.file else {
        return error_response(StatusCode::BAD_REQUEST, "No file");
    };
    let hint = normalize_hint(upload.document_type.as_deref());
    info!(
        "Analyzing {} ({} bytes, hint {:?})",
        upload.file_name.as_deref().unwrap_or("upload"),
        file.len(),
        hint
    );

    let prepared = {
        let analyzer = state.analyzer.clone();
        let hint = hint.clone();
        tokio::task::spawn_blocking(move || analyzer.prepare(&file, &hint)).await
    };
    let result = match prepared {
        Ok(Ok(prompt)) => state.analyzer.complete(&prompt, &hint).await,
        Ok(Err(e)) => Err(e),
        Err(e) => {
            error!("Analysis task failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "analysis task failed");
        }
    };

    match fold(result, hint) {
        outcome @ AnalysisOutcome::Success(_) => {
            Json(json!({ "status": "success", "data": outcome })).into_response()
        }
        AnalysisOutcome::Failure(failure) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "status": "error", "error": failure.error, "data": failure })),
        )
            .into_response(),
    }
}

pub async fn find_signatures(multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    let Some(file) = upload.file else {
        return error_response(StatusCode::BAD_REQUEST, "No file");
    };

    let locator = SignatureLocator::new(upload.keywords);
    match tokio::task::spawn_blocking(move || locator.locate_bytes(&file)).await {
        Ok(Ok(matches)) => {
            info!("Found {} signature candidates", matches.len());
            Json(json!({ "status": "success", "data": matches })).into_response()
        }
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Signature task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "signature search failed")
        }
    }
}
