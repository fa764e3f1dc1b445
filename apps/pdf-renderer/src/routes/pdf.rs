//! PDF conversion handlers
//!
//! The pipeline is the same for both entry points: validate, consult the
//! cache, render, size-check, store, respond. Cache failures degrade to
//! cache misses; only the render itself can fail a request.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;

use crate::chrome::{is_session_interrupted, render_pdf, RenderError};
use crate::error::AppError;
use crate::middleware::REQUEST_ID_HEADER;
use crate::pdf::{
    compute_cache_key, validate_html_params, validate_url_params, PdfFormParams, PdfQueryParams,
    PdfRequestParams,
};
use crate::state::AppState;

/// `POST /v0/pdf`: render form-posted HTML.
pub async fn convert_html(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PdfFormParams>,
) -> Result<Response, AppError> {
    let params = validate_html_params(form, state.config())?;
    process(state, headers, params).await
}

/// `GET /v0/pdf`: fetch and render a remote page.
pub async fn convert_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PdfQueryParams>,
) -> Result<Response, AppError> {
    let params = validate_url_params(query, state.config())?;
    process(state, headers, params).await
}

async fn process(
    state: AppState,
    headers: HeaderMap,
    params: PdfRequestParams,
) -> Result<Response, AppError> {
    let cache_key = compute_cache_key(&params);

    if let Some(cache) = state.pdf_cache() {
        if let Some(cached) = cache.get(&cache_key).await {
            return Ok(pdf_response(&params.filename, cached));
        }
    }

    let pdf = match render_pdf(&state, &params).await {
        Ok(pdf) => pdf,
        Err(e @ (RenderError::Timeout(_) | RenderError::AcquireTimeout)) => {
            // Distinguish a slow render from a wedged pool in the logs; the
            // client sees a timeout either way.
            tracing::error!(
                timeout_secs = state.config().pdf.timeout_secs,
                error = %e,
                "PDF generation timeout"
            );
            return Err(AppError::RenderTimeout);
        }
        Err(e) if is_session_interrupted(&e) => {
            tracing::error!(error = %e, "Chrome session interrupted");
            return Err(AppError::SessionInterrupted);
        }
        Err(e) => {
            tracing::error!(error = %e, "PDF generation failed");
            return Err(AppError::Internal(format!("PDF generation failed: {e}")));
        }
    };

    if pdf.len() > state.config().limits.max_pdf_bytes {
        return Err(AppError::PayloadTooLarge(
            "PDF exceeds allowed size".to_string(),
        ));
    }

    if let Some(cache) = state.pdf_cache() {
        cache.put(&cache_key, &pdf).await;
    }

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    tracing::info!(filename = %params.filename, request_id = %request_id, "PDF generated");

    Ok(pdf_response(&params.filename, pdf))
}

fn pdf_response(filename: &str, pdf: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        pdf,
    )
        .into_response()
}
