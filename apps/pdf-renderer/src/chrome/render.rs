//! Render pipeline
//!
//! Drives a tab through navigate → readiness probe → PrintToPDF. With the
//! pool enabled a render gets a fresh tab bounded by the configured timeout;
//! a session-interrupted failure restarts the pool and retries exactly once.
//! With the pool disabled every request launches an ephemeral browser in a
//! temp profile.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::Tab;

use crate::pdf::{PdfRequestParams, RenderSource};
use crate::state::AppState;

use super::fault::is_session_interrupted;
use super::pool::{launch_browser, ChromePool, ACQUIRE_TIMEOUT};
use super::readiness::{wait_for_render_ready, READINESS_DEADLINE};
use super::RenderError;

/// Render the request to PDF bytes, honoring pool configuration and the
/// one-restart-one-retry policy.
pub async fn render_pdf(state: &AppState, params: &PdfRequestParams) -> Result<Vec<u8>, RenderError> {
    let timeout_secs = state.config().pdf.timeout_secs;

    if state.config().pdf.chrome_pool_size <= 0 {
        return render_one_shot(state, params, timeout_secs).await;
    }

    let pool = state.chrome_pool().await?;

    let first = render_pooled(&pool, params, timeout_secs).await;
    match first {
        Err(ref e) if is_session_interrupted(e) => {
            tracing::warn!(
                error = %e,
                "Chrome session interrupted; restarting pool and retrying once"
            );
            if let Err(restart_err) = pool.restart().await {
                tracing::error!(error = %restart_err, "Chrome pool restart failed");
            }
            render_pooled(&pool, params, timeout_secs).await
        }
        other => other,
    }
}

async fn render_pooled(
    pool: &ChromePool,
    params: &PdfRequestParams,
    timeout_secs: u64,
) -> Result<Vec<u8>, RenderError> {
    let tab = pool.acquire(ACQUIRE_TIMEOUT).await?;

    let render_tab = tab.tab.clone();
    let render_params = params.clone();
    let render = tokio::task::spawn_blocking(move || {
        render_in_tab(&render_tab, &render_params, Duration::from_secs(timeout_secs))
    });

    let result = match tokio::time::timeout(Duration::from_secs(timeout_secs), render).await {
        Err(_) => Err(RenderError::Timeout(timeout_secs)),
        Ok(Err(join_err)) => Err(RenderError::Browser(join_err.to_string())),
        Ok(Ok(Ok(bytes))) => Ok(bytes),
        Ok(Ok(Err(e))) => Err(RenderError::browser(e)),
    };

    pool.release(tab, result.as_ref().err());
    result
}

/// Fallback used when pooling is disabled: a throwaway browser per request.
async fn render_one_shot(
    state: &AppState,
    params: &PdfRequestParams,
    timeout_secs: u64,
) -> Result<Vec<u8>, RenderError> {
    let cfg = state.config().pdf.clone();
    let render_params = params.clone();

    let render = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RenderError> {
        let profile = tempfile::Builder::new()
            .prefix("chromedata-")
            .tempdir()
            .map_err(RenderError::Profile)?;
        let browser = launch_browser(&cfg, profile.path()).map_err(RenderError::browser)?;
        let tab = browser.new_tab().map_err(RenderError::browser)?;
        render_in_tab(&tab, &render_params, Duration::from_secs(timeout_secs))
            .map_err(RenderError::browser)
    });

    match tokio::time::timeout(Duration::from_secs(timeout_secs), render).await {
        Err(_) => Err(RenderError::Timeout(timeout_secs)),
        Ok(Err(join_err)) => Err(RenderError::Browser(join_err.to_string())),
        Ok(Ok(result)) => result,
    }
}

/// The blocking tab protocol: load the source, wait until the page is worth
/// printing, print.
fn render_in_tab(
    tab: &Tab,
    params: &PdfRequestParams,
    timeout: Duration,
) -> anyhow::Result<Vec<u8>> {
    tab.set_default_timeout(timeout);

    match &params.source {
        RenderSource::Url(url) => {
            tab.navigate_to(url)?;
        }
        RenderSource::Html(html) => {
            // Loading via a data URL keeps the navigation lifecycle (and the
            // readiness conditions) identical to the URL path.
            let data_url = format!("data:text/html;base64,{}", BASE64.encode(html));
            tab.navigate_to(&data_url)?;
        }
    }
    tab.wait_until_navigated()?;

    wait_for_render_ready(tab, READINESS_DEADLINE)?;

    let pdf = tab.print_to_pdf(Some(PrintToPdfOptions {
        print_background: Some(true),
        paper_width: Some(params.paper.width),
        paper_height: Some(params.paper.height),
        margin_top: Some(params.margin),
        margin_bottom: Some(params.margin),
        margin_left: Some(params.margin),
        margin_right: Some(params.margin),
        ..Default::default()
    }))?;

    Ok(pdf)
}
