//! Render readiness probing
//!
//! PDFs captured before CDN assets arrive come out half-styled, so the probe
//! polls four conditions against one shared deadline before printing:
//! document ready, the opt-in `window.__HTML2PDF_READY__` hook, fonts, and
//! images. Every condition is permissive: a missing API or a condition that
//! never turns true only exhausts its share of the deadline, it does not fail
//! the render. Only a failing evaluation aborts.

use std::time::{Duration, Instant};

use headless_chrome::Tab;

pub const READINESS_DEADLINE: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const DOCUMENT_COMPLETE: &str = r#"document.readyState === "complete""#;
/// Producer HTML may set this flag to delay capture until it says so.
const READY_HOOK: &str = r#"(typeof window.__HTML2PDF_READY__ === "undefined") || (window.__HTML2PDF_READY__ === true)"#;
const FONTS_LOADED: &str =
    r#"(document.fonts && document.fonts.status) ? (document.fonts.status === "loaded") : true"#;
/// `complete` covers loaded and failed images; the point is not to print
/// while something is still downloading.
const IMAGES_COMPLETE: &str = r#"Array.from(document.images || []).every(img => img.complete)"#;

pub fn wait_for_render_ready(tab: &Tab, budget: Duration) -> anyhow::Result<()> {
    let deadline = Instant::now() + budget;
    poll_condition(tab, deadline, DOCUMENT_COMPLETE)?;
    poll_condition(tab, deadline, READY_HOOK)?;
    poll_condition(tab, deadline, FONTS_LOADED)?;
    poll_condition(tab, deadline, IMAGES_COMPLETE)?;
    Ok(())
}

fn poll_condition(tab: &Tab, deadline: Instant, expr: &str) -> anyhow::Result<()> {
    while Instant::now() < deadline {
        let result = tab.evaluate(expr, false)?;
        if matches!(result.value, Some(serde_json::Value::Bool(true))) {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
