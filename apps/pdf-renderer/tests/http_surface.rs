//! HTTP-level tests for the renderer surface.
//!
//! These run with the pool and cache disabled so no browser binary or Redis
//! is required; they cover validation, the error envelope, and the
//! operational endpoints.

use pdf_renderer::config::Config;
use pdf_renderer::routes;
use pdf_renderer::state::AppState;

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.pdf.chrome_pool_size = 0;
    cfg.cache.pdf_cache_enabled = false;
    cfg
}

async fn spawn_app(cfg: Config) -> String {
    let state = AppState::new(cfg).await;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn short_html_is_rejected_with_envelope() {
    let base = spawn_app(test_config()).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/v0/pdf"))
        .form(&[("html", "<b>x</b>")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 400);
    assert_eq!(
        body["error"]["message"],
        "Invalid HTML: content too short or missing"
    );
}

#[tokio::test]
async fn oversized_html_is_413() {
    let mut cfg = test_config();
    cfg.limits.max_html_bytes = 64;
    let base = spawn_app(cfg).await;

    let client = reqwest::Client::new();
    let big = format!("<html><body>{}</body></html>", "x".repeat(200));
    let resp = client
        .post(format!("{base}/v0/pdf"))
        .form(&[("html", big.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 413);
}

#[tokio::test]
async fn invalid_request_fields_are_400() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let html = "<html><body>Hello</body></html>";

    let cases: &[&[(&str, &str)]] = &[
        &[("html", html), ("format", "B7")],
        &[("html", html), ("orientation", "diagonal")],
        &[("html", html), ("margin", "9.5")],
        &[("html", html), ("filename", "report.txt")],
        &[("html", html), ("filename", "../etc.pdf")],
    ];

    for fields in cases {
        let resp = client
            .post(format!("{base}/v0/pdf"))
            .form(fields)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "fields: {fields:?}");
    }
}

#[tokio::test]
async fn url_endpoint_validates_scheme() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/v0/pdf"))
        .query(&[("url", "ftp://example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client.get(format!("{base}/v0/pdf")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let base = spawn_app(test_config()).await;

    let resp = reqwest::get(format!("{base}/does-not-exist")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 404);
    assert_eq!(body["error"]["message"], "Not Found");
}

#[tokio::test]
async fn health_is_public() {
    let base = spawn_app(test_config()).await;

    let resp = reqwest::get(format!("{base}/ops/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn chrome_stats_reports_disabled_pool() {
    let base = spawn_app(test_config()).await;

    let resp = reqwest::get(format!("{base}/v0/chrome/stats")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["enabled"], false);
    assert_eq!(body["capacity"], 0);
    assert_eq!(body["pool_size_conf"], 0);
    assert_eq!(body["timeout_secs"], 30);
}

#[tokio::test]
async fn monitor_exposes_uptime_and_version() {
    let base = spawn_app(test_config()).await;

    let resp = reqwest::get(format!("{base}/v0/monitor")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "pdf-renderer");
    assert!(body["uptime_secs"].is_u64());
    assert_eq!(body["pdf_cache_enabled"], false);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let base = spawn_app(test_config()).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/ops/health"))
        .header("X-Request-ID", "req-abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-abc-123");

    let resp = client.get(format!("{base}/ops/health")).send().await.unwrap();
    assert!(!resp.headers()["x-request-id"].is_empty());
}
