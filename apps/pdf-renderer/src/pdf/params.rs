//! Request validation and cache keys
//!
//! Both entry points (form-encoded HTML and URL query) funnel into
//! [`PdfRequestParams`]: the validated, paper-resolved description of one
//! render. The cache key hashes only the fields that change the output;
//! `filename` is presentation and stays out of the hash.

use axum::http::Uri;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::{Config, PaperSize};
use crate::error::AppError;

const MIN_HTML_BYTES: usize = 10;
const DEFAULT_MARGIN_INCHES: f64 = 0.4;
const DEFAULT_FILENAME: &str = "output.pdf";
const CACHE_KEY_PREFIX: &str = "pdfcache:";

/// Form fields for `POST /v0/pdf`.
#[derive(Debug, Default, Deserialize)]
pub struct PdfFormParams {
    pub html: Option<String>,
    pub format: Option<String>,
    pub orientation: Option<String>,
    pub margin: Option<String>,
    pub filename: Option<String>,
}

/// Query parameters for `GET /v0/pdf`.
#[derive(Debug, Default, Deserialize)]
pub struct PdfQueryParams {
    pub url: Option<String>,
    pub format: Option<String>,
    pub orientation: Option<String>,
    pub margin: Option<String>,
    pub filename: Option<String>,
}

/// What to feed the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSource {
    Html(String),
    Url(String),
}

/// A fully validated render request.
#[derive(Debug, Clone)]
pub struct PdfRequestParams {
    pub source: RenderSource,
    pub format: String,
    pub orientation: String,
    pub margin: f64,
    pub filename: String,
    pub paper: PaperSize,
}

pub fn validate_html_params(
    form: PdfFormParams,
    cfg: &Config,
) -> Result<PdfRequestParams, AppError> {
    let html = form.html.unwrap_or_default();
    if html.len() < MIN_HTML_BYTES {
        return Err(AppError::BadRequest(
            "Invalid HTML: content too short or missing".to_string(),
        ));
    }
    if html.len() > cfg.limits.max_html_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "HTML input exceeds {} bytes",
            cfg.limits.max_html_bytes
        )));
    }

    let (format, orientation, margin, filename) = validate_common(
        form.format,
        form.orientation,
        form.margin,
        form.filename,
        cfg,
    )?;
    let paper = resolve_paper(&format, &orientation, cfg)?;

    Ok(PdfRequestParams {
        source: RenderSource::Html(html),
        format,
        orientation,
        margin,
        filename,
        paper,
    })
}

pub fn validate_url_params(
    query: PdfQueryParams,
    cfg: &Config,
) -> Result<PdfRequestParams, AppError> {
    let url = query.url.unwrap_or_default();
    if url.is_empty() {
        return Err(AppError::BadRequest("Invalid URL: missing".to_string()));
    }
    let parsed: Uri = url
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid URL: must be HTTP or HTTPS".to_string()))?;
    if !matches!(parsed.scheme_str(), Some("http") | Some("https")) {
        return Err(AppError::BadRequest(
            "Invalid URL: must be HTTP or HTTPS".to_string(),
        ));
    }

    let (format, orientation, margin, filename) = validate_common(
        query.format,
        query.orientation,
        query.margin,
        query.filename,
        cfg,
    )?;
    let paper = resolve_paper(&format, &orientation, cfg)?;

    Ok(PdfRequestParams {
        source: RenderSource::Url(url),
        format,
        orientation,
        margin,
        filename,
        paper,
    })
}

fn validate_common(
    format: Option<String>,
    orientation: Option<String>,
    margin: Option<String>,
    filename: Option<String>,
    cfg: &Config,
) -> Result<(String, String, f64, String), AppError> {
    let format = format.unwrap_or_default().to_uppercase();
    if !format.is_empty() && !cfg.pdf.paper_sizes.contains_key(&format) {
        return Err(AppError::BadRequest(
            "Invalid format: not supported".to_string(),
        ));
    }

    let orientation = orientation.unwrap_or_default().to_lowercase();
    if !orientation.is_empty() && orientation != "portrait" && orientation != "landscape" {
        return Err(AppError::BadRequest(
            "Invalid orientation: must be 'portrait' or 'landscape'".to_string(),
        ));
    }

    let margin = match margin.as_deref().filter(|m| !m.is_empty()) {
        None => DEFAULT_MARGIN_INCHES,
        Some(raw) => match raw.parse::<f64>() {
            Ok(m) if (0.1..=2.0).contains(&m) => m,
            _ => {
                return Err(AppError::BadRequest(
                    "Invalid margin: must be a float between 0.1 and 2.0".to_string(),
                ))
            }
        },
    };

    let filename = match filename.filter(|f| !f.is_empty()) {
        None => DEFAULT_FILENAME.to_string(),
        Some(name) => {
            if !name.ends_with(".pdf") {
                return Err(AppError::BadRequest(
                    "Filename must end with .pdf".to_string(),
                ));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            {
                return Err(AppError::BadRequest(
                    "Filename contains invalid characters".to_string(),
                ));
            }
            name
        }
    };

    Ok((format, orientation, margin, filename))
}

fn resolve_paper(format: &str, orientation: &str, cfg: &Config) -> Result<PaperSize, AppError> {
    let mut paper = match cfg.pdf.paper_sizes.get(format) {
        Some(p) => *p,
        None => *cfg
            .pdf
            .paper_sizes
            .get(&cfg.pdf.default_paper)
            .ok_or_else(|| {
                AppError::Internal("Default paper size not configured".to_string())
            })?,
    };

    if orientation == "landscape" {
        std::mem::swap(&mut paper.width, &mut paper.height);
    }
    Ok(paper)
}

/// Content address of a render: source, format, orientation and margin.
pub fn compute_cache_key(params: &PdfRequestParams) -> String {
    let mut hasher = Sha256::new();
    match &params.source {
        RenderSource::Url(url) => hasher.update(url.as_bytes()),
        RenderSource::Html(html) => hasher.update(html.as_bytes()),
    }
    hasher.update(params.format.as_bytes());
    hasher.update(params.orientation.as_bytes());
    hasher.update(format!("{:.2}", params.margin).as_bytes());
    format!("{CACHE_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default()
    }

    fn html_form(html: &str) -> PdfFormParams {
        PdfFormParams {
            html: Some(html.to_string()),
            ..Default::default()
        }
    }

    fn valid_html() -> String {
        "<html><body>Hello</body></html>".to_string()
    }

    #[test]
    fn short_html_is_rejected() {
        let err = validate_html_params(html_form("<b>x</b>"), &cfg()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = validate_html_params(PdfFormParams::default(), &cfg()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn oversized_html_is_too_large() {
        let mut config = cfg();
        config.limits.max_html_bytes = 64;
        let big = "x".repeat(100);
        let err = validate_html_params(html_form(&format!("<p>{big}</p>")), &config).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn defaults_are_applied() {
        let params = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        assert_eq!(params.format, "");
        assert_eq!(params.orientation, "");
        assert_eq!(params.margin, 0.4);
        assert_eq!(params.filename, "output.pdf");
        // empty format resolves to the default paper
        assert_eq!(params.paper, cfg().pdf.paper_sizes["A4"]);
    }

    #[test]
    fn format_is_case_insensitive_and_validated() {
        let mut form = html_form(&valid_html());
        form.format = Some("letter".to_string());
        let params = validate_html_params(form, &cfg()).unwrap();
        assert_eq!(params.format, "LETTER");

        let mut form = html_form(&valid_html());
        form.format = Some("B7".to_string());
        let err = validate_html_params(form, &cfg()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn landscape_swaps_paper_dimensions() {
        let mut form = html_form(&valid_html());
        form.format = Some("A4".to_string());
        form.orientation = Some("landscape".to_string());
        let params = validate_html_params(form, &cfg()).unwrap();
        let a4 = cfg().pdf.paper_sizes["A4"];
        assert_eq!(params.paper.width, a4.height);
        assert_eq!(params.paper.height, a4.width);
    }

    #[test]
    fn bad_orientation_is_rejected() {
        let mut form = html_form(&valid_html());
        form.orientation = Some("diagonal".to_string());
        let err = validate_html_params(form, &cfg()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn margin_bounds_are_enforced() {
        for bad in ["0.05", "2.5", "abc", "-1"] {
            let mut form = html_form(&valid_html());
            form.margin = Some(bad.to_string());
            let err = validate_html_params(form, &cfg()).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "margin {bad}");
        }

        let mut form = html_form(&valid_html());
        form.margin = Some("1.5".to_string());
        let params = validate_html_params(form, &cfg()).unwrap();
        assert_eq!(params.margin, 1.5);
    }

    #[test]
    fn filename_rules() {
        let cases = [
            ("report-1.pdf", true),
            ("report_v2.pdf", true),
            ("a.b.pdf", true),
            ("report.txt", false),
            ("../etc.pdf", false),
            ("..%2Fetc.pdf", false),
            ("re port.pdf", false),
        ];
        for (name, ok) in cases {
            let mut form = html_form(&valid_html());
            form.filename = Some(name.to_string());
            let result = validate_html_params(form, &cfg());
            assert_eq!(result.is_ok(), ok, "filename {name}");
        }
    }

    #[test]
    fn url_must_be_http_or_https() {
        let mut query = PdfQueryParams::default();
        query.url = Some("https://example.com/invoice".to_string());
        let params = validate_url_params(query, &cfg()).unwrap();
        assert_eq!(
            params.source,
            RenderSource::Url("https://example.com/invoice".to_string())
        );

        for bad in ["", "ftp://example.com", "file:///etc/passwd", "not a url"] {
            let mut query = PdfQueryParams::default();
            query.url = Some(bad.to_string());
            assert!(validate_url_params(query, &cfg()).is_err(), "url {bad}");
        }
    }

    #[test]
    fn cache_key_is_deterministic() {
        let mut form = html_form("<b>Hello</b>123");
        form.format = Some("A4".to_string());
        form.orientation = Some("portrait".to_string());
        form.margin = Some("0.5".to_string());
        let params = validate_html_params(form, &cfg()).unwrap();

        assert_eq!(compute_cache_key(&params), compute_cache_key(&params));
        assert!(compute_cache_key(&params).starts_with("pdfcache:"));
    }

    #[test]
    fn cache_key_ignores_filename() {
        let mut a = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        let b = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        a.filename = "other.pdf".to_string();
        assert_eq!(compute_cache_key(&a), compute_cache_key(&b));
    }

    #[test]
    fn cache_key_tracks_hashed_fields() {
        let base = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        let base_key = compute_cache_key(&base);

        let mut other_html = base.clone();
        other_html.source = RenderSource::Html("<b>Hello world</b>".to_string());
        assert_ne!(compute_cache_key(&other_html), base_key);

        let mut other_format = base.clone();
        other_format.format = "LETTER".to_string();
        assert_ne!(compute_cache_key(&other_format), base_key);

        let mut other_orientation = base.clone();
        other_orientation.orientation = "landscape".to_string();
        assert_ne!(compute_cache_key(&other_orientation), base_key);

        let mut other_margin = base.clone();
        other_margin.margin = 0.5;
        assert_ne!(compute_cache_key(&other_margin), base_key);
    }

    #[test]
    fn cache_key_margin_precision_is_two_decimals() {
        let mut a = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        let mut b = validate_html_params(html_form(&valid_html()), &cfg()).unwrap();
        a.margin = 0.400;
        b.margin = 0.4004;
        assert_eq!(compute_cache_key(&a), compute_cache_key(&b));
    }
}
