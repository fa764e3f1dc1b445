//! Request model: validation and cache addressing.

mod params;

pub use params::{
    compute_cache_key, validate_html_params, validate_url_params, PdfFormParams, PdfQueryParams,
    PdfRequestParams, RenderSource,
};
