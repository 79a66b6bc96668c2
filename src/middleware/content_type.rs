//! Response content-type stage

use axum::http::{header::CONTENT_TYPE, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

/// Marks every response of the wrapped route as JSON
pub fn json_content_type() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(CONTENT_TYPE, HeaderValue::from_static("application/json"))
}
