//! CORS policy for browser gRPC-Web clients.

use std::time::Duration;

use http::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, HeaderName};
use http::{HeaderValue, Method, request::Parts};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Response headers a browser client must be able to read.
fn exposed_headers() -> [HeaderName; 11] {
    [
        ACCEPT,
        ACCEPT_ENCODING,
        HeaderName::from_static("accept-post"),
        HeaderName::from_static("connect-accept-encoding"),
        HeaderName::from_static("connect-content-encoding"),
        CONTENT_ENCODING,
        HeaderName::from_static("grpc-accept-encoding"),
        HeaderName::from_static("grpc-encoding"),
        HeaderName::from_static("grpc-message"),
        HeaderName::from_static("grpc-status"),
        HeaderName::from_static("grpc-status-details-bin"),
    ]
}

/// Build the CORS layer: any origin, any request header, gRPC status
/// headers exposed.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _parts: &Parts| {
                tracing::debug!(origin = ?origin, "Cross-origin request");
                true
            },
        ))
        .allow_methods([
            Method::HEAD,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::any())
        .expose_headers(exposed_headers())
        .max_age(Duration::from_secs(24 * 60 * 60))
}
