//! CORS response headers.
//!
//! Headers are only ever added for a request whose `Origin` is trusted by
//! the route. Error responses carry `access-control-allow-origin` and
//! `access-control-allow-credentials` even when CORS is off for the route,
//! so the SPA can read the error body.

use crate::config::RouteConfig;
use crate::request::RequestView;
use crate::verifier::verify_origin;

/// Which kind of response the headers are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// 204 answer to an `OPTIONS` request
    Preflight,
    /// The upstream response to an accepted request
    Main,
    /// An error response written by the filter
    Error,
}

/// A response header as a lowercase name and a value.
pub type Header = (&'static str, String);

/// Returns the CORS headers to add to a response.
///
/// An empty list means nothing should be added.
///
/// # Examples
///
/// ```
/// use token_handler::cors::{response_headers, ResponseKind};
/// use token_handler::{HttpMethod, IncomingRequest, RouteSettings};
///
/// let config = RouteSettings::new()
///     .enabled(true)
///     .cookie_name_prefix("app")
///     .encryption_key("00".repeat(32))
///     .trusted_web_origin("https://spa.example.com")
///     .cors_enabled(true)
///     .build()
///     .unwrap();
///
/// let mut request = IncomingRequest::new("req-1", HttpMethod::Options);
/// request.add_header("Origin", "https://spa.example.com");
///
/// let headers = response_headers(&config, &request, ResponseKind::Preflight);
/// assert!(headers.contains(&("access-control-max-age", "86400".to_string())));
/// ```
pub fn response_headers<R>(config: &RouteConfig, request: &R, kind: ResponseKind) -> Vec<Header>
where
    R: RequestView + ?Sized,
{
    let cors = config.cors();
    if !cors.enabled() && kind != ResponseKind::Error {
        return Vec::new();
    }

    let origin = match request.header("origin") {
        Some(origin) if verify_origin(config, origin) => origin.into_inner(),
        _ => return Vec::new(),
    };

    let mut headers = vec![
        ("access-control-allow-origin", origin.to_string()),
        ("access-control-allow-credentials", "true".to_string()),
    ];

    if !cors.enabled() {
        return headers;
    }

    if kind == ResponseKind::Preflight {
        headers.push(("access-control-allow-methods", cors.allow_methods().to_string()));

        let allow_headers = match cors.allow_headers() {
            Some(configured) => Some(configured.to_string()),
            None => request
                .header("access-control-request-headers")
                .map(|requested| requested.into_inner().to_string()),
        };
        if let Some(value) = allow_headers {
            headers.push(("access-control-allow-headers", value));
        }

        if cors.max_age() > 0 {
            headers.push(("access-control-max-age", cors.max_age().to_string()));
        }

        headers.push(("vary", "origin,access-control-request-headers".to_string()));
    } else {
        headers.push(("vary", "origin".to_string()));
    }

    if let Some(expose) = cors.expose_headers() {
        headers.push(("access-control-expose-headers", expose.to_string()));
    }

    headers
}
