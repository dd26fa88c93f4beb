//! Turning a [`Verdict`] into what the host sends or forwards.
//!
//! [`handle`] is the whole filter for hosts that use [`IncomingRequest`]:
//! it runs the pipeline, rewrites the request on success and returns the
//! CORS headers for the upstream response, or builds the response to send
//! otherwise. Hosts with their own request type call
//! [`process`] and use the pieces here directly.

use crate::config::RouteConfig;
use crate::cors::{response_headers, Header, ResponseKind};
use crate::error::Rejection;
use crate::pipeline::{process, Verdict};
use crate::request::{HttpMethod, IncomingRequest, RequestView};
use crate::Secret;

const SERVER_ERROR_MESSAGE: &str = "Problem encountered processing the request";
const UNAUTHORIZED_MESSAGE: &str = "Access denied due to missing or invalid credentials";

/// An error response written by the filter instead of forwarding.
///
/// The body never says which check failed; that detail is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    status: u16,
    headers: Vec<Header>,
    body: Option<String>,
}

impl ErrorResponse {
    /// Builds the response for `rejection`.
    ///
    /// The JSON body is `{"code": ..., "message": ...}` and is omitted for
    /// `HEAD` requests. CORS headers are added for a trusted origin.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_handler::response::ErrorResponse;
    /// use token_handler::{HttpMethod, IncomingRequest, Rejection, RejectionKind, RouteSettings};
    ///
    /// let config = RouteSettings::new().build().unwrap();
    /// let request = IncomingRequest::new("req-1", HttpMethod::Get);
    /// let rejection = Rejection::new(RejectionKind::CsrfMismatch, "csrf mismatch");
    ///
    /// let response = ErrorResponse::for_rejection(&rejection, &request, &config);
    /// assert_eq!(response.status(), 401);
    /// assert_eq!(
    ///     response.body(),
    ///     Some(r#"{"code":"unauthorized_request","message":"Access denied due to missing or invalid credentials"}"#)
    /// );
    /// ```
    pub fn for_rejection<R>(rejection: &Rejection, request: &R, config: &RouteConfig) -> Self
    where
        R: RequestView + ?Sized,
    {
        let mut headers = response_headers(config, request, ResponseKind::Error);

        let body = if request.method() == HttpMethod::Head {
            None
        } else {
            let message = if rejection.status() >= 500 {
                SERVER_ERROR_MESSAGE
            } else {
                UNAUTHORIZED_MESSAGE
            };
            headers.push(("content-type", "application/json".to_string()));
            Some(
                serde_json::json!({
                    "code": rejection.code(),
                    "message": message,
                })
                .to_string(),
            )
        };

        Self {
            status: rejection.status(),
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// JSON body, absent for `HEAD`.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// A 204 answer to a CORS preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightResponse {
    headers: Vec<Header>,
}

impl PreflightResponse {
    /// Builds the preflight response for `request`.
    pub fn new<R>(request: &R, config: &RouteConfig) -> Self
    where
        R: RequestView + ?Sized,
    {
        Self {
            headers: response_headers(config, request, ResponseKind::Preflight),
        }
    }

    /// Always 204.
    pub fn status(&self) -> u16 {
        204
    }

    /// CORS headers.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }
}

/// Rewrites an accepted request before it is forwarded.
///
/// Any `Authorization` header is replaced with `Bearer <token>`, and the
/// `Cookie` headers are removed when the route says so.
pub fn apply_proceed(request: &mut IncomingRequest, access_token: &Secret<String>, config: &RouteConfig) {
    request.set_authorization_bearer(access_token.expose_secret());
    if config.remove_cookie_headers() {
        request.remove_cookie_headers();
    }
}

/// What the host does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Forward the request upstream unchanged
    Forward,
    /// Forward the rewritten request and add `cors_headers` to the
    /// upstream response
    Proceed {
        /// CORS headers for the main response, empty when CORS is off
        cors_headers: Vec<Header>,
    },
    /// Send a preflight response
    Preflight(PreflightResponse),
    /// Send an error response
    Error(ErrorResponse),
}

/// Runs the filter on `request` and applies the verdict.
///
/// # Examples
///
/// ```
/// use token_handler::response::{handle, Outcome};
/// use token_handler::{HttpMethod, IncomingRequest, RouteSettings};
///
/// let config = RouteSettings::new()
///     .enabled(true)
///     .cookie_name_prefix("app")
///     .encryption_key("00".repeat(32))
///     .trusted_web_origin("https://spa.example.com")
///     .build()
///     .unwrap();
///
/// let mut request = IncomingRequest::new("req-1", HttpMethod::Get);
/// request.add_header("Origin", "https://evil.example.com");
///
/// match handle(&mut request, &config) {
///     Outcome::Error(response) => assert_eq!(response.status(), 401),
///     other => panic!("unexpected outcome: {:?}", other),
/// }
/// ```
pub fn handle(request: &mut IncomingRequest, config: &RouteConfig) -> Outcome {
    match process(&*request, config) {
        Verdict::Decline | Verdict::PassThrough => Outcome::Forward,
        Verdict::Preflight => Outcome::Preflight(PreflightResponse::new(&*request, config)),
        Verdict::Proceed { access_token } => {
            apply_proceed(request, &access_token, config);
            Outcome::Proceed {
                cors_headers: response_headers(config, &*request, ResponseKind::Main),
            }
        }
        Verdict::Reject(rejection) => {
            Outcome::Error(ErrorResponse::for_rejection(&rejection, &*request, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::seal_random;
    use crate::error::RejectionKind;
    use crate::RouteSettings;

    const KEY: [u8; 32] = [0x77; 32];
    const ORIGIN: &str = "https://spa.example.com";

    fn settings() -> RouteSettings {
        RouteSettings::new()
            .enabled(true)
            .cookie_name_prefix("example")
            .encryption_key("77".repeat(32))
            .trusted_web_origin(ORIGIN)
    }

    fn authorization(request: &IncomingRequest) -> Vec<String> {
        request
            .headers()
            .filter(|(n, _)| n.eq_ignore_ascii_case("authorization"))
            .map(|(_, v)| v.to_string())
            .collect()
    }

    fn accepted_request(config: &RouteConfig) -> IncomingRequest {
        let cookie = seal_random(&KEY, b"tok123", config.envelope_scheme()).unwrap();
        let mut request = IncomingRequest::new("req-1", HttpMethod::Get);
        request.add_header("Origin", ORIGIN);
        request.add_header("Authorization", "Basic stale");
        request.add_cookie_line(format!("example-at={}; theme=dark", cookie));
        request
    }

    #[test]
    fn server_error_body() {
        let config = settings().build().unwrap();
        let request = IncomingRequest::new("req-1", HttpMethod::Post);
        let rejection = Rejection::new(RejectionKind::CipherUnavailable, "no cipher");

        let response = ErrorResponse::for_rejection(&rejection, &request, &config);
        assert_eq!(response.status(), 500);

        let body: serde_json::Value = serde_json::from_str(response.body().unwrap()).unwrap();
        assert_eq!(body["code"], "server_error");
        assert_eq!(body["message"], SERVER_ERROR_MESSAGE);
    }

    #[test]
    fn head_response_has_no_body() {
        let config = settings().build().unwrap();
        let request = IncomingRequest::new("req-1", HttpMethod::Head);
        let rejection = Rejection::new(RejectionKind::OriginMissing, "no origin");

        let response = ErrorResponse::for_rejection(&rejection, &request, &config);
        assert_eq!(response.status(), 401);
        assert_eq!(response.body(), None);
        assert!(response.headers().iter().all(|(n, _)| *n != "content-type"));
    }

    #[test]
    fn error_for_trusted_origin_carries_cors_headers() {
        let config = settings().build().unwrap();
        let mut request = IncomingRequest::new("req-1", HttpMethod::Post);
        request.add_header("Origin", ORIGIN);
        let rejection = Rejection::new(RejectionKind::CsrfCookieMissing, "no csrf cookie");

        let response = ErrorResponse::for_rejection(&rejection, &request, &config);
        assert!(response
            .headers()
            .contains(&("access-control-allow-origin", ORIGIN.to_string())));
        assert!(response
            .headers()
            .contains(&("content-type", "application/json".to_string())));
    }

    #[test]
    fn error_body_does_not_reveal_cause() {
        let config = settings().build().unwrap();
        let request = IncomingRequest::new("req-1", HttpMethod::Get);

        let format = Rejection::new(RejectionKind::EnvelopeFormatInvalid, "format");
        let auth = Rejection::new(RejectionKind::EnvelopeAuthFailed, "auth");

        assert_eq!(
            ErrorResponse::for_rejection(&format, &request, &config),
            ErrorResponse::for_rejection(&auth, &request, &config)
        );
    }

    #[test]
    fn apply_proceed_replaces_authorization() {
        let config = settings().build().unwrap();
        let mut request = accepted_request(&config);

        apply_proceed(&mut request, &Secret::new("tok123".to_string()), &config);

        assert_eq!(authorization(&request), vec!["Bearer tok123".to_string()]);
        assert!(request.cookie("theme").is_some());
    }

    #[test]
    fn apply_proceed_can_strip_cookies() {
        let config = settings().remove_cookie_headers(true).build().unwrap();
        let mut request = accepted_request(&config);

        apply_proceed(&mut request, &Secret::new("tok123".to_string()), &config);

        assert!(request.cookie("theme").is_none());
        assert!(request.cookie("example-at").is_none());
    }

    #[test]
    fn handle_rewrites_accepted_request() {
        let config = settings().build().unwrap();
        let mut request = accepted_request(&config);

        assert_eq!(
            handle(&mut request, &config),
            Outcome::Proceed {
                cors_headers: Vec::new()
            }
        );
        assert_eq!(authorization(&request), vec!["Bearer tok123".to_string()]);
    }

    #[test]
    fn handle_adds_cors_headers_to_accepted_response() {
        let config = settings().cors_enabled(true).build().unwrap();
        let mut request = accepted_request(&config);

        match handle(&mut request, &config) {
            Outcome::Proceed { cors_headers } => {
                assert!(cors_headers.contains(&("access-control-allow-origin", ORIGIN.to_string())));
                assert!(cors_headers.contains(&("access-control-allow-credentials", "true".to_string())));
                assert!(cors_headers.contains(&("vary", "origin".to_string())));
            }
            other => panic!("expected proceed, got {:?}", other),
        }
        assert_eq!(authorization(&request), vec!["Bearer tok123".to_string()]);
    }

    #[test]
    fn handle_answers_preflight() {
        let config = settings().cors_enabled(true).build().unwrap();
        let mut request = IncomingRequest::new("req-1", HttpMethod::Options);
        request.add_header("Origin", ORIGIN);

        match handle(&mut request, &config) {
            Outcome::Preflight(response) => {
                assert_eq!(response.status(), 204);
                assert!(!response.headers().is_empty());
            }
            other => panic!("expected preflight, got {:?}", other),
        }
    }

    #[test]
    fn handle_leaves_declined_request_alone() {
        let config = RouteSettings::new().build().unwrap();
        let mut request = accepted_request(&settings().build().unwrap());

        assert_eq!(handle(&mut request, &config), Outcome::Forward);
        assert_eq!(authorization(&request), vec!["Basic stale".to_string()]);
    }
}
