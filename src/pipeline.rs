//! The per-request decision pipeline.
//!
//! [`process`] runs the checks in a fixed order and returns exactly one
//! [`Verdict`]. The origin, CSRF and decryption steps are chained through a
//! [`Checkpoint`] whose type parameter records which checks have passed.

use std::fmt;

use crate::config::RouteConfig;
use crate::error::{EnvelopeError, Rejection, RejectionKind};
use crate::logging::FilterLog;
use crate::request::{HttpMethod, RequestView};
use crate::state::{CsrfVerified, OriginVerified, Unverified};
use crate::verifier::{apply_csrf_checks, open_cookie, verify_origin};
use crate::Secret;

/// The outcome of running the filter on one request.
///
/// `Decline` and `PassThrough` both leave the request untouched; they differ
/// in who handled it. `Decline` means the filter is off for the route, while
/// `PassThrough` means the filter looked at the request and chose not to act.
#[derive(Debug)]
pub enum Verdict {
    /// The filter is disabled on this route
    Decline,
    /// Forward the request unmodified
    PassThrough,
    /// Answer a CORS preflight with 204 and CORS headers
    Preflight,
    /// Forward the request with `Authorization: Bearer <access_token>`
    Proceed {
        /// The decrypted access token
        access_token: Secret<String>,
    },
    /// Answer with an error response
    Reject(Rejection),
}

impl Verdict {
    /// Returns the rejection if this is a `Reject` verdict.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Reject(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Returns the access token if this is a `Proceed` verdict.
    pub fn access_token(&self) -> Option<&Secret<String>> {
        match self {
            Verdict::Proceed { access_token } => Some(access_token),
            _ => None,
        }
    }
}

/// Runs the filter on one request.
///
/// The steps run in this order, stopping at the first that decides:
///
/// 1. disabled route: [`Verdict::Decline`]
/// 2. `OPTIONS`: [`Verdict::Preflight`] when CORS is on, else [`Verdict::PassThrough`]
/// 3. `allow_tokens` with a non-blank `Authorization` header: [`Verdict::PassThrough`]
/// 4. `Origin` present and trusted
/// 5. CSRF double-submit check for `POST`, `PUT`, `PATCH` and `DELETE`
/// 6. `<prefix>-at` cookie present and decryptable: [`Verdict::Proceed`]
///
/// Any failure in steps 4 to 6 is logged and returned as [`Verdict::Reject`].
///
/// # Examples
///
/// ```
/// use token_handler::envelope::seal_random;
/// use token_handler::{process, HttpMethod, IncomingRequest, RouteSettings, Verdict};
///
/// let key = [9u8; 32];
/// let config = RouteSettings::new()
///     .enabled(true)
///     .cookie_name_prefix("app")
///     .encryption_key("09".repeat(32))
///     .trusted_web_origin("https://spa.example.com")
///     .build()
///     .unwrap();
///
/// let cookie = seal_random(&key, b"tok123", config.envelope_scheme()).unwrap();
/// let mut request = IncomingRequest::new("req-1", HttpMethod::Get);
/// request.add_header("Origin", "https://spa.example.com");
/// request.add_cookie_line(format!("app-at={}", cookie));
///
/// match process(&request, &config) {
///     Verdict::Proceed { access_token } => assert_eq!(access_token.expose_secret(), "tok123"),
///     other => panic!("unexpected verdict: {:?}", other),
/// }
/// ```
pub fn process<R>(request: &R, config: &RouteConfig) -> Verdict
where
    R: RequestView + ?Sized,
{
    if !config.enabled() {
        return Verdict::Decline;
    }

    let log = FilterLog::new(request.request_id());

    if request.method() == HttpMethod::Options {
        if config.cors().enabled() {
            log.debug(format_args!("answering CORS preflight"));
            return Verdict::Preflight;
        }
        log.debug(format_args!("passing OPTIONS request through"));
        return Verdict::PassThrough;
    }

    if config.allow_tokens()
        && request
            .header("authorization")
            .is_some_and(|value| !value.into_inner().trim().is_empty())
    {
        log.debug(format_args!(
            "request already carries an authorization header, passing through"
        ));
        return Verdict::PassThrough;
    }

    let result = Checkpoint::new(request, config)
        .verify_origin()
        .and_then(|checkpoint| checkpoint.verify_csrf())
        .and_then(|checkpoint| checkpoint.decrypt_access_token());

    match result {
        Ok(access_token) => {
            log.debug(format_args!("access token cookie accepted"));
            Verdict::Proceed { access_token }
        }
        Err(rejection) => {
            log.rejection(&rejection);
            Verdict::Reject(rejection)
        }
    }
}

/// A request partway through the checks.
///
/// `S` is one of the [`state`](crate::state) markers. Each transition
/// consumes the checkpoint, so a later check cannot run unless the earlier
/// ones returned `Ok`.
///
/// # Examples
///
/// ```
/// use token_handler::pipeline::Checkpoint;
/// use token_handler::{HttpMethod, IncomingRequest, RejectionKind, RouteSettings};
///
/// let config = RouteSettings::new()
///     .enabled(true)
///     .cookie_name_prefix("app")
///     .encryption_key("09".repeat(32))
///     .trusted_web_origin("https://spa.example.com")
///     .build()
///     .unwrap();
///
/// let request = IncomingRequest::new("req-1", HttpMethod::Get);
/// let rejection = Checkpoint::new(&request, &config).verify_origin().unwrap_err();
/// assert_eq!(rejection.kind, RejectionKind::OriginMissing);
/// ```
pub struct Checkpoint<'r, R: ?Sized, S> {
    request: &'r R,
    config: &'r RouteConfig,
    _state: S,
}

impl<R: ?Sized, S: fmt::Debug> fmt::Debug for Checkpoint<'_, R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("state", &self._state)
            .finish_non_exhaustive()
    }
}

impl<'r, R, S> Checkpoint<'r, R, S>
where
    R: RequestView + ?Sized,
{
    fn advance<T>(self, state: T) -> Checkpoint<'r, R, T> {
        Checkpoint {
            request: self.request,
            config: self.config,
            _state: state,
        }
    }
}

impl<'r, R> Checkpoint<'r, R, Unverified>
where
    R: RequestView + ?Sized,
{
    /// Starts the checks for `request` on the route described by `config`.
    pub fn new(request: &'r R, config: &'r RouteConfig) -> Self {
        Self {
            request,
            config,
            _state: Unverified::new(),
        }
    }

    /// Requires an `Origin` header naming a trusted origin.
    ///
    /// # Errors
    ///
    /// [`RejectionKind::OriginMissing`] or [`RejectionKind::OriginUntrusted`].
    pub fn verify_origin(self) -> Result<Checkpoint<'r, R, OriginVerified>, Rejection> {
        let origin = self.request.header("origin").ok_or_else(|| {
            Rejection::new(
                RejectionKind::OriginMissing,
                "the request did not have an origin header",
            )
        })?;

        if !verify_origin(self.config, origin) {
            return Err(Rejection::new(
                RejectionKind::OriginUntrusted,
                "the request was from an untrusted web origin",
            ));
        }

        Ok(self.advance(OriginVerified::new()))
    }
}

impl<'r, R> Checkpoint<'r, R, OriginVerified>
where
    R: RequestView + ?Sized,
{
    /// Runs the CSRF check on data-changing methods; other methods are exempt.
    ///
    /// # Errors
    ///
    /// Any rejection from [`apply_csrf_checks`].
    pub fn verify_csrf(self) -> Result<Checkpoint<'r, R, CsrfVerified>, Rejection> {
        if self.request.method().is_state_changing() {
            apply_csrf_checks(self.request, self.config)?;
        }
        Ok(self.advance(CsrfVerified::new()))
    }
}

impl<'r, R> Checkpoint<'r, R, CsrfVerified>
where
    R: RequestView + ?Sized,
{
    /// Decrypts the `<prefix>-at` cookie into the bearer token.
    ///
    /// The plaintext must be UTF-8 without control characters so it can be
    /// written into a header value.
    ///
    /// # Errors
    ///
    /// [`RejectionKind::TokenCookieMissing`] or the envelope failure.
    pub fn decrypt_access_token(self) -> Result<Secret<String>, Rejection> {
        let cookie = self
            .request
            .cookie(self.config.access_token_cookie())
            .ok_or_else(|| {
                Rejection::new(
                    RejectionKind::TokenCookieMissing,
                    "no access token cookie was received in the request",
                )
            })?;

        let plaintext = open_cookie(self.config, cookie).map_err(|e| {
            Rejection::new(
                e.into(),
                format!("the access token cookie was rejected: {}", e),
            )
        })?;

        match std::str::from_utf8(plaintext.expose_secret()) {
            Ok(token) if !token.chars().any(char::is_control) => {
                Ok(Secret::new(token.to_string()))
            }
            _ => Err(Rejection::new(
                EnvelopeError::FormatInvalid.into(),
                "the access token cookie did not hold a valid header value",
            )),
        }
    }
}
