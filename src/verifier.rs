//! Origin and CSRF checks.
//!
//! These are stateless predicates over one request and its route config.
//! They are the only place, together with the envelope decryptor, where
//! [`Tainted`] request input is unwrapped.

use subtle::ConstantTimeEq;

use crate::config::RouteConfig;
use crate::envelope;
use crate::error::{EnvelopeError, Rejection, RejectionKind};
use crate::request::RequestView;
use crate::{Secret, Tainted};

/// Returns `true` if `origin` equals a trusted origin, ignoring ASCII case.
///
/// The whole value must match. There is no prefix, suffix or wildcard
/// matching, so `https://app.example.com.evil.com` never matches a trusted
/// `https://app.example.com`, and neither does `http://app.example.com`.
///
/// # Examples
///
/// ```
/// use token_handler::{verifier::verify_origin, RouteSettings, Tainted};
///
/// let config = RouteSettings::new()
///     .enabled(true)
///     .cookie_name_prefix("app")
///     .encryption_key("00".repeat(32))
///     .trusted_web_origin("https://spa.example.com")
///     .build()
///     .unwrap();
///
/// assert!(verify_origin(&config, Tainted::new("HTTPS://SPA.example.com")));
/// assert!(!verify_origin(&config, Tainted::new("https://spa.example.com.evil.com")));
/// ```
pub fn verify_origin(config: &RouteConfig, origin: Tainted<&str>) -> bool {
    let origin = origin.into_inner();
    config
        .trusted_web_origins()
        .iter()
        .any(|trusted| trusted.eq_ignore_ascii_case(origin))
}

/// Name of the header that must echo the CSRF cookie: `x-<prefix>-csrf`.
pub fn csrf_header_name(cookie_name_prefix: &str) -> String {
    format!("x-{}-csrf", cookie_name_prefix)
}

/// Runs the double-submit CSRF check for a data-changing request.
///
/// The `<prefix>-csrf` cookie is decrypted and its plaintext compared in
/// constant time with the `x-<prefix>-csrf` header. The caller decides which
/// methods need the check.
///
/// # Errors
///
/// Returns a [`Rejection`] if the cookie or header is absent, the cookie does
/// not decrypt, or the two values differ.
pub fn apply_csrf_checks<R>(request: &R, config: &RouteConfig) -> Result<(), Rejection>
where
    R: RequestView + ?Sized,
{
    let cookie = request.cookie(config.csrf_cookie()).ok_or_else(|| {
        Rejection::new(
            RejectionKind::CsrfCookieMissing,
            "no CSRF cookie was received for a data changing request",
        )
    })?;

    let header = request.header(config.csrf_header()).ok_or_else(|| {
        Rejection::new(
            RejectionKind::CsrfHeaderMissing,
            "no CSRF request header was received for a data changing request",
        )
    })?;

    let expected = open_cookie(config, cookie)
        .map_err(|e| Rejection::new(e.into(), format!("the CSRF cookie was rejected: {}", e)))?;

    let matches: bool = expected
        .expose_secret()
        .as_slice()
        .ct_eq(header.into_inner().as_bytes())
        .into();

    if matches {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionKind::CsrfMismatch,
            "the CSRF request header did not match the CSRF cookie",
        ))
    }
}

/// Decrypts a cookie value with the route's key and envelope scheme.
pub(crate) fn open_cookie(
    config: &RouteConfig,
    cookie: Tainted<&str>,
) -> Result<Secret<Vec<u8>>, EnvelopeError> {
    envelope::decrypt(
        config.encryption_key().expose_secret(),
        cookie.into_inner().as_bytes(),
        config.envelope_scheme(),
    )
}
