//! Per-route configuration.
//!
//! A host collects raw [`RouteSettings`] for each location, merges each child
//! with its parent, and calls [`RouteSettings::build`] once at startup. The
//! resulting [`RouteConfig`] is immutable and shared by every request on the
//! route; nothing in it is re-checked per request.

use std::fmt;

use serde::Deserialize;

use crate::codec::hex_decode_array;
use crate::envelope::{EnvelopeScheme, KEY_SIZE};
use crate::error::{ConfigError, ConfigErrorKind};
use crate::Secret;

/// Longest accepted cookie name prefix.
pub const MAX_COOKIE_PREFIX_LEN: usize = 64;
/// Shortest accepted trusted origin, the length of `http://`.
pub const MIN_ORIGIN_LEN: usize = 7;

/// Methods allowed in preflight responses when none are configured.
pub const DEFAULT_CORS_ALLOW_METHODS: &str = "OPTIONS,HEAD,GET,POST,PUT,PATCH,DELETE";
/// Preflight cache lifetime in seconds when CORS is on and none is configured.
pub const DEFAULT_CORS_MAX_AGE: u32 = 86400;

const DIRECTIVE_PREFIX: &str = "cookie_name_prefix";
const DIRECTIVE_KEY: &str = "encryption_key";
const DIRECTIVE_ORIGIN: &str = "trusted_web_origin";

/// Raw settings for one route, every field optional.
///
/// Unset fields either inherit from a parent through [`merge`](Self::merge)
/// or fall back to defaults in [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use token_handler::RouteSettings;
///
/// let parent = RouteSettings::new()
///     .cookie_name_prefix("app")
///     .encryption_key("4a".repeat(32))
///     .trusted_web_origin("https://spa.example.com");
///
/// let config = RouteSettings::new()
///     .enabled(true)
///     .merge(&parent)
///     .build()
///     .expect("valid route");
///
/// assert_eq!(config.access_token_cookie(), "app-at");
/// assert_eq!(config.csrf_header(), "x-app-csrf");
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteSettings {
    enabled: Option<bool>,
    cookie_name_prefix: Option<String>,
    encryption_key: Option<String>,
    #[serde(alias = "trusted_web_origin")]
    trusted_web_origins: Option<Vec<String>>,
    allow_tokens: Option<bool>,
    remove_cookie_headers: Option<bool>,
    cors_enabled: Option<bool>,
    cors_allow_methods: Option<Vec<String>>,
    cors_allow_headers: Option<Vec<String>>,
    cors_expose_headers: Option<Vec<String>>,
    cors_max_age: Option<u32>,
    envelope_scheme: Option<EnvelopeScheme>,
}

impl RouteSettings {
    /// Creates settings with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns the filter on or off for this route.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the prefix for the `-at` and `-csrf` cookie names.
    pub fn cookie_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cookie_name_prefix = Some(prefix.into());
        self
    }

    /// Sets the AES-256 key as 64 hex characters.
    pub fn encryption_key(mut self, hex_key: impl Into<String>) -> Self {
        self.encryption_key = Some(hex_key.into());
        self
    }

    /// Adds one trusted web origin.
    pub fn trusted_web_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_web_origins
            .get_or_insert_with(Vec::new)
            .push(origin.into());
        self
    }

    /// Lets requests that already carry an `Authorization` header through untouched.
    pub fn allow_tokens(mut self, allow: bool) -> Self {
        self.allow_tokens = Some(allow);
        self
    }

    /// Strips `Cookie` headers from requests forwarded upstream.
    pub fn remove_cookie_headers(mut self, remove: bool) -> Self {
        self.remove_cookie_headers = Some(remove);
        self
    }

    /// Turns CORS response headers on or off.
    pub fn cors_enabled(mut self, enabled: bool) -> Self {
        self.cors_enabled = Some(enabled);
        self
    }

    /// Sets `access-control-allow-methods`.
    pub fn cors_allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_allow_methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Sets `access-control-allow-headers`.
    pub fn cors_allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_allow_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets `access-control-expose-headers`.
    pub fn cors_expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_expose_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets `access-control-max-age` in seconds; zero omits the header.
    pub fn cors_max_age(mut self, seconds: u32) -> Self {
        self.cors_max_age = Some(seconds);
        self
    }

    /// Chooses the cookie envelope layout.
    pub fn envelope_scheme(mut self, scheme: EnvelopeScheme) -> Self {
        self.envelope_scheme = Some(scheme);
        self
    }

    /// Fills every unset field from `parent`.
    pub fn merge(self, parent: &RouteSettings) -> Self {
        Self {
            enabled: self.enabled.or(parent.enabled),
            cookie_name_prefix: self
                .cookie_name_prefix
                .or_else(|| parent.cookie_name_prefix.clone()),
            encryption_key: self
                .encryption_key
                .or_else(|| parent.encryption_key.clone()),
            trusted_web_origins: self
                .trusted_web_origins
                .or_else(|| parent.trusted_web_origins.clone()),
            allow_tokens: self.allow_tokens.or(parent.allow_tokens),
            remove_cookie_headers: self.remove_cookie_headers.or(parent.remove_cookie_headers),
            cors_enabled: self.cors_enabled.or(parent.cors_enabled),
            cors_allow_methods: self
                .cors_allow_methods
                .or_else(|| parent.cors_allow_methods.clone()),
            cors_allow_headers: self
                .cors_allow_headers
                .or_else(|| parent.cors_allow_headers.clone()),
            cors_expose_headers: self
                .cors_expose_headers
                .or_else(|| parent.cors_expose_headers.clone()),
            cors_max_age: self.cors_max_age.or(parent.cors_max_age),
            envelope_scheme: self.envelope_scheme.or(parent.envelope_scheme),
        }
    }

    /// Applies defaults and validates the settings into a [`RouteConfig`].
    ///
    /// A disabled route is returned without validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first directive that is missing
    /// or malformed on an enabled route.
    pub fn build(&self) -> Result<RouteConfig, ConfigError> {
        if !self.enabled.unwrap_or(false) {
            return Ok(RouteConfig::disabled());
        }

        let prefix = validate_prefix(self.cookie_name_prefix.as_deref())?;
        let key = validate_key(self.encryption_key.as_deref())?;
        let origins = validate_origins(self.trusted_web_origins.as_deref())?;

        let cors_enabled = self.cors_enabled.unwrap_or(false);
        let cors = CorsConfig {
            enabled: cors_enabled,
            allow_methods: match &self.cors_allow_methods {
                Some(methods) => methods.join(","),
                None if cors_enabled => DEFAULT_CORS_ALLOW_METHODS.to_string(),
                None => String::new(),
            },
            allow_headers: self.cors_allow_headers.as_ref().map(|h| h.join(",")),
            expose_headers: self.cors_expose_headers.as_ref().map(|h| h.join(",")),
            max_age: match self.cors_max_age {
                Some(age) => age,
                None if cors_enabled => DEFAULT_CORS_MAX_AGE,
                None => 0,
            },
        };

        Ok(RouteConfig {
            enabled: true,
            access_token_cookie: format!("{}-at", prefix),
            csrf_cookie: format!("{}-csrf", prefix),
            csrf_header: format!("x-{}-csrf", prefix),
            cookie_name_prefix: prefix,
            encryption_key: key,
            trusted_web_origins: origins,
            allow_tokens: self.allow_tokens.unwrap_or(false),
            remove_cookie_headers: self.remove_cookie_headers.unwrap_or(false),
            envelope_scheme: self.envelope_scheme.unwrap_or_default(),
            cors,
        })
    }
}

impl fmt::Debug for RouteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSettings")
            .field("enabled", &self.enabled)
            .field("cookie_name_prefix", &self.cookie_name_prefix)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("trusted_web_origins", &self.trusted_web_origins)
            .field("allow_tokens", &self.allow_tokens)
            .field("remove_cookie_headers", &self.remove_cookie_headers)
            .field("cors_enabled", &self.cors_enabled)
            .field("envelope_scheme", &self.envelope_scheme)
            .finish_non_exhaustive()
    }
}

/// `tchar` from RFC 9110, valid in both cookie names and header names.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn validate_prefix(prefix: Option<&str>) -> Result<String, ConfigError> {
    let prefix = match prefix {
        Some(p) if !p.is_empty() => p,
        _ => return Err(ConfigError::new(DIRECTIVE_PREFIX, ConfigErrorKind::Missing)),
    };

    if prefix.len() > MAX_COOKIE_PREFIX_LEN {
        return Err(ConfigError::new(
            DIRECTIVE_PREFIX,
            ConfigErrorKind::TooLong {
                max: MAX_COOKIE_PREFIX_LEN,
            },
        ));
    }

    if !prefix.bytes().all(is_token_char) {
        return Err(ConfigError::new(
            DIRECTIVE_PREFIX,
            ConfigErrorKind::InvalidFormat("only cookie name characters are allowed"),
        ));
    }

    Ok(prefix.to_string())
}

fn validate_key(hex_key: Option<&str>) -> Result<Secret<[u8; KEY_SIZE]>, ConfigError> {
    let hex_key = match hex_key {
        Some(k) if !k.is_empty() => k,
        _ => return Err(ConfigError::new(DIRECTIVE_KEY, ConfigErrorKind::Missing)),
    };

    if hex_key.len() != KEY_SIZE * 2 {
        return Err(ConfigError::new(
            DIRECTIVE_KEY,
            ConfigErrorKind::InvalidLength {
                expected: KEY_SIZE * 2,
            },
        ));
    }

    hex_decode_array::<KEY_SIZE>(hex_key.as_bytes())
        .map(Secret::new)
        .map_err(|_| {
            ConfigError::new(
                DIRECTIVE_KEY,
                ConfigErrorKind::InvalidFormat("only hex characters are allowed"),
            )
        })
}

fn validate_origins(origins: Option<&[String]>) -> Result<Vec<String>, ConfigError> {
    let origins = match origins {
        Some(o) if !o.is_empty() => o,
        _ => return Err(ConfigError::new(DIRECTIVE_ORIGIN, ConfigErrorKind::Missing)),
    };

    for origin in origins {
        if origin.len() < MIN_ORIGIN_LEN {
            return Err(ConfigError::new(
                DIRECTIVE_ORIGIN,
                ConfigErrorKind::InvalidFormat("an origin must be at least 7 characters"),
            ));
        }
        if !has_http_scheme(origin) {
            return Err(ConfigError::new(
                DIRECTIVE_ORIGIN,
                ConfigErrorKind::InvalidFormat("an origin must begin with http:// or https://"),
            ));
        }
    }

    Ok(origins.to_vec())
}

fn has_http_scheme(origin: &str) -> bool {
    let starts_with = |scheme: &str| {
        origin
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    };
    starts_with("http://") || starts_with("https://")
}

/// CORS settings after defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorsConfig {
    enabled: bool,
    allow_methods: String,
    allow_headers: Option<String>,
    expose_headers: Option<String>,
    max_age: u32,
}

impl CorsConfig {
    /// Whether CORS headers are added to successful responses.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Comma-separated `access-control-allow-methods` value.
    pub fn allow_methods(&self) -> &str {
        &self.allow_methods
    }

    /// Configured `access-control-allow-headers`, if any.
    pub fn allow_headers(&self) -> Option<&str> {
        self.allow_headers.as_deref()
    }

    /// Configured `access-control-expose-headers`, if any.
    pub fn expose_headers(&self) -> Option<&str> {
        self.expose_headers.as_deref()
    }

    /// Preflight cache lifetime in seconds; zero means no header.
    pub fn max_age(&self) -> u32 {
        self.max_age
    }
}

/// Validated, immutable configuration for one route.
///
/// Built once by [`RouteSettings::build`] and shared by reference across
/// every request on the route. A disabled route holds no key, no prefix and
/// no origins; the pipeline declines it before reading any of them.
// BREAKING CHANGE WARNING: Do NOT add Clone. The key is zeroized when the single
// owning config is dropped, and hosts share it through a reference or an Arc.
#[derive(Debug)]
pub struct RouteConfig {
    enabled: bool,
    cookie_name_prefix: String,
    encryption_key: Secret<[u8; KEY_SIZE]>,
    trusted_web_origins: Vec<String>,
    allow_tokens: bool,
    remove_cookie_headers: bool,
    envelope_scheme: EnvelopeScheme,
    cors: CorsConfig,
    access_token_cookie: String,
    csrf_cookie: String,
    csrf_header: String,
}

impl RouteConfig {
    /// A route on which the filter does nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            cookie_name_prefix: String::new(),
            encryption_key: Secret::new([0u8; KEY_SIZE]),
            trusted_web_origins: Vec::new(),
            allow_tokens: false,
            remove_cookie_headers: false,
            envelope_scheme: EnvelopeScheme::default(),
            cors: CorsConfig::default(),
            access_token_cookie: String::new(),
            csrf_cookie: String::new(),
            csrf_header: String::new(),
        }
    }

    /// Whether the filter handles requests on this route.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Prefix shared by the cookie and header names.
    pub fn cookie_name_prefix(&self) -> &str {
        &self.cookie_name_prefix
    }

    /// The AES-256 key for cookie envelopes.
    pub fn encryption_key(&self) -> &Secret<[u8; KEY_SIZE]> {
        &self.encryption_key
    }

    /// Origins allowed to call this route, in configuration order.
    pub fn trusted_web_origins(&self) -> &[String] {
        &self.trusted_web_origins
    }

    /// Whether requests with their own `Authorization` header pass through.
    pub fn allow_tokens(&self) -> bool {
        self.allow_tokens
    }

    /// Whether `Cookie` headers are stripped before forwarding.
    pub fn remove_cookie_headers(&self) -> bool {
        self.remove_cookie_headers
    }

    /// Layout of cookie envelopes on this route.
    pub fn envelope_scheme(&self) -> EnvelopeScheme {
        self.envelope_scheme
    }

    /// CORS settings.
    pub fn cors(&self) -> &CorsConfig {
        &self.cors
    }

    /// `<prefix>-at`
    pub fn access_token_cookie(&self) -> &str {
        &self.access_token_cookie
    }

    /// `<prefix>-csrf`
    pub fn csrf_cookie(&self) -> &str {
        &self.csrf_cookie
    }

    /// `x-<prefix>-csrf`
    pub fn csrf_header(&self) -> &str {
        &self.csrf_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn valid() -> RouteSettings {
        RouteSettings::new()
            .enabled(true)
            .cookie_name_prefix("example")
            .encryption_key(HEX_KEY)
            .trusted_web_origin("https://www.example.com")
    }

    fn directive_of(settings: RouteSettings) -> (&'static str, ConfigErrorKind) {
        let err = settings.build().unwrap_err();
        (err.directive(), err.kind().clone())
    }

    #[test]
    fn builds_valid_route() {
        let config = valid().build().unwrap();

        assert!(config.enabled());
        assert_eq!(config.cookie_name_prefix(), "example");
        assert_eq!(config.access_token_cookie(), "example-at");
        assert_eq!(config.csrf_cookie(), "example-csrf");
        assert_eq!(config.csrf_header(), "x-example-csrf");
        assert_eq!(config.encryption_key().expose_secret()[31], 0x1f);
        assert_eq!(config.envelope_scheme(), EnvelopeScheme::Base64UrlV1);
        assert!(!config.allow_tokens());
        assert!(!config.remove_cookie_headers());
    }

    #[test]
    fn disabled_route_skips_validation() {
        let config = RouteSettings::new().build().unwrap();
        assert!(!config.enabled());

        let config = RouteSettings::new()
            .enabled(false)
            .encryption_key("nothex")
            .build()
            .unwrap();
        assert!(!config.enabled());
    }

    #[test]
    fn missing_prefix_is_reported() {
        let settings = RouteSettings::new()
            .enabled(true)
            .encryption_key(HEX_KEY)
            .trusted_web_origin("https://www.example.com");
        assert_eq!(
            directive_of(settings),
            ("cookie_name_prefix", ConfigErrorKind::Missing)
        );
        assert_eq!(
            directive_of(valid().cookie_name_prefix("")),
            ("cookie_name_prefix", ConfigErrorKind::Missing)
        );
    }

    #[test]
    fn prefix_length_is_bounded() {
        assert!(valid().cookie_name_prefix("a".repeat(64)).build().is_ok());
        assert_eq!(
            directive_of(valid().cookie_name_prefix("a".repeat(65))),
            ("cookie_name_prefix", ConfigErrorKind::TooLong { max: 64 })
        );
    }

    #[test]
    fn prefix_must_be_a_cookie_token() {
        for bad in ["my app", "app;x", "app=1", "app\r\n"] {
            let (directive, kind) = directive_of(valid().cookie_name_prefix(bad));
            assert_eq!(directive, "cookie_name_prefix");
            assert!(matches!(kind, ConfigErrorKind::InvalidFormat(_)));
        }
    }

    #[test]
    fn key_must_be_64_hex_chars() {
        assert_eq!(
            directive_of(valid().encryption_key("")),
            ("encryption_key", ConfigErrorKind::Missing)
        );
        assert_eq!(
            directive_of(valid().encryption_key(&HEX_KEY[..62])),
            ("encryption_key", ConfigErrorKind::InvalidLength { expected: 64 })
        );

        let not_hex = format!("{}zz", &HEX_KEY[..62]);
        let (directive, kind) = directive_of(valid().encryption_key(not_hex));
        assert_eq!(directive, "encryption_key");
        assert!(matches!(kind, ConfigErrorKind::InvalidFormat(_)));
    }

    #[test]
    fn at_least_one_origin_is_required() {
        let settings = RouteSettings::new()
            .enabled(true)
            .cookie_name_prefix("example")
            .encryption_key(HEX_KEY);
        assert_eq!(
            directive_of(settings),
            ("trusted_web_origin", ConfigErrorKind::Missing)
        );
    }

    #[test]
    fn origins_must_be_http_urls() {
        for bad in ["ftp://files.example.com", "http:/", "www.example.com", "https:"] {
            let (directive, kind) = directive_of(valid().trusted_web_origin(bad));
            assert_eq!(directive, "trusted_web_origin");
            assert!(matches!(kind, ConfigErrorKind::InvalidFormat(_)), "{}", bad);
        }

        let config = valid()
            .trusted_web_origin("HTTP://localhost:3000")
            .build()
            .unwrap();
        assert_eq!(config.trusted_web_origins().len(), 2);
    }

    #[test]
    fn child_inherits_unset_fields_from_parent() {
        let parent = valid()
            .allow_tokens(true)
            .envelope_scheme(EnvelopeScheme::LegacyHex);
        let child = RouteSettings::new().cookie_name_prefix("child").merge(&parent);
        let config = child.build().unwrap();

        assert_eq!(config.cookie_name_prefix(), "child");
        assert!(config.allow_tokens());
        assert_eq!(config.envelope_scheme(), EnvelopeScheme::LegacyHex);
        assert_eq!(config.trusted_web_origins(), ["https://www.example.com"]);
    }

    #[test]
    fn child_can_disable_enabled_parent() {
        let child = RouteSettings::new().enabled(false).merge(&valid());
        assert!(!child.build().unwrap().enabled());
    }

    #[test]
    fn child_origins_replace_parent_origins() {
        let child = RouteSettings::new()
            .trusted_web_origin("https://other.example.com")
            .merge(&valid());
        let config = child.build().unwrap();
        assert_eq!(config.trusted_web_origins(), ["https://other.example.com"]);
    }

    #[test]
    fn cors_defaults_apply_only_when_enabled() {
        let config = valid().build().unwrap();
        assert!(!config.cors().enabled());
        assert_eq!(config.cors().allow_methods(), "");
        assert_eq!(config.cors().max_age(), 0);

        let config = valid().cors_enabled(true).build().unwrap();
        assert!(config.cors().enabled());
        assert_eq!(config.cors().allow_methods(), DEFAULT_CORS_ALLOW_METHODS);
        assert_eq!(config.cors().max_age(), 86400);
        assert_eq!(config.cors().allow_headers(), None);
    }

    #[test]
    fn cors_lists_are_comma_joined() {
        let config = valid()
            .cors_enabled(true)
            .cors_allow_methods(["GET", "POST"])
            .cors_allow_headers(["x-example-csrf", "content-type"])
            .cors_expose_headers(["x-request-id"])
            .cors_max_age(0)
            .build()
            .unwrap();

        assert_eq!(config.cors().allow_methods(), "GET,POST");
        assert_eq!(config.cors().allow_headers(), Some("x-example-csrf,content-type"));
        assert_eq!(config.cors().expose_headers(), Some("x-request-id"));
        assert_eq!(config.cors().max_age(), 0);
    }

    #[test]
    fn deserializes_from_json() {
        let json = format!(
            r#"{{
                "enabled": true,
                "cookie_name_prefix": "example",
                "encryption_key": "{}",
                "trusted_web_origin": ["https://www.example.com"],
                "envelope_scheme": "hex"
            }}"#,
            HEX_KEY
        );
        let settings: RouteSettings = serde_json::from_str(&json).unwrap();
        let config = settings.build().unwrap();

        assert_eq!(config.envelope_scheme(), EnvelopeScheme::LegacyHex);
        assert_eq!(config.csrf_cookie(), "example-csrf");
    }

    #[test]
    fn rejects_unknown_json_fields() {
        let result = serde_json::from_str::<RouteSettings>(r#"{"cookie_prefix": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let settings_output = format!("{:?}", valid());
        let config_output = format!("{:?}", valid().build().unwrap());

        assert!(!settings_output.contains(HEX_KEY));
        assert!(settings_output.contains("[REDACTED]"));
        assert!(config_output.contains("[REDACTED]"));
    }

    #[test]
    fn route_config_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RouteConfig>();
    }
}
