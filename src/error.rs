use std::fmt;

/// A request rejection with the internal cause.
///
/// The `kind` and `message` are for logs only. Everything a client sees is
/// derived from [`RejectionKind::status`] and [`RejectionKind::code`], which
/// collapse every verification failure into the same 401 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The check that failed
    pub kind: RejectionKind,
    /// Operator-facing explanation; never contains request bytes
    pub message: String,
}

impl Rejection {
    /// Creates a new rejection.
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// HTTP status to respond with.
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Error code for the JSON response body.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Rejection {}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// No `Origin` header
    OriginMissing,
    /// `Origin` is not in the trusted list
    OriginUntrusted,
    /// Data-changing request without the CSRF cookie
    CsrfCookieMissing,
    /// Data-changing request without the CSRF header
    CsrfHeaderMissing,
    /// CSRF header does not equal the decrypted CSRF cookie
    CsrfMismatch,
    /// No access-token cookie
    TokenCookieMissing,
    /// A cookie envelope could not be decoded or parsed
    EnvelopeFormatInvalid,
    /// A cookie envelope failed authentication
    EnvelopeAuthFailed,
    /// The cipher could not be set up; not a client fault
    CipherUnavailable,
}

impl RejectionKind {
    /// HTTP status for this kind: 500 for environment failures, 401 otherwise.
    pub fn status(self) -> u16 {
        match self {
            RejectionKind::CipherUnavailable => 500,
            _ => 401,
        }
    }

    /// Public error code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            RejectionKind::CipherUnavailable => "server_error",
            _ => "unauthorized_request",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionKind::OriginMissing => "origin missing",
            RejectionKind::OriginUntrusted => "origin untrusted",
            RejectionKind::CsrfCookieMissing => "csrf cookie missing",
            RejectionKind::CsrfHeaderMissing => "csrf header missing",
            RejectionKind::CsrfMismatch => "csrf mismatch",
            RejectionKind::TokenCookieMissing => "token cookie missing",
            RejectionKind::EnvelopeFormatInvalid => "envelope format invalid",
            RejectionKind::EnvelopeAuthFailed => "envelope authentication failed",
            RejectionKind::CipherUnavailable => "cipher unavailable",
        };
        f.write_str(name)
    }
}

/// Failure to open a cookie envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Bad encoding, wrong length or unsupported version
    FormatInvalid,
    /// The GCM tag did not verify
    AuthFailed,
    /// The cipher could not be constructed
    CipherUnavailable,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::FormatInvalid => write!(f, "the cookie envelope has an invalid format"),
            EnvelopeError::AuthFailed => write!(f, "the cookie envelope failed authentication"),
            EnvelopeError::CipherUnavailable => write!(f, "the decryption cipher is unavailable"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl From<EnvelopeError> for RejectionKind {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::FormatInvalid => RejectionKind::EnvelopeFormatInvalid,
            EnvelopeError::AuthFailed => RejectionKind::EnvelopeAuthFailed,
            EnvelopeError::CipherUnavailable => RejectionKind::CipherUnavailable,
        }
    }
}

/// A configuration directive that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    directive: &'static str,
    kind: ConfigErrorKind,
}

impl ConfigError {
    /// Creates a new configuration error for `directive`.
    pub fn new(directive: &'static str, kind: ConfigErrorKind) -> Self {
        Self { directive, kind }
    }

    /// The directive that failed.
    pub fn directive(&self) -> &'static str {
        self.directive
    }

    /// The constraint that was not met.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::Missing => {
                write!(f, "The {} configuration directive was not provided", self.directive)
            }
            ConfigErrorKind::TooLong { max } => write!(
                f,
                "The {} configuration directive has a maximum length of {} characters",
                self.directive, max
            ),
            ConfigErrorKind::InvalidLength { expected } => write!(
                f,
                "The {} configuration directive must contain exactly {} characters",
                self.directive, expected
            ),
            ConfigErrorKind::InvalidFormat(reason) => write!(
                f,
                "The {} configuration directive is invalid: {}",
                self.directive, reason
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The constraint a configuration directive did not meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Required but absent or empty
    Missing,
    /// Longer than allowed
    TooLong {
        /// Maximum number of characters
        max: usize,
    },
    /// Not the exact required length
    InvalidLength {
        /// Required number of characters
        expected: usize,
    },
    /// Present but malformed
    InvalidFormat(&'static str),
}
