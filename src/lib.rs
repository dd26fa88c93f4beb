//! Cookie-to-bearer token handler for single-page applications.
//!
//! This crate is the request-time half of the token handler pattern. A
//! browser holds encrypted, HttpOnly cookies; for each API request the
//! filter checks the `Origin`, enforces double-submit CSRF protection on
//! data-changing methods, decrypts the access-token cookie, and forwards the
//! request with `Authorization: Bearer <token>`.
//!
//! Every check fails closed and every verification failure looks the same to
//! the client: a 401 with code `unauthorized_request`.
//!
//! # Core Types
//!
//! - [`RouteSettings`]: raw, mergeable per-route settings
//! - [`RouteConfig`]: validated, immutable per-route configuration
//! - [`RequestView`]: read-only view of a request, implemented by the host
//! - [`process`]: runs the checks and returns a [`Verdict`]
//! - [`Secret<T>`]: redacting, zeroize-on-drop wrapper for keys and tokens
//! - [`Tainted<T>`]: wrapper for attacker-controlled request input
//!
//! # Examples
//!
//! ```
//! use token_handler::envelope::seal_random;
//! use token_handler::response::{handle, Outcome};
//! use token_handler::{HttpMethod, IncomingRequest, RouteSettings};
//!
//! let config = RouteSettings::new()
//!     .enabled(true)
//!     .cookie_name_prefix("example")
//!     .encryption_key("4a".repeat(32))
//!     .trusted_web_origin("https://www.example.com")
//!     .build()
//!     .expect("valid route settings");
//!
//! // Normally issued by the login side of the token handler.
//! let cookie = seal_random(&[0x4a; 32], b"tok123", config.envelope_scheme()).unwrap();
//!
//! let mut request = IncomingRequest::new("req-1", HttpMethod::Get);
//! request.add_header("Origin", "https://www.example.com");
//! request.add_cookie_line(format!("example-at={}", cookie));
//!
//! assert!(matches!(handle(&mut request, &config), Outcome::Proceed { .. }));
//! assert!(request
//!     .headers()
//!     .any(|(name, value)| name == "authorization" && value == "Bearer tok123"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
pub mod cors;
pub mod envelope;
mod error;
mod logging;
pub mod pipeline;
pub mod request;
pub mod response;
mod secret;
pub mod state;
mod tainted;
pub mod verifier;

pub use config::{CorsConfig, RouteConfig, RouteSettings};
pub use envelope::EnvelopeScheme;
pub use error::{ConfigError, ConfigErrorKind, EnvelopeError, Rejection, RejectionKind};
pub use logging::FilterLog;
pub use pipeline::{process, Verdict};
pub use request::{HttpMethod, IncomingRequest, RequestView};
pub use secret::Secret;
pub use tainted::Tainted;
