//! Type-state markers for pipeline checkpoints.
//!
//! A [`Checkpoint`](crate::pipeline::Checkpoint) moves through these states
//! in a fixed order. Each transition runs one check, so the access token can
//! only be decrypted once the origin and CSRF checks have passed:
//!
//! ```text
//! Unverified --verify_origin--> OriginVerified --verify_csrf--> CsrfVerified --decrypt_access_token--> token
//! ```

/// Marker for a request that has not passed any check.
#[derive(Debug, Clone, Copy)]
pub struct Unverified {
    _private: (),
}

impl Unverified {
    /// This is `pub(crate)` so only the pipeline can create it.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Marker for a request whose `Origin` is trusted.
#[derive(Debug, Clone, Copy)]
pub struct OriginVerified {
    _private: (),
}

impl OriginVerified {
    /// This is `pub(crate)` so only the pipeline can create it.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Marker for a request that passed the CSRF check, or was exempt from it.
#[derive(Debug, Clone, Copy)]
pub struct CsrfVerified {
    _private: (),
}

impl CsrfVerified {
    /// This is `pub(crate)` so only the pipeline can create it.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}
