use std::fmt;

use crate::error::Rejection;

/// Request-scoped logging for the filter.
///
/// Every line carries the request id so a rejection can be traced back to the
/// request that caused it. Messages name the failed check; they never contain
/// cookie values, header values or decrypted plaintext. Anything wrapped in
/// [`Secret`](crate::Secret) or [`Tainted`](crate::Tainted) is redacted by its
/// own `Debug` impl if it is passed in by mistake.
#[derive(Debug, Clone, Copy)]
pub struct FilterLog<'a> {
    request_id: &'a str,
}

impl<'a> FilterLog<'a> {
    /// Creates a logger for one request.
    ///
    /// This is `pub(crate)`: only the pipeline creates it.
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs an error-level message with request ID.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a rejection at the level its status calls for.
    pub(crate) fn rejection(&self, rejection: &Rejection) {
        let status = rejection.status();
        if status >= 500 {
            self.error(format_args!("{} (status {}): {}", rejection.kind, status, rejection.message));
        } else {
            self.warn(format_args!("{} (status {}): {}", rejection.kind, status, rejection.message));
        }
    }
}
