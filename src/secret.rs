use std::fmt;

use zeroize::Zeroize;

/// A wrapper for key material and decrypted tokens.
///
/// `Secret<T>` keeps the encryption key and every decrypted cookie value out
/// of logs and error text, and wipes the bytes when the value is dropped. A
/// request's plaintext therefore lives exactly as long as the request's
/// [`Verdict`](crate::Verdict) and no longer.
///
/// # Security Properties
///
/// - Does NOT implement `Deref`, `AsRef`, `Borrow`, `Clone`, or `Copy`
/// - Debug and Display output is always `[REDACTED]`
/// - The inner value is zeroized on drop
/// - Access requires the explicit [`expose_secret`](Self::expose_secret) call
///
/// # Examples
///
/// ```
/// use token_handler::Secret;
///
/// let token = Secret::new("eyJhbGciOi...".to_string());
///
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "eyJhbGciOi...");
/// ```
// BREAKING CHANGE WARNING: Do NOT add Clone, Copy, or Default derives.
// A cloned secret is a second copy that outlives the zeroize-on-drop of the first.
pub struct Secret<T: Zeroize> {
    // BREAKING CHANGE WARNING: This field MUST remain private (CWE-532).
    inner: T,
}

impl<T: Zeroize> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// # Security Warning
    ///
    /// The returned reference must not be logged or copied into a longer
    /// lived buffer.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
