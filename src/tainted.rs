use std::fmt;

/// A wrapper for request input that has not been checked yet.
///
/// Every header and cookie value read from an incoming request is handed to
/// the pipeline as `Tainted<T>`. The value cannot be read from outside this
/// crate; only the verifier and the envelope decryptor unwrap it, and only to
/// compare it against configuration or to authenticate it.
///
/// # Security Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - The inner value is crate-private
/// - Debug output shows only the length, so attacker bytes never reach logs
///
/// # Examples
///
/// ```
/// use token_handler::Tainted;
///
/// let origin = Tainted::new("https://evil.example\r\nx-injected: 1");
///
/// assert_eq!(format!("{:?}", origin), "Tainted { len: 35 }");
/// assert!(!origin.is_empty());
/// ```
// BREAKING CHANGE WARNING: Do NOT remove Clone or Copy - lookups return borrowed views that are
// handed to several checks.
#[derive(Clone, Copy)]
pub struct Tainted<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private.
    // Making it public lets callers skip the origin, CSRF and AEAD checks (CWE-20).
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for checking.
    ///
    /// This is `pub(crate)`: only the verifier and decryptor may look inside.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: AsRef<[u8]>> Tainted<T> {
    /// Returns the length in bytes of the untrusted value.
    pub fn len(&self) -> usize {
        self.inner.as_ref().len()
    }

    /// Returns `true` if the untrusted value is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.as_ref().is_empty()
    }
}

// BREAKING CHANGE WARNING: Do NOT add Deref, AsRef, Borrow, From<T>, Into<T>, or any other
// implicit conversion traits to Tainted<T>.

impl<T: AsRef<[u8]>> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("len", &self.inner.as_ref().len())
            .finish()
    }
}
