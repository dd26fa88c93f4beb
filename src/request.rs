//! Request model at the boundary with the host server.
//!
//! The pipeline reads requests only through [`RequestView`], so any host can
//! plug in its own header list. [`IncomingRequest`] is an owned
//! implementation for hosts that materialize headers up front, and for tests.
//!
//! All header and cookie values come back wrapped in [`Tainted`].

use std::fmt;

use crate::Tainted;

/// HTTP method of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET method
    Get,
    /// HTTP HEAD method
    Head,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP PATCH method
    Patch,
    /// HTTP DELETE method
    Delete,
    /// HTTP OPTIONS method
    Options,
    /// Any other method token
    Other,
}

impl HttpMethod {
    /// Parses a request-line method token. Method tokens are case-sensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_handler::HttpMethod;
    ///
    /// assert_eq!(HttpMethod::parse("POST"), HttpMethod::Post);
    /// assert_eq!(HttpMethod::parse("post"), HttpMethod::Other);
    /// ```
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Other,
        }
    }

    /// Returns `true` for the data-changing methods that require CSRF checks.
    pub fn is_state_changing(self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Head => write!(f, "HEAD"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Options => write!(f, "OPTIONS"),
            HttpMethod::Other => write!(f, "OTHER"),
        }
    }
}

/// Read-only view of an incoming request.
///
/// This trait is the seam between a host server and the pipeline. A host
/// implements it over its own header storage; headers may be split across
/// several physical records, but lookups behave as one case-insensitive map
/// where the first match wins.
///
/// # Examples
///
/// ```
/// use token_handler::{HttpMethod, RequestView, Tainted};
///
/// struct HostRequest {
///     headers: Vec<(String, String)>,
/// }
///
/// impl RequestView for HostRequest {
///     fn method(&self) -> HttpMethod {
///         HttpMethod::Get
///     }
///
///     fn request_id(&self) -> &str {
///         "req-1"
///     }
///
///     fn header(&self, name: &str) -> Option<Tainted<&str>> {
///         self.headers
///             .iter()
///             .find(|(n, _)| n.eq_ignore_ascii_case(name))
///             .map(|(_, v)| Tainted::new(v.as_str()))
///     }
///
///     fn cookie(&self, name: &str) -> Option<Tainted<&str>> {
///         let lines = self
///             .headers
///             .iter()
///             .filter(|(n, _)| n.eq_ignore_ascii_case("cookie"))
///             .map(|(_, v)| v.as_str());
///         token_handler::request::find_cookie(lines, name).map(Tainted::new)
///     }
/// }
/// ```
pub trait RequestView {
    /// The request method.
    fn method(&self) -> HttpMethod;

    /// Identifier used to correlate log lines for this request.
    fn request_id(&self) -> &str;

    /// First header named `name`, compared case-insensitively.
    fn header(&self, name: &str) -> Option<Tainted<&str>>;

    /// First cookie named `name` across every `Cookie` header line.
    fn cookie(&self, name: &str) -> Option<Tainted<&str>>;
}

/// Finds a cookie value across one or more `Cookie` header lines.
///
/// Each line holds `name=value` pairs separated by `;`. Whitespace around
/// pairs, names and values is ignored and names compare case-insensitively.
/// The first match in line order wins.
///
/// # Examples
///
/// ```
/// use token_handler::request::find_cookie;
///
/// let lines = ["theme=dark", "app-at=abc; app-csrf=def"];
/// assert_eq!(find_cookie(lines, "app-csrf"), Some("def"));
/// assert_eq!(find_cookie(lines, "missing"), None);
/// ```
pub fn find_cookie<'a, I>(lines: I, name: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

/// Owned request headers for hosts that materialize them, and for tests.
///
/// Headers keep their arrival order and duplicates are allowed, so the same
/// name can appear on several physical lines (as HTTP/2 does for `Cookie`).
///
/// # Examples
///
/// ```
/// use token_handler::{HttpMethod, IncomingRequest, RequestView};
///
/// let mut request = IncomingRequest::new("req-42", HttpMethod::Post);
/// request.add_header("Origin", "https://spa.example.com");
/// request.add_cookie_line("app-at=AQID");
/// request.add_cookie_line("app-csrf=BAUG");
///
/// assert!(request.header("origin").is_some());
/// assert!(request.cookie("app-csrf").is_some());
/// ```
#[derive(Clone)]
pub struct IncomingRequest {
    request_id: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
}

impl IncomingRequest {
    /// Creates a request with no headers.
    pub fn new(request_id: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            headers: Vec::new(),
        }
    }

    /// Appends a header, keeping any existing headers with the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Appends one physical `Cookie` header line.
    pub fn add_cookie_line(&mut self, line: impl Into<String>) {
        self.add_header("cookie", line);
    }

    /// Iterates over all headers in arrival order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Replaces every `Authorization` header with `Bearer <token>`.
    pub fn set_authorization_bearer(&mut self, token: &str) {
        self.remove_headers("authorization");
        self.headers
            .push(("authorization".to_string(), format!("Bearer {}", token)));
    }

    /// Removes every `Cookie` header so cookies are not forwarded upstream.
    pub fn remove_cookie_headers(&mut self) {
        self.remove_headers("cookie");
    }

    fn remove_headers(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    fn cookie_lines(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("cookie"))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for IncomingRequest {
    /// Header values are cookies and credentials, so only names are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field(
                "headers",
                &self.headers.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RequestView for IncomingRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn header(&self, name: &str) -> Option<Tainted<&str>> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| Tainted::new(v.as_str()))
    }

    fn cookie(&self, name: &str) -> Option<Tainted<&str>> {
        find_cookie(self.cookie_lines(), name).map(Tainted::new)
    }
}
