use std::collections::BTreeMap;

/// A response produced by a handler or a failure path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers, keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Response body
    pub body: String,
    /// Whether the host should end the principal's session before sending
    pub end_session: bool,
}

impl Response {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: String::new(),
            end_session: false,
        }
    }

    /// `200 OK` with a body.
    pub fn ok(body: impl Into<String>) -> Self {
        let mut response = Self::new(200);
        response.body = body.into();
        response
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location", location)
    }

    /// `301 Moved Permanently` pointing at `location`.
    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::new(301).with_header("Location", location)
    }

    /// `400 Bad Request`.
    pub fn bad_request() -> Self {
        Self::new(400)
    }

    /// `405 Method Not Allowed`.
    pub fn method_not_allowed() -> Self {
        Self::new(405)
    }

    /// Sets a header. Names are stored lowercase.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Sets a header in place, replacing any previous value.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Returns a header by case-insensitive name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The redirect target, if this is a redirect.
    pub fn location(&self) -> Option<&str> {
        if self.is_redirect() {
            self.header("location")
        } else {
            None
        }
    }

    /// Whether the status is a 3xx redirect carrying a location.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.headers.contains_key("location")
    }
}
