use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// HTTP method of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
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
}

impl Method {
    /// Returns the lowercase method name (`"get"`, `"post"`, ...).
    pub fn as_lower(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Head => "head",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
            Method::Delete => "delete",
            Method::Options => "options",
        }
    }

    /// Whether requests with this method carry submitted form data.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_lower().to_ascii_uppercase())
    }
}

/// An authenticated user or service principal.
///
/// A request without a principal is anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique identifier for this principal
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether the account is active
    pub is_active: bool,
    /// Staff members may use administrative surfaces
    pub is_staff: bool,
    /// Superusers hold every permission while active
    pub is_superuser: bool,
    /// When the principal last authenticated
    pub last_login: Option<DateTime<Utc>>,
    /// Names of the groups the principal belongs to
    pub groups: BTreeSet<String>,
    /// Permission codenames granted to the principal
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Creates an active principal with no flags, groups or permissions.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            groups: BTreeSet::new(),
            permissions: BTreeSet::new(),
        }
    }

    /// Marks the principal as staff.
    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Marks the principal as a superuser.
    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    /// Marks the principal as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Records the time of the last login.
    pub fn logged_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_login = Some(at);
        self
    }

    /// Adds the principal to a group.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Grants a permission.
    pub fn with_perm(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    /// Whether the principal holds `perm`.
    ///
    /// Inactive principals hold nothing; active superusers hold everything.
    pub fn has_perm(&self, perm: &str) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(perm)
    }

    /// Whether the principal holds every permission in `perms`.
    pub fn has_perms<'a>(&self, perms: impl IntoIterator<Item = &'a String>) -> bool {
        perms.into_iter().all(|p| self.has_perm(p))
    }

    /// Whether the principal belongs to `group`.
    pub fn is_member(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// An incoming request as seen by guards, layers and handlers.
///
/// `Request` holds simple owned data so it does not couple to any specific
/// HTTP framework. Integrations build one per incoming request.
///
/// # Examples
///
/// ```
/// use request_guards::{Method, Principal, Request};
///
/// let request = Request::new("req-1", Method::Get, "/reports/")
///     .with_host("example.com")
///     .with_query_param("page", "2")
///     .with_principal(Principal::new("u1", "Alice"));
///
/// assert_eq!(request.full_path(), "/reports/?page=2");
/// assert_eq!(request.absolute_uri(), "http://example.com/reports/?page=2");
/// assert!(request.is_authenticated());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    request_id: String,
    method: Method,
    secure: bool,
    host: String,
    path: String,
    query: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    path_params: BTreeMap<String, String>,
    form_data: Map<String, Value>,
    principal: Option<Principal>,
}

impl Request {
    /// Creates an anonymous, insecure request for `path` on `localhost`.
    pub fn new(request_id: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            secure: false,
            host: "localhost".to_string(),
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            path_params: BTreeMap::new(),
            form_data: Map::new(),
            principal: None,
        }
    }

    /// Marks whether the request arrived over a secure channel.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the host the request was addressed to.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Appends a query-string parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header. Header names are stored lowercase.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets a routing argument.
    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    /// Sets one submitted form field.
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.form_data.insert(key.into(), value.into());
        self
    }

    /// Attaches the acting principal.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Whether the request arrived over a secure channel.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the first value of a query-string parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns a header by case-insensitive name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns a routing argument.
    pub fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params.get(key).map(String::as_str)
    }

    /// Returns the submitted form data.
    pub fn form_data(&self) -> &Map<String, Value> {
        &self.form_data
    }

    /// Returns the acting principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Whether an authenticated principal is attached.
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Path plus the encoded query string, if any.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    /// Scheme, host and full path.
    pub fn absolute_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, self.full_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_are_anonymous_and_insecure() {
        let request = Request::new("req-test", Method::Get, "/");
        assert_eq!(request.request_id(), "req-test");
        assert!(!request.is_secure());
        assert!(!request.is_authenticated());
        assert_eq!(request.host(), "localhost");
    }

    #[test]
    fn full_path_encodes_query() {
        let request = Request::new("req-1", Method::Get, "/search/")
            .with_query_param("q", "rust guards")
            .with_query_param("page", "1");
        assert_eq!(request.full_path(), "/search/?q=rust%20guards&page=1");
        assert_eq!(request.query_param("page"), Some("1"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn absolute_uri_uses_scheme() {
        let request = Request::new("req-1", Method::Get, "/a/")
            .with_host("example.com")
            .with_secure(true);
        assert_eq!(request.absolute_uri(), "https://example.com/a/");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let request = Request::new("req-1", Method::Get, "/").with_header("X-Custom", "value");
        assert_eq!(request.header("x-custom"), Some("value"));
        assert_eq!(request.header("X-CUSTOM"), Some("value"));
    }

    #[test]
    fn superuser_holds_every_permission_while_active() {
        let admin = Principal::new("u1", "Admin").superuser();
        assert!(admin.has_perm("anything.at_all"));

        let inactive = Principal::new("u2", "Gone").superuser().inactive();
        assert!(!inactive.has_perm("anything.at_all"));
    }

    #[test]
    fn has_perms_requires_all() {
        let user = Principal::new("u1", "Alice")
            .with_perm("app.view")
            .with_perm("app.change");
        let wanted = vec!["app.view".to_string(), "app.change".to_string()];
        assert!(user.has_perms(&wanted));

        let more = vec!["app.view".to_string(), "app.delete".to_string()];
        assert!(!user.has_perms(&more));
    }

    #[test]
    fn method_helpers() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Post.as_lower(), "post");
        assert!(Method::Put.carries_body());
        assert!(!Method::Get.carries_body());
    }
}
