//! What happens when a guard's test fails.
//!
//! A [`FailureHandler`] produces either a response (usually a redirect) or an
//! error. It never lets the request continue to the guarded handler.

use std::sync::Arc;

use crate::error::{ConfigurationError, Error, Violation, ViolationKind};
use crate::request::Request;
use crate::response::Response;

/// Produces the outcome for a request whose test failed.
pub type FailureHandler = Arc<dyn Fn(&Request) -> Result<Response, Error> + Send + Sync>;

/// Query parameter that carries the originally requested path to the login page.
pub const REDIRECT_FIELD_NAME: &str = "next";

/// Denies the request with a violation of the given kind.
pub fn deny(kind: ViolationKind) -> FailureHandler {
    Arc::new(move |request: &Request| -> Result<Response, Error> {
        let subject = request
            .principal()
            .map_or("anonymous user", |p| p.id.as_str());
        Err(Violation::new(
            kind.clone(),
            format!("{} denied for {}", request.full_path(), subject),
        )
        .into())
    })
}

/// Answers with `400 Bad Request`.
pub fn bad_request() -> FailureHandler {
    Arc::new(|_: &Request| -> Result<Response, Error> { Ok(Response::bad_request()) })
}

/// Redirects to a fixed URL.
///
/// # Errors
///
/// Returns a `ConfigurationError` if `url` is empty.
pub fn redirect(url: impl Into<String>) -> Result<FailureHandler, ConfigurationError> {
    let url = require_url(url.into(), "redirect_url")?;
    Ok(Arc::new(move |_: &Request| -> Result<Response, Error> {
        Ok(Response::redirect(url.clone()))
    }))
}

/// Redirects to the login page, carrying the requested path in `?next=`.
///
/// # Errors
///
/// Returns a `ConfigurationError` if `login_url` is empty.
pub fn redirect_to_login(
    login_url: impl Into<String>,
) -> Result<FailureHandler, ConfigurationError> {
    let login_url = require_url(login_url.into(), "login_url")?;
    Ok(Arc::new(move |request: &Request| -> Result<Response, Error> {
        Ok(Response::redirect(login_redirect_target(&login_url, request)))
    }))
}

/// Ends the principal's session, then redirects to the login page.
///
/// # Errors
///
/// Returns a `ConfigurationError` if `login_url` is empty.
pub fn logout_then_login(
    login_url: impl Into<String>,
) -> Result<FailureHandler, ConfigurationError> {
    let login_url = require_url(login_url.into(), "login_url")?;
    Ok(Arc::new(move |request: &Request| -> Result<Response, Error> {
        let mut response = Response::redirect(login_redirect_target(&login_url, request));
        response.end_session = true;
        Ok(response)
    }))
}

/// Permanently redirects to the `https` equivalent of the requested URL.
pub fn redirect_to_secure() -> FailureHandler {
    Arc::new(|request: &Request| -> Result<Response, Error> {
        let current = request.absolute_uri();
        let secure = current.replacen("http://", "https://", 1);
        Ok(Response::permanent_redirect(secure))
    })
}

/// Builds `login_url?next=<full path>`, appending with `&` when the login URL
/// already has a query string.
pub fn login_redirect_target(login_url: &str, request: &Request) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        login_url,
        separator,
        REDIRECT_FIELD_NAME,
        urlencoding::encode(&request.full_path())
    )
}

fn require_url(url: String, attribute: &str) -> Result<String, ConfigurationError> {
    if url.trim().is_empty() {
        return Err(ConfigurationError::missing("FailureHandler", attribute));
    }
    Ok(url)
}
