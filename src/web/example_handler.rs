//! Example endpoints demonstrating guarded handlers.
//!
//! These show realistic compositions of guards and response layers without
//! requiring actual HTTP infrastructure.
//!
//! **These examples are for documentation and testing only.**

use std::sync::Arc;

use chrono::Duration;

use crate::error::{ConfigurationError, Error};
use crate::gate::{Guard, SslOptions, DEFAULT_MAX_LOGIN_AGE_SECS};
use crate::policy::{GroupRequirement, PermissionRequirement};
use crate::predicate::Clock;
use crate::request::{Method, Request};
use crate::response::Response;

use super::{CacheControl, CacheControlOptions, Guarded, Handler, Headers, MethodRouter, NeverCache};

/// Login page the examples redirect to.
pub const LOGIN_URL: &str = "/accounts/login/";

fn greet(request: &Request) -> Result<Response, Error> {
    let who = request.principal().map_or("guest", |p| p.name.as_str());
    Ok(Response::ok(format!("{} {}", request.path(), who)))
}

/// Staff-only admin dashboard that is never cached.
///
/// # Examples
///
/// ```
/// use request_guards::web::{example_handler::admin_dashboard, Handler};
/// use request_guards::{Method, Principal, Request};
///
/// let endpoint = admin_dashboard();
/// let request = Request::new("req-1", Method::Get, "/admin/")
///     .with_principal(Principal::new("u1", "Alice").staff());
///
/// let response = endpoint.handle(&request).unwrap();
/// assert_eq!(response.body, "/admin/ Alice");
/// assert!(response.header("cache-control").unwrap().contains("no-store"));
/// ```
pub fn admin_dashboard() -> impl Handler {
    NeverCache::new(Guarded::new(Guard::staff_required(), greet))
}

/// Sign-up page for anonymous visitors; signed-in users go to their profile.
///
/// # Errors
///
/// Never fails for the built-in redirect target; the `Result` mirrors the
/// guard builder.
pub fn signup() -> Result<impl Handler, ConfigurationError> {
    let guard = Guard::anonymous_required().redirect_on_failure("/accounts/profile/")?;
    Ok(Guarded::new(guard, greet))
}

/// Billing settings: HTTPS only, and the login must be recent.
///
/// # Errors
///
/// Never fails for the built-in login URL; the `Result` mirrors the guard
/// builder.
pub fn billing(clock: Arc<dyn Clock>) -> Result<impl Handler, ConfigurationError> {
    let recent = Guard::recent_login_required(
        Duration::seconds(DEFAULT_MAX_LOGIN_AGE_SECS),
        clock,
        LOGIN_URL,
    )?;
    Ok(Guarded::new(
        Guard::ssl_required(SslOptions::default()),
        Guarded::new(recent, greet),
    ))
}

/// Editorial reports: editors or admins with the view permission, plus one
/// of the export permissions for writes.
///
/// Reads are cacheable for five minutes by private caches.
pub fn reports() -> Result<impl Handler, ConfigurationError> {
    let editors = Guard::group_required(GroupRequirement::new(["editors", "admins"])?)
        .redirect_to_login_on_failure(LOGIN_URL)?;
    let export = Guard::permission_required(Some(
        PermissionRequirement::new()
            .all(["reports.view"])
            .any(["reports.export_csv", "reports.export_pdf"]),
    ));
    let read = Guard::permission_required(Some(PermissionRequirement::from("reports.view")));

    let router = MethodRouter::new()
        .on(Method::Get, Guarded::new(read, greet))
        .on(Method::Post, Guarded::new(export, greet));

    Ok(Headers::new(CacheControl::new(
        CacheControlOptions::new().private().max_age(300),
        Guarded::new(editors, router),
    ))
    .header("X-Content-Type-Options", "nosniff"))
}
