//! Handler trait and the layers that wrap handlers.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::gate::Guard;
use crate::request::Request;
use crate::response::Response;

/// Something that turns a request into a response.
///
/// Closures and plain functions with the right signature are handlers.
pub trait Handler: Send + Sync {
    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Returns an `Error` when the request is denied, the handler is
    /// misconfigured, or the handler itself fails.
    fn handle(&self, request: &Request) -> Result<Response, Error>;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Result<Response, Error> + Send + Sync,
{
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        self(request)
    }
}

impl Handler for Box<dyn Handler> {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        self.as_ref().handle(request)
    }
}

/// A handler behind a guard.
///
/// The guard's test runs on every request; the inner handler only sees
/// requests that pass.
///
/// # Examples
///
/// ```
/// use request_guards::web::{Guarded, Handler};
/// use request_guards::{Error, Guard, Method, Request, Response};
///
/// let signup = |_: &Request| -> Result<Response, Error> { Ok(Response::ok("sign up")) };
/// let endpoint = Guarded::new(Guard::anonymous_required(), signup);
///
/// let request = Request::new("req-1", Method::Get, "/signup/");
/// assert_eq!(endpoint.handle(&request).unwrap().body, "sign up");
/// ```
#[derive(Debug)]
pub struct Guarded<H> {
    guard: Guard,
    inner: H,
}

impl<H: Handler> Guarded<H> {
    /// Puts `guard` in front of `inner`.
    pub fn new(guard: Guard, inner: H) -> Self {
        Self { guard, inner }
    }

    /// Returns the guard.
    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

impl<H: Handler> Handler for Guarded<H> {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        self.guard
            .dispatch(request, |request| self.inner.handle(request))
    }
}

/// Adds fixed headers to every response of the inner handler.
///
/// Headers replace same-named headers set by the inner handler. Failures of
/// the inner handler pass through untouched.
#[derive(Debug)]
pub struct Headers<H> {
    headers: BTreeMap<String, String>,
    inner: H,
}

impl<H: Handler> Headers<H> {
    /// Wraps `inner` with no headers configured.
    pub fn new(inner: H) -> Self {
        Self {
            headers: BTreeMap::new(),
            inner,
        }
    }

    /// Adds a header to set on every response.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns the headers this layer sets.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

impl<H: Handler> Handler for Headers<H> {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        let mut response = self.inner.handle(request)?;
        for (key, value) in &self.headers {
            response.set_header(key.clone(), value.clone());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::ViolationKind;
    use crate::request::{Method, Principal};

    fn ok(_: &Request) -> Result<Response, Error> {
        Ok(Response::ok("inner"))
    }

    #[test]
    fn guarded_forwards_on_pass() {
        let endpoint = Guarded::new(Guard::login_required(), ok);
        let request =
            Request::new("req-1", Method::Get, "/").with_principal(Principal::new("u1", "Alice"));
        assert_eq!(endpoint.handle(&request).unwrap().body, "inner");
        assert_eq!(endpoint.guard().name(), "login_required");
    }

    #[test]
    fn stacked_guards_run_outer_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let inner = move |_: &Request| -> Result<Response, Error> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Response::ok("inner"))
        };

        let endpoint = Guarded::new(
            Guard::login_required(),
            Guarded::new(Guard::staff_required(), inner),
        );

        let anon = Request::new("req-1", Method::Get, "/");
        let err = endpoint.handle(&anon).unwrap_err();
        assert_eq!(
            err.violation().unwrap().kind,
            ViolationKind::Unauthenticated
        );

        let user =
            Request::new("req-2", Method::Get, "/").with_principal(Principal::new("u1", "Alice"));
        let err = endpoint.handle(&user).unwrap_err();
        assert_eq!(err.violation().unwrap().kind, ViolationKind::NotStaff);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn headers_are_added_and_override() {
        let inner = |_: &Request| -> Result<Response, Error> {
            Ok(Response::ok("x").with_header("X-Mode", "inner"))
        };
        let endpoint = Headers::new(inner)
            .header("X-Mode", "outer")
            .header("X-Extra", "1");

        let response = endpoint
            .handle(&Request::new("req-1", Method::Get, "/"))
            .unwrap();
        assert_eq!(response.header("x-mode"), Some("outer"));
        assert_eq!(response.header("x-extra"), Some("1"));
    }

    #[test]
    fn headers_pass_errors_through() {
        let endpoint = Headers::new(Guarded::new(Guard::login_required(), ok)).header("X-A", "1");
        assert!(endpoint
            .handle(&Request::new("req-1", Method::Get, "/"))
            .is_err());
    }

    #[test]
    fn boxed_handlers_are_handlers() {
        let boxed: Box<dyn Handler> = Box::new(ok);
        let response = boxed.handle(&Request::new("req-1", Method::Get, "/")).unwrap();
        assert_eq!(response.body, "inner");
    }
}
