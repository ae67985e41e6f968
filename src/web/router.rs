use std::collections::BTreeMap;

use crate::error::{ConfigurationError, Error};
use crate::request::{Method, Request};
use crate::response::Response;

use super::Handler;

/// Routes requests to handlers by HTTP method.
///
/// A handler registered with [`MethodRouter::all`] receives every method
/// that has no handler of its own. Methods with neither answer
/// `405 Method Not Allowed` with an `Allow` header.
///
/// # Examples
///
/// ```
/// use request_guards::web::{Handler, MethodRouter};
/// use request_guards::{Error, Method, Request, Response};
///
/// let router = MethodRouter::new()
///     .all(|_: &Request| -> Result<Response, Error> { Ok(Response::ok("any verb")) });
///
/// for method in [Method::Get, Method::Delete, Method::Patch] {
///     let response = router.handle(&Request::new("req-1", method, "/")).unwrap();
///     assert_eq!(response.body, "any verb");
/// }
/// ```
#[derive(Default)]
pub struct MethodRouter {
    routes: BTreeMap<Method, Box<dyn Handler>>,
    fallback: Option<Box<dyn Handler>>,
}

impl MethodRouter {
    /// Creates a router with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one method.
    pub fn on(mut self, method: Method, handler: impl Handler + 'static) -> Self {
        self.routes.insert(method, Box::new(handler));
        self
    }

    /// Registers the handler for every method without its own handler.
    pub fn all(mut self, handler: impl Handler + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    fn allowed(&self) -> String {
        self.routes
            .keys()
            .map(Method::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Handler for MethodRouter {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        if self.routes.is_empty() && self.fallback.is_none() {
            return Err(ConfigurationError::new(
                "MethodRouter",
                "no handlers are registered; add one with `on` or `all`",
            )
            .into());
        }

        if let Some(handler) = self.routes.get(&request.method()) {
            return handler.handle(request);
        }
        if let Some(handler) = &self.fallback {
            return handler.handle(request);
        }

        tracing::warn!(
            request_id = %request.request_id(),
            method = %request.method(),
            path = %request.path(),
            "method not allowed"
        );
        Ok(Response::method_not_allowed().with_header("Allow", self.allowed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(body: &'static str) -> impl Handler {
        move |_: &Request| -> Result<Response, Error> { Ok(Response::ok(body)) }
    }

    #[test]
    fn specific_routes_win_over_fallback() {
        let router = MethodRouter::new()
            .on(Method::Post, reply("post"))
            .all(reply("all"));

        let post = router
            .handle(&Request::new("req-1", Method::Post, "/"))
            .unwrap();
        assert_eq!(post.body, "post");

        let get = router
            .handle(&Request::new("req-2", Method::Get, "/"))
            .unwrap();
        assert_eq!(get.body, "all");
    }

    #[test]
    fn unrouted_method_is_not_allowed() {
        let router = MethodRouter::new()
            .on(Method::Get, reply("get"))
            .on(Method::Head, reply("head"));
        let response = router
            .handle(&Request::new("req-1", Method::Delete, "/"))
            .unwrap();
        assert_eq!(response.status, 405);
        assert_eq!(response.header("allow"), Some("GET, HEAD"));
    }

    #[test]
    fn empty_router_is_configuration_error() {
        let err = MethodRouter::new()
            .handle(&Request::new("req-1", Method::Get, "/"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
