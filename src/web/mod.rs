//! Handler composition surface.
//!
//! This module is the boundary between host integrations and the guards and
//! response layers in this crate. It provides:
//! - The [`Handler`] trait every guarded endpoint implements
//! - [`Guarded`], which puts a [`Guard`](crate::Guard) in front of a handler
//! - Response layers that add headers or cache directives
//! - [`MethodRouter`], which routes by HTTP method
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: handlers take a plain [`Request`](crate::Request)
//!    and return a plain [`Response`](crate::Response). Host integrations convert.
//!
//! 2. **Composition over inheritance**: every layer is itself a `Handler`, so
//!    guards and layers stack in any order. The outermost runs first.
//!
//! # Example Flow
//!
//! ```
//! use request_guards::web::{Guarded, Handler, Headers};
//! use request_guards::{Error, Guard, Method, Principal, Request, Response};
//!
//! fn dashboard(_: &Request) -> Result<Response, Error> {
//!     Ok(Response::ok("dashboard"))
//! }
//!
//! let endpoint = Headers::new(Guarded::new(Guard::login_required(), dashboard))
//!     .header("X-Frame-Options", "DENY");
//!
//! let request = Request::new("req-1", Method::Get, "/")
//!     .with_principal(Principal::new("u1", "Alice"));
//! let response = endpoint.handle(&request).unwrap();
//! assert_eq!(response.header("x-frame-options"), Some("DENY"));
//! ```

mod cache;
pub mod example_handler;
mod middleware;
mod router;

pub use cache::{CacheControl, CacheControlOptions, NeverCache};
pub use middleware::{Guarded, Handler, Headers};
pub use router::MethodRouter;
