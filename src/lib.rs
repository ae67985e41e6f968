//! Request guards: gate-and-branch dispatch in front of request handlers.
//!
//! Every access check in this crate has the same shape. A [`Guard`] tests the
//! incoming request; if the test passes the request continues to the next
//! handler, otherwise a failure handler produces the outcome (a denial, a
//! redirect, or a `400`). Exactly one of the two branches runs.
//!
//! # Core Types
//!
//! - [`Guard`]: the dispatcher, with named constructors for the common checks
//!   (login, staff, superuser, anonymous, recent login, groups, permissions,
//!   secure transport)
//! - [`Predicate`] and [`PredicateRegistry`]: the tests guards run, injected
//!   directly or looked up by name
//! - [`GroupRequirement`] and [`PermissionRequirement`]: boolean combinations
//!   evaluated against the acting [`Principal`]
//! - [`GuardConfig`]: guards described as JSON
//! - [`web`]: the [`Handler`](web::Handler) trait plus layers that stack guards
//!   and response headers around handlers
//! - [`forms`]: validation of several forms under one submission
//! - [`query`]: request-driven list ordering, per-method selection and
//!   related-field loading
//! - [`StaticContext`]: fixed values merged into template contexts
//!
//! # Examples
//!
//! ```
//! use request_guards::{Error, Guard, GroupRequirement, Method, Principal, Request, Response};
//!
//! let guard = Guard::group_required(GroupRequirement::new(["editors", "admins"]).unwrap())
//!     .redirect_to_login_on_failure("/accounts/login/")
//!     .unwrap();
//! let edit = |_: &Request| -> Result<Response, Error> { Ok(Response::ok("editor")) };
//!
//! let editor = Request::new("req-1", Method::Get, "/posts/7/edit/")
//!     .with_principal(Principal::new("u1", "Alice").in_group("editors"));
//! assert_eq!(guard.dispatch(&editor, edit).unwrap().body, "editor");
//!
//! let visitor = Request::new("req-2", Method::Get, "/posts/7/edit/");
//! let response = guard.dispatch(&visitor, edit).unwrap();
//! assert_eq!(
//!     response.location(),
//!     Some("/accounts/login/?next=%2Fposts%2F7%2Fedit%2F")
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
pub mod failure;
pub mod forms;
mod gate;
mod policy;
pub mod predicate;
pub mod query;
mod request;
mod response;
pub mod web;

pub use config::{FailureMode, GuardConfig};
pub use context::StaticContext;
pub use error::{ConfigurationError, Error, Violation, ViolationKind};
pub use failure::FailureHandler;
pub use gate::{Guard, SslOptions, DEFAULT_MAX_LOGIN_AGE_SECS};
pub use policy::{GroupRequirement, PermissionRequirement};
pub use predicate::{predicate, Clock, FixedClock, Predicate, PredicateRegistry, SystemClock};
pub use query::{MethodSelector, OrderableList, Ordering, RelatedFields};
pub use request::{Method, Principal, Request};
pub use response::Response;
