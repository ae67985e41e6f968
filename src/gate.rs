use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use crate::error::{ConfigurationError, Error, ViolationKind};
use crate::failure::{self, FailureHandler};
use crate::policy::{GroupRequirement, PermissionRequirement};
use crate::predicate::{self, Clock, Predicate, PredicateRegistry};
use crate::request::Request;
use crate::response::Response;

/// Default maximum age, in seconds, of a login for [`Guard::recent_login_required`].
pub const DEFAULT_MAX_LOGIN_AGE_SECS: i64 = 3600;

/// How a guard finds its test.
#[derive(Clone)]
enum Test {
    /// A predicate injected at construction
    Direct(Predicate),
    /// A name looked up in a registry on every dispatch
    Named {
        name: String,
        registry: Arc<PredicateRegistry>,
    },
}

/// Options for [`Guard::ssl_required`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslOptions {
    /// Redirect insecure requests to their `https` URL instead of answering
    /// `400 Bad Request`
    pub redirect_to_ssl: bool,
    /// Let every request through, for development servers without TLS
    pub debug: bool,
}

impl Default for SslOptions {
    fn default() -> Self {
        Self {
            redirect_to_ssl: true,
            debug: false,
        }
    }
}

/// The gate-and-branch dispatcher.
///
/// A `Guard` pairs a test with a failure handler. [`Guard::dispatch`] runs the
/// test, then either forwards the request to the next handler or hands it to
/// the failure handler. Exactly one of the two runs.
///
/// Named constructors cover the common access checks. Any of them can have
/// its failure behavior replaced with [`Guard::on_failure`] and friends.
///
/// # Examples
///
/// ```
/// use request_guards::{Error, Guard, Method, Principal, Request, Response};
///
/// let guard = Guard::staff_required();
/// let next = |_: &Request| -> Result<Response, Error> { Ok(Response::ok("dashboard")) };
///
/// let staff = Request::new("req-1", Method::Get, "/admin/")
///     .with_principal(Principal::new("u1", "Alice").staff());
/// assert_eq!(guard.dispatch(&staff, next).unwrap().body, "dashboard");
///
/// let visitor = Request::new("req-2", Method::Get, "/admin/");
/// let err = guard.dispatch(&visitor, next).unwrap_err();
/// assert_eq!(err.status(), 403);
/// ```
#[derive(Clone)]
pub struct Guard {
    name: String,
    test: Test,
    on_failure: FailureHandler,
}

impl Guard {
    /// Creates a guard around a custom predicate.
    ///
    /// Failing requests are denied with [`ViolationKind::TestFailed`].
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        let name = name.into();
        let kind = ViolationKind::TestFailed { test: name.clone() };
        Self::with_denial(name, predicate, kind)
    }

    /// Creates a guard whose test is resolved by name from `registry` on
    /// every dispatch.
    ///
    /// An empty or unregistered name is reported as a `ConfigurationError`
    /// when the guard dispatches.
    pub fn named(test: impl Into<String>, registry: Arc<PredicateRegistry>) -> Self {
        let name = test.into();
        Self {
            on_failure: failure::deny(ViolationKind::TestFailed { test: name.clone() }),
            test: Test::Named {
                name: name.clone(),
                registry,
            },
            name,
        }
    }

    fn with_denial(name: impl Into<String>, predicate: Predicate, kind: ViolationKind) -> Self {
        Self {
            name: name.into(),
            test: Test::Direct(predicate),
            on_failure: failure::deny(kind),
        }
    }

    /// Requires an authenticated superuser.
    pub fn superuser_required() -> Self {
        Self::with_denial(
            "superuser_required",
            predicate::superuser(),
            ViolationKind::NotSuperuser,
        )
    }

    /// Requires an authenticated staff member.
    pub fn staff_required() -> Self {
        Self::with_denial("staff_required", predicate::staff(), ViolationKind::NotStaff)
    }

    /// Requires an authenticated principal.
    pub fn login_required() -> Self {
        Self::with_denial(
            "login_required",
            predicate::authenticated(),
            ViolationKind::Unauthenticated,
        )
    }

    /// Requires the request to be anonymous.
    ///
    /// Authenticated principals are denied; use
    /// [`Guard::redirect_on_failure`] to send them elsewhere instead.
    pub fn anonymous_required() -> Self {
        Self::with_denial(
            "anonymous_required",
            predicate::anonymous(),
            ViolationKind::NotAnonymous,
        )
    }

    /// Requires a login no older than `max_age`.
    ///
    /// Failing requests have their session ended and are redirected to
    /// `login_url` with the requested path in `?next=`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `login_url` is empty.
    pub fn recent_login_required(
        max_age: Duration,
        clock: Arc<dyn Clock>,
        login_url: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            name: "recent_login_required".to_string(),
            test: Test::Direct(predicate::recent_login(max_age, clock)),
            on_failure: failure::logout_then_login(login_url)?,
        })
    }

    /// Requires membership in at least one of the given groups.
    pub fn group_required(requirement: GroupRequirement) -> Self {
        Self::with_denial(
            "group_required",
            predicate::in_groups(requirement),
            ViolationKind::MissingGroup,
        )
    }

    /// Requires the given permissions. `None` places no constraint.
    pub fn permission_required(requirement: Option<PermissionRequirement>) -> Self {
        Self::with_denial(
            "permission_required",
            predicate::has_permissions(requirement),
            ViolationKind::MissingPermission,
        )
    }

    /// Requires a secure channel.
    ///
    /// Insecure requests are permanently redirected to their `https` URL, or
    /// answered with `400 Bad Request` when `redirect_to_ssl` is off.
    pub fn ssl_required(options: SslOptions) -> Self {
        let test = if options.debug {
            predicate::predicate(|_| true)
        } else {
            predicate::secure()
        };
        let on_failure = if options.redirect_to_ssl {
            failure::redirect_to_secure()
        } else {
            failure::bad_request()
        };
        Self {
            name: "ssl_required".to_string(),
            test: Test::Direct(test),
            on_failure,
        }
    }

    /// Runs `predicate`; failing anonymous requests are redirected to `url`.
    ///
    /// Failing authenticated requests are denied. When
    /// `redirect_unauthenticated_users` is off, anonymous requests are denied
    /// too.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `url` is empty.
    pub fn pass_or_redirect(
        name: impl Into<String>,
        predicate: Predicate,
        url: impl Into<String>,
        redirect_unauthenticated_users: bool,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let redirect = failure::redirect(url)?;
        let deny = failure::deny(ViolationKind::TestFailed { test: name.clone() });
        let on_failure: FailureHandler =
            Arc::new(move |request: &Request| -> Result<Response, Error> {
                if !request.is_authenticated() && redirect_unauthenticated_users {
                    redirect(request)
                } else {
                    deny(request)
                }
            });
        Ok(Self {
            name,
            test: Test::Direct(predicate),
            on_failure,
        })
    }

    /// Replaces the failure handler.
    pub fn on_failure(mut self, handler: FailureHandler) -> Self {
        self.on_failure = handler;
        self
    }

    /// Redirects failing requests to `url`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `url` is empty.
    pub fn redirect_on_failure(self, url: impl Into<String>) -> Result<Self, ConfigurationError> {
        Ok(self.on_failure(failure::redirect(url)?))
    }

    /// Redirects failing requests to `login_url` with `?next=`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `login_url` is empty.
    pub fn redirect_to_login_on_failure(
        self,
        login_url: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        Ok(self.on_failure(failure::redirect_to_login(login_url)?))
    }

    /// Redirects failing anonymous requests to `url`. Failing authenticated
    /// requests keep the current failure behavior.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `url` is empty.
    pub fn redirect_anonymous_on_failure(
        mut self,
        url: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let redirect = failure::redirect(url)?;
        let fallback = Arc::clone(&self.on_failure);
        self.on_failure = Arc::new(move |request: &Request| -> Result<Response, Error> {
            if request.is_authenticated() {
                fallback(request)
            } else {
                redirect(request)
            }
        });
        Ok(self)
    }

    /// Returns the guard's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finds the predicate this guard tests requests with.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a named test is empty or not
    /// registered.
    pub fn resolve_predicate(&self) -> Result<Predicate, ConfigurationError> {
        match &self.test {
            Test::Direct(predicate) => Ok(Arc::clone(predicate)),
            Test::Named { name, registry } => registry.resolve(name).map_err(|err| {
                ConfigurationError::new(format!("Guard `{}`", self.name), err.message)
            }),
        }
    }

    /// Tests the request and branches.
    ///
    /// On pass, `next` is called and its result returned unchanged. On
    /// failure, the failure handler runs once and `next` is never called.
    ///
    /// # Errors
    ///
    /// Configuration errors, predicate errors, denials from the failure
    /// handler and errors from `next` are all returned as-is.
    pub fn dispatch<F>(&self, request: &Request, next: F) -> Result<Response, Error>
    where
        F: FnOnce(&Request) -> Result<Response, Error>,
    {
        let test = self.resolve_predicate().inspect_err(|err| {
            tracing::error!(
                guard = %self.name,
                request_id = %request.request_id(),
                error = %err,
                "guard is misconfigured"
            );
        })?;

        if test(request)? {
            tracing::debug!(
                guard = %self.name,
                request_id = %request.request_id(),
                "guard passed"
            );
            return next(request);
        }

        tracing::warn!(
            guard = %self.name,
            request_id = %request.request_id(),
            path = %request.path(),
            "guard test failed"
        );
        self.handle_test_failure(request)
    }

    /// Produces the failure outcome for `request`.
    pub fn handle_test_failure(&self, request: &Request) -> Result<Response, Error> {
        (self.on_failure)(request)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let test = match &self.test {
            Test::Direct(_) => "<direct>".to_string(),
            Test::Named { name, .. } => name.clone(),
        };
        f.debug_struct("Guard")
            .field("name", &self.name)
            .field("test", &test)
            .finish_non_exhaustive()
    }
}
