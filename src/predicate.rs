//! Predicates that gate request handling, and the registry they are looked up in.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::{ConfigurationError, Error};
use crate::policy::{GroupRequirement, PermissionRequirement};
use crate::request::Request;

/// A boolean check over the current request.
///
/// Errors raised by a predicate are not interpreted by guards; they
/// propagate to the caller unchanged.
pub type Predicate = Arc<dyn Fn(&Request) -> Result<bool, Error> + Send + Sync>;

/// Wraps an infallible check as a [`Predicate`].
pub fn predicate<F>(check: F) -> Predicate
where
    F: Fn(&Request) -> bool + Send + Sync + 'static,
{
    Arc::new(move |request: &Request| -> Result<bool, Error> { Ok(check(request)) })
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The principal is authenticated.
pub fn authenticated() -> Predicate {
    predicate(|request| request.is_authenticated())
}

/// No principal is attached to the request.
pub fn anonymous() -> Predicate {
    predicate(|request| !request.is_authenticated())
}

/// The principal is authenticated and a superuser.
pub fn superuser() -> Predicate {
    predicate(|request| request.principal().is_some_and(|p| p.is_superuser))
}

/// The principal is authenticated and staff.
pub fn staff() -> Predicate {
    predicate(|request| request.principal().is_some_and(|p| p.is_staff))
}

/// The request arrived over a secure channel.
pub fn secure() -> Predicate {
    predicate(|request| request.is_secure())
}

/// The principal authenticated no longer than `max_age` ago.
///
/// A principal with no recorded login fails.
pub fn recent_login(max_age: Duration, clock: Arc<dyn Clock>) -> Predicate {
    predicate(move |request| {
        let Some(last_login) = request.principal().and_then(|p| p.last_login) else {
            return false;
        };
        clock.now() - last_login <= max_age
    })
}

/// The principal belongs to one of the required groups.
pub fn in_groups(requirement: GroupRequirement) -> Predicate {
    predicate(move |request| requirement.is_satisfied_by(request.principal()))
}

/// The principal satisfies the permission requirement.
///
/// `None` places no constraint and always passes.
pub fn has_permissions(requirement: Option<PermissionRequirement>) -> Predicate {
    predicate(move |request| match &requirement {
        Some(req) => req.is_satisfied_by(request.principal()),
        None => true,
    })
}

/// Named predicates that guards resolve at dispatch time.
///
/// The registry starts with the parameterless built-ins (`authenticated`,
/// `anonymous`, `superuser`, `staff`, `secure`). Applications register their
/// own checks under new names or replace built-ins.
///
/// # Examples
///
/// ```
/// use request_guards::{predicate, Method, PredicateRegistry, Request};
///
/// let mut registry = PredicateRegistry::with_builtins();
/// registry.register("is_get", predicate(|r| r.method() == Method::Get));
///
/// let check = registry.resolve("is_get").unwrap();
/// let request = Request::new("req-1", Method::Get, "/");
/// assert!(check(&request).unwrap());
///
/// assert!(registry.resolve("missing").is_err());
/// ```
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, Predicate>,
}

impl PredicateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in predicates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("authenticated", authenticated());
        registry.register("anonymous", anonymous());
        registry.register("superuser", superuser());
        registry.register("staff", staff());
        registry.register("secure", secure());
        registry
    }

    /// Registers a predicate, replacing any previous one of the same name.
    pub fn register(&mut self, name: impl Into<String>, predicate: Predicate) {
        self.predicates.insert(name.into(), predicate);
    }

    /// Whether a predicate is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Looks a predicate up by name.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `name` is empty or unregistered.
    pub fn resolve(&self, name: &str) -> Result<Predicate, ConfigurationError> {
        if name.is_empty() {
            return Err(ConfigurationError::missing("PredicateRegistry", "test"));
        }
        self.predicates.get(name).cloned().ok_or_else(|| {
            ConfigurationError::new(
                "PredicateRegistry",
                format!("no predicate named `{name}` is registered"),
            )
        })
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}
