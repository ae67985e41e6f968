use std::fmt;

use thiserror::Error;

/// Errors that can occur while guarding or handling a request.
#[derive(Debug, Error)]
pub enum Error {
    /// A guard, layer or coordinator is missing required configuration
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A guard's test failed and the failure path denied the request
    #[error("Access denied: {0}")]
    Denied(#[from] Violation),
    /// A handler or predicate failed on its own terms
    #[error("Handler error: {0}")]
    Handler(String),
}

impl Error {
    /// Creates a handler error from any displayable message.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// Returns the HTTP status code a host integration should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Error::Configuration(_) => 500,
            Error::Denied(_) => 403,
            Error::Handler(_) => 500,
        }
    }

    /// Returns the violation if this error is a denial.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Error::Denied(v) => Some(v),
            _ => None,
        }
    }
}

/// Raised when a required setting is unset or invalid.
///
/// Configuration errors are never recoverable at request time. They surface
/// immediately and abort handling of the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{component} is misconfigured: {message}")]
pub struct ConfigurationError {
    /// The component (guard, layer, coordinator) that is misconfigured
    pub component: String,
    /// What is missing or wrong
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Error for a required attribute that was never set.
    pub(crate) fn missing(component: &str, attribute: &str) -> Self {
        Self::new(
            component,
            format!("missing the `{attribute}` setting; configure it before use"),
        )
    }
}

/// A denial with details about which test failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Violation {
    /// The kind of violation that occurred
    pub kind: ViolationKind,
    /// Human-readable message explaining the violation
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The kind of access violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Authentication is required but missing
    Unauthenticated,
    /// The principal is not a superuser
    NotSuperuser,
    /// The principal is not a staff member
    NotStaff,
    /// The request must be anonymous but carries a principal
    NotAnonymous,
    /// The principal's last login is older than the allowed age
    StaleLogin,
    /// The principal belongs to none of the required groups
    MissingGroup,
    /// The principal lacks a required permission
    MissingPermission,
    /// The request did not arrive over a secure channel
    InsecureTransport,
    /// A custom test failed
    TestFailed {
        /// Name of the failing test
        test: String,
    },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Unauthenticated => write!(f, "Unauthenticated"),
            ViolationKind::NotSuperuser => write!(f, "Superuser required"),
            ViolationKind::NotStaff => write!(f, "Staff required"),
            ViolationKind::NotAnonymous => write!(f, "Anonymous required"),
            ViolationKind::StaleLogin => write!(f, "Recent login required"),
            ViolationKind::MissingGroup => write!(f, "Group membership required"),
            ViolationKind::MissingPermission => write!(f, "Permission required"),
            ViolationKind::InsecureTransport => write!(f, "Secure transport required"),
            ViolationKind::TestFailed { test } => write!(f, "Test '{}' failed", test),
        }
    }
}
