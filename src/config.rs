//! Declarative guard configuration.
//!
//! A [`GuardConfig`] describes one guard as data, so access rules can live in
//! JSON next to the rest of an application's settings:
//!
//! ```json
//! { "test": "groups", "groups": ["editors", "admins"], "failure": "login",
//!   "login_url": "/accounts/login/" }
//! ```
//!
//! Built-in test names map to the named [`Guard`] constructors. Any other
//! name is looked up in a [`PredicateRegistry`] when the guard dispatches.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::failure;
use crate::gate::{Guard, SslOptions, DEFAULT_MAX_LOGIN_AGE_SECS};
use crate::policy::{GroupRequirement, PermissionRequirement};
use crate::predicate::{Clock, PredicateRegistry};

const COMPONENT: &str = "GuardConfig";

/// What a configured guard does with failing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The guard's own denial
    Deny,
    /// `400 Bad Request`
    BadRequest,
    /// Redirect to `redirect_url`
    Redirect,
    /// Redirect to `login_url` with `?next=`
    Login,
    /// End the session, then redirect to `login_url` with `?next=`
    LogoutThenLogin,
}

/// One guard, described as data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Test name: `superuser`, `staff`, `authenticated`, `anonymous`,
    /// `ssl`, `recent_login`, `groups`, `permissions`, or a registered
    /// predicate
    pub test: String,
    /// Groups for the `groups` test; a string or a list
    pub groups: Option<GroupRequirement>,
    /// Permissions for the `permissions` test; a string or `{all, any}`
    pub permissions: Option<PermissionRequirement>,
    /// Maximum login age for the `recent_login` test
    pub max_age_secs: Option<i64>,
    /// Target of the `redirect` failure mode
    pub redirect_url: Option<String>,
    /// Login page for the `login` failure modes and `recent_login`
    pub login_url: Option<String>,
    /// Whether `ssl` redirects insecure requests; defaults to true
    pub redirect_to_ssl: Option<bool>,
    /// Lets every request through the `ssl` test
    pub debug: bool,
    /// Redirects failing anonymous requests to `redirect_url` while still
    /// denying authenticated ones
    pub redirect_unauthenticated_users: bool,
    /// Failure behavior; the guard's own when unset
    pub failure: Option<FailureMode>,
}

impl GuardConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for malformed JSON, unknown keys, or
    /// an empty group list.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json)
            .map_err(|err| ConfigurationError::new(COMPONENT, err.to_string()))
    }

    /// Builds the guard.
    ///
    /// `registry` supplies tests that are not built in. `clock` is used by
    /// `recent_login`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when a setting the chosen test or
    /// failure mode needs is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use request_guards::{GuardConfig, Method, PredicateRegistry, Request, SystemClock};
    ///
    /// let config = GuardConfig::from_json(
    ///     r#"{"test": "authenticated", "failure": "login", "login_url": "/login/"}"#,
    /// )
    /// .unwrap();
    /// let guard = config
    ///     .build(&Arc::new(PredicateRegistry::new()), Arc::new(SystemClock))
    ///     .unwrap();
    ///
    /// let request = Request::new("req-1", Method::Get, "/inbox/");
    /// let response = guard.handle_test_failure(&request).unwrap();
    /// assert_eq!(response.location(), Some("/login/?next=%2Finbox%2F"));
    /// ```
    pub fn build(
        &self,
        registry: &Arc<PredicateRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Guard, ConfigurationError> {
        let guard = match self.test.as_str() {
            "" => return Err(ConfigurationError::missing(COMPONENT, "test")),
            "superuser" => Guard::superuser_required(),
            "staff" => Guard::staff_required(),
            "authenticated" => Guard::login_required(),
            "anonymous" => Guard::anonymous_required(),
            "ssl" => Guard::ssl_required(SslOptions {
                redirect_to_ssl: self.redirect_to_ssl.unwrap_or(true),
                debug: self.debug,
            }),
            "recent_login" => {
                Guard::recent_login_required(self.max_age()?, clock, self.login_url()?)?
            }
            "groups" => Guard::group_required(
                self.groups
                    .clone()
                    .ok_or_else(|| ConfigurationError::missing(COMPONENT, "groups"))?,
            ),
            "permissions" => Guard::permission_required(self.permissions.clone()),
            name => Guard::named(name, Arc::clone(registry)),
        };

        let guard = match self.failure {
            None | Some(FailureMode::Deny) => guard,
            Some(FailureMode::BadRequest) => guard.on_failure(failure::bad_request()),
            Some(FailureMode::Redirect) => guard.redirect_on_failure(self.redirect_url()?)?,
            Some(FailureMode::Login) => guard.redirect_to_login_on_failure(self.login_url()?)?,
            Some(FailureMode::LogoutThenLogin) => {
                guard.on_failure(failure::logout_then_login(self.login_url()?)?)
            }
        };

        if self.redirect_unauthenticated_users {
            guard.redirect_anonymous_on_failure(self.redirect_url()?)
        } else {
            Ok(guard)
        }
    }

    fn max_age(&self) -> Result<Duration, ConfigurationError> {
        let secs = self.max_age_secs.unwrap_or(DEFAULT_MAX_LOGIN_AGE_SECS);
        if secs < 0 {
            return Err(Self::max_age_out_of_range());
        }
        Duration::try_seconds(secs).ok_or_else(Self::max_age_out_of_range)
    }

    fn max_age_out_of_range() -> ConfigurationError {
        ConfigurationError::new(
            COMPONENT,
            "max_age_secs must be a non-negative number of seconds within range",
        )
    }

    fn redirect_url(&self) -> Result<&str, ConfigurationError> {
        self.redirect_url
            .as_deref()
            .ok_or_else(|| ConfigurationError::missing(COMPONENT, "redirect_url"))
    }

    fn login_url(&self) -> Result<&str, ConfigurationError> {
        self.login_url
            .as_deref()
            .ok_or_else(|| ConfigurationError::missing(COMPONENT, "login_url"))
    }
}
