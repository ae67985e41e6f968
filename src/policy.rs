//! Boolean-combination requirements evaluated against the acting principal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::request::Principal;

/// Membership in at least one of a set of groups.
///
/// A single group name is promoted to a one-element set. An empty set is
/// rejected at construction.
///
/// # Examples
///
/// ```
/// use request_guards::{GroupRequirement, Principal};
///
/// let editors = GroupRequirement::new(["editors", "admins"]).unwrap();
/// let alice = Principal::new("u1", "Alice").in_group("editors");
///
/// assert!(editors.is_satisfied_by(Some(&alice)));
/// assert!(!editors.is_satisfied_by(None));
/// assert!(GroupRequirement::new(Vec::<String>::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupSpec", into = "GroupSpec")]
pub struct GroupRequirement {
    groups: BTreeSet<String>,
}

impl GroupRequirement {
    /// Creates a requirement from one or more group names.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `groups` is empty.
    pub fn new<I, S>(groups: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: BTreeSet<String> = groups.into_iter().map(Into::into).collect();
        if groups.is_empty() {
            return Err(ConfigurationError::new(
                "GroupRequirement",
                "`group_required` must name at least one group",
            ));
        }
        Ok(Self { groups })
    }

    /// Creates a requirement for a single group.
    pub fn one(group: impl Into<String>) -> Self {
        let mut groups = BTreeSet::new();
        groups.insert(group.into());
        Self { groups }
    }

    /// Returns the required groups.
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Passes iff the principal is authenticated and shares a group with the
    /// requirement.
    pub fn is_satisfied_by(&self, principal: Option<&Principal>) -> bool {
        match principal {
            Some(p) => self.groups.iter().any(|g| p.is_member(g)),
            None => false,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GroupSpec {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<GroupSpec> for GroupRequirement {
    type Error = ConfigurationError;

    fn try_from(spec: GroupSpec) -> Result<Self, Self::Error> {
        match spec {
            GroupSpec::One(group) => GroupRequirement::new([group]),
            GroupSpec::Many(groups) => GroupRequirement::new(groups),
        }
    }
}

impl From<GroupRequirement> for GroupSpec {
    fn from(req: GroupRequirement) -> Self {
        GroupSpec::Many(req.groups.into_iter().collect())
    }
}

/// Required permissions, split into an `all` clause and an `any` clause.
///
/// - `all` passes iff every listed permission is held; empty passes.
/// - `any` passes iff one listed permission is held; empty passes.
///
/// The requirement passes iff both clauses pass. A bare string deserializes
/// to `{ "all": [string] }`.
///
/// # Examples
///
/// ```
/// use request_guards::{PermissionRequirement, Principal};
///
/// let req = PermissionRequirement::new()
///     .all(["blog.change_post"])
///     .any(["blog.publish", "blog.moderate"]);
///
/// let writer = Principal::new("u1", "Alice")
///     .with_perm("blog.change_post")
///     .with_perm("blog.moderate");
/// assert!(req.is_satisfied_by(Some(&writer)));
///
/// let reader = Principal::new("u2", "Bob").with_perm("blog.change_post");
/// assert!(!req.is_satisfied_by(Some(&reader)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionSpec")]
pub struct PermissionRequirement {
    /// Permissions that must all be held
    #[serde(default)]
    pub all: Vec<String>,
    /// Permissions of which at least one must be held
    #[serde(default)]
    pub any: Vec<String>,
}

impl PermissionRequirement {
    /// Creates a requirement with both clauses empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds permissions to the `all` clause.
    pub fn all<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all.extend(perms.into_iter().map(Into::into));
        self
    }

    /// Adds permissions to the `any` clause.
    pub fn any<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.any.extend(perms.into_iter().map(Into::into));
        self
    }

    /// Whether neither clause lists anything.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Evaluates both clauses against the principal.
    ///
    /// Without a principal no permission is held, so only clauses that are
    /// vacuously true pass.
    pub fn is_satisfied_by(&self, principal: Option<&Principal>) -> bool {
        let holds = |perm: &String| principal.is_some_and(|p| p.has_perm(perm));

        let all_ok = self.all.iter().all(holds);
        let any_ok = self.any.is_empty() || self.any.iter().any(holds);

        all_ok && any_ok
    }
}

impl From<&str> for PermissionRequirement {
    fn from(perm: &str) -> Self {
        Self::new().all([perm])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionSpec {
    One(String),
    Menu(PermissionMenu),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionMenu {
    #[serde(default)]
    all: Vec<String>,
    #[serde(default)]
    any: Vec<String>,
}

impl From<PermissionSpec> for PermissionRequirement {
    fn from(spec: PermissionSpec) -> Self {
        match spec {
            PermissionSpec::One(perm) => PermissionRequirement::new().all([perm]),
            PermissionSpec::Menu(PermissionMenu { all, any }) => PermissionRequirement { all, any },
        }
    }
}
