//! Query shaping driven by the request and configuration: list ordering,
//! per-method selection and related-field loading.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::request::{Method, Request};

/// Query-string parameter naming the field to order by.
pub const ORDER_BY_PARAM: &str = "order_by";
/// Query-string parameter naming the direction (`asc` or `desc`).
pub const ORDER_DIR_PARAM: &str = "order_dir";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl Direction {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }
}

/// An ordering chosen from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    /// Field to order by
    pub field: String,
    /// Direction to order in
    pub direction: Direction,
}

impl Ordering {
    /// Renders the ordering as an `order_by` term: `field` or `-field`.
    pub fn as_order_by(&self) -> String {
        match self.direction {
            Direction::Asc => self.field.clone(),
            Direction::Desc => format!("-{}", self.field),
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_order_by())
    }
}

/// Lets clients order a list through `?order_by=` and `?order_dir=`.
///
/// Missing parameters fall back to the defaults. Fields outside the allowed
/// set produce no ordering, so the list keeps its natural order. An
/// unrecognized direction is treated as ascending.
///
/// # Examples
///
/// ```
/// use request_guards::query::{Direction, OrderableList};
/// use request_guards::{Method, Request};
///
/// let list = OrderableList::new(["title", "published"], "published", Direction::Desc);
///
/// let request = Request::new("req-1", Method::Get, "/posts/")
///     .with_query_param("order_by", "Title")
///     .with_query_param("order_dir", "asc");
/// assert_eq!(list.ordering(&request).unwrap().unwrap().as_order_by(), "title");
///
/// let default = Request::new("req-2", Method::Get, "/posts/");
/// assert_eq!(list.ordering(&default).unwrap().unwrap().as_order_by(), "-published");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderableList {
    /// Fields clients may order by
    pub fields: Vec<String>,
    /// Field used when the request names none
    pub default_field: String,
    /// Direction used when the request names none, `asc` or `desc`
    pub default_direction: String,
}

impl OrderableList {
    /// Creates an orderable list.
    pub fn new<I, S>(
        fields: I,
        default_field: impl Into<String>,
        default_direction: Direction,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            default_field: default_field.into(),
            default_direction: match default_direction {
                Direction::Asc => "asc".to_string(),
                Direction::Desc => "desc".to_string(),
            },
        }
    }

    /// Returns the allowed fields.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if no fields are allowed.
    pub fn orderable_fields(&self) -> Result<&[String], ConfigurationError> {
        if self.fields.is_empty() {
            return Err(ConfigurationError::missing("OrderableList", "orderable_fields"));
        }
        Ok(&self.fields)
    }

    /// Returns the default field.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if it is empty.
    pub fn default_field(&self) -> Result<&str, ConfigurationError> {
        if self.default_field.is_empty() {
            return Err(ConfigurationError::missing(
                "OrderableList",
                "orderable_field_default",
            ));
        }
        Ok(&self.default_field)
    }

    /// Returns the default direction.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` unless it is `asc` or `desc`.
    pub fn default_direction(&self) -> Result<Direction, ConfigurationError> {
        Direction::parse(&self.default_direction).ok_or_else(|| {
            ConfigurationError::new(
                "OrderableList",
                "`orderable_direction_default` must be 'asc' or 'desc'",
            )
        })
    }

    /// Reads the requested field and direction, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a needed default is invalid.
    pub fn order_from_request(
        &self,
        request: &Request,
    ) -> Result<(String, Direction), ConfigurationError> {
        let field = request
            .query_param(ORDER_BY_PARAM)
            .map(str::to_lowercase)
            .filter(|f| !f.is_empty());
        let direction = request
            .query_param(ORDER_DIR_PARAM)
            .map(str::to_lowercase)
            .filter(|d| !d.is_empty());

        let field = match field {
            Some(field) => field,
            None => self.default_field()?.to_string(),
        };
        let direction = match direction {
            Some(direction) => Direction::parse(&direction).unwrap_or(Direction::Asc),
            None => self.default_direction()?,
        };
        Ok((field, direction))
    }

    /// The ordering to apply, or `None` when the field is not allowed.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the list is misconfigured.
    pub fn ordering(&self, request: &Request) -> Result<Option<Ordering>, ConfigurationError> {
        let (field, direction) = self.order_from_request(request)?;
        let allowed = self.orderable_fields()?;
        if allowed.iter().any(|f| *f == field) {
            Ok(Some(Ordering { field, direction }))
        } else {
            tracing::debug!(
                request_id = %request.request_id(),
                field = %field,
                "ignoring ordering by a field that is not orderable"
            );
            Ok(None)
        }
    }
}

/// Picks a value (typically a serializer) by request method.
///
/// # Examples
///
/// ```
/// use request_guards::query::MethodSelector;
/// use request_guards::{Method, Request};
///
/// let serializers = MethodSelector::new()
///     .on(Method::Get, "PostSummary")
///     .on(Method::Post, "PostCreate");
///
/// let request = Request::new("req-1", Method::Post, "/posts/");
/// assert_eq!(serializers.select(&request).unwrap(), Some(&"PostCreate"));
/// ```
#[derive(Debug, Clone)]
pub struct MethodSelector<T> {
    choices: BTreeMap<String, T>,
}

impl<T> Default for MethodSelector<T> {
    fn default() -> Self {
        Self {
            choices: BTreeMap::new(),
        }
    }
}

impl<T> MethodSelector<T> {
    /// Creates an empty selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for `method`.
    pub fn on(mut self, method: Method, value: T) -> Self {
        self.choices.insert(method.as_lower().to_string(), value);
        self
    }

    /// Creates a selector from lowercase method names, as found in
    /// configuration files.
    pub fn from_names(choices: BTreeMap<String, T>) -> Self {
        let choices = choices
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self { choices }
    }

    /// Returns the value for the request's method, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if nothing is configured at all.
    pub fn select(&self, request: &Request) -> Result<Option<&T>, ConfigurationError> {
        if self.choices.is_empty() {
            return Err(ConfigurationError::missing(
                "MethodSelector",
                "serializer_classes",
            ));
        }
        Ok(self.choices.get(request.method().as_lower()))
    }
}

/// Related fields to load together with a query, as `select_related` or
/// `prefetch_related` lists.
///
/// A single field name is promoted to a one-element list. An empty list is
/// reported when the fields are used, naming the setting that is missing.
///
/// # Examples
///
/// ```
/// use request_guards::query::RelatedFields;
///
/// let related: RelatedFields = serde_json::from_str(r#""author""#).unwrap();
/// let plan = related
///     .apply("select_related", Vec::new(), |mut plan: Vec<String>, fields| {
///         plan.extend(fields.iter().map(|f| format!("join {f}")));
///         plan
///     })
///     .unwrap();
/// assert_eq!(plan, ["join author"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RelatedSpec", into = "Vec<String>")]
pub struct RelatedFields {
    fields: Vec<String>,
}

impl RelatedFields {
    /// Creates a list of related fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a list holding one field.
    pub fn one(field: impl Into<String>) -> Self {
        Self::new([field])
    }

    /// Returns the fields.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming `attribute` if the list is empty.
    pub fn fields(&self, attribute: &str) -> Result<&[String], ConfigurationError> {
        if self.fields.is_empty() {
            return Err(ConfigurationError::missing("RelatedFields", attribute));
        }
        Ok(&self.fields)
    }

    /// Hands the fields to `load`, which adds them to `query`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming `attribute` if the list is empty.
    pub fn apply<Q, F>(&self, attribute: &str, query: Q, load: F) -> Result<Q, ConfigurationError>
    where
        F: FnOnce(Q, &[String]) -> Q,
    {
        let fields = self.fields(attribute)?;
        Ok(load(query, fields))
    }
}

impl From<RelatedFields> for Vec<String> {
    fn from(related: RelatedFields) -> Self {
        related.fields
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelatedSpec {
    One(String),
    Many(Vec<String>),
}

impl From<RelatedSpec> for RelatedFields {
    fn from(spec: RelatedSpec) -> Self {
        match spec {
            RelatedSpec::One(field) if field.is_empty() => Self::default(),
            RelatedSpec::One(field) => Self::one(field),
            RelatedSpec::Many(fields) => Self::new(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> OrderableList {
        OrderableList::new(["name", "created"], "created", Direction::Asc)
    }

    fn get() -> Request {
        Request::new("req-1", Method::Get, "/items/")
    }

    #[test]
    fn request_parameters_are_lowercased() {
        let request = get()
            .with_query_param("order_by", "NAME")
            .with_query_param("order_dir", "DESC");
        let ordering = list().ordering(&request).unwrap().unwrap();
        assert_eq!(ordering.as_order_by(), "-name");
        assert_eq!(ordering.to_string(), "-name");
    }

    #[test]
    fn defaults_fill_missing_parameters() {
        let request = get().with_query_param("order_dir", "desc");
        let ordering = list().ordering(&request).unwrap().unwrap();
        assert_eq!(ordering.field, "created");
        assert_eq!(ordering.direction, Direction::Desc);
    }

    #[test]
    fn disallowed_field_is_ignored() {
        let request = get().with_query_param("order_by", "password");
        assert_eq!(list().ordering(&request).unwrap(), None);
    }

    #[test]
    fn misconfiguration_is_reported() {
        let mut no_fields = list();
        no_fields.fields.clear();
        assert!(no_fields.ordering(&get()).is_err());

        let mut no_default = list();
        no_default.default_field.clear();
        assert!(no_default.ordering(&get()).is_err());

        let mut bad_direction = list();
        bad_direction.default_direction = "sideways".to_string();
        assert!(bad_direction.ordering(&get()).is_err());
    }

    #[test]
    fn orderable_list_deserializes() {
        let list: OrderableList = serde_json::from_str(
            r#"{"fields": ["name"], "default_field": "name", "default_direction": "desc"}"#,
        )
        .unwrap();
        assert_eq!(list.default_direction().unwrap(), Direction::Desc);
    }

    #[test]
    fn method_selector_picks_by_method() {
        let selector = MethodSelector::new().on(Method::Get, 1).on(Method::Put, 2);
        assert_eq!(selector.select(&get()).unwrap(), Some(&1));

        let delete = Request::new("req-2", Method::Delete, "/");
        assert_eq!(selector.select(&delete).unwrap(), None);
    }

    #[test]
    fn method_selector_from_names() {
        let mut names = BTreeMap::new();
        names.insert("GET".to_string(), "list");
        let selector = MethodSelector::from_names(names);
        assert_eq!(selector.select(&get()).unwrap(), Some(&"list"));
    }

    #[test]
    fn empty_selector_is_configuration_error() {
        let selector: MethodSelector<u8> = MethodSelector::new();
        assert!(selector.select(&get()).is_err());
    }

    #[test]
    fn single_related_field_is_promoted_to_list() {
        let related: RelatedFields = serde_json::from_str(r#""author""#).unwrap();
        assert_eq!(related.fields("select_related").unwrap(), ["author".to_string()]);

        let many: RelatedFields = serde_json::from_str(r#"["tags", "comments"]"#).unwrap();
        assert_eq!(many.fields("prefetch_related").unwrap().len(), 2);
    }

    #[test]
    fn empty_related_fields_name_the_missing_setting() {
        let err = RelatedFields::default().fields("prefetch_related").unwrap_err();
        assert!(err.message.contains("prefetch_related"));

        let blank: RelatedFields = serde_json::from_str(r#""""#).unwrap();
        let err = blank
            .apply("select_related", 0, |count: usize, fields| count + fields.len())
            .unwrap_err();
        assert!(err.message.contains("select_related"));
    }

    #[test]
    fn related_fields_are_applied_to_the_query() {
        let related = RelatedFields::new(["author", "editor"]);
        let joins = related
            .apply("select_related", 0, |count: usize, fields| count + fields.len())
            .unwrap();
        assert_eq!(joins, 2);
    }
}
