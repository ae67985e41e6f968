//! Fixed values merged into every template context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigurationError;

/// Values added to a handler's template context on every request.
///
/// # Examples
///
/// ```
/// use request_guards::StaticContext;
/// use serde_json::{json, Map};
///
/// let statics = StaticContext::new()
///     .with("site_name", "Reports")
///     .with("show_sidebar", true);
///
/// let mut context = Map::new();
/// context.insert("page".to_string(), json!(2));
/// statics.merge_into(&mut context).unwrap();
///
/// assert_eq!(context["site_name"], json!("Reports"));
/// assert_eq!(context["page"], json!(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticContext {
    values: Map<String, Value>,
}

impl StaticContext {
    /// Creates an empty static context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the configured values.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if nothing is configured.
    pub fn static_context(&self) -> Result<&Map<String, Value>, ConfigurationError> {
        if self.values.is_empty() {
            return Err(ConfigurationError::missing("StaticContext", "static_context"));
        }
        Ok(&self.values)
    }

    /// Copies the values into `context`, replacing keys already there.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if nothing is configured.
    pub fn merge_into(&self, context: &mut Map<String, Value>) -> Result<(), ConfigurationError> {
        for (key, value) in self.static_context()? {
            context.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
