//! Coordinating several independently-typed forms under one submission.
//!
//! [`MultipleForms`] builds every configured form for a request and treats
//! the submission as valid only when every form validates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ConfigurationError, Error};
use crate::request::{Method, Principal, Request};
use crate::response::Response;

/// A form that validates submitted data.
pub trait Form: Send {
    /// Validates the bound data, recording errors.
    fn is_valid(&mut self) -> bool;

    /// Errors found by the last validation, keyed by field.
    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }
}

/// Constructed forms, keyed by form name.
pub type Forms = BTreeMap<String, Box<dyn Form>>;

/// Keyword arguments a form is constructed with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormKwargs {
    /// Field-name prefix; every form gets its key as prefix
    pub prefix: String,
    /// Initial values for unbound fields
    pub initial: Map<String, Value>,
    /// Model instance the form edits, for instance-binding forms
    pub instance: Option<Value>,
    /// Submitted data, present for POST/PUT/PATCH
    pub data: Option<Map<String, Value>>,
    /// Acting principal, when user injection is on
    pub user: Option<Principal>,
    /// Anything else set by overrides
    pub extra: Map<String, Value>,
}

type FormFactory = Arc<dyn Fn(FormKwargs) -> Box<dyn Form> + Send + Sync>;
type KwargsOverride = Arc<dyn Fn(&mut FormKwargs, &Request) + Send + Sync>;

/// How to construct one kind of form.
#[derive(Clone)]
pub struct FormClass {
    build: FormFactory,
    binds_instance: bool,
}

impl FormClass {
    /// A plain form.
    pub fn new<F, T>(build: F) -> Self
    where
        F: Fn(FormKwargs) -> T + Send + Sync + 'static,
        T: Form + 'static,
    {
        Self {
            build: Arc::new(move |kwargs: FormKwargs| Box::new(build(kwargs)) as Box<dyn Form>),
            binds_instance: false,
        }
    }

    /// A form that edits a model instance and needs one at construction.
    pub fn model<F, T>(build: F) -> Self
    where
        F: Fn(FormKwargs) -> T + Send + Sync + 'static,
        T: Form + 'static,
    {
        Self {
            binds_instance: true,
            ..Self::new(build)
        }
    }

    /// Whether the form needs a model instance.
    pub fn binds_instance(&self) -> bool {
        self.binds_instance
    }
}

impl fmt::Debug for FormClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormClass")
            .field("binds_instance", &self.binds_instance)
            .finish_non_exhaustive()
    }
}

/// Reacts to the outcome of a multi-form submission.
pub trait FormsHandler {
    /// Every form validated.
    fn forms_valid(&self, request: &Request, forms: &Forms) -> Result<Response, Error>;

    /// At least one form failed validation.
    fn forms_invalid(&self, request: &Request, forms: &Forms) -> Result<Response, Error>;
}

/// Several forms handled as one all-or-nothing submission.
///
/// # Examples
///
/// ```
/// use request_guards::forms::{Form, FormClass, FormKwargs, MultipleForms};
/// use request_guards::{Method, Request};
///
/// struct Required(FormKwargs);
///
/// impl Form for Required {
///     fn is_valid(&mut self) -> bool {
///         let field = format!("{}-name", self.0.prefix);
///         self.0.data.as_ref().is_some_and(|d| d.contains_key(&field))
///     }
/// }
///
/// let forms = MultipleForms::new()
///     .form("billing", FormClass::new(Required))
///     .form("shipping", FormClass::new(Required));
///
/// let partial = Request::new("req-1", Method::Post, "/checkout/")
///     .with_form_field("billing-name", "Alice");
/// assert!(!forms.validate_forms(&partial).unwrap().valid);
///
/// let complete = partial.with_form_field("shipping-name", "Alice");
/// assert!(forms.validate_forms(&complete).unwrap().valid);
/// ```
#[derive(Clone, Default)]
pub struct MultipleForms {
    form_classes: BTreeMap<String, FormClass>,
    initial: BTreeMap<String, Map<String, Value>>,
    instances: Option<BTreeMap<String, Value>>,
    overrides: BTreeMap<String, Vec<KwargsOverride>>,
    inject_user: bool,
}

/// The outcome of validating every form.
pub struct Validated {
    /// The constructed forms, after validation
    pub forms: Forms,
    /// Whether every form validated
    pub valid: bool,
}

impl MultipleForms {
    /// Creates a coordinator with no forms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a form under `name`.
    pub fn form(mut self, name: impl Into<String>, class: FormClass) -> Self {
        self.form_classes.insert(name.into(), class);
        self
    }

    /// Sets initial values for the form under `name`.
    pub fn initial(mut self, name: impl Into<String>, values: Map<String, Value>) -> Self {
        self.initial.insert(name.into(), values);
        self
    }

    /// Sets the instance the form under `name` edits.
    pub fn instance(mut self, name: impl Into<String>, instance: Value) -> Self {
        self.instances
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), instance);
        self
    }

    /// Adjusts the kwargs of the form under `name` after defaults are set.
    pub fn override_kwargs<F>(mut self, name: impl Into<String>, adjust: F) -> Self
    where
        F: Fn(&mut FormKwargs, &Request) + Send + Sync + 'static,
    {
        self.overrides
            .entry(name.into())
            .or_default()
            .push(Arc::new(adjust));
        self
    }

    /// Passes the request's principal to every form as `user`.
    pub fn with_request_user(mut self) -> Self {
        self.inject_user = true;
        self
    }

    /// Returns the configured form classes.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if no forms are configured.
    pub fn form_classes(&self) -> Result<&BTreeMap<String, FormClass>, ConfigurationError> {
        if self.form_classes.is_empty() {
            return Err(ConfigurationError::missing("MultipleForms", "form_classes"));
        }
        Ok(&self.form_classes)
    }

    /// Returns the instance for `name`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if no instances are configured or
    /// none is configured for `name`.
    pub fn instance_for(&self, name: &str) -> Result<&Value, ConfigurationError> {
        let instances = self
            .instances
            .as_ref()
            .ok_or_else(|| ConfigurationError::missing("MultipleForms", "form_instances"))?;
        instances.get(name).ok_or_else(|| {
            ConfigurationError::new(
                "MultipleForms",
                format!("`{name}` is not an available instance"),
            )
        })
    }

    /// Returns the initial values for `name`, or an empty map.
    pub fn initial_for(&self, name: &str) -> Map<String, Value> {
        self.initial.get(name).cloned().unwrap_or_default()
    }

    /// Builds the kwargs for the form under `name`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `name` is not configured or an
    /// instance-binding form has no instance.
    pub fn form_kwargs(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<FormKwargs, ConfigurationError> {
        let class = self.form_classes()?.get(name).ok_or_else(|| {
            ConfigurationError::new("MultipleForms", format!("no form named `{name}`"))
        })?;

        let mut kwargs = FormKwargs {
            prefix: name.to_string(),
            initial: self.initial_for(name),
            ..FormKwargs::default()
        };

        if class.binds_instance() {
            kwargs.instance = Some(self.instance_for(name)?.clone());
        }
        if request.method().carries_body() {
            kwargs.data = Some(request.form_data().clone());
        }
        if self.inject_user {
            kwargs.user = request.principal().cloned();
        }
        for adjust in self.overrides.get(name).into_iter().flatten() {
            adjust(&mut kwargs, request);
        }

        Ok(kwargs)
    }

    /// Constructs every configured form.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any form's kwargs cannot be built.
    pub fn forms(&self, request: &Request) -> Result<Forms, ConfigurationError> {
        self.form_classes()?
            .iter()
            .map(|(name, class)| -> Result<(String, Box<dyn Form>), ConfigurationError> {
                let kwargs = self.form_kwargs(name, request)?;
                Ok((name.clone(), (class.build)(kwargs)))
            })
            .collect()
    }

    /// Constructs and validates every form.
    ///
    /// Every form is validated, even after one fails, so each one records
    /// its errors.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the forms cannot be constructed.
    pub fn validate_forms(&self, request: &Request) -> Result<Validated, ConfigurationError> {
        let mut forms = self.forms(request)?;
        let mut valid = true;
        for (name, form) in forms.iter_mut() {
            if !form.is_valid() {
                tracing::debug!(
                    request_id = %request.request_id(),
                    form = %name,
                    "form failed validation"
                );
                valid = false;
            }
        }
        Ok(Validated { forms, valid })
    }

    /// Validates a POST submission and hands the forms to `handler`.
    ///
    /// Requests with any other method answer `405 Method Not Allowed`.
    ///
    /// # Errors
    ///
    /// Configuration errors and errors from `handler` are returned as-is.
    pub fn post<H: FormsHandler>(&self, request: &Request, handler: &H) -> Result<Response, Error> {
        if request.method() != Method::Post {
            return Ok(Response::method_not_allowed().with_header("Allow", "POST"));
        }
        let Validated { forms, valid } = self.validate_forms(request)?;
        if valid {
            handler.forms_valid(request, &forms)
        } else {
            handler.forms_invalid(request, &forms)
        }
    }
}

impl fmt::Debug for MultipleForms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleForms")
            .field("form_classes", &self.form_classes)
            .field("initial", &self.initial)
            .field("instances", &self.instances)
            .field("inject_user", &self.inject_user)
            .finish_non_exhaustive()
    }
}
