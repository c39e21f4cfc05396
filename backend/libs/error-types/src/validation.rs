//! Field-level validation messages
//!
//! Validation rules live on request structs as `validator` attributes. This
//! module turns the resulting [`validator::ValidationErrors`] into one
//! message per field using a static table of templates keyed by rule code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

/// Message template for one validation rule code
///
/// `{field}` is replaced with the JSON field name, `{param}` with the first
/// rule parameter found under one of `param_keys`.
#[derive(Debug, Clone, Copy)]
pub struct MessageTemplate {
    pub code: &'static str,
    pub template: &'static str,
    pub param_keys: &'static [&'static str],
}

/// Templates for the rule codes used across services
pub const DEFAULT_TEMPLATES: &[MessageTemplate] = &[
    MessageTemplate {
        code: "required",
        template: "{field} is required",
        param_keys: &[],
    },
    MessageTemplate {
        code: "gt",
        template: "{field} must be greater than {param}",
        param_keys: &["exclusive_min", "min"],
    },
];

const FALLBACK_TEMPLATE: &str = "{field} is not valid";

/// One message per failed field, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render validator output with [`DEFAULT_TEMPLATES`]
    pub fn from_validation(errors: &ValidationErrors) -> Self {
        Self::with_templates(errors, DEFAULT_TEMPLATES)
    }

    pub fn with_templates(errors: &ValidationErrors, templates: &[MessageTemplate]) -> Self {
        let mut rendered = Self::new();
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            if let Some(first) = field_errors.first() {
                let message = render(&field, first, templates);
                rendered.insert(field, message);
            }
        }
        rendered
    }

    /// Record a message; the first message for a field wins
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn render(field: &str, error: &ValidationError, templates: &[MessageTemplate]) -> String {
    let Some(template) = templates.iter().find(|t| t.code == error.code) else {
        return FALLBACK_TEMPLATE.replace("{field}", field);
    };

    let param = template
        .param_keys
        .iter()
        .find_map(|key| error.params.get(*key))
        .map(format_param)
        .unwrap_or_default();

    template
        .template
        .replace("{field}", field)
        .replace("{param}", &param)
}

/// Integral floats render without a trailing `.0` (`0.0` -> `0`)
fn format_param(value: &Value) -> String {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
