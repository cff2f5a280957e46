//! Schema validation capability consumed by the profile store.
//!
//! The store never interprets config fields itself; it hands documents to a
//! [`DocumentValidator`] and either gets a valid document back or a list of
//! issues. [`ModelMapValidator`] is the built-in rule set for the
//! agent/category model maps.

use serde_json::{Map, Value};
use std::fmt;

/// A single schema violation, located by JSON pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub trait DocumentValidator {
    /// Validate a raw document, returning the accepted document or every issue found
    fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationIssue>>;
}

impl<F> DocumentValidator for F
where
    F: Fn(&Value) -> Result<Value, Vec<ValidationIssue>>,
{
    fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationIssue>> {
        self(raw)
    }
}

/// Keys whose values map a name to a `{ model, variant }` entry
const MODEL_MAP_KEYS: [&str; 2] = ["agents", "categories"];

/// Fields of a model entry that must be strings when present
const MODEL_ENTRY_STRING_FIELDS: [&str; 2] = ["model", "variant"];

/// Built-in validator for oh-my-opencode documents
///
/// Only the model maps are checked; every other field is free-form.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelMapValidator;

impl DocumentValidator for ModelMapValidator {
    fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationIssue>> {
        let Some(root) = raw.as_object() else {
            return Err(vec![ValidationIssue::new(
                "",
                format!("expected a JSON object, found {}", type_name(raw)),
            )]);
        };

        let mut issues = Vec::new();

        if let Some(schema) = root.get("$schema")
            && !schema.is_string()
        {
            issues.push(ValidationIssue::new(
                "/$schema",
                format!("expected a string, found {}", type_name(schema)),
            ));
        }

        for key in MODEL_MAP_KEYS {
            if let Some(value) = root.get(key) {
                check_model_map(&format!("/{key}"), value, &mut issues);
            }
        }

        if issues.is_empty() {
            Ok(raw.clone())
        } else {
            Err(issues)
        }
    }
}

fn check_model_map(pointer: &str, value: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(entries) = value.as_object() else {
        issues.push(ValidationIssue::new(
            pointer,
            format!("expected an object, found {}", type_name(value)),
        ));
        return;
    };

    for (name, entry) in entries {
        let entry_pointer = format!("{pointer}/{}", escape_pointer(name));
        match entry.as_object() {
            Some(fields) => check_model_entry(&entry_pointer, fields, issues),
            None => issues.push(ValidationIssue::new(
                entry_pointer,
                format!("expected an object, found {}", type_name(entry)),
            )),
        }
    }
}

fn check_model_entry(
    pointer: &str,
    fields: &Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in MODEL_ENTRY_STRING_FIELDS {
        if let Some(value) = fields.get(field)
            && !value.is_string()
        {
            issues.push(ValidationIssue::new(
                format!("{pointer}/{field}"),
                format!("expected a string, found {}", type_name(value)),
            ));
        }
    }
}

/// RFC 6901 escaping for a single reference token
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
