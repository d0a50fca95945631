//! Field-level validation primitives shared by every schema.
//!
//! A schema reads an untyped JSON record through [`Fields`], which records one
//! [`FieldError`] per offending field instead of stopping at the first one.
//! Messages follow the wording users already see in the forms
//! (`Required`, `Expected string, received number`, ...).

use super::enums::ClosedEnum;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .expect("uuid regex is valid")
});

/// A single rejected field: dotted path plus a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the field (`title`, `labels.1`, `2.role`); empty for the record itself
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Structured validation failure: one or more `(path, message)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure with exactly one field error
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, message)],
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First error attached to `path`, if any
    pub fn field(&self, path: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.path == path)
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.field(path).is_some()
    }

    /// All messages attached to `path`, in the order they were recorded
    pub fn messages_for(&self, path: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Prefix every path with `prefix` (used for rows inside a collection)
    pub fn prefixed(self, prefix: &str) -> Self {
        let errors = self
            .errors
            .into_iter()
            .map(|e| FieldError {
                path: join_path(prefix, &e.path),
                message: e.message,
            })
            .collect();
        Self { errors }
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                if e.path.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.path, e.message)
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A type that can be produced from an untrusted JSON record.
///
/// Validation is pure: no I/O, no clock, no randomness.
pub trait Schema: Sized {
    fn validate(input: &Value) -> Result<Self, ValidationErrors>;
}

/// Validate a whole collection. Any bad row fails the entire collection.
pub fn validate_array<T: Schema>(input: &Value) -> Result<Vec<T>, ValidationErrors> {
    let rows = match input {
        Value::Array(rows) => rows,
        other => {
            return Err(ValidationErrors::single(
                "",
                format!("Expected array, received {}", json_type(other)),
            ))
        }
    };

    let mut errors = ValidationErrors::new();
    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match T::validate(row) {
            Ok(v) => out.push(v),
            Err(e) => errors.extend(e.prefixed(&i.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// Re-run a schema over an already typed value.
///
/// Typed inputs can still be constructed with invalid content (an empty title,
/// a short password), so every hook validates through the JSON form before
/// touching the network.
pub fn revalidate<T: Schema + Serialize>(value: &T) -> Result<T, ValidationErrors> {
    let json = serde_json::to_value(value)
        .map_err(|e| ValidationErrors::single("", format!("Unserializable input: {}", e)))?;
    T::validate(&json)
}

/// JSON type name as it appears in messages
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, path),
    }
}

/// How a key may be absent or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Key must be present and non-null
    Required,
    /// Key may be absent; `null` is a type error
    Optional,
    /// Key must be present; `null` is allowed
    Nullable,
    /// Key may be absent or `null`
    Nullish,
}

/// Cursor over one JSON object that accumulates field errors.
pub struct Fields<'a> {
    object: Option<&'a Map<String, Value>>,
    errors: ValidationErrors,
}

impl<'a> Fields<'a> {
    pub fn new(input: &'a Value) -> Self {
        match input {
            Value::Object(map) => Self {
                object: Some(map),
                errors: ValidationErrors::new(),
            },
            other => Self {
                object: None,
                errors: ValidationErrors::single(
                    "",
                    format!("Expected object, received {}", json_type(other)),
                ),
            },
        }
    }

    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(path, message));
    }

    /// Resolve a key according to its presence rule.
    ///
    /// Returns the non-null value, or `None` when the key is absent/null
    /// (recording an error when that is not allowed).
    fn slot(&mut self, key: &str, presence: Presence, expected: &str) -> Option<&'a Value> {
        let object = self.object?;
        match object.get(key) {
            None => {
                if matches!(presence, Presence::Required | Presence::Nullable) {
                    self.fail(key, "Required");
                }
                None
            }
            Some(Value::Null) => {
                if matches!(presence, Presence::Required | Presence::Optional) {
                    self.fail(key, format!("Expected {}, received null", expected));
                }
                None
            }
            Some(v) => Some(v),
        }
    }

    /// Any string
    pub fn string(&mut self, key: &str, presence: Presence) -> Option<String> {
        let value = self.slot(key, presence, "string")?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.fail(key, format!("Expected string, received {}", json_type(value)));
                None
            }
        }
    }

    /// String of at least `min` characters; `message` when shorter
    pub fn min_len(
        &mut self,
        key: &str,
        presence: Presence,
        min: usize,
        message: &str,
    ) -> Option<String> {
        let s = self.string(key, presence)?;
        if s.chars().count() < min {
            self.fail(key, message);
            return None;
        }
        Some(s)
    }

    pub fn email(&mut self, key: &str, presence: Presence) -> Option<String> {
        let s = self.string(key, presence)?;
        if s.starts_with('.') || s.contains("..") || !EMAIL_RE.is_match(&s) {
            self.fail(key, "Invalid email address");
            return None;
        }
        Some(s)
    }

    pub fn url(&mut self, key: &str, presence: Presence) -> Option<String> {
        let s = self.string(key, presence)?;
        if reqwest::Url::parse(&s).is_err() {
            self.fail(key, "Invalid url");
            return None;
        }
        Some(s)
    }

    /// Hyphenated UUID string
    pub fn uuid(&mut self, key: &str, presence: Presence) -> Option<Uuid> {
        let s = self.string(key, presence)?;
        if !UUID_RE.is_match(&s) {
            self.fail(key, "Invalid uuid");
            return None;
        }
        match Uuid::parse_str(&s) {
            Ok(id) => Some(id),
            Err(_) => {
                self.fail(key, "Invalid uuid");
                None
            }
        }
    }

    /// Member of a closed enumeration; no coercion
    pub fn choice<E: ClosedEnum>(&mut self, key: &str, presence: Presence) -> Option<E> {
        let expected = E::expected();
        let value = self.slot(key, presence, &expected)?;
        match value.as_str() {
            Some(s) => match E::parse(s) {
                Some(v) => Some(v),
                None => {
                    self.fail(
                        key,
                        format!("Invalid enum value. Expected {}, received '{}'", expected, s),
                    );
                    None
                }
            },
            None => {
                self.fail(
                    key,
                    format!("Expected {}, received {}", expected, json_type(value)),
                );
                None
            }
        }
    }

    pub fn boolean(&mut self, key: &str, presence: Presence) -> Option<bool> {
        let value = self.slot(key, presence, "boolean")?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.fail(key, format!("Expected boolean, received {}", json_type(value)));
                None
            }
        }
    }

    /// Non-negative integer counter
    pub fn count(&mut self, key: &str, presence: Presence) -> Option<u32> {
        let value = self.slot(key, presence, "number")?;
        match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None if value.is_number() => {
                self.fail(key, "Expected non-negative integer");
                None
            }
            None => {
                self.fail(key, format!("Expected number, received {}", json_type(value)));
                None
            }
        }
    }

    /// Array of strings; element errors are reported as `key.index`
    pub fn string_list(&mut self, key: &str, presence: Presence) -> Option<Vec<String>> {
        let value = self.slot(key, presence, "array")?;
        let items = match value.as_array() {
            Some(items) => items,
            None => {
                self.fail(key, format!("Expected array, received {}", json_type(value)));
                return None;
            }
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    ok = false;
                    self.fail(
                        &format!("{}.{}", key, i),
                        format!("Expected string, received {}", json_type(item)),
                    );
                }
            }
        }
        ok.then_some(out)
    }

    /// Cross-field rule: record `message` at `path` unless `ok`
    pub fn check(&mut self, path: &str, ok: bool, message: &str) {
        if !ok {
            self.fail(path, message);
        }
    }

    /// Whether no error has been recorded so far
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Produce the typed record, or every error recorded while reading it.
    ///
    /// `build` is only called when no error was recorded; it returns `None`
    /// only if a required value is missing, which cannot happen without an
    /// error having been recorded first.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, ValidationErrors> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        build().ok_or_else(|| ValidationErrors::single("", "Invalid input"))
    }
}
