//! Schema validation, sanitization and attack-pattern screening for user input.
//!
//! The order is fixed: screen the raw payload for attack signatures (reject
//! outright, never strip), validate structure against the entity schema, then
//! sanitize the validated data. Validation messages therefore always describe
//! what the user literally submitted.

pub mod attack;
pub mod sanitize;
pub mod schema;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub use attack::{detect, scan_value, AttackKind, AttackMatch};
pub use schema::{EntityKind, FieldRule, Format, Sanitizer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// All field failures for one submission, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { errors: vec![FieldError::new(field, message)] }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Flatten to the `field_errors` map used in API error bodies
    pub fn to_field_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for err in &self.errors {
            map.entry(err.field.clone()).or_insert_with(|| err.message.clone());
        }
        map
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Why a submission was refused before reaching storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRejection {
    Attack(AttackMatch),
    Invalid(ValidationErrors),
}

/// Structural validation only. Unknown fields are dropped; every failing field
/// is reported.
pub fn validate(kind: EntityKind, raw: &Value) -> Result<Map<String, Value>, ValidationErrors> {
    let Some(input) = raw.as_object() else {
        return Err(ValidationErrors::single("_root", "Expected a JSON object"));
    };

    let mut errors = ValidationErrors::default();
    let mut data = Map::new();
    for rule in kind.rules() {
        match validate_field(rule, input.get(rule.name)) {
            Ok(Some(value)) => {
                data.insert(rule.name.to_string(), value);
            }
            Ok(None) => {}
            Err(message) => errors.push(rule.name, message),
        }
    }

    if errors.is_empty() {
        Ok(data)
    } else {
        Err(errors)
    }
}

/// Apply each field's sanitizer to already-validated data
pub fn sanitize(kind: EntityKind, mut data: Map<String, Value>) -> Result<Map<String, Value>, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for rule in kind.rules() {
        let Some(Value::String(current)) = data.get(rule.name) else { continue };
        let cleaned = match rule.sanitizer {
            Sanitizer::None => continue,
            Sanitizer::PlainText => sanitize::escape_html(current),
            Sanitizer::RichText => sanitize::sanitize_rich_text(current),
            Sanitizer::Email => sanitize::sanitize_email(current),
            Sanitizer::Phone => sanitize::sanitize_phone(current),
            Sanitizer::Url => match sanitize::sanitize_url(current) {
                Ok(url) => url,
                Err(message) => {
                    errors.push(rule.name, message);
                    continue;
                }
            },
        };
        data.insert(rule.name.to_string(), Value::String(cleaned));
    }

    if errors.is_empty() {
        Ok(data)
    } else {
        Err(errors)
    }
}

/// Screen, validate and sanitize in that order
pub fn validate_and_sanitize(kind: EntityKind, raw: &Value) -> Result<Map<String, Value>, InputRejection> {
    if let Some(hit) = scan_value(raw) {
        return Err(InputRejection::Attack(hit));
    }
    let data = validate(kind, raw).map_err(InputRejection::Invalid)?;
    sanitize(kind, data).map_err(InputRejection::Invalid)
}

/// Validate a partial update: only submitted fields are checked, required
/// fields may be omitted but not blanked.
pub fn validate_patch(kind: EntityKind, raw: &Value) -> Result<Map<String, Value>, InputRejection> {
    if let Some(hit) = scan_value(raw) {
        return Err(InputRejection::Attack(hit));
    }
    let Some(input) = raw.as_object() else {
        return Err(InputRejection::Invalid(ValidationErrors::single("_root", "Expected a JSON object")));
    };

    let mut errors = ValidationErrors::default();
    let mut data = Map::new();
    for rule in kind.rules() {
        let Some(submitted) = input.get(rule.name) else { continue };
        match validate_field(rule, Some(submitted)) {
            Ok(Some(value)) => {
                data.insert(rule.name.to_string(), value);
            }
            Ok(None) => {}
            Err(message) => errors.push(rule.name, message),
        }
    }

    if !errors.is_empty() {
        return Err(InputRejection::Invalid(errors));
    }
    sanitize(kind, data).map_err(InputRejection::Invalid)
}

fn validate_field(rule: &FieldRule, submitted: Option<&Value>) -> Result<Option<Value>, String> {
    let value = match submitted {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err("Must be a string".to_string()),
    };
    if value.is_empty() {
        return if rule.required { Err("This field is required".to_string()) } else { Ok(None) };
    }

    let len = value.chars().count();
    if len < rule.min_len {
        return Err(format!("Must be at least {} characters", rule.min_len));
    }
    if len > rule.max_len {
        return Err(format!("Must be at most {} characters", rule.max_len));
    }
    schema::check_format(rule.format, value)?;
    Ok(Some(Value::String(value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_client_name_is_reported() {
        let errs = validate(EntityKind::Client, &json!({ "name": "", "email": "a@example.com" })).unwrap_err();
        assert!(errs.has_field("name"));
        assert_eq!(errs.errors.len(), 1);
    }

    #[test]
    fn email_format_checked() {
        assert!(validate(EntityKind::Client, &json!({ "name": "Acme", "email": "ops@acme.io" })).is_ok());
        let errs = validate(EntityKind::Client, &json!({ "name": "Acme", "email": "not-an-email" })).unwrap_err();
        assert!(errs.has_field("email"));
    }

    #[test]
    fn reports_all_failures_and_drops_unknown_fields() {
        let errs = validate(
            EntityKind::Inquiry,
            &json!({ "email": "nope", "message": "short", "service": "hacking" }),
        )
        .unwrap_err();
        assert!(errs.has_field("name"));
        assert!(errs.has_field("email"));
        assert!(errs.has_field("message"));
        assert!(errs.has_field("service"));

        let data = validate(EntityKind::Comment, &json!({ "body": "hi", "is_admin": true })).unwrap();
        assert!(!data.contains_key("is_admin"));
    }

    #[test]
    fn non_object_is_a_root_error() {
        let errs = validate(EntityKind::Task, &json!(["title"])).unwrap_err();
        assert!(errs.has_field("_root"));
    }

    #[test]
    fn validation_errors_reflect_literal_input() {
        let errs = validate(EntityKind::Client, &json!({ "name": "A", "email": "X@Y" })).unwrap_err();
        assert_eq!(errs.errors[0].message, "Must be at least 2 characters");
    }

    #[test]
    fn sanitizes_after_validation() {
        let data = validate_and_sanitize(
            EntityKind::Client,
            &json!({
                "name": "O'Brien's Diner",
                "email": "Owner@OBriens.IE",
                "notes": "<p>Prefers <em>morning</em> calls</p><span>!</span>"
            }),
        )
        .unwrap();
        assert_eq!(data["name"], "O&#x27;Brien&#x27;s Diner");
        assert_eq!(data["email"], "owner@obriens.ie");
        assert_eq!(data["notes"], "<p>Prefers <em>morning</em> calls</p>!");
    }

    #[test]
    fn attack_rejects_whole_payload() {
        let result = validate_and_sanitize(
            EntityKind::Client,
            &json!({ "name": "Acme", "email": "a@acme.io", "notes": "<script>alert(1)</script>" }),
        );
        assert!(matches!(result, Err(InputRejection::Attack(AttackMatch { ref field, .. })) if field == "notes"));
    }

    #[test]
    fn patch_allows_omitting_required_but_not_blanking() {
        assert!(validate_patch(EntityKind::Client, &json!({ "status": "active" })).is_ok());
        let result = validate_patch(EntityKind::Client, &json!({ "name": "" }));
        assert!(matches!(result, Err(InputRejection::Invalid(ref e)) if e.has_field("name")));
    }
}
