use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Entity kinds that accept user input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Lead,
    Task,
    UserProfile,
    Inquiry,
    Comment,
    Interaction,
}

/// Structural format a field value must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Email,
    Phone,
    Url,
    SafeName,
    Date,
    Uuid,
    OneOf(&'static [&'static str]),
}

/// Post-validation cleanup applied to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitizer {
    None,
    PlainText,
    RichText,
    Email,
    Phone,
    Url,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub min_len: usize,
    pub max_len: usize,
    pub format: Format,
    pub sanitizer: Sanitizer,
}

const fn field(name: &'static str, required: bool, min_len: usize, max_len: usize, format: Format, sanitizer: Sanitizer) -> FieldRule {
    FieldRule { name, required, min_len, max_len, format, sanitizer }
}

pub const CLIENT_STATUSES: &[&str] = &["prospect", "active", "inactive", "churned"];
pub const LEAD_STAGES: &[&str] = &["new", "contacted", "qualified", "proposal", "won", "lost"];
pub const TASK_STATUSES: &[&str] = &["todo", "in_progress", "blocked", "done"];
pub const TASK_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];
pub const INQUIRY_SERVICES: &[&str] = &["web_design", "web_development", "seo", "branding", "maintenance", "other"];
pub const INTERACTION_KINDS: &[&str] = &["call", "email", "meeting", "note"];
pub const INQUIRY_STATUSES: &[&str] = &["new", "contacted", "qualified", "converted", "closed"];

use Format as F;
use Sanitizer as S;

const CLIENT: &[FieldRule] = &[
    field("name", true, 2, 100, F::SafeName, S::PlainText),
    field("email", true, 5, 254, F::Email, S::Email),
    field("phone", false, 7, 20, F::Phone, S::Phone),
    field("company", false, 1, 100, F::SafeName, S::PlainText),
    field("website", false, 4, 2048, F::Url, S::Url),
    field("status", false, 1, 20, F::OneOf(CLIENT_STATUSES), S::None),
    field("assigned_to", false, 1, 64, F::Text, S::None),
    field("notes", false, 0, 5000, F::Text, S::RichText),
];

const LEAD: &[FieldRule] = &[
    field("name", true, 2, 100, F::SafeName, S::PlainText),
    field("email", true, 5, 254, F::Email, S::Email),
    field("phone", false, 7, 20, F::Phone, S::Phone),
    field("company", false, 1, 100, F::SafeName, S::PlainText),
    field("stage", false, 1, 20, F::OneOf(LEAD_STAGES), S::None),
    field("source", false, 1, 50, F::Text, S::PlainText),
    field("notes", false, 0, 5000, F::Text, S::RichText),
];

const TASK: &[FieldRule] = &[
    field("title", true, 3, 200, F::Text, S::PlainText),
    field("description", false, 0, 5000, F::Text, S::RichText),
    field("status", false, 1, 20, F::OneOf(TASK_STATUSES), S::None),
    field("priority", false, 1, 20, F::OneOf(TASK_PRIORITIES), S::None),
    field("assigned_to", false, 1, 64, F::Text, S::None),
    field("client_id", false, 1, 64, F::Text, S::None),
    field("due_date", false, 10, 10, F::Date, S::None),
];

const USER_PROFILE: &[FieldRule] = &[
    field("display_name", true, 2, 100, F::SafeName, S::PlainText),
    field("email", true, 5, 254, F::Email, S::Email),
    field("phone", false, 7, 20, F::Phone, S::Phone),
    field("title", false, 1, 100, F::Text, S::PlainText),
    field("bio", false, 0, 2000, F::Text, S::RichText),
];

const INQUIRY: &[FieldRule] = &[
    field("name", true, 2, 100, F::SafeName, S::PlainText),
    field("email", true, 5, 254, F::Email, S::Email),
    field("phone", false, 7, 20, F::Phone, S::Phone),
    field("company", false, 1, 100, F::SafeName, S::PlainText),
    field("service", false, 1, 30, F::OneOf(INQUIRY_SERVICES), S::None),
    field("message", true, 10, 5000, F::Text, S::PlainText),
];

const COMMENT: &[FieldRule] = &[
    field("body", true, 1, 2000, F::Text, S::RichText),
    field("author_name", false, 2, 100, F::SafeName, S::PlainText),
];

const INTERACTION: &[FieldRule] = &[
    field("kind", true, 1, 20, F::OneOf(INTERACTION_KINDS), S::None),
    field("summary", true, 3, 500, F::Text, S::PlainText),
    field("details", false, 0, 5000, F::Text, S::RichText),
    field("occurred_on", false, 10, 10, F::Date, S::None),
];

impl EntityKind {
    pub fn rules(&self) -> &'static [FieldRule] {
        match self {
            EntityKind::Client => CLIENT,
            EntityKind::Lead => LEAD,
            EntityKind::Task => TASK,
            EntityKind::UserProfile => USER_PROFILE,
            EntityKind::Inquiry => INQUIRY,
            EntityKind::Comment => COMMENT,
            EntityKind::Interaction => INTERACTION,
        }
    }

    pub fn rule(&self, name: &str) -> Option<&'static FieldRule> {
        self.rules().iter().find(|r| r.name == name)
    }
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("static email pattern")
});
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[\d\s\-()]{7,20}$").expect("static phone pattern"));
static SAFE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N}\s'.,&\-()]+$").expect("static name pattern"));
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// Check `value` against a format, returning a user-facing message on failure
pub fn check_format(format: Format, value: &str) -> Result<(), String> {
    let ok = match format {
        Format::Text => true,
        Format::Email => EMAIL.is_match(value),
        Format::Phone => PHONE.is_match(value) && value.chars().filter(|c| c.is_ascii_digit()).count() >= 7,
        Format::Url => url::Url::parse(value)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false),
        Format::SafeName => SAFE_NAME.is_match(value),
        Format::Date => {
            DATE.is_match(value) && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        }
        Format::Uuid => uuid::Uuid::parse_str(value).is_ok(),
        Format::OneOf(options) => options.contains(&value),
    };

    if ok {
        return Ok(());
    }

    Err(match format {
        Format::Text => "Invalid value".to_string(),
        Format::Email => "Must be a valid email address".to_string(),
        Format::Phone => "Must be a valid phone number".to_string(),
        Format::Url => "Must be a valid http or https URL".to_string(),
        Format::SafeName => "Contains characters that are not allowed".to_string(),
        Format::Date => "Must be a date in YYYY-MM-DD format".to_string(),
        Format::Uuid => "Must be a valid UUID".to_string(),
        Format::OneOf(options) => format!("Must be one of: {}", options.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(check_format(Format::Email, "jane@example.com").is_ok());
        assert!(check_format(Format::Email, "jane.doe+crm@mail.example.co.uk").is_ok());
        assert!(check_format(Format::Email, "not-an-email").is_err());
        assert!(check_format(Format::Email, "a@b").is_err());
    }

    #[test]
    fn safe_name_allows_apostrophes() {
        assert!(check_format(Format::SafeName, "O'Brien's Diner").is_ok());
        assert!(check_format(Format::SafeName, "Müller & Söhne GmbH").is_ok());
        assert!(check_format(Format::SafeName, "<b>bold</b>").is_err());
    }

    #[test]
    fn dates_must_exist() {
        assert!(check_format(Format::Date, "2024-02-29").is_ok());
        assert!(check_format(Format::Date, "2023-02-29").is_err());
        assert!(check_format(Format::Date, "29/02/2024").is_err());
    }

    #[test]
    fn one_of_lists_options() {
        let err = check_format(Format::OneOf(TASK_PRIORITIES), "whenever").unwrap_err();
        assert_eq!(err, "Must be one of: low, medium, high, urgent");
    }

    #[test]
    fn every_schema_has_a_required_field() {
        for kind in [
            EntityKind::Client,
            EntityKind::Lead,
            EntityKind::Task,
            EntityKind::UserProfile,
            EntityKind::Inquiry,
            EntityKind::Comment,
            EntityKind::Interaction,
        ] {
            assert!(kind.rules().iter().any(|r| r.required), "{:?}", kind);
        }
    }
}
