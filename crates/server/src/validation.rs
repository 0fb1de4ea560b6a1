use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use crate::flow::FieldValue;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").unwrap();
}

/// Validate an email address outside of a task payload (registration and
/// email updates go through here).
pub fn validate_email(value: &str) -> Option<String> {
    if EMAIL_RE.is_match(value) {
        None
    } else {
        Some("Invalid email format.".to_string())
    }
}

/// Validate a single payload value against the rule selected by its field
/// name, returning an error message on failure. The first matching rule
/// wins; exact-match rules sit above the `date`/`name` substring rules so
/// they are never shadowed. Fields matching no rule only need a non-empty
/// value.
pub fn validate_field(field_name: &str, value: &FieldValue) -> Option<String> {
    if field_name == "email" {
        match value.as_text() {
            Some(v) => validate_email(v),
            None => Some("Invalid email format.".to_string()),
        }
    } else if field_name.contains("date") {
        match value.as_text() {
            Some(v) if NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok() => None,
            _ => Some("Date must be in YYYY-MM-DD format.".to_string()),
        }
    } else if field_name == "timestamp" {
        match value.as_text() {
            Some(v) if NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S").is_ok() => None,
            _ => Some("Timestamp must be in YYYY-MM-DD HH:MM:SS format.".to_string()),
        }
    } else if field_name == "passport_number" {
        let valid = match value {
            FieldValue::Int(n) => *n >= 0,
            FieldValue::Text(s) if !s.is_empty() => {
                s.chars().all(|c| c.is_ascii_digit()) || s.chars().all(|c| c.is_alphabetic())
            }
            _ => false,
        };
        if valid {
            None
        } else {
            Some("Passport number must contain only digits.".to_string())
        }
    } else if field_name.contains("name") {
        match value.as_text() {
            Some(v) if !v.is_empty() && v.chars().all(|c| c.is_alphabetic()) => None,
            _ => Some("Name fields must contain only alphabetic characters.".to_string()),
        }
    } else if field_name == "score" {
        match value.as_int() {
            Some(score) if (0..=100).contains(&score) => None,
            _ => Some("Score must be between 0 and 100.".to_string()),
        }
    } else if value.is_empty() {
        Some(format!("Missing value for field - {field_name}"))
    } else {
        None
    }
}
