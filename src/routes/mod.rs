use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use regex::Regex;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::{DomainStore, StoreError};

pub mod account;
pub mod audit;
pub mod chat;
pub mod demo;
pub mod gateway;
pub mod payment_methods;
pub mod reports;
pub mod shelters;
pub mod sponsees;
pub mod sponsorships;
pub mod users;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Fresh collision-free id with a readable prefix, e.g. `sp-<uuid>`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Whether any account already signs in with `email`.
pub fn email_taken(store: &DomainStore, email: &str) -> bool {
    let email = email.trim();
    store.list::<User>().iter().any(|u| u.email.eq_ignore_ascii_case(email))
}

/// Minimum 8 characters with at least one upper-case letter, one lower-case
/// letter and one digit.
pub fn password_problem(password: &str) -> Option<&'static str> {
    if password.chars().count() < 8 {
        return Some("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Some("Password needs an upper-case letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Some("Password needs a lower-case letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password needs a digit");
    }
    None
}

/// Field-level validation failures, rendered as 422 `{"errors": {...}}`.
#[derive(Default)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn require(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "Required");
        }
    }

    pub fn email(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "Required");
        } else if !is_valid_email(value) {
            self.add(field, "Invalid e-mail address");
        }
    }

    pub fn into_result(self) -> Result<(), Response> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err((StatusCode::UNPROCESSABLE_ENTITY, AxumJson(serde_json::json!({ "errors": self.0 }))).into_response())
        }
    }
}

pub fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        StoreError::Transition(_) => (StatusCode::CONFLICT, e.to_string()).into_response(),
    }
}

pub fn not_found(kind: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("{} not found", kind)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert_eq!(password_problem("short1A"), Some("Password must be at least 8 characters"));
        assert_eq!(password_problem("alllower1"), Some("Password needs an upper-case letter"));
        assert_eq!(password_problem("NoDigitsHere"), Some("Password needs a digit"));
        assert_eq!(password_problem("Sponsor2026"), None);
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("laura@example.com"));
        assert!(!is_valid_email("laura@example"));
        assert!(!is_valid_email("laura example.com"));
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut errors = FieldErrors::default();
        errors.require("name", " ");
        errors.add("name", "second");
        errors.email("email", "nope");
        assert_eq!(errors.0.get("name").map(String::as_str), Some("Required"));
        assert_eq!(errors.0.get("email").map(String::as_str), Some("Invalid e-mail address"));
        assert!(errors.into_result().is_err());
    }
}
