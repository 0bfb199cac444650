//! Field-level request validation.
//!
//! Handlers collect every problem in a request body before failing, so a client sees all
//! invalid fields in one `400` response rather than one at a time.

use crate::errors::{Error, FieldErrors, Result};

pub const MAX_FIRST_NAME_LENGTH: usize = 30;
pub const MAX_LAST_NAME_LENGTH: usize = 150;
pub const MAX_RESOURCE_NAME_LENGTH: usize = 100;

/// Accumulates per-field messages and turns them into [`Error::Validation`].
#[derive(Debug, Default)]
pub struct FieldValidator {
    fields: FieldErrors,
}

impl FieldValidator {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("Ensure this field has no more than {max} characters."));
        }
    }

    pub fn not_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "This field may not be blank.");
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "This field may not be blank.");
        } else if !is_valid_email(value) {
            self.push(field, "Enter a valid email address.");
        }
    }

    /// Merge messages produced elsewhere (e.g. the password policy) under `field`.
    pub fn extend(&mut self, field: &str, messages: Vec<String>) {
        if !messages.is_empty() {
            self.fields.entry(field.to_string()).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> Result<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { fields: self.fields })
        }
    }
}

/// Syntactic email check: one `@`, a non-empty local part, and a dotted domain made of
/// alphanumeric labels that may contain inner hyphens.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
