//! Submitted forms and their validation rules.
//!
//! Every field deserializes as a plain string (missing fields become empty)
//! so validation, not the extractor, decides what the user sees.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field name to messages, rendered next to the inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn is_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
        })
        .is_match(email)
}

fn require(errors: &mut FormErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        false
    } else {
        true
    }
}

fn check_email(errors: &mut FormErrors, value: &str) {
    if require(errors, "email", value) && !is_email(value.trim()) {
        errors.add("email", "Invalid email address.");
    }
}

fn check_confirmation(errors: &mut FormErrors, password: &str, confirm: &str) {
    if require(errors, "confirm_password", confirm) && password != confirm {
        errors.add("confirm_password", "Field must be equal to password.");
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if require(&mut errors, "username", &self.username) {
            let len = self.username.trim().chars().count();
            if !(2..=20).contains(&len) {
                errors.add("username", "Field must be between 2 and 20 characters long.");
            }
        }
        check_email(&mut errors, &self.email);
        require(&mut errors, "password", &self.password);
        check_confirmation(&mut errors, &self.password, &self.confirm_password);
        errors.into_result(())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox: present when ticked
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_email(&mut errors, &self.email);
        require(&mut errors, "password", &self.password);
        errors.into_result(())
    }

    pub fn remember(&self) -> bool {
        matches!(self.remember.as_deref(), Some(v) if !v.is_empty() && v != "false")
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RequestResetForm {
    pub email: String,
}

impl RequestResetForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_email(&mut errors, &self.email);
        errors.into_result(())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        require(&mut errors, "password", &self.password);
        check_confirmation(&mut errors, &self.password, &self.confirm_password);
        errors.into_result(())
    }
}

/// Add and edit share one form.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TaskForm {
    pub task: String,
    pub due_date: String,
}

/// A task form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTask {
    pub text: String,
    pub due_date: NaiveDate,
}

impl TaskForm {
    pub fn validate(&self) -> Result<ValidTask, FormErrors> {
        let mut errors = FormErrors::default();
        require(&mut errors, "task", &self.task);
        let due_date = if require(&mut errors, "due_date", &self.due_date) {
            match NaiveDate::parse_from_str(self.due_date.trim(), DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("due_date", "Not a valid date value. Use YYYY-MM-DD.");
                    None
                }
            }
        } else {
            None
        };

        match due_date {
            Some(due_date) if errors.is_empty() => Ok(ValidTask {
                text: self.task.trim().to_string(),
                due_date,
            }),
            _ => Err(errors),
        }
    }
}

/// Buttons on the home page.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HomeAction {
    pub add_task: Option<String>,
    pub sort_task: Option<String>,
}
