//! Field checks for user payloads.
//!
//! Payloads arrive as a JSON object. [`validate`] turns it into a [`UserInput`]
//! or a [`ValidationErrors`] listing every offending field. Keys other than
//! `name`, `email` and `password` are ignored, and a `null` value counts as absent.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

pub const NAME_MAX: usize = 80;
pub const EMAIL_MAX: usize = 120;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 255;

const MISSING: &str = "missing required field";
const NUL: &str = "must not contain NUL characters";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create: `name`, `email` and `password` are all required.
    Strict,
    /// Update: any subset may be present.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validated, typed payload. Absent fields are `None`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for UserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInput")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// All three fields of a create payload.
pub struct CompleteInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl UserInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }

    /// Splits into the three required fields, reporting each one that is absent.
    pub fn into_complete(self) -> Result<CompleteInput, ValidationErrors> {
        match (self.name, self.email, self.password) {
            (Some(name), Some(email), Some(password)) => Ok(CompleteInput {
                name,
                email,
                password,
            }),
            (name, email, password) => {
                let mut errors = ValidationErrors::default();
                for (field, absent) in [
                    ("name", name.is_none()),
                    ("email", email.is_none()),
                    ("password", password.is_none()),
                ] {
                    if absent {
                        errors.push(field, MISSING);
                    }
                }
                Err(errors)
            }
        }
    }
}

pub fn validate(payload: &Map<String, Value>, mode: Mode) -> Result<UserInput, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = read_field(payload, "name", mode, check_name, &mut errors);
    let email = read_field(payload, "email", mode, check_email, &mut errors);
    let password = read_field(payload, "password", mode, check_password, &mut errors);

    if errors.is_empty() {
        Ok(UserInput {
            name,
            email,
            password,
        })
    } else {
        Err(errors)
    }
}

fn read_field(
    payload: &Map<String, Value>,
    field: &'static str,
    mode: Mode,
    check: fn(&str) -> Result<(), String>,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match payload.get(field) {
        None | Some(Value::Null) => {
            if mode == Mode::Strict {
                errors.push(field, MISSING);
            }
            None
        }
        Some(Value::String(s)) => match check(s) {
            Ok(()) => Some(s.clone()),
            Err(msg) => {
                errors.push(field, msg);
                None
            }
        },
        Some(_) => {
            errors.push(field, "must be a string");
            None
        }
    }
}

pub fn check_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX {
        return Err(format!("must be between 1 and {NAME_MAX} characters"));
    }
    if name.contains('\0') {
        return Err(NUL.into());
    }
    Ok(())
}

pub fn check_email(email: &str) -> Result<(), String> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@]+@[^@]+\.[^@]+$").unwrap();
    }
    let len = email.chars().count();
    if len == 0 || len > EMAIL_MAX {
        return Err(format!("must be between 1 and {EMAIL_MAX} characters"));
    }
    if email.contains('\0') {
        return Err(NUL.into());
    }
    if !EMAIL_RE.is_match(email) {
        return Err("is not a valid email address".into());
    }
    Ok(())
}

pub fn check_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(format!(
            "must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        ));
    }
    Ok(())
}
