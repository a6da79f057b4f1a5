// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request field validation shared by the handlers.

use std::sync::LazyLock;

use regex::Regex;

use crate::auth::password::validate_password;
use crate::error::ApiError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid regex")
});

const FULL_NAME_MIN: usize = 3;
const FULL_NAME_MAX: usize = 255;

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() <= 254 && EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid email address"))
    }
}

pub fn validate_full_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if (FULL_NAME_MIN..=FULL_NAME_MAX).contains(&len) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "full name must be between {FULL_NAME_MIN} and {FULL_NAME_MAX} characters"
        )))
    }
}

/// Validate the fields of a new principal.
pub fn validate_new_user(full_name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    validate_full_name(full_name)?;
    validate_email(email)?;
    validate_password(password).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
