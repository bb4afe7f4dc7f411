// Validation utilities for string fields and the sign-in schema

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 32;

/// Trim an optional field, collapsing blank values to `None`
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Validate an email/password pair. Returns the first failing rule's message.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !validator::validate_email(email) {
        return Err("Invalid email".to_string());
    }

    let length = password.chars().count();
    if length == 0 {
        return Err("Password is required".to_string());
    }
    if length < PASSWORD_MIN_LENGTH {
        return Err("Password must be more than 8 characters".to_string());
    }
    if length > PASSWORD_MAX_LENGTH {
        return Err("Password must be less than 32 characters".to_string());
    }

    Ok(())
}

/// First human-readable message out of a derive-validated struct, ordered by field name
pub fn first_message(errors: &validator::ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by_key(|(name, _)| **name);

    fields
        .into_iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| (field, e)))
        .map(|(field, e)| match &e.message {
            Some(message) => message.to_string(),
            None => format!("Invalid {}", field),
        })
        .next()
        .unwrap_or_else(|| "Invalid request".to_string())
}
