use crate::models::ApiError;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Password policy: 8 to 128 characters with at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let length = password.chars().count();

    if length < PASSWORD_MIN_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LENGTH
        )));
    }

    if length > PASSWORD_MAX_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at most {} characters long",
            PASSWORD_MAX_LENGTH
        )));
    }

    if !password.chars().any(|c| c.is_alphabetic()) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(ApiError::Validation(
            "Password must contain at least one letter and one number".to_string(),
        ));
    }

    Ok(())
}

/// Lowercased, trimmed email or a validation error
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();

    if !validator::validate_email(email.as_str()) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    Ok(email)
}

/// Trimmed non-empty text or a validation error naming the field
pub fn required_text(value: Option<&str>, field: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::Validation(format!("{} is required", field))),
    }
}

/// Parse an optional price; blank input means "no price"
pub fn parse_price(value: Option<&str>, field: &str) -> Result<Option<f64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {} value: {}", field, raw))),
    }
}
