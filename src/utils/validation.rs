use crate::utils::error::{Result, WsError};
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Staging paths are joined under the module directory or the staging root,
/// so they must stay relative and never climb out with `..`.
pub fn validate_relative_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;

    let p = Path::new(path);
    if p.is_absolute() {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path must be relative".to_string(),
        });
    }
    if p.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path must not contain '..'".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Debian source/binary package name rules.
pub fn validate_package_name(field_name: &str, name: &str) -> Result<()> {
    let invalid = |reason: &str| WsError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < 2 {
        return Err(invalid("Package name must be at least two characters long"));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(invalid("Package name must start with a lowercase letter or a digit"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.')))
    {
        return Err(invalid(&format!("Character '{}' is not allowed", c)));
    }
    Ok(())
}

pub fn validate_url_base(field_name: &str, url_base: &str) -> Result<()> {
    if !url_base.starts_with('/') {
        return Err(WsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_base.to_string(),
            reason: "URL base must start with '/'".to_string(),
        });
    }
    Ok(())
}
