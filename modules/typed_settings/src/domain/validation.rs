//! Validation and normalization of group names, namespaces and setting names

use crate::contract::SettingsError;
use heck::ToSnakeCase;

/// Validate a settings group name
///
/// A group must contain at least one non-whitespace character.
pub fn validate_group(group: &str) -> Result<(), SettingsError> {
    if group.trim().is_empty() {
        return Err(SettingsError::MissingGroup);
    }

    Ok(())
}

/// Normalize a namespace (Rust module path)
///
/// Surrounding whitespace and leading or trailing `::` separators are removed,
/// so `"::app::settings::"` and `"app::settings"` name the same namespace.
pub fn normalize_namespace(namespace: &str) -> String {
    namespace
        .trim()
        .trim_start_matches("::")
        .trim_end_matches("::")
        .to_string()
}

/// Normalize a setting name declared by a migration blueprint
pub fn setting_name(name: &str) -> String {
    name.trim().to_snake_case()
}
