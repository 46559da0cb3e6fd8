use super::{ErrorCode, ForgeError};
use std::path::PathBuf;

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> ForgeError {
        ForgeError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
    }

    pub fn missing_setting(name: &str, env_var: &str) -> ForgeError {
        ForgeError::config_with_code(
            ErrorCode::CONFIG_MISSING_REQUIRED,
            format!("'{}' is not set (set {} or add it to config.yml)", name, env_var),
        )
    }

    pub fn storage_io_error(path: Option<PathBuf>, operation: &str) -> ForgeError {
        ForgeError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            format!("Cache {} failed", operation),
            path,
        )
    }

    pub fn command_not_found(command: &str) -> ForgeError {
        ForgeError::execution_with_code(
            ErrorCode::EXEC_COMMAND_NOT_FOUND,
            format!("Command '{}' not found", command),
            Some(command.to_string()),
        )
    }

    pub fn session_not_found(session_id: &str) -> ForgeError {
        ForgeError::session_with_code(
            ErrorCode::SESSION_NOT_FOUND,
            format!("Session '{}' not found", session_id),
            Some(session_id.to_string()),
        )
    }

    pub fn required_field(field: &str) -> ForgeError {
        ForgeError::validation_with_code(
            ErrorCode::VALIDATION_REQUIRED_FIELD,
            format!("Required field '{}' has no value", field),
            Some(field.to_string()),
        )
    }
}
