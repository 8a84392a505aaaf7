// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for configuration validation.

/// Errors raised synchronously while building configuration.
///
/// These are construction-time faults, never runtime faults of the cache or
/// the connection facade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two mutually exclusive options were both supplied.
    #[error("Options '{first}' and '{second}' cannot be used together")]
    ConflictingOptions {
        /// Name of the first option
        first: &'static str,
        /// Name of the second option
        second: &'static str,
    },

    /// An option was set to a value outside its accepted range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the option
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A required option was not supplied.
    #[error("Missing required option '{field}'")]
    MissingValue {
        /// Name of the option
        field: &'static str,
    },
}

impl ConfigError {
    /// Helper to create an `InvalidValue` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
