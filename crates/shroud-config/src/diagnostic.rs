// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic error type for configuration failures, rendered via miette.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error suitable for terminal rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The TOML/env layer failed to parse or deserialize.
    #[error("failed to load configuration: {message}")]
    #[diagnostic(
        code(shroud::config::parse),
        help("check shroud.toml and SHROUD_* environment variables")
    )]
    Parse {
        /// Figment's description of the failure.
        message: String,
    },

    /// A semantic constraint on a config value was violated.
    #[error("validation error: {message}")]
    #[diagnostic(code(shroud::config::validation))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Render a list of configuration errors to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        eprintln!("{:?}", miette::Report::msg(error.to_string()));
    }
}
