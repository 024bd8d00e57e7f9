//! # Canary Types
//!
//! Options and errors shared by the canary token subsystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder substituted with the raw token inside a header template.
pub const CANARY_PLACEHOLDER: &str = "{canary}";

/// Default header template wrapped around every generated token.
pub const DEFAULT_HEADER: &str = "<-@!-- {canary} --@!->";

/// Default token length in hex characters (8 random bytes).
pub const DEFAULT_TOKEN_LENGTH: usize = 16;

/// Parameters for generating and embedding a canary token.
///
/// # Fields
///
/// - `length`: token length in hex characters; must be even and non-zero
/// - `always`: wrap the header in the "always include this token" frame
/// - `header`: template containing [`CANARY_PLACEHOLDER`]
///
/// # Example
///
/// ```rust
/// use vigil_canary::CanaryOptions;
///
/// let opts = CanaryOptions::default().with_always(true).with_length(32);
/// assert_eq!(opts.length, 32);
/// assert!(opts.always);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryOptions {
    /// Token length in hex characters.
    pub length: usize,
    /// Ask the model to always echo the token.
    pub always: bool,
    /// Header template containing `{canary}`.
    pub header: String,
}

impl Default for CanaryOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_TOKEN_LENGTH,
            always: false,
            header: DEFAULT_HEADER.to_string(),
        }
    }
}

impl CanaryOptions {
    /// Sets the token length.
    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Sets the always-include flag.
    #[must_use]
    pub fn with_always(mut self, always: bool) -> Self {
        self.always = always;
        self
    }

    /// Sets the header template.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Checks the options before any randomness is drawn.
    ///
    /// # Errors
    ///
    /// - [`CanaryError::InvalidLength`] if `length` is zero or odd
    /// - [`CanaryError::MissingPlaceholder`] if `header` lacks `{canary}`
    pub fn validate(&self) -> Result<(), CanaryError> {
        if self.length == 0 || self.length % 2 != 0 {
            return Err(CanaryError::InvalidLength(self.length));
        }
        if !self.header.contains(CANARY_PLACEHOLDER) {
            return Err(CanaryError::MissingPlaceholder(self.header.clone()));
        }
        Ok(())
    }
}

/// Errors raised while generating canary tokens.
///
/// Both variants are caller mistakes caught before a token is recorded, so a
/// failed `add` never leaves a token in the history.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanaryError {
    /// Token length must be a non-zero even number of hex characters.
    #[error("invalid canary length {0}: must be a non-zero even number")]
    InvalidLength(usize),

    /// Header template has nowhere to put the token.
    #[error("canary header template is missing the {{canary}} placeholder: {0:?}")]
    MissingPlaceholder(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_valid() {
        let opts = CanaryOptions::default();
        assert_eq!(opts.length, 16);
        assert!(!opts.always);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_odd_length_rejected() {
        let opts = CanaryOptions::default().with_length(7);
        assert_eq!(opts.validate(), Err(CanaryError::InvalidLength(7)));
    }

    #[test]
    fn test_zero_length_rejected() {
        let opts = CanaryOptions::default().with_length(0);
        assert_eq!(opts.validate(), Err(CanaryError::InvalidLength(0)));
    }

    #[test]
    fn test_header_without_placeholder_rejected() {
        let opts = CanaryOptions::default().with_header("no slot here");
        assert!(matches!(
            opts.validate(),
            Err(CanaryError::MissingPlaceholder(_))
        ));
    }

    #[test]
    fn test_options_deserialize_partial() {
        let opts: CanaryOptions = serde_json::from_str(r#"{"always": true}"#).unwrap();
        assert!(opts.always);
        assert_eq!(opts.length, DEFAULT_TOKEN_LENGTH);
        assert_eq!(opts.header, DEFAULT_HEADER);
    }
}
