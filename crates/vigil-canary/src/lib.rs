//! # Vigil Canary - Prompt Leakage Tripwires
//!
//! Generates unguessable canary tokens, embeds them in prompts, and tests
//! text for their presence later on.
//!
//! ## Purpose
//!
//! A canary is planted in a prompt before it is sent to a model. Two things
//! can then be observed on the way back:
//!
//! 1. **Leakage** - the token shows up somewhere it should not (another
//!    user's response, a tool call argument, a log line).
//! 2. **Goal hijacking** - the model was told to always echo the token
//!    (`always` mode) but the response does not contain it.
//!
//! ## Usage
//!
//! ```rust
//! use vigil_canary::{CanaryOptions, CanaryTokens};
//!
//! let canaries = CanaryTokens::new();
//! let prompt = canaries
//!     .add("You are a helpful assistant.", &CanaryOptions::default().with_always(true))
//!     .unwrap();
//!
//! // ... send `prompt` to the model, receive `response` ...
//! let response = "Sure, here is the answer.";
//! if !canaries.check(response) {
//!     println!("model dropped the canary: possible goal hijacking");
//! }
//! ```

pub mod canary;
pub mod models;

pub use canary::{generate, CanaryTokens};
pub use models::{CanaryError, CanaryOptions, DEFAULT_HEADER, DEFAULT_TOKEN_LENGTH};

/// Result type for canary operations.
pub type Result<T> = std::result::Result<T, CanaryError>;
