//! # Validation Framework
//!
//! Field validation with built-in validators for common cases (email,
//! numbers, paths, choices) plus custom validators and multi-field form
//! validation.
//!
//! Validators return `Result<(), ValidationError>`; chains run every
//! validator and accumulate all failures into a [`ValidationResult`] so a
//! caller gets complete per-field feedback in one pass.
//!
//! ```
//! use validation::{ValidatorChain, RequiredValidator, LengthValidator};
//! use serde_json::json;
//!
//! let chain = ValidatorChain::new()
//!     .with(RequiredValidator::new())
//!     .with(LengthValidator::new(Some(3), Some(20)));
//!
//! let result = chain.validate(&json!("ab"), "username");
//! assert!(!result.is_valid);
//! ```

pub mod chain;
pub mod fields;
pub mod validators;

pub use chain::{FormValidator, ValidationResult, ValidatorChain};
pub use errors::ValidationError;
pub use fields::{
    choice_field, email_field, number_field, optional_email_field, optional_string, path_field,
    required_string,
};
pub use validators::{
    ChoiceValidator, CustomValidator, EmailValidator, LengthValidator, NumberValidator,
    PathValidator, RegexValidator, RequiredValidator, Validator,
};
