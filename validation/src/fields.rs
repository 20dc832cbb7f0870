//! Prebuilt validator chains for common form fields.

use serde_json::Value;

use crate::chain::ValidatorChain;
use crate::validators::{
    ChoiceValidator, EmailValidator, LengthValidator, NumberValidator, PathValidator,
    RequiredValidator,
};

/// Required string with optional length bounds.
pub fn required_string(min_length: Option<usize>, max_length: Option<usize>) -> ValidatorChain {
    let mut chain = ValidatorChain::new().with(RequiredValidator::new());
    if min_length.is_some() || max_length.is_some() {
        chain = chain.with(LengthValidator::new(min_length, max_length));
    }
    chain
}

/// Optional string; length bounds apply only when a value is present.
pub fn optional_string(max_length: Option<usize>) -> ValidatorChain {
    let mut chain = ValidatorChain::new();
    if max_length.is_some() {
        chain = chain.with(LengthValidator::new(None, max_length));
    }
    chain
}

/// Required, well-formed email address.
pub fn email_field() -> ValidatorChain {
    ValidatorChain::new()
        .with(RequiredValidator::new())
        .with(EmailValidator::new())
}

/// Email address that may be omitted but must be valid when given.
pub fn optional_email_field() -> ValidatorChain {
    ValidatorChain::new().with(EmailValidator::new())
}

/// Required number within an optional range.
pub fn number_field(min_value: Option<f64>, max_value: Option<f64>) -> ValidatorChain {
    ValidatorChain::new()
        .with(RequiredValidator::new())
        .with(NumberValidator::new(min_value, max_value))
}

/// Required filesystem path.
pub fn path_field(must_exist: bool, must_be_file: bool, must_be_dir: bool) -> ValidatorChain {
    ValidatorChain::new()
        .with(RequiredValidator::new())
        .with(PathValidator::new(must_exist, must_be_file, must_be_dir))
}

/// Required value drawn from a fixed set.
pub fn choice_field(choices: Vec<Value>) -> ValidatorChain {
    ValidatorChain::new()
        .with(RequiredValidator::new())
        .with(ChoiceValidator::new(choices))
}
