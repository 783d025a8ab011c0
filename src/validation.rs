use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Flattens validator output into one line per failing field, ordered by
/// field name.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                let message = error
                    .message
                    .clone()
                    .unwrap_or_else(|| "Invalid value".into())
                    .to_string();
                (field.to_string(), message)
            })
        })
        .collect();

    messages.sort();
    messages
        .into_iter()
        .map(|(_, message)| message)
        .collect::<Vec<_>>()
        .join("\n")
}

pub trait ValidateExt: Sized {
    fn validate_form(self) -> Result<Self, AppError>;
}

impl<T: Validate> ValidateExt for T {
    fn validate_form(self) -> Result<Self, AppError> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(errors) => Err(AppError::Validation(describe(&errors))),
        }
    }
}
