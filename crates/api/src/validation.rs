use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

pub fn validate<T: Validate>(value: &T) -> Result<(), ApiError> {
    value
        .validate()
        .map_err(|errors| ApiError::Validation(describe(&errors)))
}

/// `field: code` pairs in field order, e.g. `code: length, name: length`.
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let codes: Vec<String> = errors.iter().map(|error| error.code.to_string()).collect();
            format!("{field}: {}", codes.join("/"))
        })
        .collect();
    fields.sort();
    if fields.is_empty() {
        return "invalid request body".to_string();
    }
    format!("invalid fields: {}", fields.join(", "))
}
