//! Thin bridge from `garde`'s validation report to [`AppError::Validation`].

use garde::Validate;
use pos_core::AppError;

pub fn validated<T: Validate<Context = ()>>(value: T) -> Result<T, AppError> {
    value
        .validate()
        .map_err(|report| AppError::validation(report.to_string()))?;
    Ok(value)
}
