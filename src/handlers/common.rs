use axum::{http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::{errors::ServiceError, ApiResponse};

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Rejects negative money amounts.
pub fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("amount cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects blank strings after trimming.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_validator() {
        assert!(non_negative_amount(&dec!(0)).is_ok());
        assert!(non_negative_amount(&dec!(12.50)).is_ok());
        assert!(non_negative_amount(&dec!(-0.01)).is_err());
    }

    #[test]
    fn blank_validator() {
        assert!(not_blank("P").is_ok());
        assert!(not_blank("   ").is_err());
    }
}
