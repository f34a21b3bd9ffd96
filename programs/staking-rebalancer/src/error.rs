use anchor_lang::error::{AnchorError, Error};
use anchor_lang::prelude::*;

#[error_code]
pub enum ErrorCode {
    #[msg("Validator percentages must add up to 100%")]
    PercentageSumMismatch,


    #[msg("Validator listed more than once")]
    DuplicateValidator,

    #[msg("Amount is not a non-negative decimal integer")]
    InvalidAmount,

    #[msg("Balance calculation would overflow")]
    BalanceOverflow,

    #[msg("Insufficient balance for operation")]
    InsufficientBalance,

    #[msg("Result exceeds the 1024 byte return data limit")]
    ReturnDataTooLarge,
}

/// Percentage-sum failure carrying the computed total in its message.
pub fn percentage_sum_mismatch(total_percentage: f64) -> Error {
    let code = ErrorCode::PercentageSumMismatch;
    AnchorError {
        error_name: code.name(),
        error_code_number: code.into(),
        error_msg: format!(
            "Validator percentages must add up to 100%, got {}%",
            total_percentage.round() as i64
        ),
        error_origin: None,
        compared_values: None,
    }
    .into()
}
