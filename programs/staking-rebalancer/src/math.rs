use anchor_lang::prelude::*;
use crate::constants::*;
use crate::error::ErrorCode;

pub use wide::U256;

mod wide {
    uint::construct_uint! {
        /// Token amount in base denom units. Wide enough that summing every
        /// delegation of an account cannot realistically overflow.
        pub struct U256(4);
    }
}

/// Parses a base-unit amount such as `"1000000"`.
pub fn parse_amount(raw: &str) -> Result<U256> {
    require!(
        !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()),
        ErrorCode::InvalidAmount
    );
    U256::from_dec_str(raw).map_err(|_| error!(ErrorCode::InvalidAmount))
}

/// Converts a percentage into basis points, truncating past two decimals.
///
/// Values outside [0, 100] clamp to the nearest bound and NaN maps to zero.
/// A product that lands within float noise of a whole basis point (0.29 * 100
/// is 28.999999999999996) counts as that basis point.
pub fn percentage_to_basis_points(percentage: f64) -> u64 {
    let scaled = percentage * PERCENT_SCALE;
    let nearest = scaled.round();
    let basis_points = if (scaled - nearest).abs() < BASIS_POINT_EPSILON {
        nearest
    } else {
        scaled.floor()
    };
    // float -> int casts saturate and send NaN to 0
    (basis_points as u64).min(BASIS_POINTS_DENOMINATOR)
}

/// `amount * basis_points / 10_000`, truncating.
pub fn apply_basis_points(amount: U256, basis_points: u64) -> Result<U256> {
    let scaled = amount
        .checked_mul(U256::from(basis_points))
        .ok_or(ErrorCode::BalanceOverflow)?;
    Ok(scaled / U256::from(BASIS_POINTS_DENOMINATOR))
}

pub fn checked_sum<I>(amounts: I) -> Result<U256>
where
    I: IntoIterator<Item = U256>,
{
    amounts.into_iter().try_fold(U256::zero(), |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| error!(ErrorCode::BalanceOverflow))
    })
}
