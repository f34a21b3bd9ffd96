/// Allowed drift of the summed validator percentages away from 100.
pub const PERCENTAGE_SUM_TOLERANCE: f64 = 0.01;

/// Percentages keep two decimal digits: 33.33% becomes 3333 basis points.
pub const PERCENT_SCALE: f64 = 100.0;
pub const MAX_PERCENTAGE: f64 = 100.0;
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;
pub const BASIS_POINT_EPSILON: f64 = 1e-6;

/// Solana caps instruction return data at this many bytes.
pub const MAX_RETURN_DATA_LEN: usize = 1_024;

// Cosmos SDK staking message types expected by the downstream signer
pub const MSG_DELEGATE_TYPE_URL: &str = "/cosmos.staking.v1beta1.MsgDelegate";
pub const MSG_BEGIN_REDELEGATE_TYPE_URL: &str = "/cosmos.staking.v1beta1.MsgBeginRedelegate";
pub const MSG_UNDELEGATE_TYPE_URL: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
