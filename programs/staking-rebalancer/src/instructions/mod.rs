pub mod compute_rebalance;
pub mod simulate_rebalance;

pub use compute_rebalance::*;
pub use simulate_rebalance::*;
