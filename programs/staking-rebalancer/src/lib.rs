pub mod constants;
pub mod error;
pub mod math;
pub mod state;
pub mod instructions;

use anchor_lang::prelude::*;

pub use state::*;
pub use instructions::*;

declare_id!("5MJFr9FEqj4ixyykjtUwbEP6sQyXN9TBEGXieBkHQ6U9");

#[program]
pub mod staking_rebalancer {
    use super::*;

    pub fn compute_rebalance(
        ctx: Context<ComputeRebalance>,
        delegator_address: String,
        policy: RebalancePolicy,
    ) -> Result<Vec<RebalanceOperation>> {
        instructions::compute_rebalance(ctx, delegator_address, policy)
    }

    pub fn simulate_rebalance(
        ctx: Context<SimulateRebalance>,
        delegator_address: String,
        policy: RebalancePolicy,
    ) -> Result<RebalancePlan> {
        instructions::simulate_rebalance(ctx, delegator_address, policy)
    }
}
