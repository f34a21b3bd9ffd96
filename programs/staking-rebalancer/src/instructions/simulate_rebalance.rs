use anchor_lang::prelude::*;
use crate::state::*;
use crate::error::ErrorCode;
use crate::math::U256;
use super::compute_rebalance::{calculate_rebalance_operations, calculate_target_total_staked};

#[derive(Accounts)]
pub struct SimulateRebalance {}

pub fn simulate_rebalance(
    _ctx: Context<SimulateRebalance>,
    delegator_address: String,
    policy: RebalancePolicy,
) -> Result<RebalancePlan> {
    let plan = build_rebalance_plan(&delegator_address, &policy)?;
    ensure_fits_return_data(&plan)?;

    msg!(
        "Rebalance plan for {}: {} operations, redelegate={}, delegate={}, undelegate={}",
        delegator_address,
        plan.operations.len(),
        plan.total_redelegated,
        plan.total_delegated,
        plan.total_undelegated
    );

    Ok(plan)
}

/// Computes the operations and replays them against the current holdings to
/// report where the account ends up.
pub fn build_rebalance_plan(
    delegator_address: &str,
    policy: &RebalancePolicy,
) -> Result<RebalancePlan> {
    let operations = calculate_rebalance_operations(delegator_address, policy)?;
    let target_total_staked = calculate_target_total_staked(policy)?;

    let mut ledger = StakeLedger::from_policy(policy)?;
    ledger.apply_all(&operations)?;

    let mut total_redelegated = U256::zero();
    let mut total_delegated = U256::zero();
    let mut total_undelegated = U256::zero();
    for operation in &operations {
        let total = match operation {
            RebalanceOperation::Redelegate { .. } => &mut total_redelegated,
            RebalanceOperation::Delegate { .. } => &mut total_delegated,
            RebalanceOperation::Undelegate { .. } => &mut total_undelegated,
        };
        *total = total
            .checked_add(operation.amount()?)
            .ok_or(ErrorCode::BalanceOverflow)?;
    }

    Ok(RebalancePlan {
        operations,
        target_total_staked: target_total_staked.to_string(),
        projected_available_balance: ledger.available().to_string(),
        projected_delegations: ledger.into_delegations(),
        total_redelegated: total_redelegated.to_string(),
        total_delegated: total_delegated.to_string(),
        total_undelegated: total_undelegated.to_string(),
    })
}
