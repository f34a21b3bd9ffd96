use anchor_lang::prelude::*;
use std::collections::{HashMap, HashSet};
use crate::state::*;
use crate::error::ErrorCode;
use crate::math::{apply_basis_points, checked_sum, parse_amount, percentage_to_basis_points, U256};

#[derive(Accounts)]
pub struct ComputeRebalance {}

pub fn compute_rebalance(
    _ctx: Context<ComputeRebalance>,
    delegator_address: String,
    policy: RebalancePolicy,
) -> Result<Vec<RebalanceOperation>> {
    msg!(
        "Computing rebalance for {}: {} targets, {} current delegations",
        delegator_address,
        policy.validator_targets.len(),
        policy.current_delegations.len()
    );

    let operations = calculate_rebalance_operations(&delegator_address, &policy)?;
    let encoded_len = ensure_fits_return_data(&operations)?;

    msg!("Rebalance requires {} operations ({} bytes)", operations.len(), encoded_len);
    Ok(operations)
}

/// Stake a validator holds above (surplus) or below (deficit) its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeGap {
    pub validator_address: String,
    pub amount: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeGaps {
    pub surpluses: Vec<StakeGap>,
    pub deficits: Vec<StakeGap>,
}

/// Turns a target policy into the ordered stake movements that reach it.
///
/// Overstaked and exiting validators are paired with understaked ones as
/// redelegations first. Whatever surplus is left gets undelegated and
/// whatever deficit is left gets delegated from the available balance.
pub fn calculate_rebalance_operations(
    delegator_address: &str,
    policy: &RebalancePolicy,
) -> Result<Vec<RebalanceOperation>> {
    policy.validate()?;

    let target_total_staked = calculate_target_total_staked(policy)?;
    let targets = calculate_validator_targets(target_total_staked, &policy.resolved_targets())?;
    let gaps = calculate_stake_gaps(&targets, &policy.current_delegations)?;

    Ok(match_stake_gaps(delegator_address, &policy.denom, gaps))
}

/// Share of total holdings (staked plus available) that should end up staked.
pub fn calculate_target_total_staked(policy: &RebalancePolicy) -> Result<U256> {
    let current_amounts = policy
        .current_delegations
        .iter()
        .map(|d| parse_amount(&d.amount))
        .collect::<Result<Vec<_>>>()?;
    let total_current_staked = checked_sum(current_amounts)?;

    let total_balance = total_current_staked
        .checked_add(parse_amount(&policy.available_balance)?)
        .ok_or(ErrorCode::BalanceOverflow)?;

    let staked_bps = percentage_to_basis_points(policy.preferred_staked_percentage);
    apply_basis_points(total_balance, staked_bps)
}

/// Per-validator targets in declaration order. Each share truncates on its
/// own, so the sum can fall short of `target_total_staked` by fewer units
/// than there are validators; that slack is left unstaked.
pub fn calculate_validator_targets(
    target_total_staked: U256,
    validator_targets: &[ValidatorTarget],
) -> Result<Vec<StakeGap>> {
    validator_targets
        .iter()
        .map(|vt| {
            let bps = percentage_to_basis_points(vt.percentage);
            Ok(StakeGap {
                validator_address: vt.validator_address.clone(),
                amount: apply_basis_points(target_total_staked, bps)?,
            })
        })
        .collect()
}

/// Diffs targets against current delegations. Validators missing from the
/// targets are surplus in full.
pub fn calculate_stake_gaps(
    targets: &[StakeGap],
    current_delegations: &[CurrentDelegation],
) -> Result<StakeGaps> {
    let mut current = HashMap::with_capacity(current_delegations.len());
    for delegation in current_delegations {
        current.insert(
            delegation.validator_address.as_str(),
            parse_amount(&delegation.amount)?,
        );
    }

    let mut gaps = StakeGaps::default();

    for target in targets {
        let held = current
            .get(target.validator_address.as_str())
            .copied()
            .unwrap_or_default();

        if target.amount > held {
            gaps.deficits.push(StakeGap {
                validator_address: target.validator_address.clone(),
                amount: target.amount - held,
            });
        } else if held > target.amount {
            gaps.surpluses.push(StakeGap {
                validator_address: target.validator_address.clone(),
                amount: held - target.amount,
            });
        }
    }

    // EXITING VALIDATORS
    let targeted: HashSet<&str> = targets
        .iter()
        .map(|t| t.validator_address.as_str())
        .collect();
    for delegation in current_delegations {
        if targeted.contains(delegation.validator_address.as_str()) {
            continue;
        }

        let held = current[delegation.validator_address.as_str()];
        if !held.is_zero() {
            gaps.surpluses.push(StakeGap {
                validator_address: delegation.validator_address.clone(),
                amount: held,
            });
        }
    }

    Ok(gaps)
}

/// Greedy pairing of surpluses with deficits, both walked in their original
/// order. Never moves more than the current surplus entry still holds.
pub fn match_stake_gaps(
    delegator_address: &str,
    denom: &str,
    gaps: StakeGaps,
) -> Vec<RebalanceOperation> {
    let StakeGaps { mut surpluses, mut deficits } = gaps;
    let mut operations = Vec::new();
    let mut surplus_index = 0;
    let mut deficit_index = 0;

    // REDELEGATION PASS
    while surplus_index < surpluses.len() && deficit_index < deficits.len() {
        let surplus = &mut surpluses[surplus_index];
        let deficit = &mut deficits[deficit_index];
        let transfer = surplus.amount.min(deficit.amount);

        if !transfer.is_zero() {
            operations.push(RebalanceOperation::Redelegate {
                delegator_address: delegator_address.to_string(),
                validator_src_address: surplus.validator_address.clone(),
                validator_dst_address: deficit.validator_address.clone(),
                amount: Coin::new(denom, transfer),
            });
        }

        surplus.amount -= transfer;
        deficit.amount -= transfer;

        if surplus.amount.is_zero() {
            surplus_index += 1;
        }
        if deficit.amount.is_zero() {
            deficit_index += 1;
        }
    }

    // LEFTOVER SURPLUS GOES BACK TO THE AVAILABLE BALANCE
    for surplus in &surpluses[surplus_index..] {
        if !surplus.amount.is_zero() {
            operations.push(RebalanceOperation::Undelegate {
                delegator_address: delegator_address.to_string(),
                validator_address: surplus.validator_address.clone(),
                amount: Coin::new(denom, surplus.amount),
            });
        }
    }

    // LEFTOVER DEFICIT IS FUNDED FROM THE AVAILABLE BALANCE
    for deficit in &deficits[deficit_index..] {
        if !deficit.amount.is_zero() {
            operations.push(RebalanceOperation::Delegate {
                delegator_address: delegator_address.to_string(),
                validator_address: deficit.validator_address.clone(),
                amount: Coin::new(denom, deficit.amount),
            });
        }
    }

    operations
}
