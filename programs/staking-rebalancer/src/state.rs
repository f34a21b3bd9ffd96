use anchor_lang::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use crate::constants::*;
use crate::error::{percentage_sum_mismatch, ErrorCode};
use crate::math::{checked_sum, parse_amount, U256};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq)]
pub struct ValidatorTarget {
    pub validator_address: String,          // Validator operator address
    pub percentage: f64,                    // Share of the staked total, 0-100
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct CurrentDelegation {
    pub validator_address: String,
    pub amount: String,                     // Base denom units, decimal
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq)]
pub struct RebalancePolicy {
    pub validator_targets: Vec<ValidatorTarget>,
    pub preferred_staked_percentage: f64,   // Share of total holdings to keep staked, 0-100
    pub current_delegations: Vec<CurrentDelegation>,
    pub available_balance: String,          // Unstaked base denom units, decimal
    pub denom: String,                      // e.g. "uatone"
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// A single stake movement for the signing layer to submit.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RebalanceOperation {
    Delegate {
        delegator_address: String,
        validator_address: String,
        amount: Coin,
    },
    Redelegate {
        delegator_address: String,
        validator_src_address: String,
        validator_dst_address: String,
        amount: Coin,
    },
    Undelegate {
        delegator_address: String,
        validator_address: String,
        amount: Coin,
    },
}

/// Operations plus the account state they lead to.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq)]
pub struct RebalancePlan {
    pub operations: Vec<RebalanceOperation>,
    pub target_total_staked: String,
    pub projected_delegations: Vec<CurrentDelegation>,
    pub projected_available_balance: String,
    pub total_redelegated: String,
    pub total_delegated: String,
    pub total_undelegated: String,
}

impl RebalancePolicy {
    /// Rejects target sets that do not add up to 100%. An empty target set
    /// means "exit every validator" and is accepted as is. Individual shares
    /// are not range-checked; out-of-range values clamp when converted.
    pub fn validate_target_percentages(&self) -> Result<()> {
        if self.validator_targets.is_empty() {
            return Ok(());
        }

        let total_percentage: f64 = self
            .validator_targets
            .iter()
            .map(|vt| vt.percentage)
            .sum();
        // written so that a NaN total fails too
        if !((total_percentage - MAX_PERCENTAGE).abs() <= PERCENTAGE_SUM_TOLERANCE) {
            msg!("Rejected target policy: percentages sum to {}", total_percentage);
            return Err(percentage_sum_mismatch(total_percentage));
        }
        Ok(())
    }

    /// A validator may hold only one current delegation entry.
    pub fn validate_unique_delegations(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for delegation in &self.current_delegations {
            require!(
                seen.insert(delegation.validator_address.as_str()),
                ErrorCode::DuplicateValidator
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_target_percentages()?;
        self.validate_unique_delegations()
    }

    /// Targets with repeated validators collapsed: each validator keeps the
    /// position of its first entry and the percentage of its last.
    pub fn resolved_targets(&self) -> Vec<ValidatorTarget> {
        let mut resolved: Vec<ValidatorTarget> = Vec::with_capacity(self.validator_targets.len());
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for target in &self.validator_targets {
            match positions.get(target.validator_address.as_str()) {
                Some(&index) => resolved[index].percentage = target.percentage,
                None => {
                    positions.insert(target.validator_address.as_str(), resolved.len());
                    resolved.push(target.clone());
                }
            }
        }
        resolved
    }
}

/// Fails when `value` would not fit in Solana instruction return data.
pub fn ensure_fits_return_data<T: AnchorSerialize>(value: &T) -> Result<usize> {
    let mut encoded = Vec::new();
    value
        .serialize(&mut encoded)
        .map_err(|_| error!(ErrorCode::ReturnDataTooLarge))?;
    if encoded.len() > MAX_RETURN_DATA_LEN {
        msg!("Return data of {} bytes exceeds {}", encoded.len(), MAX_RETURN_DATA_LEN);
        return err!(ErrorCode::ReturnDataTooLarge);
    }
    Ok(encoded.len())
}

impl Coin {
    pub fn new(denom: &str, amount: U256) -> Self {
        Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }
}

impl RebalanceOperation {
    pub fn type_url(&self) -> &'static str {
        match self {
            RebalanceOperation::Delegate { .. } => MSG_DELEGATE_TYPE_URL,
            RebalanceOperation::Redelegate { .. } => MSG_BEGIN_REDELEGATE_TYPE_URL,
            RebalanceOperation::Undelegate { .. } => MSG_UNDELEGATE_TYPE_URL,
        }
    }

    pub fn coin(&self) -> &Coin {
        match self {
            RebalanceOperation::Delegate { amount, .. }
            | RebalanceOperation::Redelegate { amount, .. }
            | RebalanceOperation::Undelegate { amount, .. } => amount,
        }
    }

    pub fn amount(&self) -> Result<U256> {
        parse_amount(&self.coin().amount)
    }
}

/// In-memory view of a delegator account: stake per validator plus the
/// unstaked balance. Undelegated funds are credited immediately; the chain's
/// unbonding period is not modelled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StakeLedger {
    delegations: BTreeMap<String, U256>,
    available: U256,
}

impl StakeLedger {
    pub fn new(available: U256) -> Self {
        StakeLedger {
            delegations: BTreeMap::new(),
            available,
        }
    }

    pub fn from_policy(policy: &RebalancePolicy) -> Result<Self> {
        let mut ledger = StakeLedger::new(parse_amount(&policy.available_balance)?);
        for delegation in &policy.current_delegations {
            let amount = parse_amount(&delegation.amount)?;
            ledger.credit(&delegation.validator_address, amount)?;
        }
        Ok(ledger)
    }

    pub fn available(&self) -> U256 {
        self.available
    }

    pub fn delegation(&self, validator_address: &str) -> U256 {
        self.delegations
            .get(validator_address)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_staked(&self) -> Result<U256> {
        checked_sum(self.delegations.values().copied())
    }

    pub fn apply(&mut self, operation: &RebalanceOperation) -> Result<()> {
        let amount = operation.amount()?;
        match operation {
            RebalanceOperation::Delegate { validator_address, .. } => {
                self.available = self
                    .available
                    .checked_sub(amount)
                    .ok_or(ErrorCode::InsufficientBalance)?;
                self.credit(validator_address, amount)
            }
            RebalanceOperation::Redelegate {
                validator_src_address,
                validator_dst_address,
                ..
            } => {
                self.debit(validator_src_address, amount)?;
                self.credit(validator_dst_address, amount)
            }
            RebalanceOperation::Undelegate { validator_address, .. } => {
                self.debit(validator_address, amount)?;
                self.available = self
                    .available
                    .checked_add(amount)
                    .ok_or(ErrorCode::BalanceOverflow)?;
                Ok(())
            }
        }
    }

    pub fn apply_all(&mut self, operations: &[RebalanceOperation]) -> Result<()> {
        operations.iter().try_for_each(|op| self.apply(op))
    }

    /// Non-zero delegations, ordered by validator address.
    pub fn into_delegations(self) -> Vec<CurrentDelegation> {
        self.delegations
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(validator_address, amount)| CurrentDelegation {
                validator_address,
                amount: amount.to_string(),
            })
            .collect()
    }

    fn credit(&mut self, validator_address: &str, amount: U256) -> Result<()> {
        let entry = self
            .delegations
            .entry(validator_address.to_string())
            .or_default();
        *entry = entry.checked_add(amount).ok_or(ErrorCode::BalanceOverflow)?;
        Ok(())
    }

    fn debit(&mut self, validator_address: &str, amount: U256) -> Result<()> {
        let entry = self
            .delegations
            .get_mut(validator_address)
            .ok_or(ErrorCode::InsufficientBalance)?;
        *entry = entry
            .checked_sub(amount)
            .ok_or(ErrorCode::InsufficientBalance)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::error::Error;

    fn code_of(err: &Error) -> Option<u32> {
        match err {
            Error::AnchorError(e) => Some(e.error_code_number),
            _ => None,
        }
    }

    fn policy(targets: &[(&str, f64)], delegations: &[(&str, &str)]) -> RebalancePolicy {
        RebalancePolicy {
            validator_targets: targets
                .iter()
                .map(|(v, p)| ValidatorTarget {
                    validator_address: v.to_string(),
                    percentage: *p,
                })
                .collect(),
            preferred_staked_percentage: 100.0,
            current_delegations: delegations
                .iter()
                .map(|(v, a)| CurrentDelegation {
                    validator_address: v.to_string(),
                    amount: a.to_string(),
                })
                .collect(),
            available_balance: "0".to_string(),
            denom: "uatone".to_string(),
        }
    }

    fn coin(amount: u64) -> Coin {
        Coin::new("uatone", U256::from(amount))
    }

    #[test]
    fn percentage_sum_error_names_the_total() {
        let err = policy(&[("val1", 50.0), ("val2", 40.0)], &[])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("got 90%"), "{err}");

        let err = policy(&[("val1", 60.0), ("val2", 50.0)], &[])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("got 110%"), "{err}");
    }

    #[test]
    fn sum_within_tolerance_is_accepted() {
        assert!(policy(&[("val1", 33.33), ("val2", 33.33), ("val3", 33.34)], &[])
            .validate()
            .is_ok());
        assert!(policy(&[("val1", 50.0), ("val2", 50.005)], &[]).validate().is_ok());
        assert!(policy(&[], &[("val1", "10")]).validate().is_ok());
    }

    #[test]
    fn shares_are_not_range_checked_beyond_the_sum() {
        assert!(policy(&[("val1", 100.005)], &[]).validate().is_ok());
        assert!(policy(&[("val1", -20.0), ("val2", 120.0)], &[]).validate().is_ok());

        let mut staked_fraction = policy(&[("val1", 100.0)], &[]);
        staked_fraction.preferred_staked_percentage = 150.0;
        assert!(staked_fraction.validate().is_ok());
    }

    #[test]
    fn nan_percentage_sum_is_a_mismatch() {
        let err = policy(&[("val1", f64::NAN)], &[]).validate().unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::PercentageSumMismatch.into()));
    }

    #[test]
    fn repeated_targets_resolve_last_write_wins() {
        let repeated = policy(&[("val1", 50.0), ("val1", 50.0)], &[]);
        assert!(repeated.validate().is_ok());
        assert_eq!(
            repeated.resolved_targets(),
            vec![ValidatorTarget { validator_address: "val1".into(), percentage: 50.0 }]
        );

        let reordered = policy(&[("val1", 60.0), ("val2", 40.0), ("val1", 0.0)], &[]);
        assert_eq!(
            reordered.resolved_targets(),
            vec![
                ValidatorTarget { validator_address: "val1".into(), percentage: 0.0 },
                ValidatorTarget { validator_address: "val2".into(), percentage: 40.0 },
            ]
        );
    }

    #[test]
    fn duplicate_current_delegations_are_rejected() {
        let err = policy(&[("val1", 100.0)], &[("val2", "1"), ("val2", "2")])
            .validate()
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::DuplicateValidator.into()));
    }

    #[test]
    fn return_data_guard_measures_borsh_size() {
        let small = vec![RebalanceOperation::Delegate {
            delegator_address: "atone1test".to_string(),
            validator_address: "val1".to_string(),
            amount: coin(5),
        }];
        assert!(ensure_fits_return_data(&small).unwrap() <= MAX_RETURN_DATA_LEN);

        let address = "atonevaloper1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq";
        let large: Vec<RebalanceOperation> = (0..12)
            .map(|i| RebalanceOperation::Redelegate {
                delegator_address: "atone1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq".to_string(),
                validator_src_address: format!("{address}{i}"),
                validator_dst_address: format!("{address}{i}"),
                amount: coin(166_666),
            })
            .collect();
        let err = ensure_fits_return_data(&large).unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::ReturnDataTooLarge.into()));
    }

    #[test]
    fn operations_report_their_message_type() {
        let delegate = RebalanceOperation::Delegate {
            delegator_address: "atone1test".to_string(),
            validator_address: "val1".to_string(),
            amount: coin(5),
        };
        assert_eq!(delegate.type_url(), "/cosmos.staking.v1beta1.MsgDelegate");
        assert_eq!(delegate.amount().unwrap(), U256::from(5u64));
    }

    #[test]
    fn ledger_applies_each_operation_kind() {
        let mut ledger =
            StakeLedger::from_policy(&policy(&[("val1", 100.0)], &[("val1", "100")])).unwrap();
        ledger.available = U256::from(50u64);

        ledger
            .apply_all(&[
                RebalanceOperation::Delegate {
                    delegator_address: "d".to_string(),
                    validator_address: "val2".to_string(),
                    amount: coin(50),
                },
                RebalanceOperation::Redelegate {
                    delegator_address: "d".to_string(),
                    validator_src_address: "val1".to_string(),
                    validator_dst_address: "val2".to_string(),
                    amount: coin(30),
                },
                RebalanceOperation::Undelegate {
                    delegator_address: "d".to_string(),
                    validator_address: "val1".to_string(),
                    amount: coin(70),
                },
            ])
            .unwrap();

        assert_eq!(ledger.delegation("val1"), U256::zero());
        assert_eq!(ledger.delegation("val2"), U256::from(80u64));
        assert_eq!(ledger.available(), U256::from(70u64));
        assert_eq!(ledger.total_staked().unwrap(), U256::from(80u64));
        assert_eq!(
            ledger.into_delegations(),
            vec![CurrentDelegation {
                validator_address: "val2".to_string(),
                amount: "80".to_string(),
            }]
        );
    }

    #[test]
    fn ledger_refuses_to_go_negative() {
        let mut ledger = StakeLedger::new(U256::from(10u64));
        let overdraw = RebalanceOperation::Delegate {
            delegator_address: "d".to_string(),
            validator_address: "val1".to_string(),
            amount: coin(11),
        };
        assert_eq!(
            code_of(&ledger.apply(&overdraw).unwrap_err()),
            Some(ErrorCode::InsufficientBalance.into())
        );

        let unknown_source = RebalanceOperation::Undelegate {
            delegator_address: "d".to_string(),
            validator_address: "val9".to_string(),
            amount: coin(1),
        };
        assert!(ledger.apply(&unknown_source).is_err());
    }
}
