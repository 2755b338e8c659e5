//! Adapter traits for the collaborators the scheduler drives but does not own:
//! the contract virtual machine, the balance ledger and the fee allowance store.

use crate::types::{CodeId, EntryPoint, Gas};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::traits::{AtLeast32BitUnsigned, Saturating};

/// Result of invoking one contract entry point.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvokeOutcome {
  pub gas_used: Gas,
  pub result: DispatchResult,
}

impl InvokeOutcome {
  pub fn ok(gas_used: Gas) -> Self {
    Self {
      gas_used,
      result: Ok(()),
    }
  }

  pub fn err(gas_used: Gas, error: DispatchError) -> Self {
    Self {
      gas_used,
      result: Err(error),
    }
  }
}

pub trait ContractRuntime<AccountId> {
  /// Current code id of an instantiated contract, `None` if no such contract exists.
  fn code_id(contract: &AccountId) -> Option<CodeId>;

  fn code_exists(code_id: CodeId) -> bool;

  /// Admin recorded by the virtual machine at instantiation.
  fn contract_admin(contract: &AccountId) -> Option<AccountId>;

  fn has_entry_point(contract: &AccountId, entry_point: EntryPoint) -> bool;

  /// Runs `entry_point` metering at most `gas_limit`. Storage effects are
  /// committed or discarded by the caller.
  fn invoke(contract: &AccountId, entry_point: EntryPoint, gas_limit: Gas) -> InvokeOutcome;

  fn store_code(run_as: &AccountId, wasm: Vec<u8>) -> Result<CodeId, DispatchError>;

  fn pin(code_id: CodeId) -> DispatchResult;

  fn unpin(code_id: CodeId) -> DispatchResult;
}

pub trait LedgerOps<AccountId, Balance> {
  fn balance(who: &AccountId) -> Balance;

  fn transfer(from: &AccountId, to: &AccountId, amount: Balance) -> DispatchResult;
}

/// A fee allowance as stored by the allowance primitive.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen)]
pub enum Allowance<Balance, Moment> {
  Basic {
    /// `None` means no cap.
    spend_limit: Option<Balance>,
    expiration: Option<Moment>,
  },
  Periodic {
    spend_limit: Option<Balance>,
    expiration: Option<Moment>,
    period: Moment,
    period_spend_limit: Balance,
    period_can_spend: Balance,
    period_reset: Moment,
  },
}

impl<Balance, Moment> Allowance<Balance, Moment>
where
  Balance: AtLeast32BitUnsigned + Copy,
  Moment: Ord + Copy + Saturating,
{
  pub fn is_expired_at(&self, now: Moment) -> bool {
    let expiration = match self {
      Allowance::Basic { expiration, .. } | Allowance::Periodic { expiration, .. } => expiration,
    };
    expiration.is_some_and(|expiration| expiration < now)
  }

  /// Amount spendable at `now`, `None` when uncapped.
  pub fn spendable_at(&self, now: Moment) -> Option<Balance> {
    match self {
      Allowance::Basic { spend_limit, .. } => *spend_limit,
      Allowance::Periodic {
        spend_limit,
        period_spend_limit,
        period_can_spend,
        period_reset,
        ..
      } => {
        let in_period = if now >= *period_reset {
          match spend_limit {
            Some(limit) => (*period_spend_limit).min(*limit),
            None => *period_spend_limit,
          }
        } else {
          *period_can_spend
        };
        Some(match spend_limit {
          Some(limit) => in_period.min(*limit),
          None => in_period,
        })
      }
    }
  }

  /// Whether `amount` can be drawn at `now`.
  pub fn covers(&self, amount: Balance, now: Moment) -> bool {
    if self.is_expired_at(now) {
      return false;
    }
    self.spendable_at(now).is_none_or(|spendable| spendable >= amount)
  }

  /// Applies a spend the way the allowance primitive does, rolling the period forward first.
  pub fn spend(&mut self, amount: Balance, now: Moment) -> Result<(), DispatchError> {
    if !self.covers(amount, now) {
      return Err(DispatchError::Other("AllowanceExceeded"));
    }
    match self {
      Allowance::Basic { spend_limit, .. } => {
        if let Some(limit) = spend_limit {
          *limit = limit.saturating_sub(amount);
        }
      }
      Allowance::Periodic {
        spend_limit,
        period,
        period_spend_limit,
        period_can_spend,
        period_reset,
        ..
      } => {
        if now >= *period_reset {
          *period_can_spend = match spend_limit {
            Some(limit) => (*period_spend_limit).min(*limit),
            None => *period_spend_limit,
          };
          *period_reset = now.saturating_add(*period);
        }
        *period_can_spend = period_can_spend.saturating_sub(amount);
        if let Some(limit) = spend_limit {
          *limit = limit.saturating_sub(amount);
        }
      }
    }
    Ok(())
  }

  /// Gives back an unused part of an earlier spend.
  pub fn restore(&mut self, amount: Balance) {
    match self {
      Allowance::Basic { spend_limit, .. } => {
        if let Some(limit) = spend_limit {
          *limit = limit.saturating_add(amount);
        }
      }
      Allowance::Periodic {
        spend_limit,
        period_spend_limit,
        period_can_spend,
        ..
      } => {
        *period_can_spend = period_can_spend
          .saturating_add(amount)
          .min(*period_spend_limit);
        if let Some(limit) = spend_limit {
          *limit = limit.saturating_add(amount);
        }
      }
    }
  }
}

pub trait FeeAllowances<AccountId, Balance, Moment> {
  fn allowance(granter: &AccountId, grantee: &AccountId) -> Option<Allowance<Balance, Moment>>;

  /// Atomic check-and-debit that keeps expiry and period bookkeeping consistent.
  fn spend(granter: &AccountId, grantee: &AccountId, amount: Balance, now: Moment)
  -> DispatchResult;

  /// Returns an unused part of an earlier spend to the allowance.
  fn restore(granter: &AccountId, grantee: &AccountId, amount: Balance) -> DispatchResult;
}

impl<AccountId> ContractRuntime<AccountId> for () {
  fn code_id(_contract: &AccountId) -> Option<CodeId> {
    None
  }
  fn code_exists(_code_id: CodeId) -> bool {
    false
  }
  fn contract_admin(_contract: &AccountId) -> Option<AccountId> {
    None
  }
  fn has_entry_point(_contract: &AccountId, _entry_point: EntryPoint) -> bool {
    false
  }
  fn invoke(_contract: &AccountId, _entry_point: EntryPoint, _gas_limit: Gas) -> InvokeOutcome {
    InvokeOutcome::err(0, DispatchError::Other("NoContractRuntime"))
  }
  fn store_code(_run_as: &AccountId, _wasm: Vec<u8>) -> Result<CodeId, DispatchError> {
    Err(DispatchError::Other("NoContractRuntime"))
  }
  fn pin(_code_id: CodeId) -> DispatchResult {
    Err(DispatchError::Other("NoContractRuntime"))
  }
  fn unpin(_code_id: CodeId) -> DispatchResult {
    Err(DispatchError::Other("NoContractRuntime"))
  }
}

impl<AccountId, Balance: Default> LedgerOps<AccountId, Balance> for () {
  fn balance(_who: &AccountId) -> Balance {
    Balance::default()
  }
  fn transfer(_from: &AccountId, _to: &AccountId, _amount: Balance) -> DispatchResult {
    Err(DispatchError::Other("NoLedger"))
  }
}

impl<AccountId, Balance, Moment> FeeAllowances<AccountId, Balance, Moment> for () {
  fn allowance(_granter: &AccountId, _grantee: &AccountId) -> Option<Allowance<Balance, Moment>> {
    None
  }
  fn spend(
    _granter: &AccountId,
    _grantee: &AccountId,
    _amount: Balance,
    _now: Moment,
  ) -> DispatchResult {
    Err(DispatchError::Other("NoAllowances"))
  }
  fn restore(_granter: &AccountId, _grantee: &AccountId, _amount: Balance) -> DispatchResult {
    Err(DispatchError::Other("NoAllowances"))
  }
}
