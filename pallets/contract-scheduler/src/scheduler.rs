use crate::{
  Config, ContractRuntime, Event, LOG_TARGET, Pallet, RegisteredContractOf, RegisteredContracts,
  SchedulerParams, WeightInfo,
  funding::Funding,
  types::{BlockReport, DeactivationReason, Gas, ScheduleOutcome, SkipReason},
};
use alloc::vec::Vec;
use frame::prelude::*;

impl<T: Config> Pallet<T> {
  /// One begin-block pass over the registry in priority order.
  ///
  /// A contract is admitted when its gas limit fits into the gas left in the
  /// block. A contract that does not fit is skipped and cheaper ones further
  /// down are still considered.
  pub fn execute_begin_block() -> BlockReport<T::AccountId> {
    let params = SchedulerParams::<T>::get();
    let mut report = BlockReport {
      outcomes: Vec::new(),
      gas_consumed: 0,
      hook_gas_outside_budget: 0,
    };
    if !params.is_execution_enabled {
      return report;
    }

    let mut remaining = params.max_begin_block_total_gas;
    for contract in Self::contracts_by_gas_price(params.min_gas_price) {
      let Some(record) = RegisteredContracts::<T>::get(&contract) else {
        continue;
      };
      let outcome = Self::schedule_contract(&contract, &record, &mut remaining, &mut report);
      report.outcomes.push((contract, outcome));
    }
    log::debug!(
      target: LOG_TARGET,
      "begin block: {} of {} contracts ran, {} gas used",
      report.ran(),
      report.outcomes.len(),
      report.gas_consumed,
    );
    report
  }

  fn schedule_contract(
    contract: &T::AccountId,
    record: &RegisteredContractOf<T>,
    remaining: &mut Gas,
    report: &mut BlockReport<T::AccountId>,
  ) -> ScheduleOutcome {
    if !record.is_executable {
      return ScheduleOutcome::SkippedInactive;
    }
    if T::ContractRuntime::code_id(contract) != Some(record.code_id) {
      Self::deposit_event(Event::ContractSkipped {
        contract: contract.clone(),
        reason: SkipReason::CodeIdMismatch,
      });
      return ScheduleOutcome::SkippedCodeIdMismatch;
    }
    if record.gas_limit > *remaining {
      Self::deposit_event(Event::ContractSkipped {
        contract: contract.clone(),
        reason: SkipReason::BudgetExhausted,
      });
      return ScheduleOutcome::SkippedBudget;
    }

    match Self::resolve_funding(contract, record, Self::reservation_for(record)) {
      Funding::Unfunded => {
        let hook_gas = Self::deactivate(contract, DeactivationReason::InsufficientFunds);
        report.hook_gas_outside_budget = report.hook_gas_outside_budget.saturating_add(hook_gas);
        ScheduleOutcome::SkippedUnfunded
      }
      Funding::Funded(reservation) => {
        let (outcome, gas) = Self::run_contract(contract, record, reservation);
        *remaining = remaining.saturating_sub(gas);
        report.gas_consumed = report.gas_consumed.saturating_add(gas);
        outcome
      }
    }
  }

  pub(crate) fn begin_block_weight(report: &BlockReport<T::AccountId>) -> Weight {
    let gas = report
      .gas_consumed
      .saturating_add(report.hook_gas_outside_budget);
    T::WeightInfo::begin_block(report.outcomes.len() as u32).saturating_add(Self::gas_weight(gas))
  }

  pub fn gas_weight(gas: Gas) -> Weight {
    T::WeightPerGas::get().saturating_mul(gas)
  }

  /// Upper bound on the weight of one deactivation hook, charged up front by
  /// calls that may run it.
  pub fn hook_weight_bound() -> Weight {
    Self::gas_weight(SchedulerParams::<T>::get().max_contract_gas_limit)
  }
}
