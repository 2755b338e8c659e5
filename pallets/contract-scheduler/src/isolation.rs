//! Execution isolation. Each entry point runs in its own savepoint; the fee for
//! metered gas is settled outside of it, so a discarded run is still paid for.

use crate::{
  Config, ContractRuntime, Event, LOG_TARGET, Pallet, RegisteredContractOf, SchedulerParams,
  funding::{Funding, ReservationOf},
  types::{DeactivationReason, EntryPoint, Gas, ScheduleOutcome},
};
use frame::prelude::*;
use polkadot_sdk::frame_support::storage::{TransactionOutcome, with_transaction};

pub enum Savepoint<R> {
  Commit(R),
  Discard(R),
}

/// Runs `f` in a fresh storage layer and keeps or drops its writes as `f` decides.
/// Fails only when the nesting limit of storage layers is reached.
pub fn within_savepoint<R>(f: impl FnOnce() -> Savepoint<R>) -> Result<R, DispatchError> {
  with_transaction(|| match f() {
    Savepoint::Commit(value) => TransactionOutcome::Commit(Ok(value)),
    Savepoint::Discard(value) => TransactionOutcome::Rollback(Ok(value)),
  })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionReport {
  pub gas_used: Gas,
  pub result: DispatchResult,
}

impl<T: Config> Pallet<T> {
  pub fn execute_isolated(
    contract: &T::AccountId,
    entry_point: EntryPoint,
    gas_limit: Gas,
  ) -> ExecutionReport {
    within_savepoint(|| {
      let outcome = T::ContractRuntime::invoke(contract, entry_point, gas_limit);
      let report = ExecutionReport {
        gas_used: outcome.gas_used.min(gas_limit),
        result: outcome.result,
      };
      if report.result.is_ok() {
        Savepoint::Commit(report)
      } else {
        Savepoint::Discard(report)
      }
    })
    .unwrap_or_else(|error| ExecutionReport {
      gas_used: 0,
      result: Err(error),
    })
  }

  /// Runs the periodic entry point against a held reservation. Returns the
  /// outcome and the gas of every step, follow-up hook included.
  pub(crate) fn run_contract(
    contract: &T::AccountId,
    record: &RegisteredContractOf<T>,
    mut reservation: ReservationOf<T>,
  ) -> (ScheduleOutcome, Gas) {
    let report = Self::execute_isolated(contract, EntryPoint::Periodic, record.gas_limit);
    let fee = Self::charge_reservation(&mut reservation, report.gas_used, record.gas_price);
    let payer = reservation.source.payer().clone();
    Self::release_reservation(reservation);

    match report.result {
      Ok(()) => {
        Self::deposit_event(Event::ContractExecuted {
          contract: contract.clone(),
          gas_used: report.gas_used,
          fee,
          payer,
        });
        (ScheduleOutcome::Ran, report.gas_used)
      }
      Err(error) => {
        log::debug!(
          target: LOG_TARGET,
          "contract {:?} failed after {} gas: {:?}",
          contract,
          report.gas_used,
          error,
        );
        Self::deposit_event(Event::ContractExecutionFailed {
          contract: contract.clone(),
          gas_used: report.gas_used,
          fee,
          payer,
          error,
        });
        let hook_gas = Self::deactivate(contract, DeactivationReason::ExecutionFailed);
        (
          ScheduleOutcome::RanThenDeactivated,
          report.gas_used.saturating_add(hook_gas),
        )
      }
    }
  }

  /// Marks the contract non-executable and runs its deactivation hook. Returns the hook's gas.
  pub(crate) fn deactivate(contract: &T::AccountId, reason: DeactivationReason) -> Gas {
    let Some(record) = Self::set_executable(contract, false) else {
      return 0;
    };
    Self::deposit_event(Event::ContractDeactivated {
      contract: contract.clone(),
      reason,
    });
    Self::run_deactivation_hook(contract, &record)
  }

  /// Funded like a run but for a single `gas_limit`, capped at the current
  /// `max_contract_gas_limit`. Failures are logged and swallowed.
  pub(crate) fn run_deactivation_hook(
    contract: &T::AccountId,
    record: &RegisteredContractOf<T>,
  ) -> Gas {
    if !T::ContractRuntime::has_entry_point(contract, EntryPoint::Deactivate) {
      return 0;
    }
    let gas_limit = record
      .gas_limit
      .min(SchedulerParams::<T>::get().max_contract_gas_limit);
    let required = Self::fee_for(gas_limit, record.gas_price);
    let Funding::Funded(mut reservation) = Self::resolve_funding(contract, record, required) else {
      log::debug!(
        target: LOG_TARGET,
        "deactivation hook of {:?} skipped, no funds",
        contract,
      );
      return 0;
    };

    let report = Self::execute_isolated(contract, EntryPoint::Deactivate, gas_limit);
    let fee = Self::charge_reservation(&mut reservation, report.gas_used, record.gas_price);
    Self::release_reservation(reservation);

    if let Err(error) = report.result {
      log::warn!(
        target: LOG_TARGET,
        "deactivation hook of {:?} failed: {:?}",
        contract,
        error,
      );
    }
    Self::deposit_event(Event::DeactivationHookExecuted {
      contract: contract.clone(),
      gas_used: report.gas_used,
      fee,
      succeeded: report.result.is_ok(),
    });
    report.gas_used
  }
}
