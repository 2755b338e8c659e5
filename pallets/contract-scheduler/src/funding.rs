//! Funding resolution. A reservation is moved from exactly one source into the
//! pallet escrow, then charged to the fee sink and the rest returned.

use crate::{
  BalanceOf, Config, FeeAllowances, LOG_TARGET, LedgerOps, Pallet, RegisteredContractOf,
  types::{FundingMode, Gas, GasPrice, RESERVATION_MULTIPLIER},
};
use frame::prelude::*;
use polkadot_sdk::{
  frame_support::{storage::with_storage_layer, traits::Time},
  sp_runtime::traits::{SaturatedConversion, Zero},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FundingSource<AccountId> {
  /// The contract's own balance.
  Contract(AccountId),
  /// The granter's balance, drawn through its allowance to the grantee.
  Allowance { granter: AccountId, grantee: AccountId },
}

impl<AccountId> FundingSource<AccountId> {
  pub fn payer(&self) -> &AccountId {
    match self {
      FundingSource::Contract(contract) => contract,
      FundingSource::Allowance { granter, .. } => granter,
    }
  }
}

/// Funds sitting in escrow on behalf of `source`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reservation<AccountId, Balance> {
  pub source: FundingSource<AccountId>,
  pub held: Balance,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Funding<AccountId, Balance> {
  Funded(Reservation<AccountId, Balance>),
  Unfunded,
}

pub type ReservationOf<T> = Reservation<<T as frame_system::Config>::AccountId, BalanceOf<T>>;
pub type FundingOf<T> = Funding<<T as frame_system::Config>::AccountId, BalanceOf<T>>;

impl<T: Config> Pallet<T> {
  pub fn fee_for(gas: Gas, gas_price: GasPrice) -> BalanceOf<T> {
    u128::from(gas)
      .saturating_mul(u128::from(gas_price))
      .saturated_into()
  }

  /// Worst-case cost of one scheduled run, deactivation hook included.
  pub fn reservation_for(record: &RegisteredContractOf<T>) -> BalanceOf<T> {
    u128::from(record.gas_limit)
      .saturating_mul(u128::from(record.gas_price))
      .saturating_mul(RESERVATION_MULTIPLIER)
      .saturated_into()
  }

  /// Holds `required` from a single source chosen by the contract's funding mode.
  /// `Unfunded` leaves balances and allowances untouched.
  pub fn resolve_funding(
    contract: &T::AccountId,
    record: &RegisteredContractOf<T>,
    required: BalanceOf<T>,
  ) -> FundingOf<T> {
    let reservation = match &record.funding_mode {
      FundingMode::SelfFunded => Self::reserve_from_contract(contract, required),
      FundingMode::GrantOnly { granter } => Self::reserve_from_allowance(granter, contract, required),
      FundingMode::Dual { granter } => Self::reserve_from_contract(contract, required)
        .or_else(|| Self::reserve_from_allowance(granter, contract, required)),
    };
    match reservation {
      Some(reservation) => Funding::Funded(reservation),
      None => Funding::Unfunded,
    }
  }

  fn reserve_from_contract(
    contract: &T::AccountId,
    amount: BalanceOf<T>,
  ) -> Option<ReservationOf<T>> {
    if T::Ledger::balance(contract) < amount {
      return None;
    }
    Self::hold(FundingSource::Contract(contract.clone()), amount)
  }

  fn reserve_from_allowance(
    granter: &T::AccountId,
    grantee: &T::AccountId,
    amount: BalanceOf<T>,
  ) -> Option<ReservationOf<T>> {
    let allowance = T::Allowances::allowance(granter, grantee)?;
    if !allowance.covers(amount, T::Time::now()) {
      return None;
    }
    Self::hold(
      FundingSource::Allowance {
        granter: granter.clone(),
        grantee: grantee.clone(),
      },
      amount,
    )
  }

  fn hold(
    source: FundingSource<T::AccountId>,
    amount: BalanceOf<T>,
  ) -> Option<ReservationOf<T>> {
    let escrow = Self::account_id();
    let held = with_storage_layer(|| -> DispatchResult {
      if let FundingSource::Allowance { granter, grantee } = &source {
        T::Allowances::spend(granter, grantee, amount, T::Time::now())?;
      }
      T::Ledger::transfer(source.payer(), &escrow, amount)
    });
    match held {
      Ok(()) => Some(Reservation {
        source,
        held: amount,
      }),
      Err(error) => {
        log::debug!(
          target: LOG_TARGET,
          "could not hold {:?} from {:?}: {:?}",
          amount,
          source.payer(),
          error,
        );
        None
      }
    }
  }

  /// Pays the fee for `gas_used` out of the reservation. Never charges more than is held.
  pub(crate) fn charge_reservation(
    reservation: &mut ReservationOf<T>,
    gas_used: Gas,
    gas_price: GasPrice,
  ) -> BalanceOf<T> {
    let fee = Self::fee_for(gas_used, gas_price).min(reservation.held);
    if fee.is_zero() {
      return fee;
    }
    if let Err(error) = T::Ledger::transfer(&Self::account_id(), &T::FeeSink::get(), fee) {
      log::error!(
        target: LOG_TARGET,
        "fee of {:?} could not leave escrow: {:?}",
        fee,
        error,
      );
      return Zero::zero();
    }
    reservation.held = reservation.held.saturating_sub(fee);
    fee
  }

  /// Returns whatever is still held to the payer, mirroring it into the allowance.
  pub(crate) fn release_reservation(reservation: ReservationOf<T>) {
    let Reservation { source, held } = reservation;
    if held.is_zero() {
      return;
    }
    if let Err(error) = T::Ledger::transfer(&Self::account_id(), source.payer(), held) {
      log::error!(
        target: LOG_TARGET,
        "refund of {:?} to {:?} failed: {:?}",
        held,
        source.payer(),
        error,
      );
      return;
    }
    if let FundingSource::Allowance { granter, grantee } = &source {
      if let Err(error) = T::Allowances::restore(granter, grantee, held) {
        log::error!(
          target: LOG_TARGET,
          "allowance from {:?} to {:?} not restored by {:?}: {:?}",
          granter,
          grantee,
          held,
          error,
        );
      }
    }
  }
}
