//! Registry store. The primary map and the gas-price priority index are only
//! ever written together, through `set_contract` and `delete_contract`.

use crate::{
  CodeReferences, Config, ContractsByGasPrice, Error, LOG_TARGET, Pallet, RegisteredContractOf,
  RegisteredContracts,
  types::{CodeId, GasPrice},
};
use alloc::vec::Vec;
use frame::prelude::*;

/// Big-endian `u64::MAX - gas_price`: ascending key order is descending price order.
/// Accounts sharing a key are not in `Ord` order on disk, see `iterate_by_gas_price`.
pub type PriorityKey = [u8; 8];

pub fn priority_key(gas_price: GasPrice) -> PriorityKey {
  (u64::MAX - gas_price).to_be_bytes()
}

pub fn gas_price_of(key: &PriorityKey) -> GasPrice {
  u64::MAX - u64::from_be_bytes(*key)
}

impl<T: Config> Pallet<T> {
  pub fn set_contract(contract: &T::AccountId, record: RegisteredContractOf<T>) {
    match RegisteredContracts::<T>::get(contract) {
      Some(previous) => {
        if previous.gas_price != record.gas_price {
          ContractsByGasPrice::<T>::remove(priority_key(previous.gas_price), contract);
        }
        if previous.code_id != record.code_id {
          Self::release_code_reference(previous.code_id);
          CodeReferences::<T>::mutate(record.code_id, |count| *count = count.saturating_add(1));
        }
      }
      None => CodeReferences::<T>::mutate(record.code_id, |count| *count = count.saturating_add(1)),
    }
    ContractsByGasPrice::<T>::insert(priority_key(record.gas_price), contract, ());
    RegisteredContracts::<T>::insert(contract, record);
  }

  pub fn delete_contract(contract: &T::AccountId) -> Option<RegisteredContractOf<T>> {
    let record = RegisteredContracts::<T>::take(contract)?;
    ContractsByGasPrice::<T>::remove(priority_key(record.gas_price), contract);
    Self::release_code_reference(record.code_id);
    Some(record)
  }

  fn release_code_reference(code_id: CodeId) {
    CodeReferences::<T>::mutate_exists(code_id, |count| {
      *count = count.map(|c| c.saturating_sub(1)).filter(|c| *c > 0);
    });
  }

  /// Flips `is_executable` and returns the updated record.
  pub(crate) fn set_executable(
    contract: &T::AccountId,
    is_executable: bool,
  ) -> Option<RegisteredContractOf<T>> {
    let mut record = RegisteredContracts::<T>::get(contract)?;
    record.is_executable = is_executable;
    Self::set_contract(contract, record.clone());
    Some(record)
  }

  /// Visits contracts by descending gas price, ties by ascending address, until
  /// `visit` returns `true` or the price drops below `min_price`.
  ///
  /// Raw key order within one price follows the account encoding, which need not
  /// agree with `Ord` (little-endian integers do not), so each price group is
  /// sorted before it is visited.
  pub fn iterate_by_gas_price(
    min_price: GasPrice,
    mut visit: impl FnMut(&T::AccountId, &RegisteredContractOf<T>) -> bool,
  ) {
    let mut group_key: Option<PriorityKey> = None;
    let mut group: Vec<T::AccountId> = Vec::new();
    for (key, contract) in ContractsByGasPrice::<T>::iter_keys() {
      if gas_price_of(&key) < min_price {
        break;
      }
      if group_key != Some(key) {
        if let Some(previous) = group_key.replace(key) {
          if Self::visit_price_group(&previous, &mut group, &mut visit) {
            return;
          }
        }
      }
      group.push(contract);
    }
    if let Some(last) = group_key {
      Self::visit_price_group(&last, &mut group, &mut visit);
    }
  }

  /// Returns `true` when `visit` asked to stop.
  fn visit_price_group(
    key: &PriorityKey,
    group: &mut Vec<T::AccountId>,
    visit: &mut impl FnMut(&T::AccountId, &RegisteredContractOf<T>) -> bool,
  ) -> bool {
    group.sort();
    for contract in group.drain(..) {
      let record = Self::indexed_record(key, &contract);
      if visit(&contract, &record) {
        return true;
      }
    }
    false
  }

  pub fn contracts_by_gas_price(min_price: GasPrice) -> Vec<T::AccountId> {
    let mut contracts = Vec::new();
    Self::iterate_by_gas_price(min_price, |contract, _| {
      contracts.push(contract.clone());
      false
    });
    contracts
  }

  // A diverged index means nodes may disagree on execution order: stop the block.
  fn indexed_record(key: &PriorityKey, contract: &T::AccountId) -> RegisteredContractOf<T> {
    match RegisteredContracts::<T>::get(contract) {
      Some(record) if priority_key(record.gas_price) == *key => record,
      _ => {
        log::error!(
          target: LOG_TARGET,
          "priority index entry at price {} for {:?} has no matching registration",
          gas_price_of(key),
          contract,
        );
        panic!("contract scheduler registry and priority index diverged");
      }
    }
  }

  /// Full registry in priority order.
  pub fn export_registry() -> Vec<(T::AccountId, RegisteredContractOf<T>)> {
    let mut entries = Vec::new();
    Self::iterate_by_gas_price(0, |contract, record| {
      entries.push((contract.clone(), record.clone()));
      false
    });
    entries
  }

  /// Fails on the first address that is already registered.
  pub fn import_registry(entries: &[(T::AccountId, RegisteredContractOf<T>)]) -> DispatchResult {
    for (contract, record) in entries {
      ensure!(
        !RegisteredContracts::<T>::contains_key(contract),
        Error::<T>::ContractAlreadyRegistered
      );
      Self::set_contract(contract, record.clone());
    }
    Ok(())
  }

  pub(crate) fn is_code_referenced(code_id: CodeId) -> bool {
    CodeReferences::<T>::contains_key(code_id)
  }

  #[cfg(any(feature = "try-runtime", test))]
  pub fn do_try_state() -> Result<(), DispatchError> {
    let mut indexed = 0usize;
    for (key, contract) in ContractsByGasPrice::<T>::iter_keys() {
      let record = RegisteredContracts::<T>::get(&contract)
        .ok_or(DispatchError::Other("Index entry without registration"))?;
      ensure!(
        priority_key(record.gas_price) == key,
        DispatchError::Other("Index entry under a stale gas price")
      );
      indexed += 1;
    }
    ensure!(
      RegisteredContracts::<T>::iter_keys().count() == indexed,
      DispatchError::Other("Registration missing from the priority index")
    );
    let mut counted = alloc::collections::BTreeMap::<CodeId, u32>::new();
    for record in RegisteredContracts::<T>::iter_values() {
      *counted.entry(record.code_id).or_default() += 1;
    }
    ensure!(
      CodeReferences::<T>::iter().collect::<alloc::collections::BTreeMap<_, _>>() == counted,
      DispatchError::Other("Code reference counts out of sync")
    );
    Ok(())
  }
}
