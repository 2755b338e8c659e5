//! Registration administration, the only writer of the registry outside of
//! begin-block deactivation.

use crate::{
  CodeUploadOf, Config, ContractRuntime, Error, Event, LOG_TARGET, Pallet, RegisteredContractOf,
  RegisteredContracts, RegistrationRequestOf, SchedulerParams,
  types::{
    CodeId, DeactivationReason, Gas, GasPrice, Params, RegisteredContract, RegistrationInfo,
  },
};
use alloc::collections::BTreeSet;
use frame::prelude::*;

impl<T: Config> Pallet<T> {
  pub fn contract_registration_info(
    contract: &T::AccountId,
  ) -> Option<RegistrationInfo<T::AccountId>> {
    RegisteredContracts::<T>::get(contract).map(|record| RegistrationInfo {
      contract: contract.clone(),
      gas_limit: record.gas_limit,
      gas_price: record.gas_price,
      is_executable: record.is_executable,
      funding_mode: record.funding_mode,
    })
  }

  /// The contract itself or the admin named in its registration.
  pub(crate) fn ensure_controller(
    who: &T::AccountId,
    contract: &T::AccountId,
  ) -> Result<RegisteredContractOf<T>, DispatchError> {
    let record = RegisteredContracts::<T>::get(contract).ok_or(Error::<T>::ContractNotRegistered)?;
    ensure!(
      who == contract || record.admin.as_ref() == Some(who),
      Error::<T>::NotContractController
    );
    Ok(record)
  }

  pub(crate) fn ensure_may_register(who: &T::AccountId, contract: &T::AccountId) -> DispatchResult {
    ensure!(
      who == contract || T::ContractRuntime::contract_admin(contract).as_ref() == Some(who),
      Error::<T>::NotContractController
    );
    Ok(())
  }

  pub(crate) fn validate_gas(params: &Params, gas_limit: Gas, gas_price: GasPrice) -> DispatchResult {
    ensure!(
      gas_limit > 0 && gas_limit <= params.max_contract_gas_limit,
      Error::<T>::InvalidGasLimit
    );
    ensure!(
      gas_price >= params.min_gas_price,
      Error::<T>::GasPriceTooLow
    );
    Ok(())
  }

  pub(crate) fn validate_registration(request: &RegistrationRequestOf<T>) -> DispatchResult {
    Self::validate_gas(
      &SchedulerParams::<T>::get(),
      request.gas_limit,
      request.gas_price,
    )?;
    let current_code_id =
      T::ContractRuntime::code_id(&request.contract).ok_or(Error::<T>::ContractNotFound)?;
    ensure!(
      T::ContractRuntime::code_exists(request.code_id),
      Error::<T>::CodeNotFound
    );
    ensure!(
      current_code_id == request.code_id,
      Error::<T>::CodeIdMismatch
    );
    ensure!(
      !RegisteredContracts::<T>::contains_key(&request.contract),
      Error::<T>::ContractAlreadyRegistered
    );
    Ok(())
  }

  fn apply_registration(request: &RegistrationRequestOf<T>) -> DispatchResult {
    if request.should_pin_contract {
      T::ContractRuntime::pin(request.code_id).map_err(|error| {
        log::warn!(
          target: LOG_TARGET,
          "pinning code {} for {:?} failed: {:?}",
          request.code_id,
          request.contract,
          error,
        );
        Error::<T>::PinFailed
      })?;
    }
    Self::set_contract(&request.contract, RegisteredContract::from_request(request));
    Self::deposit_event(Event::ContractRegistered {
      contract: request.contract.clone(),
      code_id: request.code_id,
      gas_limit: request.gas_limit,
      gas_price: request.gas_price,
    });
    Ok(())
  }

  pub(crate) fn do_register_contract(request: &RegistrationRequestOf<T>) -> DispatchResult {
    Self::validate_registration(request)?;
    Self::apply_registration(request)
  }

  pub(crate) fn do_register_batch(requests: &[RegistrationRequestOf<T>]) -> DispatchResult {
    ensure!(!requests.is_empty(), Error::<T>::EmptyBatch);
    Self::ensure_distinct(requests.iter().map(|request| &request.contract))?;
    for request in requests {
      Self::validate_registration(request)?;
    }
    for request in requests {
      Self::apply_registration(request)?;
    }
    Ok(())
  }

  fn ensure_distinct<'a>(contracts: impl Iterator<Item = &'a T::AccountId>) -> DispatchResult
  where
    T::AccountId: 'a,
  {
    let mut seen = BTreeSet::new();
    for contract in contracts {
      ensure!(seen.insert(contract), Error::<T>::DuplicateBatchEntry);
    }
    Ok(())
  }

  pub(crate) fn do_update_contract(
    who: &T::AccountId,
    contract: &T::AccountId,
    gas_limit: Gas,
    gas_price: GasPrice,
    admin: Option<T::AccountId>,
  ) -> DispatchResult {
    let mut record = Self::ensure_controller(who, contract)?;
    Self::validate_gas(&SchedulerParams::<T>::get(), gas_limit, gas_price)?;
    record.gas_limit = gas_limit;
    record.gas_price = gas_price;
    if admin.is_some() {
      record.admin = admin;
    }
    Self::set_contract(contract, record);
    Self::deposit_event(Event::ContractUpdated {
      contract: contract.clone(),
      gas_limit,
      gas_price,
    });
    Ok(())
  }

  pub(crate) fn do_activate_contract(who: &T::AccountId, contract: &T::AccountId) -> DispatchResult {
    let record = Self::ensure_controller(who, contract)?;
    ensure!(!record.is_executable, Error::<T>::ContractAlreadyActive);
    Self::set_executable(contract, true);
    Self::deposit_event(Event::ContractActivated {
      contract: contract.clone(),
    });
    Ok(())
  }

  /// Returns the gas burnt by the deactivation hook.
  pub(crate) fn do_deactivate_contract(
    who: &T::AccountId,
    contract: &T::AccountId,
  ) -> Result<Gas, DispatchError> {
    let record = Self::ensure_controller(who, contract)?;
    ensure!(record.is_executable, Error::<T>::ContractAlreadyInactive);
    Ok(Self::deactivate(contract, DeactivationReason::Manual))
  }

  /// Returns the hook gas, or `None` when nothing was registered under `contract`.
  pub(crate) fn do_deregister_contract(contract: &T::AccountId) -> Option<Gas> {
    let record = RegisteredContracts::<T>::get(contract)?;
    let hook_gas = if record.is_executable {
      Self::deactivate(contract, DeactivationReason::Deregistered)
    } else {
      0
    };
    Self::delete_contract(contract);
    Self::unpin_if_unreferenced(record.code_id);
    Self::deposit_event(Event::ContractDeregistered {
      contract: contract.clone(),
    });
    Some(hook_gas)
  }

  /// Returns the total hook gas of the batch.
  pub(crate) fn do_deregister_batch(contracts: &[T::AccountId]) -> Result<Gas, DispatchError> {
    ensure!(!contracts.is_empty(), Error::<T>::EmptyBatch);
    Self::ensure_distinct(contracts.iter())?;
    let mut hook_gas: Gas = 0;
    for contract in contracts {
      match Self::do_deregister_contract(contract) {
        Some(gas) => hook_gas = hook_gas.saturating_add(gas),
        None => log::debug!(
          target: LOG_TARGET,
          "deregistration of unknown contract {:?} skipped",
          contract,
        ),
      }
    }
    Ok(hook_gas)
  }

  fn unpin_if_unreferenced(code_id: CodeId) {
    if Self::is_code_referenced(code_id) {
      return;
    }
    if let Err(error) = T::ContractRuntime::unpin(code_id) {
      log::warn!(
        target: LOG_TARGET,
        "unpinning code {} failed: {:?}",
        code_id,
        error,
      );
    }
  }

  pub(crate) fn do_store_code_batch(uploads: &[CodeUploadOf<T>]) -> DispatchResult {
    ensure!(!uploads.is_empty(), Error::<T>::EmptyBatch);
    for upload in uploads {
      ensure!(upload.has_wasm_magic(), Error::<T>::InvalidWasmCode);
    }
    for upload in uploads {
      let code_id = T::ContractRuntime::store_code(&upload.run_as, upload.wasm.to_vec())?;
      if upload.pin {
        T::ContractRuntime::pin(code_id).map_err(|_| Error::<T>::PinFailed)?;
      }
      Self::deposit_event(Event::CodeStored {
        code_id,
        run_as: upload.run_as.clone(),
        pinned: upload.pin,
      });
    }
    Ok(())
  }
}
