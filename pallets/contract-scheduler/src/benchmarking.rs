extern crate alloc;

use crate::*;
use alloc::{vec, vec::Vec};
use polkadot_sdk::frame_benchmarking::v2::*;
use polkadot_sdk::frame_support::{
  BoundedVec,
  traits::{Get, Hooks},
};
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::traits::SaturatedConversion;

const BENCH_CODE: CodeId = 1;
const BENCH_GAS_LIMIT: Gas = 100_000;

fn bench_request<T: Config>(contract: &T::AccountId) -> RegistrationRequestOf<T> {
  ContractRegistrationRequest {
    contract: contract.clone(),
    code_id: BENCH_CODE,
    gas_limit: BENCH_GAS_LIMIT,
    gas_price: SchedulerParams::<T>::get().min_gas_price,
    funding_mode: FundingMode::SelfFunded,
    admin: None,
    should_pin_contract: true,
  }
}

/// Instantiated and funded for many runs, not yet registered.
fn prepare_contract<T: Config>(index: u32) -> T::AccountId {
  let contract: T::AccountId = account("contract", index, 0);
  T::BenchmarkHelper::instantiate_contract(&contract, BENCH_CODE);
  let run_cost = u128::from(BENCH_GAS_LIMIT)
    .saturating_mul(u128::from(SchedulerParams::<T>::get().min_gas_price));
  T::BenchmarkHelper::fund(&contract, run_cost.saturating_mul(100).saturated_into());
  contract
}

fn registered_contract<T: Config>(index: u32) -> T::AccountId {
  let contract = prepare_contract::<T>(index);
  Pallet::<T>::do_register_contract(&bench_request::<T>(&contract))
    .expect("Failed to register contract");
  contract
}

fn wasm_upload<T: Config>(run_as: &T::AccountId) -> CodeUploadOf<T> {
  let mut wasm = vec![0u8; T::MaxCodeSize::get() as usize];
  assert!(
    wasm.len() >= WASM_MAGIC.len(),
    "MaxCodeSize must fit at least the wasm magic"
  );
  wasm[..WASM_MAGIC.len()].copy_from_slice(&WASM_MAGIC);
  CodeUpload {
    run_as: run_as.clone(),
    wasm: wasm.try_into().expect("Sized to the bound"),
    pin: true,
  }
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn register_contract() {
    let contract = prepare_contract::<T>(0);
    let request = bench_request::<T>(&contract);

    #[extrinsic_call]
    register_contract(RawOrigin::Signed(contract.clone()), request);

    assert!(RegisteredContracts::<T>::contains_key(&contract));
  }

  #[benchmark]
  fn update_contract() {
    let contract = registered_contract::<T>(0);
    let gas_price = SchedulerParams::<T>::get().min_gas_price.saturating_add(1);

    #[extrinsic_call]
    update_contract(
      RawOrigin::Signed(contract.clone()),
      contract.clone(),
      BENCH_GAS_LIMIT,
      gas_price,
      Some(whitelisted_caller()),
    );

    assert_eq!(Pallet::<T>::registered_contract(&contract).unwrap().gas_price, gas_price);
  }

  #[benchmark]
  fn activate_contract() {
    let contract = registered_contract::<T>(0);
    Pallet::<T>::set_executable(&contract, false);

    #[extrinsic_call]
    activate_contract(RawOrigin::Signed(contract.clone()), contract.clone());

    assert!(Pallet::<T>::registered_contract(&contract).unwrap().is_executable);
  }

  #[benchmark]
  fn deactivate_contract() {
    let contract = registered_contract::<T>(0);

    #[extrinsic_call]
    deactivate_contract(RawOrigin::Signed(contract.clone()), contract.clone());

    assert!(!Pallet::<T>::registered_contract(&contract).unwrap().is_executable);
  }

  #[benchmark]
  fn deregister_contract() {
    let contract = registered_contract::<T>(0);

    #[extrinsic_call]
    deregister_contract(RawOrigin::Signed(contract.clone()), contract.clone());

    assert!(!RegisteredContracts::<T>::contains_key(&contract));
  }

  #[benchmark]
  fn approve_contract_registration() {
    let contract = prepare_contract::<T>(0);
    let request = bench_request::<T>(&contract);

    #[extrinsic_call]
    approve_contract_registration(RawOrigin::Root, request);

    assert!(RegisteredContracts::<T>::contains_key(&contract));
  }

  #[benchmark]
  fn batch_register_contracts(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let requests: BoundedVec<_, T::MaxBatchSize> = (0..n)
      .map(|i| bench_request::<T>(&prepare_contract::<T>(i)))
      .collect::<Vec<_>>()
      .try_into()
      .expect("Within batch bound");

    #[extrinsic_call]
    batch_register_contracts(RawOrigin::Root, requests);

    assert_eq!(RegisteredContracts::<T>::iter().count(), n as usize);
  }

  #[benchmark]
  fn batch_deregister_contracts(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let contracts: BoundedVec<_, T::MaxBatchSize> = (0..n)
      .map(registered_contract::<T>)
      .collect::<Vec<_>>()
      .try_into()
      .expect("Within batch bound");

    #[extrinsic_call]
    batch_deregister_contracts(RawOrigin::Root, contracts);

    assert_eq!(RegisteredContracts::<T>::iter().count(), 0);
  }

  #[benchmark]
  fn batch_store_code(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let run_as: T::AccountId = whitelisted_caller();
    let uploads: BoundedVec<_, T::MaxBatchSize> = (0..n)
      .map(|_| wasm_upload::<T>(&run_as))
      .collect::<Vec<_>>()
      .try_into()
      .expect("Within batch bound");

    #[extrinsic_call]
    batch_store_code(RawOrigin::Root, uploads);
  }

  #[benchmark]
  fn update_params() {
    let params = Params {
      max_begin_block_total_gas: 84_000_000,
      ..SchedulerParams::<T>::get()
    };

    #[extrinsic_call]
    update_params(RawOrigin::Root, params);

    assert_eq!(SchedulerParams::<T>::get(), params);
  }

  #[benchmark]
  fn begin_block(n: Linear<1, 64>) {
    for i in 0..n {
      registered_contract::<T>(i);
    }

    #[block]
    {
      Pallet::<T>::on_initialize(polkadot_sdk::frame_system::Pallet::<T>::block_number());
    }
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
