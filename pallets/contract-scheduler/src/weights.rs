#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn register_contract() -> Weight;
  fn update_contract() -> Weight;
  fn activate_contract() -> Weight;
  fn deactivate_contract() -> Weight;
  fn deregister_contract() -> Weight;
  fn approve_contract_registration() -> Weight;
  fn batch_register_contracts(n: u32) -> Weight;
  fn batch_deregister_contracts(n: u32) -> Weight;
  fn batch_store_code(n: u32) -> Weight;
  fn update_params() -> Weight;
  /// Bookkeeping of one begin-block pass over `n` contracts, contract gas excluded.
  fn begin_block(n: u32) -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  fn register_contract() -> Weight {
    Weight::from_parts(22_000_000, 1800)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn update_contract() -> Weight {
    Weight::from_parts(18_000_000, 1600)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(3))
  }

  fn activate_contract() -> Weight {
    Weight::from_parts(14_000_000, 1200)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  // Includes a funded deactivation hook: escrow in and out plus the fee transfer.
  fn deactivate_contract() -> Weight {
    Weight::from_parts(40_000_000, 3000)
      .saturating_add(T::DbWeight::get().reads(6))
      .saturating_add(T::DbWeight::get().writes(7))
  }

  fn deregister_contract() -> Weight {
    Weight::from_parts(45_000_000, 3200)
      .saturating_add(T::DbWeight::get().reads(7))
      .saturating_add(T::DbWeight::get().writes(9))
  }

  fn approve_contract_registration() -> Weight {
    Weight::from_parts(22_000_000, 1800)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn batch_register_contracts(n: u32) -> Weight {
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(Weight::from_parts(22_000_000, 1800).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads((3_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes((2_u64).saturating_mul(n.into())))
  }

  fn batch_deregister_contracts(n: u32) -> Weight {
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(Weight::from_parts(45_000_000, 3200).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads((7_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes((9_u64).saturating_mul(n.into())))
  }

  fn batch_store_code(n: u32) -> Weight {
    let max_code = u64::from(T::MaxCodeSize::get());
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(Weight::from_parts(30_000_000, max_code).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().writes((2_u64).saturating_mul(n.into())))
  }

  fn update_params() -> Weight {
    Weight::from_parts(8_000_000, 500)
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn begin_block(n: u32) -> Weight {
    Weight::from_parts(5_000_000, 500)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(Weight::from_parts(12_000_000, 1500).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
  }
}

impl WeightInfo for () {
  fn register_contract() -> Weight { Weight::from_parts(22_000_000, 1800).saturating_add(RocksDbWeight::get().reads_writes(3, 2)) }
  fn update_contract() -> Weight { Weight::from_parts(18_000_000, 1600).saturating_add(RocksDbWeight::get().reads_writes(2, 3)) }
  fn activate_contract() -> Weight { Weight::from_parts(14_000_000, 1200).saturating_add(RocksDbWeight::get().reads_writes(1, 2)) }
  fn deactivate_contract() -> Weight { Weight::from_parts(40_000_000, 3000).saturating_add(RocksDbWeight::get().reads_writes(6, 7)) }
  fn deregister_contract() -> Weight { Weight::from_parts(45_000_000, 3200).saturating_add(RocksDbWeight::get().reads_writes(7, 9)) }
  fn approve_contract_registration() -> Weight { Weight::from_parts(22_000_000, 1800).saturating_add(RocksDbWeight::get().reads_writes(3, 2)) }
  fn batch_register_contracts(n: u32) -> Weight { Weight::from_parts(10_000_000, 1000).saturating_add(Weight::from_parts(22_000_000, 1800).saturating_mul(n.into())) }
  fn batch_deregister_contracts(n: u32) -> Weight { Weight::from_parts(10_000_000, 1000).saturating_add(Weight::from_parts(45_000_000, 3200).saturating_mul(n.into())) }
  fn batch_store_code(n: u32) -> Weight { Weight::from_parts(10_000_000, 1000).saturating_add(Weight::from_parts(30_000_000, 1024).saturating_mul(n.into())) }
  fn update_params() -> Weight { Weight::from_parts(8_000_000, 500).saturating_add(RocksDbWeight::get().writes(1)) }
  fn begin_block(n: u32) -> Weight { Weight::from_parts(5_000_000, 500).saturating_add(Weight::from_parts(12_000_000, 1500).saturating_mul(n.into())) }
}
