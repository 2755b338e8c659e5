use crate as pallet_contract_scheduler;
use crate::{
  Allowance, CodeId, ContractRuntime, EntryPoint, FeeAllowances, FundingMode, Gas, GasPrice,
  InvokeOutcome, LedgerOps, Params, RegisteredContract,
};
use frame::prelude::*;
use polkadot_sdk::{
  frame_support::{
    PalletId, construct_runtime,
    storage::unhashed,
    traits::{ConstU32, ConstU128, Currency, ExistenceRequirement, Get, Time},
  },
  frame_system::EnsureRoot,
  sp_runtime::{
    BuildStorage,
    traits::{BlakeTwo256, IdentityLookup},
  },
};

use alloc::{collections::BTreeMap, vec, vec::Vec};
use core::cell::RefCell;

type Block = polkadot_sdk::frame_system::mocking::MockBlock<Test>;
pub type AccountId = u64;
pub type Balance = u128;
pub type Moment = u64;

pub const ALICE: AccountId = 1;
pub const ADMIN: AccountId = 500;
pub const STRANGER: AccountId = 600;
pub const FEE_SINK: AccountId = 999;

/// Code every test contract is instantiated from unless stated otherwise.
pub const DUMMY_CODE: CodeId = 1;
pub const OTHER_CODE: CodeId = 2;
/// Gas the dummy contract burns per periodic run.
pub const DUMMY_RUN_GAS: Gas = 70_000;
/// Gas the dummy contract burns in its deactivation hook.
pub const DUMMY_DEACTIVATE_GAS: Gas = 66_821;

pub const GENESIS_TIME: Moment = 1_700_000_000;
pub const HOUR: Moment = 3_600;

construct_runtime!(
  pub enum Test {
    System: polkadot_sdk::frame_system,
    Balances: polkadot_sdk::pallet_balances,
    ContractScheduler: pallet_contract_scheduler,
  }
);

impl polkadot_sdk::frame_system::Config for Test {
  type BaseCallFilter = polkadot_sdk::frame_support::traits::Everything;
  type BlockWeights = ();
  type BlockLength = ();
  type DbWeight = ();
  type RuntimeOrigin = RuntimeOrigin;
  type RuntimeCall = RuntimeCall;
  type Nonce = u64;
  type Hash = polkadot_sdk::sp_core::H256;
  type Hashing = BlakeTwo256;
  type AccountId = AccountId;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Block = Block;
  type RuntimeEvent = RuntimeEvent;
  type BlockHashCount = polkadot_sdk::frame_support::traits::ConstU64<250>;
  type Version = ();
  type PalletInfo = PalletInfo;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<Balance>;
  type OnNewAccount = ();
  type OnKilledAccount = ();
  type SystemWeightInfo = ();
  type SS58Prefix = ();
  type OnSetCode = ();
  type MaxConsumers = ConstU32<16>;
  type RuntimeTask = ();
  type ExtensionsWeightInfo = ();
  type SingleBlockMigrations = ();
  type MultiBlockMigrator = ();
  type PreInherents = ();
  type PostInherents = ();
  type PostTransactions = ();
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ConstU32<50>;
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = Balance;
  type RuntimeEvent = RuntimeEvent;
  type DustRemoval = ();
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = RuntimeHoldReason;
  type RuntimeFreezeReason = RuntimeFreezeReason;
  type DoneSlashHandler = ();
}

/// Static shape of a contract instantiated in the mock virtual machine.
#[derive(Clone, Debug)]
pub struct MockContract {
  pub code_id: CodeId,
  pub admin: Option<AccountId>,
  pub run_gas: Gas,
  /// `None` when the contract has no deactivation entry point.
  pub deactivate_gas: Option<Gas>,
  pub fails: bool,
}

impl MockContract {
  pub fn dummy() -> Self {
    Self {
      code_id: DUMMY_CODE,
      admin: None,
      run_gas: DUMMY_RUN_GAS,
      deactivate_gas: Some(DUMMY_DEACTIVATE_GAS),
      fails: false,
    }
  }
}

thread_local! {
  static CONTRACTS: RefCell<BTreeMap<AccountId, MockContract>> = RefCell::new(BTreeMap::new());
  static NOW: RefCell<Moment> = const { RefCell::new(GENESIS_TIME) };
  static PIN_FAILS: RefCell<bool> = const { RefCell::new(false) };
  static UNPIN_FAILS: RefCell<bool> = const { RefCell::new(false) };
}

pub fn reset_mock_vm() {
  CONTRACTS.with(|c| c.borrow_mut().clear());
  NOW.with(|n| *n.borrow_mut() = GENESIS_TIME);
  PIN_FAILS.with(|p| *p.borrow_mut() = false);
  UNPIN_FAILS.with(|p| *p.borrow_mut() = false);
}

pub fn instantiate(contract: AccountId, shape: MockContract) {
  unhashed::put(&code_key(shape.code_id), &());
  CONTRACTS.with(|c| {
    c.borrow_mut().insert(contract, shape);
  });
}

/// Points an instantiated contract at other code, as a migration would.
pub fn migrate(contract: AccountId, code_id: CodeId) {
  unhashed::put(&code_key(code_id), &());
  CONTRACTS.with(|c| {
    if let Some(shape) = c.borrow_mut().get_mut(&contract) {
      shape.code_id = code_id;
    }
  });
}

pub fn set_failing(contract: AccountId, fails: bool) {
  CONTRACTS.with(|c| {
    if let Some(shape) = c.borrow_mut().get_mut(&contract) {
      shape.fails = fails;
    }
  });
}

pub fn set_pin_fails(fails: bool) {
  PIN_FAILS.with(|p| *p.borrow_mut() = fails);
}

pub fn set_unpin_fails(fails: bool) {
  UNPIN_FAILS.with(|p| *p.borrow_mut() = fails);
}

pub fn set_now(now: Moment) {
  NOW.with(|n| *n.borrow_mut() = now);
}

fn contract_of(contract: &AccountId) -> Option<MockContract> {
  CONTRACTS.with(|c| c.borrow().get(contract).cloned())
}

fn code_key(code_id: CodeId) -> Vec<u8> {
  (b":mock:vm:code:", code_id).encode()
}

fn pin_key(code_id: CodeId) -> Vec<u8> {
  (b":mock:vm:pinned:", code_id).encode()
}

fn runs_key(contract: &AccountId) -> Vec<u8> {
  (b":mock:vm:runs:", contract).encode()
}

fn cleaned_up_key(contract: &AccountId) -> Vec<u8> {
  (b":mock:vm:cleaned-up:", contract).encode()
}

fn allowance_key(granter: &AccountId, grantee: &AccountId) -> Vec<u8> {
  (b":mock:allowance:", granter, grantee).encode()
}

/// Periodic runs whose writes were committed.
pub fn run_count(contract: AccountId) -> u32 {
  unhashed::get_or_default(&runs_key(&contract))
}

/// Whether a deactivation hook of `contract` completed.
pub fn cleaned_up(contract: AccountId) -> bool {
  unhashed::get_or_default(&cleaned_up_key(&contract))
}

pub fn is_pinned(code_id: CodeId) -> bool {
  unhashed::get_or_default(&pin_key(code_id))
}

pub fn code_stored(code_id: CodeId) -> bool {
  unhashed::exists(&code_key(code_id))
}

pub struct MockContractRuntime;

impl ContractRuntime<AccountId> for MockContractRuntime {
  fn code_id(contract: &AccountId) -> Option<CodeId> {
    contract_of(contract).map(|shape| shape.code_id)
  }

  fn code_exists(code_id: CodeId) -> bool {
    code_stored(code_id)
  }

  fn contract_admin(contract: &AccountId) -> Option<AccountId> {
    contract_of(contract).and_then(|shape| shape.admin)
  }

  fn has_entry_point(contract: &AccountId, entry_point: EntryPoint) -> bool {
    match (contract_of(contract), entry_point) {
      (Some(_), EntryPoint::Periodic) => true,
      (Some(shape), EntryPoint::Deactivate) => shape.deactivate_gas.is_some(),
      (None, _) => false,
    }
  }

  // Writes happen before the gas check so a discarded savepoint is observable.
  fn invoke(contract: &AccountId, entry_point: EntryPoint, gas_limit: Gas) -> InvokeOutcome {
    let Some(shape) = contract_of(contract) else {
      return InvokeOutcome::err(0, DispatchError::Other("ContractNotFound"));
    };
    match entry_point {
      EntryPoint::Periodic => {
        unhashed::put(&runs_key(contract), &run_count(*contract).saturating_add(1));
        if shape.run_gas > gas_limit {
          return InvokeOutcome::err(gas_limit, DispatchError::Exhausted);
        }
        if shape.fails {
          return InvokeOutcome::err(shape.run_gas, DispatchError::Other("ContractPanicked"));
        }
        InvokeOutcome::ok(shape.run_gas)
      }
      EntryPoint::Deactivate => {
        let Some(gas) = shape.deactivate_gas else {
          return InvokeOutcome::err(0, DispatchError::Other("NoDeactivateEntryPoint"));
        };
        unhashed::put(&cleaned_up_key(contract), &true);
        if gas > gas_limit {
          return InvokeOutcome::err(gas_limit, DispatchError::Exhausted);
        }
        InvokeOutcome::ok(gas)
      }
    }
  }

  fn store_code(_run_as: &AccountId, _wasm: Vec<u8>) -> Result<CodeId, DispatchError> {
    let next_key = b":mock:vm:next-code-id".to_vec();
    let code_id: CodeId = unhashed::get(&next_key).unwrap_or(100);
    unhashed::put(&next_key, &code_id.saturating_add(1));
    unhashed::put(&code_key(code_id), &());
    Ok(code_id)
  }

  fn pin(code_id: CodeId) -> DispatchResult {
    if PIN_FAILS.with(|p| *p.borrow()) || !code_stored(code_id) {
      return Err(DispatchError::Other("PinFailed"));
    }
    unhashed::put(&pin_key(code_id), &true);
    Ok(())
  }

  fn unpin(code_id: CodeId) -> DispatchResult {
    if UNPIN_FAILS.with(|p| *p.borrow()) {
      return Err(DispatchError::Other("UnpinFailed"));
    }
    unhashed::kill(&pin_key(code_id));
    Ok(())
  }
}

pub struct MockLedger;

impl LedgerOps<AccountId, Balance> for MockLedger {
  fn balance(who: &AccountId) -> Balance {
    <Balances as Currency<AccountId>>::free_balance(who)
  }

  fn transfer(from: &AccountId, to: &AccountId, amount: Balance) -> DispatchResult {
    <Balances as Currency<AccountId>>::transfer(from, to, amount, ExistenceRequirement::AllowDeath)
  }
}

pub struct MockAllowances;

impl FeeAllowances<AccountId, Balance, Moment> for MockAllowances {
  fn allowance(granter: &AccountId, grantee: &AccountId) -> Option<Allowance<Balance, Moment>> {
    unhashed::get(&allowance_key(granter, grantee))
  }

  fn spend(
    granter: &AccountId,
    grantee: &AccountId,
    amount: Balance,
    now: Moment,
  ) -> DispatchResult {
    let mut allowance =
      Self::allowance(granter, grantee).ok_or(DispatchError::Other("NoAllowance"))?;
    allowance.spend(amount, now)?;
    unhashed::put(&allowance_key(granter, grantee), &allowance);
    Ok(())
  }

  fn restore(granter: &AccountId, grantee: &AccountId, amount: Balance) -> DispatchResult {
    let mut allowance =
      Self::allowance(granter, grantee).ok_or(DispatchError::Other("NoAllowance"))?;
    allowance.restore(amount);
    unhashed::put(&allowance_key(granter, grantee), &allowance);
    Ok(())
  }
}

pub fn grant(granter: AccountId, grantee: AccountId, allowance: Allowance<Balance, Moment>) {
  unhashed::put(&allowance_key(&granter, &grantee), &allowance);
}

pub fn basic_allowance(spend_limit: Balance, expiration: Option<Moment>) -> Allowance<Balance, Moment> {
  Allowance::Basic {
    spend_limit: Some(spend_limit),
    expiration,
  }
}

pub fn allowance_of(granter: AccountId, grantee: AccountId) -> Option<Allowance<Balance, Moment>> {
  MockAllowances::allowance(&granter, &grantee)
}

pub struct MockTime;
impl Time for MockTime {
  type Moment = Moment;
  fn now() -> Moment {
    NOW.with(|n| *n.borrow())
  }
}

pub struct SchedulerPalletId;
impl Get<PalletId> for SchedulerPalletId {
  fn get() -> PalletId {
    PalletId(*b"py/bbcon")
  }
}

pub struct TestFeeSink;
impl Get<AccountId> for TestFeeSink {
  fn get() -> AccountId {
    FEE_SINK
  }
}

pub struct TestWeightPerGas;
impl Get<Weight> for TestWeightPerGas {
  fn get() -> Weight {
    Weight::from_parts(10_000, 0)
  }
}

impl pallet_contract_scheduler::Config for Test {
  type Balance = Balance;
  type ContractRuntime = MockContractRuntime;
  type Ledger = MockLedger;
  type Allowances = MockAllowances;
  type Time = MockTime;
  type GovernanceOrigin = EnsureRoot<AccountId>;
  type PalletId = SchedulerPalletId;
  type FeeSink = TestFeeSink;
  type MaxBatchSize = ConstU32<8>;
  type MaxCodeSize = ConstU32<1024>;
  type WeightPerGas = TestWeightPerGas;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = MockBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct MockBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::BenchmarkHelper<AccountId, Balance> for MockBenchmarkHelper {
  fn instantiate_contract(contract: &AccountId, code_id: CodeId) {
    instantiate(
      *contract,
      MockContract {
        code_id,
        ..MockContract::dummy()
      },
    );
  }

  fn fund(who: &AccountId, amount: Balance) {
    let _ = <Balances as Currency<AccountId>>::deposit_creating(who, amount);
  }
}

pub fn test_params() -> Params {
  Params {
    is_execution_enabled: true,
    max_begin_block_total_gas: 42_000_000,
    max_contract_gas_limit: 3_500_000,
    min_gas_price: 1_000,
  }
}

pub fn self_funded(gas_limit: Gas, gas_price: GasPrice) -> RegisteredContract<AccountId> {
  RegisteredContract {
    code_id: DUMMY_CODE,
    gas_limit,
    gas_price,
    is_executable: true,
    funding_mode: FundingMode::SelfFunded,
    admin: None,
  }
}

pub const TEST_INITIAL_BALANCE: Balance = 10_000_000_000_000;

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  new_test_ext_with(pallet_contract_scheduler::GenesisConfig {
    params: test_params(),
    registered_contracts: vec![],
  })
}

pub fn new_test_ext_with(
  genesis: pallet_contract_scheduler::GenesisConfig<Test>,
) -> polkadot_sdk::sp_io::TestExternalities {
  reset_mock_vm();
  let mut t = polkadot_sdk::frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  polkadot_sdk::pallet_balances::GenesisConfig::<Test> {
    balances: vec![
      (ALICE, TEST_INITIAL_BALANCE),
      (FEE_SINK, 1), // FeeSink ED
    ],
    dev_accounts: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  genesis.assimilate_storage(&mut t).unwrap();

  let mut ext = polkadot_sdk::sp_io::TestExternalities::new(t);
  ext.execute_with(|| {
    polkadot_sdk::frame_system::Pallet::<Test>::set_block_number(1);
  });
  ext
}
