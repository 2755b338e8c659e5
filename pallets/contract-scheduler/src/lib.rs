#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{Allowance, ContractRuntime, FeeAllowances, InvokeOutcome, LedgerOps};

pub mod types;
pub use types::*;

mod admin;
mod funding;
mod isolation;
mod registry;
mod scheduler;

pub use funding::{Funding, FundingSource, Reservation};
pub use isolation::{ExecutionReport, Savepoint, within_savepoint};
pub use registry::{PriorityKey, gas_price_of, priority_key};

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub const LOG_TARGET: &str = "runtime::contract-scheduler";

#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, Balance> {
  /// Makes `contract` exist in the virtual machine with `code_id` and a periodic entry point.
  fn instantiate_contract(contract: &AccountId, code_id: CodeId);
  fn fund(who: &AccountId, amount: Balance);
}

#[frame::pallet]
pub mod pallet {
  use super::{
    CodeId, CodeUpload, ContractRegistrationRequest, ContractRuntime, DeactivationReason,
    FeeAllowances, Gas, GasPrice, LedgerOps, Params, PriorityKey, RegisteredContract, SkipReason,
    WASM_MAGIC, WeightInfo,
  };
  use alloc::vec::Vec;
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      traits::{EnsureOrigin, Time},
    },
    sp_runtime::traits::AccountIdConversion,
  };

  #[pallet::config]
  pub trait Config: frame_system::Config {
    type Balance: Parameter
      + Member
      + AtLeast32BitUnsigned
      + Default
      + Copy
      + MaybeSerializeDeserialize
      + MaxEncodedLen;

    type ContractRuntime: ContractRuntime<Self::AccountId>;
    type Ledger: LedgerOps<Self::AccountId, Self::Balance>;
    type Allowances: FeeAllowances<Self::AccountId, Self::Balance, <Self::Time as Time>::Moment>;
    /// Block timestamp used for allowance expiry and periods.
    type Time: Time;

    /// Approves registration batches, code uploads and parameter changes.
    type GovernanceOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Escrow account holding reservations while a contract runs.
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    type FeeSink: Get<Self::AccountId>;

    #[pallet::constant]
    type MaxBatchSize: Get<u32>;
    #[pallet::constant]
    type MaxCodeSize: Get<u32> + 'static;
    #[pallet::constant]
    type WeightPerGas: Get<Weight>;

    type WeightInfo: WeightInfo;
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId, Self::Balance>;
  }

  pub type BalanceOf<T> = <T as Config>::Balance;
  pub type MomentOf<T> = <<T as Config>::Time as Time>::Moment;
  pub type RegisteredContractOf<T> = RegisteredContract<<T as frame_system::Config>::AccountId>;
  pub type RegistrationRequestOf<T> =
    ContractRegistrationRequest<<T as frame_system::Config>::AccountId>;
  pub type CodeUploadOf<T> =
    CodeUpload<<T as frame_system::Config>::AccountId, <T as Config>::MaxCodeSize>;

  #[pallet::pallet]
  pub struct Pallet<T>(_);

  #[pallet::storage]
  #[pallet::getter(fn registered_contract)]
  pub type RegisteredContracts<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, RegisteredContractOf<T>, OptionQuery>;

  /// Priority index over `RegisteredContracts`. Prices iterate in raw key order,
  /// accounts within a price are sorted on read.
  #[pallet::storage]
  pub type ContractsByGasPrice<T: Config> =
    StorageDoubleMap<_, Identity, PriorityKey, Identity, T::AccountId, (), OptionQuery>;

  /// Number of registrations per code id, for unpinning on deregistration.
  #[pallet::storage]
  pub type CodeReferences<T> = StorageMap<_, Blake2_128Concat, CodeId, u32, ValueQuery>;

  #[pallet::storage]
  #[pallet::getter(fn params)]
  pub type SchedulerParams<T> = StorageValue<_, Params, ValueQuery>;

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    fn on_initialize(_now: BlockNumberFor<T>) -> Weight {
      let report = Self::execute_begin_block();
      Self::begin_block_weight(&report)
    }

    fn integrity_test() {
      assert!(
        T::MaxCodeSize::get() as usize >= WASM_MAGIC.len(),
        "MaxCodeSize must fit at least the wasm magic"
      );
    }

    #[cfg(feature = "try-runtime")]
    fn try_state(_now: BlockNumberFor<T>) -> Result<(), polkadot_sdk::sp_runtime::TryRuntimeError> {
      Self::do_try_state()
    }
  }

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    ContractRegistered {
      contract: T::AccountId,
      code_id: CodeId,
      gas_limit: Gas,
      gas_price: GasPrice,
    },
    ContractUpdated {
      contract: T::AccountId,
      gas_limit: Gas,
      gas_price: GasPrice,
    },
    ContractActivated {
      contract: T::AccountId,
    },
    ContractDeactivated {
      contract: T::AccountId,
      reason: DeactivationReason,
    },
    ContractDeregistered {
      contract: T::AccountId,
    },
    ContractExecuted {
      contract: T::AccountId,
      gas_used: Gas,
      fee: BalanceOf<T>,
      payer: T::AccountId,
    },
    ContractExecutionFailed {
      contract: T::AccountId,
      gas_used: Gas,
      fee: BalanceOf<T>,
      payer: T::AccountId,
      error: DispatchError,
    },
    ContractSkipped {
      contract: T::AccountId,
      reason: SkipReason,
    },
    DeactivationHookExecuted {
      contract: T::AccountId,
      gas_used: Gas,
      fee: BalanceOf<T>,
      succeeded: bool,
    },
    CodeStored {
      code_id: CodeId,
      run_as: T::AccountId,
      pinned: bool,
    },
    ParamsUpdated {
      params: Params,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    ContractNotRegistered,
    ContractAlreadyRegistered,
    /// No instantiated contract at this address.
    ContractNotFound,
    CodeNotFound,
    /// Registered code id differs from the contract's current code id.
    CodeIdMismatch,
    /// Gas limit is zero or above `max_contract_gas_limit`.
    InvalidGasLimit,
    GasPriceTooLow,
    NotContractController,
    ContractAlreadyActive,
    ContractAlreadyInactive,
    EmptyBatch,
    DuplicateBatchEntry,
    InvalidWasmCode,
    PinFailed,
    InvalidParams,
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub params: Params,
    /// Registry contents in priority order, as produced by `Pallet::export_genesis`.
    pub registered_contracts: Vec<(T::AccountId, RegisteredContractOf<T>)>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      assert!(
        self.params.is_valid(),
        "Invalid contract scheduler params in genesis"
      );
      SchedulerParams::<T>::put(self.params);
      for (_, record) in &self.registered_contracts {
        Pallet::<T>::validate_gas(&self.params, record.gas_limit, record.gas_price)
          .expect("Genesis registration outside the scheduler gas params");
      }
      Pallet::<T>::import_registry(&self.registered_contracts)
        .expect("Duplicate contract in genesis registry");
      // Escrow must survive a zero balance between runs
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Registers a contract on its own behalf. Signed by the contract or its VM admin.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::register_contract())]
    pub fn register_contract(
      origin: OriginFor<T>,
      request: RegistrationRequestOf<T>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_may_register(&who, &request.contract)?;
      Self::do_register_contract(&request)
    }

    /// Changes gas limit and price, and optionally the admin. Applies from the next block.
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::update_contract())]
    pub fn update_contract(
      origin: OriginFor<T>,
      contract: T::AccountId,
      gas_limit: Gas,
      gas_price: GasPrice,
      admin: Option<T::AccountId>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_update_contract(&who, &contract, gas_limit, gas_price, admin)
    }

    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::activate_contract())]
    pub fn activate_contract(origin: OriginFor<T>, contract: T::AccountId) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_activate_contract(&who, &contract)
    }

    /// Switches the contract off and runs its deactivation hook. Charged for a
    /// hook at `max_contract_gas_limit`, refunded down to the gas it used.
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::deactivate_contract().saturating_add(Pallet::<T>::hook_weight_bound()))]
    pub fn deactivate_contract(
      origin: OriginFor<T>,
      contract: T::AccountId,
    ) -> DispatchResultWithPostInfo {
      let who = ensure_signed(origin)?;
      let hook_gas = Self::do_deactivate_contract(&who, &contract)?;
      Ok(Some(T::WeightInfo::deactivate_contract().saturating_add(Self::gas_weight(hook_gas))).into())
    }

    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::deregister_contract().saturating_add(Pallet::<T>::hook_weight_bound()))]
    pub fn deregister_contract(
      origin: OriginFor<T>,
      contract: T::AccountId,
    ) -> DispatchResultWithPostInfo {
      let who = ensure_signed(origin)?;
      Self::ensure_controller(&who, &contract)?;
      let hook_gas = Self::do_deregister_contract(&contract).unwrap_or_default();
      Ok(Some(T::WeightInfo::deregister_contract().saturating_add(Self::gas_weight(hook_gas))).into())
    }

    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::approve_contract_registration())]
    pub fn approve_contract_registration(
      origin: OriginFor<T>,
      request: RegistrationRequestOf<T>,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_register_contract(&request)
    }

    /// All-or-nothing: every request is validated before any is applied.
    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::batch_register_contracts(requests.len() as u32))]
    pub fn batch_register_contracts(
      origin: OriginFor<T>,
      requests: BoundedVec<RegistrationRequestOf<T>, T::MaxBatchSize>,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_register_batch(&requests)
    }

    /// Addresses that are not registered are skipped.
    #[pallet::call_index(7)]
    #[pallet::weight(
      T::WeightInfo::batch_deregister_contracts(contracts.len() as u32)
        .saturating_add(Pallet::<T>::hook_weight_bound().saturating_mul(contracts.len() as u64))
    )]
    pub fn batch_deregister_contracts(
      origin: OriginFor<T>,
      contracts: BoundedVec<T::AccountId, T::MaxBatchSize>,
    ) -> DispatchResultWithPostInfo {
      T::GovernanceOrigin::ensure_origin(origin)?;
      let hook_gas = Self::do_deregister_batch(&contracts)?;
      Ok(
        Some(
          T::WeightInfo::batch_deregister_contracts(contracts.len() as u32)
            .saturating_add(Self::gas_weight(hook_gas)),
        )
        .into(),
      )
    }

    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::batch_store_code(uploads.len() as u32))]
    pub fn batch_store_code(
      origin: OriginFor<T>,
      uploads: BoundedVec<CodeUploadOf<T>, T::MaxBatchSize>,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_store_code_batch(&uploads)
    }

    #[pallet::call_index(9)]
    #[pallet::weight(T::WeightInfo::update_params())]
    pub fn update_params(origin: OriginFor<T>, params: Params) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      ensure!(params.is_valid(), Error::<T>::InvalidParams);
      SchedulerParams::<T>::put(params);
      Self::deposit_event(Event::ParamsUpdated { params });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    pub fn export_genesis() -> GenesisConfig<T> {
      GenesisConfig {
        params: SchedulerParams::<T>::get(),
        registered_contracts: Self::export_registry(),
      }
    }
  }
}
