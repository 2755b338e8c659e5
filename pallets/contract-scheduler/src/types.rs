use alloc::vec::Vec;
use frame::prelude::*;
use serde::{Deserialize, Serialize};

/// Identifier of stored contract code in the virtual machine.
pub type CodeId = u64;
/// Gas units metered by the virtual machine.
pub type Gas = u64;
/// Price per gas unit, in the smallest unit of the fee currency.
pub type GasPrice = u64;

/// A reservation covers the main run plus a possible deactivation hook.
pub const RESERVATION_MULTIPLIER: u128 = 3;

/// Every accepted code upload must start with the wasm binary magic.
pub const WASM_MAGIC: [u8; 4] = *b"\0asm";

/// Contract entry points the scheduler is allowed to call.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum EntryPoint {
  /// Invoked once per block while the contract is executable.
  Periodic,
  /// Invoked when the contract is being switched off.
  Deactivate,
}

/// Who pays for a contract's runs.
#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
  Serialize,
  Deserialize,
)]
pub enum FundingMode<AccountId> {
  SelfFunded,
  GrantOnly { granter: AccountId },
  /// Own balance first. The granter's allowance only when the own balance cannot cover it.
  Dual { granter: AccountId },
}

impl<AccountId> FundingMode<AccountId> {
  pub fn granter(&self) -> Option<&AccountId> {
    match self {
      FundingMode::SelfFunded => None,
      FundingMode::GrantOnly { granter } | FundingMode::Dual { granter } => Some(granter),
    }
  }
}

#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
  Serialize,
  Deserialize,
)]
pub struct RegisteredContract<AccountId> {
  /// Code id the contract had when it was registered.
  pub code_id: CodeId,
  pub gas_limit: Gas,
  pub gas_price: GasPrice,
  pub is_executable: bool,
  pub funding_mode: FundingMode<AccountId>,
  /// Account allowed to administer the registration besides the contract itself.
  pub admin: Option<AccountId>,
}

impl<AccountId: Clone> RegisteredContract<AccountId> {
  pub fn from_request(request: &ContractRegistrationRequest<AccountId>) -> Self {
    Self {
      code_id: request.code_id,
      gas_limit: request.gas_limit,
      gas_price: request.gas_price,
      is_executable: true,
      funding_mode: request.funding_mode.clone(),
      admin: request.admin.clone(),
    }
  }
}

#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct ContractRegistrationRequest<AccountId> {
  pub contract: AccountId,
  pub code_id: CodeId,
  pub gas_limit: Gas,
  pub gas_price: GasPrice,
  pub funding_mode: FundingMode<AccountId>,
  pub admin: Option<AccountId>,
  pub should_pin_contract: bool,
}

/// Read-only view served to clients asking about a registration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistrationInfo<AccountId> {
  pub contract: AccountId,
  pub gas_limit: Gas,
  pub gas_price: GasPrice,
  pub is_executable: bool,
  pub funding_mode: FundingMode<AccountId>,
}

#[derive(Decode, DecodeWithMemTracking, Encode, TypeInfo, MaxEncodedLen)]
#[scale_info(skip_type_params(MaxCodeSize))]
pub struct CodeUpload<AccountId, MaxCodeSize: Get<u32>> {
  pub run_as: AccountId,
  pub wasm: BoundedVec<u8, MaxCodeSize>,
  pub pin: bool,
}

impl<AccountId: Clone, MaxCodeSize: Get<u32>> Clone for CodeUpload<AccountId, MaxCodeSize> {
  fn clone(&self) -> Self {
    Self {
      run_as: self.run_as.clone(),
      wasm: self.wasm.clone(),
      pin: self.pin,
    }
  }
}

impl<AccountId: core::fmt::Debug, MaxCodeSize: Get<u32>> core::fmt::Debug
  for CodeUpload<AccountId, MaxCodeSize>
{
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("CodeUpload")
      .field("run_as", &self.run_as)
      .field("wasm_len", &self.wasm.len())
      .field("pin", &self.pin)
      .finish()
  }
}

impl<AccountId: PartialEq, MaxCodeSize: Get<u32>> PartialEq for CodeUpload<AccountId, MaxCodeSize> {
  fn eq(&self, other: &Self) -> bool {
    self.run_as == other.run_as && self.wasm == other.wasm && self.pin == other.pin
  }
}

impl<AccountId: Eq, MaxCodeSize: Get<u32>> Eq for CodeUpload<AccountId, MaxCodeSize> {}

impl<AccountId, MaxCodeSize: Get<u32>> CodeUpload<AccountId, MaxCodeSize> {
  pub fn has_wasm_magic(&self) -> bool {
    self.wasm.starts_with(&WASM_MAGIC)
  }
}

/// Module parameters, settable only through governance.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
  Serialize,
  Deserialize,
)]
pub struct Params {
  /// Global kill switch for begin-block execution.
  pub is_execution_enabled: bool,
  pub max_begin_block_total_gas: Gas,
  pub max_contract_gas_limit: Gas,
  pub min_gas_price: GasPrice,
}

impl Default for Params {
  fn default() -> Self {
    Self {
      is_execution_enabled: true,
      max_begin_block_total_gas: 42_000_000,
      max_contract_gas_limit: 3_500_000,
      min_gas_price: 1_000,
    }
  }
}

impl Params {
  pub fn is_valid(&self) -> bool {
    self.max_contract_gas_limit > 0
      && self.max_begin_block_total_gas > 0
      && self.max_contract_gas_limit <= self.max_begin_block_total_gas
      && self.min_gas_price > 0
  }
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum DeactivationReason {
  Manual,
  InsufficientFunds,
  ExecutionFailed,
  Deregistered,
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum SkipReason {
  /// The contract was migrated to other code since it was registered.
  CodeIdMismatch,
  /// Its gas limit did not fit into what was left of the block budget.
  BudgetExhausted,
}

/// What happened to one contract during one begin-block pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScheduleOutcome {
  SkippedInactive,
  SkippedCodeIdMismatch,
  SkippedBudget,
  SkippedUnfunded,
  Ran,
  RanThenDeactivated,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockReport<AccountId> {
  pub outcomes: Vec<(AccountId, ScheduleOutcome)>,
  /// Gas charged against the block budget.
  pub gas_consumed: Gas,
  /// Gas spent by hooks after unfunded reservations, outside the block budget.
  pub hook_gas_outside_budget: Gas,
}

impl<AccountId: PartialEq> BlockReport<AccountId> {
  pub fn outcome_of(&self, contract: &AccountId) -> Option<ScheduleOutcome> {
    self
      .outcomes
      .iter()
      .find(|(who, _)| who == contract)
      .map(|(_, outcome)| *outcome)
  }

  pub fn ran(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|(_, outcome)| {
        matches!(
          outcome,
          ScheduleOutcome::Ran | ScheduleOutcome::RanThenDeactivated
        )
      })
      .count()
  }
}
