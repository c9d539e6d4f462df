//! # EVM Interpreter
//!
//! The main execution engine for EVM bytecode.
//! Implements all opcodes and execution flow.

use crate::domain::entities::{
    AccountState, Config, ExecutionContext, ExecutionResult, Log, StateChange,
};
use crate::domain::invariants::limits;
use crate::domain::services::{
    compute_contract_address, compute_contract_address_create2, keccak256,
};
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::errors::VmError;
use crate::evm::gas::{self, costs, CallGasParams, OPCODE_GAS};
use crate::evm::memory::{memory_expansion_cost, Memory};
use crate::evm::opcodes::Opcode;
use crate::evm::precompiles::execute_precompile;
use crate::evm::stack::Stack;
use crate::evm::transient::TransientStorage;
use crate::ports::outbound::{AccessList, AccessStatus, StateAccess};
use std::cell::RefCell;
use std::collections::HashSet;

/// Maximum execution steps to prevent infinite loops (safety limit).
const MAX_EXECUTION_STEPS: u64 = 10_000_000;

/// EVM Interpreter state.
pub struct Interpreter<'a, S, A>
where
    S: StateAccess,
    A: AccessList,
{
    /// Execution context.
    pub context: ExecutionContext,
    /// Contract bytecode.
    pub code: &'a [u8],
    /// Program counter.
    pub pc: usize,
    /// EVM stack.
    pub stack: Stack,
    /// EVM memory.
    pub memory: Memory,
    /// Return data from last call.
    pub return_data: Bytes,
    /// State changes accumulated, mirroring the mutations already applied
    /// through `state` (used for the receipt/event audit trail, not as the
    /// source of truth — `state`'s own journal is what CALL/CREATE
    /// snapshot/revert_to roll back).
    pub state_changes: Vec<StateChange>,
    /// Logs emitted.
    pub logs: Vec<Log>,
    /// Gas remaining.
    pub gas_remaining: u64,
    /// Gas refund accumulated.
    pub gas_refund: u64,
    /// State access interface.
    pub state: &'a S,
    /// Access list for warm/cold tracking.
    pub access_list: &'a mut A,
    /// Valid jump destinations (cached).
    pub jump_dests: HashSet<usize>,
    /// Execution stopped flag.
    pub stopped: bool,
    /// Execution reverted flag.
    pub reverted: bool,
    /// Active hardfork rule set, governing which opcodes are recognised and
    /// how gas refunds, SSTORE metering, and CREATE are accounted for.
    pub config: Config,
    /// Transaction-scoped transient storage (EIP-1153), shared by every
    /// nested call frame and discarded with the transaction, never committed
    /// to `state`.
    pub transient: &'a RefCell<TransientStorage>,
}

impl<'a, S, A> Interpreter<'a, S, A>
where
    S: StateAccess,
    A: AccessList,
{
    /// Create a new interpreter.
    pub fn new(
        context: ExecutionContext,
        code: &'a [u8],
        state: &'a S,
        access_list: &'a mut A,
        transient: &'a RefCell<TransientStorage>,
    ) -> Self {
        Self::with_config(context, code, state, access_list, transient, Config::default())
    }

    /// Create a new interpreter targeting a specific hardfork rule set.
    pub fn with_config(
        context: ExecutionContext,
        code: &'a [u8],
        state: &'a S,
        access_list: &'a mut A,
        transient: &'a RefCell<TransientStorage>,
        config: Config,
    ) -> Self {
        let gas_remaining = context.gas_limit;
        let jump_dests = analyze_jump_dests(code);

        Self {
            context,
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Bytes::new(),
            state_changes: Vec::new(),
            logs: Vec::new(),
            gas_remaining,
            gas_refund: 0,
            state,
            access_list,
            jump_dests,
            stopped: false,
            reverted: false,
            config,
            transient,
        }
    }

    /// Execute the bytecode and return the result.
    pub async fn execute(&mut self) -> Result<ExecutionResult, VmError> {
        let mut steps = 0u64;

        while !self.stopped && self.pc < self.code.len() {
            steps += 1;
            if steps > MAX_EXECUTION_STEPS {
                return Err(VmError::Timeout {
                    elapsed_ms: 0,
                    max_ms: 5000,
                });
            }

            let opcode_byte = self.code[self.pc];
            let opcode = Opcode::from_byte(opcode_byte);

            // Check for invalid opcode
            let opcode = match opcode {
                Some(op) => op,
                None => return Err(VmError::InvalidOpcode(opcode_byte)),
            };

            // Consume base gas
            let base_gas = OPCODE_GAS[opcode_byte as usize];
            if !self.consume_gas(base_gas) {
                return Err(VmError::OutOfGas);
            }

            // Execute the opcode
            self.execute_opcode(opcode).await?;
        }

        // Build result
        let gas_used = self.context.gas_limit - self.gas_remaining;

        if self.reverted {
            Ok(ExecutionResult {
                success: false,
                output: self.return_data.clone(),
                gas_used,
                gas_refund: 0,
                state_changes: Vec::new(), // Rolled back
                logs: Vec::new(),          // Rolled back
                revert_reason: None,
            })
        } else {
            let gas_refund = gas::calculate_refund(gas_used, self.gas_refund, &self.config);
            Ok(ExecutionResult {
                success: true,
                output: self.return_data.clone(),
                gas_used,
                gas_refund,
                state_changes: std::mem::take(&mut self.state_changes),
                logs: std::mem::take(&mut self.logs),
                revert_reason: None,
            })
        }
    }

    /// Consume gas, returning false if insufficient.
    fn consume_gas(&mut self, amount: u64) -> bool {
        if amount > self.gas_remaining {
            self.gas_remaining = 0;
            false
        } else {
            self.gas_remaining -= amount;
            true
        }
    }

    /// Execute a single opcode.
    async fn execute_opcode(&mut self, opcode: Opcode) -> Result<(), VmError> {
        self.pc += 1;

        match opcode {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => {
                self.stopped = true;
            }

            Opcode::Add => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }

            Opcode::Mul => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }

            Opcode::Sub => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }

            Opcode::Div => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() { U256::zero() } else { a / b };
                self.stack.push(result)?;
            }

            Opcode::SDiv => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() {
                    U256::zero()
                } else {
                    signed_div(a, b)
                };
                self.stack.push(result)?;
            }

            Opcode::Mod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() { U256::zero() } else { a % b };
                self.stack.push(result)?;
            }

            Opcode::SMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() {
                    U256::zero()
                } else {
                    signed_mod(a, b)
                };
                self.stack.push(result)?;
            }

            Opcode::AddMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    // Use 512-bit arithmetic to prevent overflow
                    let sum = u256_to_u512(a) + u256_to_u512(b);
                    let result = sum % u256_to_u512(n);
                    u512_to_u256(result)
                };
                self.stack.push(result)?;
            }

            Opcode::MulMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    // Use 512-bit arithmetic
                    let prod = u256_to_u512(a) * u256_to_u512(b);
                    let result = prod % u256_to_u512(n);
                    u512_to_u256(result)
                };
                self.stack.push(result)?;
            }

            Opcode::Exp => {
                let base = self.stack.pop()?;
                let exp = self.stack.pop()?;

                // Dynamic gas cost
                let exp_gas = gas::exp_gas_cost(exp) - costs::EXP;
                if !self.consume_gas(exp_gas) {
                    return Err(VmError::OutOfGas);
                }

                let result = exp_by_squaring(base, exp);
                self.stack.push(result)?;
            }

            Opcode::SignExtend => {
                let k = self.stack.pop()?;
                let x = self.stack.pop()?;

                let result = if k < U256::from(32) {
                    let k = k.as_usize();
                    let bit_index = 8 * k + 7;
                    let bit = x.bit(bit_index);
                    let mask = (U256::one() << (bit_index + 1)) - 1;
                    if bit {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a < b { U256::one() } else { U256::zero() })?;
            }

            Opcode::Gt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a > b { U256::one() } else { U256::zero() })?;
            }

            Opcode::SLt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if signed_lt(a, b) {
                    U256::one()
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::SGt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if signed_lt(b, a) {
                    U256::one()
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Eq => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a == b { U256::one() } else { U256::zero() })?;
            }

            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push(if a.is_zero() {
                    U256::one()
                } else {
                    U256::zero()
                })?;
            }

            Opcode::And => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a & b)?;
            }

            Opcode::Or => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a | b)?;
            }

            Opcode::Xor => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a ^ b)?;
            }

            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }

            Opcode::Byte => {
                let i = self.stack.pop()?;
                let x = self.stack.pop()?;
                let result = if i < U256::from(32) {
                    let byte_index = 31 - i.as_usize();
                    let mut bytes = [0u8; 32];
                    x.to_big_endian(&mut bytes);
                    U256::from(bytes[31 - byte_index])
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Shl => {
                if !self.config.has_shl_shr_sar {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.as_usize()
                };
                self.stack.push(result)?;
            }

            Opcode::Shr => {
                if !self.config.has_shl_shr_sar {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.as_usize()
                };
                self.stack.push(result)?;
            }

            Opcode::Sar => {
                if !self.config.has_shl_shr_sar {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                let result = sar(value, shift);
                self.stack.push(result)?;
            }

            // =================================================================
            // KECCAK256
            // =================================================================
            Opcode::Keccak256 => {
                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Memory expansion gas
                let words_added = self.memory.expand(offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Hash cost
                let hash_gas = gas::keccak256_gas_cost(size) - costs::KECCAK256;
                if !self.consume_gas(hash_gas) {
                    return Err(VmError::OutOfGas);
                }

                let data = self.memory.read_bytes(offset, size);
                let hash = keccak256(&data);
                self.stack.push(U256::from_big_endian(hash.as_bytes()))?;
            }

            // =================================================================
            // ENVIRONMENTAL INFORMATION
            // =================================================================
            Opcode::Address => {
                let mut bytes = [0u8; 32];
                bytes[12..].copy_from_slice(self.context.address.as_bytes());
                self.stack.push(U256::from_big_endian(&bytes))?;
            }

            Opcode::Balance => {
                let addr_val = self.stack.pop()?;
                let addr = u256_to_address(addr_val);

                // Check warm/cold
                let is_cold = self.access_list.touch_account(addr) == AccessStatus::Cold;
                let gas = if is_cold {
                    costs::COLD_ACCOUNT_ACCESS
                } else {
                    costs::WARM_ACCOUNT_ACCESS
                };
                if !self.consume_gas(gas) {
                    return Err(VmError::OutOfGas);
                }

                let balance = self.state.get_balance(addr).await?;
                self.stack.push(balance)?;
            }

            Opcode::Origin => {
                let mut bytes = [0u8; 32];
                bytes[12..].copy_from_slice(self.context.origin.as_bytes());
                self.stack.push(U256::from_big_endian(&bytes))?;
            }

            Opcode::Caller => {
                let mut bytes = [0u8; 32];
                bytes[12..].copy_from_slice(self.context.caller.as_bytes());
                self.stack.push(U256::from_big_endian(&bytes))?;
            }

            Opcode::CallValue => {
                self.stack.push(self.context.value)?;
            }

            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?.as_usize();
                let data = &self.context.data;
                let mut result = [0u8; 32];

                for (i, byte) in result.iter_mut().enumerate() {
                    let pos = offset.saturating_add(i);
                    if pos < data.len() {
                        *byte = data.as_slice()[pos];
                    }
                }

                self.stack.push(U256::from_big_endian(&result))?;
            }

            Opcode::CallDataSize => {
                self.stack.push(U256::from(self.context.data.len()))?;
            }

            Opcode::CallDataCopy => {
                let dest_offset = self.stack.pop()?.as_usize();
                let data_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Memory expansion
                let words_added = self.memory.expand(dest_offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy gas
                let copy_gas = gas::copy_gas_cost(size);
                if !self.consume_gas(copy_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy data with zero padding
                let data = &self.context.data;
                for i in 0..size {
                    let byte = if data_offset + i < data.len() {
                        data.as_slice()[data_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            Opcode::CodeSize => {
                self.stack.push(U256::from(self.code.len()))?;
            }

            Opcode::CodeCopy => {
                let dest_offset = self.stack.pop()?.as_usize();
                let code_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Memory expansion
                let words_added = self.memory.expand(dest_offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy gas
                let copy_gas = gas::copy_gas_cost(size);
                if !self.consume_gas(copy_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy code with zero padding
                for i in 0..size {
                    let byte = if code_offset + i < self.code.len() {
                        self.code[code_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            Opcode::GasPrice => {
                self.stack.push(self.context.gas_price)?;
            }

            Opcode::ReturnDataSize => {
                if !self.config.has_returndata_ops {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                self.stack.push(U256::from(self.return_data.len()))?;
            }

            Opcode::ReturnDataCopy => {
                if !self.config.has_returndata_ops {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let dest_offset = self.stack.pop()?.as_usize();
                let data_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Check bounds
                if data_offset.saturating_add(size) > self.return_data.len() {
                    return Err(VmError::ReturnDataOutOfBounds {
                        offset: data_offset,
                        size,
                        available: self.return_data.len(),
                    });
                }

                // Memory expansion
                let words_added = self.memory.expand(dest_offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy gas
                let copy_gas = gas::copy_gas_cost(size);
                if !self.consume_gas(copy_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Copy return data
                let data = &self.return_data.as_slice()[data_offset..data_offset + size];
                self.memory.write_bytes(dest_offset, data)?;
            }

            // =================================================================
            // BLOCK INFORMATION
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                // Only last 256 blocks available
                let current = self.context.block.number;
                let result = if number >= U256::from(current)
                    || number < U256::from(current.saturating_sub(256))
                {
                    U256::zero()
                } else {
                    // Would need block hash oracle
                    U256::zero() // Simplified
                };
                self.stack.push(result)?;
            }

            Opcode::Coinbase => {
                let mut bytes = [0u8; 32];
                bytes[12..].copy_from_slice(self.context.block.coinbase.as_bytes());
                self.stack.push(U256::from_big_endian(&bytes))?;
            }

            Opcode::Timestamp => {
                self.stack.push(U256::from(self.context.block.timestamp))?;
            }

            Opcode::Number => {
                self.stack.push(U256::from(self.context.block.number))?;
            }

            Opcode::PrevRandao => {
                self.stack.push(self.context.block.difficulty)?;
            }

            Opcode::GasLimit => {
                self.stack.push(U256::from(self.context.block.gas_limit))?;
            }

            Opcode::ChainId => {
                if !self.config.has_chainid {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                self.stack.push(U256::from(self.context.block.chain_id))?;
            }

            Opcode::SelfBalance => {
                if !self.config.has_selfbalance {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let balance = self.state.get_balance(self.context.address).await?;
                self.stack.push(balance)?;
            }

            Opcode::BaseFee => {
                self.stack.push(self.context.block.base_fee)?;
            }

            // =================================================================
            // STACK, MEMORY, STORAGE
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }

            Opcode::MLoad => {
                let offset = self.stack.pop()?.as_usize();

                // Memory expansion
                let words_added = self.memory.expand(offset + 32)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                let value = self.memory.read_word(offset);
                self.stack.push(U256::from_big_endian(&value))?;
            }

            Opcode::MStore => {
                let offset = self.stack.pop()?.as_usize();
                let value = self.stack.pop()?;

                // Memory expansion
                let words_added = self.memory.expand(offset + 32)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                let mut bytes = [0u8; 32];
                value.to_big_endian(&mut bytes);
                self.memory.write_word(offset, &bytes)?;
            }

            Opcode::MStore8 => {
                let offset = self.stack.pop()?.as_usize();
                let value = self.stack.pop()?;

                // Memory expansion
                let words_added = self.memory.expand(offset + 1)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                self.memory.write_byte(offset, value.byte(0))?;
            }

            Opcode::SLoad => {
                let key = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);

                // Check warm/cold
                let is_cold = self
                    .access_list
                    .touch_storage(self.context.address, storage_key)
                    == AccessStatus::Cold;
                let gas = if is_cold {
                    costs::COLD_SLOAD
                } else {
                    costs::WARM_SLOAD
                };
                if !self.consume_gas(gas) {
                    return Err(VmError::OutOfGas);
                }

                let value = self
                    .state
                    .get_storage(self.context.address, storage_key)
                    .await?;
                self.stack.push(value.to_u256())?;
            }

            Opcode::SStore => {
                if self.context.is_static {
                    return Err(VmError::WriteInStaticContext);
                }

                let key = self.stack.pop()?;
                let value = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);
                let storage_value = StorageValue::from_u256(value);

                // Check warm/cold (SSTORE has complex gas rules)
                let is_cold = self
                    .access_list
                    .touch_storage(self.context.address, storage_key)
                    == AccessStatus::Cold;
                if is_cold
                    && !self.consume_gas(costs::COLD_SLOAD) {
                    return Err(VmError::OutOfGas);
                }

                let current = self
                    .state
                    .get_storage(self.context.address, storage_key)
                    .await?
                    .to_u256();

                if self.config.eip1283_sstore {
                    // EIP-2200 net-metered gas: cost and refund depend on
                    // the slot's original (pre-transaction) value as well
                    // as its current value and the value being written.
                    let original = self
                        .state
                        .get_initial_storage(self.context.address, storage_key)
                        .await?
                        .to_u256();

                    let gas = if current == value {
                        costs::WARM_SLOAD
                    } else if original == current {
                        if original.is_zero() {
                            costs::SSTORE_SET
                        } else {
                            costs::SSTORE_RESET
                        }
                    } else {
                        costs::WARM_SLOAD
                    };
                    if !self.consume_gas(gas) {
                        return Err(VmError::OutOfGas);
                    }

                    if current != value {
                        if original == current {
                            if !original.is_zero() && value.is_zero() {
                                self.gas_refund += costs::SSTORE_CLEAR_REFUND;
                            }
                        } else {
                            if !original.is_zero() {
                                if current.is_zero() {
                                    self.gas_refund = self
                                        .gas_refund
                                        .saturating_sub(costs::SSTORE_CLEAR_REFUND);
                                } else if value.is_zero() {
                                    self.gas_refund += costs::SSTORE_CLEAR_REFUND;
                                }
                            }
                            if original == value {
                                let restored_refund = if original.is_zero() {
                                    costs::SSTORE_SET - costs::WARM_SLOAD
                                } else {
                                    costs::SSTORE_RESET - costs::WARM_SLOAD
                                };
                                self.gas_refund += restored_refund;
                            }
                        }
                    }
                } else {
                    // Pre-EIP-1283: cost and refund depend only on the
                    // slot's current value, not its pre-transaction value.
                    let gas = if current.is_zero() {
                        costs::SSTORE_SET
                    } else {
                        costs::SSTORE_RESET
                    };
                    if !self.consume_gas(gas) {
                        return Err(VmError::OutOfGas);
                    }
                    if !current.is_zero() && value.is_zero() {
                        self.gas_refund += costs::SSTORE_CLEAR_REFUND;
                    }
                }

                self.state
                    .set_storage(self.context.address, storage_key, storage_value)
                    .await?;
                self.state_changes.push(StateChange::StorageWrite {
                    address: self.context.address,
                    key: storage_key,
                    value: storage_value,
                });
            }

            Opcode::Jump => {
                let dest = self.stack.pop()?.as_usize();
                if !self.jump_dests.contains(&dest) {
                    return Err(VmError::InvalidJump(dest));
                }
                self.pc = dest;
            }

            Opcode::JumpI => {
                let dest = self.stack.pop()?.as_usize();
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    if !self.jump_dests.contains(&dest) {
                        return Err(VmError::InvalidJump(dest));
                    }
                    self.pc = dest;
                }
            }

            Opcode::Pc => {
                self.stack.push(U256::from(self.pc - 1))?;
            }

            Opcode::MSize => {
                self.stack.push(U256::from(self.memory.len()))?;
            }

            Opcode::Gas => {
                self.stack.push(U256::from(self.gas_remaining))?;
            }

            Opcode::JumpDest => {
                // No-op, just a marker
            }

            // =================================================================
            // PUSH OPERATIONS
            // =================================================================
            Opcode::Push0 => {
                self.stack.push(U256::zero())?;
            }

            Opcode::Push1
            | Opcode::Push2
            | Opcode::Push3
            | Opcode::Push4
            | Opcode::Push5
            | Opcode::Push6
            | Opcode::Push7
            | Opcode::Push8
            | Opcode::Push9
            | Opcode::Push10
            | Opcode::Push11
            | Opcode::Push12
            | Opcode::Push13
            | Opcode::Push14
            | Opcode::Push15
            | Opcode::Push16
            | Opcode::Push17
            | Opcode::Push18
            | Opcode::Push19
            | Opcode::Push20
            | Opcode::Push21
            | Opcode::Push22
            | Opcode::Push23
            | Opcode::Push24
            | Opcode::Push25
            | Opcode::Push26
            | Opcode::Push27
            | Opcode::Push28
            | Opcode::Push29
            | Opcode::Push30
            | Opcode::Push31
            | Opcode::Push32 => {
                let size = opcode.push_size().unwrap_or(0);
                let mut bytes = [0u8; 32];
                let end = (self.pc + size).min(self.code.len());
                let data_len = end - self.pc;
                if data_len > 0 {
                    bytes[32 - size..32 - size + data_len]
                        .copy_from_slice(&self.code[self.pc..end]);
                }
                self.stack.push(U256::from_big_endian(&bytes))?;
                self.pc += size;
            }

            // =================================================================
            // DUP OPERATIONS
            // =================================================================
            Opcode::Dup1 => self.stack.dup(0)?,
            Opcode::Dup2 => self.stack.dup(1)?,
            Opcode::Dup3 => self.stack.dup(2)?,
            Opcode::Dup4 => self.stack.dup(3)?,
            Opcode::Dup5 => self.stack.dup(4)?,
            Opcode::Dup6 => self.stack.dup(5)?,
            Opcode::Dup7 => self.stack.dup(6)?,
            Opcode::Dup8 => self.stack.dup(7)?,
            Opcode::Dup9 => self.stack.dup(8)?,
            Opcode::Dup10 => self.stack.dup(9)?,
            Opcode::Dup11 => self.stack.dup(10)?,
            Opcode::Dup12 => self.stack.dup(11)?,
            Opcode::Dup13 => self.stack.dup(12)?,
            Opcode::Dup14 => self.stack.dup(13)?,
            Opcode::Dup15 => self.stack.dup(14)?,
            Opcode::Dup16 => self.stack.dup(15)?,

            // =================================================================
            // SWAP OPERATIONS
            // =================================================================
            Opcode::Swap1 => self.stack.swap(1)?,
            Opcode::Swap2 => self.stack.swap(2)?,
            Opcode::Swap3 => self.stack.swap(3)?,
            Opcode::Swap4 => self.stack.swap(4)?,
            Opcode::Swap5 => self.stack.swap(5)?,
            Opcode::Swap6 => self.stack.swap(6)?,
            Opcode::Swap7 => self.stack.swap(7)?,
            Opcode::Swap8 => self.stack.swap(8)?,
            Opcode::Swap9 => self.stack.swap(9)?,
            Opcode::Swap10 => self.stack.swap(10)?,
            Opcode::Swap11 => self.stack.swap(11)?,
            Opcode::Swap12 => self.stack.swap(12)?,
            Opcode::Swap13 => self.stack.swap(13)?,
            Opcode::Swap14 => self.stack.swap(14)?,
            Opcode::Swap15 => self.stack.swap(15)?,
            Opcode::Swap16 => self.stack.swap(16)?,

            // =================================================================
            // LOG OPERATIONS
            // =================================================================
            Opcode::Log0 | Opcode::Log1 | Opcode::Log2 | Opcode::Log3 | Opcode::Log4 => {
                if self.context.is_static {
                    return Err(VmError::WriteInStaticContext);
                }

                let topic_count = match opcode {
                    Opcode::Log0 => 0,
                    Opcode::Log1 => 1,
                    Opcode::Log2 => 2,
                    Opcode::Log3 => 3,
                    Opcode::Log4 => 4,
                    _ => unreachable!(),
                };

                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    let topic = self.stack.pop()?;
                    let mut bytes = [0u8; 32];
                    topic.to_big_endian(&mut bytes);
                    topics.push(Hash::new(bytes));
                }

                // Memory expansion
                let words_added = self.memory.expand(offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                // Log gas
                let log_gas = gas::log_gas_cost(size, topic_count) - costs::LOG;
                if !self.consume_gas(log_gas) {
                    return Err(VmError::OutOfGas);
                }

                let data = self.memory.read_bytes(offset, size);
                self.logs.push(Log::new(
                    self.context.address,
                    topics,
                    Bytes::from_vec(data),
                ));
            }

            // =================================================================
            // SYSTEM OPERATIONS
            // =================================================================
            Opcode::Return => {
                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Memory expansion
                let words_added = self.memory.expand(offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                self.return_data = Bytes::from_vec(self.memory.read_bytes(offset, size));
                self.stopped = true;
            }

            Opcode::Revert => {
                if !self.config.has_revert {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                // Memory expansion
                let words_added = self.memory.expand(offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }

                self.return_data = Bytes::from_vec(self.memory.read_bytes(offset, size));
                self.stopped = true;
                self.reverted = true;
            }

            Opcode::Invalid => {
                return Err(VmError::InvalidOpcode(0xFE));
            }

            Opcode::SelfDestruct => {
                if self.context.is_static {
                    return Err(VmError::WriteInStaticContext);
                }
                let beneficiary = u256_to_address(self.stack.pop()?);

                let is_cold = self.access_list.touch_account(beneficiary) == AccessStatus::Cold;
                if is_cold && !self.consume_gas(costs::COLD_ACCOUNT_ACCESS) {
                    return Err(VmError::OutOfGas);
                }

                let balance = self.state.get_balance(self.context.address).await?;
                let beneficiary_exists = self.state.account_exists(beneficiary).await?;
                if !balance.is_zero() && !beneficiary_exists
                    && !self.consume_gas(costs::SELFDESTRUCT_NEW_ACCOUNT)
                {
                    return Err(VmError::OutOfGas);
                }

                self.state
                    .self_destruct(self.context.address, beneficiary)
                    .await?;
                self.state_changes.push(StateChange::ContractDestroy {
                    address: self.context.address,
                    beneficiary,
                });
                self.stopped = true;
            }

            Opcode::ExtCodeSize => {
                let address = u256_to_address(self.stack.pop()?);
                let is_cold = self.access_list.touch_account(address) == AccessStatus::Cold;
                let gas = if is_cold {
                    costs::COLD_ACCOUNT_ACCESS
                } else {
                    costs::WARM_ACCOUNT_ACCESS
                };
                if !self.consume_gas(gas) {
                    return Err(VmError::OutOfGas);
                }
                let size = self.state.get_code_size(address).await?;
                self.stack.push(U256::from(size))?;
            }

            Opcode::ExtCodeHash => {
                if !self.config.has_extcodehash {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let address = u256_to_address(self.stack.pop()?);
                let is_cold = self.access_list.touch_account(address) == AccessStatus::Cold;
                let gas = if is_cold {
                    costs::COLD_ACCOUNT_ACCESS
                } else {
                    costs::WARM_ACCOUNT_ACCESS
                };
                if !self.consume_gas(gas) {
                    return Err(VmError::OutOfGas);
                }
                let exists = self.state.account_exists(address).await?;
                let hash = if exists {
                    self.state.get_code_hash(address).await?
                } else {
                    Hash::ZERO
                };
                self.stack.push(U256::from_big_endian(hash.as_bytes()))?;
            }

            Opcode::ExtCodeCopy => {
                let address = u256_to_address(self.stack.pop()?);
                let dest_offset = self.stack.pop()?.as_usize();
                let code_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                let is_cold = self.access_list.touch_account(address) == AccessStatus::Cold;
                let access_gas = if is_cold {
                    costs::COLD_ACCOUNT_ACCESS
                } else {
                    costs::WARM_ACCOUNT_ACCESS
                };
                if !self.consume_gas(access_gas) {
                    return Err(VmError::OutOfGas);
                }

                let words_added = self.memory.expand(dest_offset + size)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }
                let copy_gas = gas::copy_gas_cost(size);
                if !self.consume_gas(copy_gas) {
                    return Err(VmError::OutOfGas);
                }

                let code = self.state.get_code(address).await?;
                for i in 0..size {
                    let byte = if code_offset + i < code.len() {
                        code.as_slice()[code_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            Opcode::Call | Opcode::CallCode => {
                let gas_requested = self.stack.pop()?;
                let target = u256_to_address(self.stack.pop()?);
                let value = self.stack.pop()?;
                let args_offset = self.stack.pop()?.as_usize();
                let args_size = self.stack.pop()?.as_usize();
                let ret_offset = self.stack.pop()?.as_usize();
                let ret_size = self.stack.pop()?.as_usize();

                if opcode == Opcode::Call && self.context.is_static && !value.is_zero() {
                    return Err(VmError::WriteInStaticContext);
                }

                self.exec_call(
                    opcode,
                    target,
                    value,
                    args_offset,
                    args_size,
                    ret_offset,
                    ret_size,
                    gas_requested,
                )
                .await?;
            }

            Opcode::DelegateCall | Opcode::StaticCall => {
                if opcode == Opcode::StaticCall && !self.config.has_staticcall {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let gas_requested = self.stack.pop()?;
                let target = u256_to_address(self.stack.pop()?);
                let args_offset = self.stack.pop()?.as_usize();
                let args_size = self.stack.pop()?.as_usize();
                let ret_offset = self.stack.pop()?.as_usize();
                let ret_size = self.stack.pop()?.as_usize();

                self.exec_call(
                    opcode,
                    target,
                    U256::zero(),
                    args_offset,
                    args_size,
                    ret_offset,
                    ret_size,
                    gas_requested,
                )
                .await?;
            }

            Opcode::Create => {
                self.exec_create(None).await?;
            }

            Opcode::Create2 => {
                if !self.config.has_create2 {
                    return Err(VmError::InvalidOpcode(opcode_byte));
                }
                let salt = self.stack.pop()?;
                self.exec_create(Some(salt)).await?;
            }

            Opcode::MCopy => {
                let dest = self.stack.pop()?.as_usize();
                let src = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                let max_offset = dest.max(src).saturating_add(size);
                let words_added = self.memory.expand(max_offset)?;
                let mem_gas = memory_expansion_cost(
                    self.memory.word_size() - words_added,
                    self.memory.word_size(),
                );
                if !self.consume_gas(mem_gas) {
                    return Err(VmError::OutOfGas);
                }
                let copy_gas = gas::copy_gas_cost(size);
                if !self.consume_gas(copy_gas) {
                    return Err(VmError::OutOfGas);
                }

                self.memory.copy(dest, src, size)?;
            }

            Opcode::TLoad => {
                let key = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);
                let value = self
                    .transient
                    .borrow()
                    .tload(&self.context.address, &storage_key);
                self.stack.push(value.to_u256())?;
            }

            Opcode::TStore => {
                if self.context.is_static {
                    return Err(VmError::WriteInStaticContext);
                }
                let key = self.stack.pop()?;
                let value = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);
                let storage_value = StorageValue::from_u256(value);
                self.transient
                    .borrow_mut()
                    .tstore(self.context.address, storage_key, storage_value);
            }
        }

        Ok(())
    }

    /// Popping the CALL-family stack arguments already happened; this runs
    /// the shared body of CALL/CALLCODE/DELEGATECALL/STATICCALL: charges
    /// access-list and value-transfer gas, forwards gas under the EIP-150
    /// 63/64 rule, dispatches to a precompile or a nested `Interpreter`, and
    /// leaves the success flag and return data on the stack/in `return_data`.
    #[allow(clippy::too_many_arguments)]
    async fn exec_call(
        &mut self,
        opcode: Opcode,
        target: Address,
        value: U256,
        args_offset: usize,
        args_size: usize,
        ret_offset: usize,
        ret_size: usize,
        gas_requested: U256,
    ) -> Result<(), VmError> {
        let has_value = !value.is_zero();

        let mem_end = args_offset
            .saturating_add(args_size)
            .max(ret_offset.saturating_add(ret_size));
        let words_added = self.memory.expand(mem_end)?;
        let mem_gas = memory_expansion_cost(
            self.memory.word_size() - words_added,
            self.memory.word_size(),
        );
        if !self.consume_gas(mem_gas) {
            return Err(VmError::OutOfGas);
        }

        let is_cold = self.access_list.touch_account(target) == AccessStatus::Cold;
        let is_empty = if has_value {
            !self.state.account_exists(target).await?
        } else {
            false
        };
        let call_gas = gas::call_gas_cost(&CallGasParams {
            is_cold,
            has_value,
            is_empty,
        });
        if !self.consume_gas(call_gas) {
            return Err(VmError::OutOfGas);
        }

        if self.context.depth >= limits::MAX_CALL_DEPTH {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let transfer_from = self.context.address;
        let transfer_to = if opcode == Opcode::CallCode {
            self.context.address
        } else {
            target
        };
        if has_value {
            let balance = self.state.get_balance(transfer_from).await?;
            if balance < value {
                self.stack.push(U256::zero())?;
                return Ok(());
            }
        }

        let requested = u256_to_gas(gas_requested);
        let child_gas = gas::calculate_call_gas(self.gas_remaining, requested, has_value);
        let charged = if has_value {
            child_gas.saturating_sub(costs::CALL_STIPEND)
        } else {
            child_gas
        };
        if !self.consume_gas(charged) {
            return Err(VmError::OutOfGas);
        }

        let input = Bytes::from_vec(self.memory.read_bytes(args_offset, args_size));

        let snapshot = self.state.snapshot();
        if has_value {
            self.state.transfer(transfer_from, transfer_to, value).await?;
        }

        if let Some(precompile_result) =
            execute_precompile(target, input.as_slice(), child_gas, &self.config.precompiles)
        {
            match precompile_result {
                Ok(output) => {
                    let unused = child_gas.saturating_sub(output.gas_used);
                    self.gas_remaining = self.gas_remaining.saturating_add(unused);
                    self.return_data = output.output.clone();
                    let copy_len = output.output.len().min(ret_size);
                    if copy_len > 0 {
                        self.memory
                            .write_bytes(ret_offset, &output.output.as_slice()[..copy_len])?;
                    }
                    self.stack.push(U256::one())?;
                }
                Err(_) => {
                    self.state.revert_to(snapshot);
                    self.return_data = Bytes::new();
                    self.stack.push(U256::zero())?;
                }
            }
            return Ok(());
        }

        let code = self.state.get_code(target).await?;
        let child_context = match opcode {
            Opcode::Call => self
                .context
                .child_call(self.context.address, target, value, input, child_gas),
            Opcode::CallCode => self.context.child_callcode(value, input, child_gas),
            Opcode::DelegateCall => self.context.child_delegatecall(target, input, child_gas),
            Opcode::StaticCall => self.context.child_staticcall(target, input, child_gas),
            _ => unreachable!(),
        };

        let mut child = Interpreter::with_config(
            child_context,
            code.as_slice(),
            self.state,
            &mut *self.access_list,
            self.transient,
            self.config.clone(),
        );
        let result = Box::pin(child.execute()).await;

        match result {
            Err(_) => {
                self.state.revert_to(snapshot);
                self.return_data = Bytes::new();
                self.stack.push(U256::zero())?;
            }
            Ok(exec_result) => {
                self.return_data = exec_result.output.clone();
                let copy_len = exec_result.output.len().min(ret_size);
                if copy_len > 0 {
                    self.memory
                        .write_bytes(ret_offset, &exec_result.output.as_slice()[..copy_len])?;
                }

                let unused = child_gas.saturating_sub(exec_result.gas_used);
                self.gas_remaining = self.gas_remaining.saturating_add(unused);

                if exec_result.success {
                    self.gas_refund += exec_result.gas_refund;
                    self.state_changes.extend(exec_result.state_changes);
                    self.logs.extend(exec_result.logs);
                    self.stack.push(U256::one())?;
                } else {
                    self.state.revert_to(snapshot);
                    self.stack.push(U256::zero())?;
                }
            }
        }

        Ok(())
    }

    /// Runs CREATE (`salt = None`) or CREATE2 (`salt = Some(..)`): derives
    /// the new contract's address, runs its init code as a child frame, and
    /// deposits the returned bytecode if it fits the EIP-170 size cap and
    /// the init code's remaining gas can afford the per-byte deposit cost.
    async fn exec_create(&mut self, salt: Option<U256>) -> Result<(), VmError> {
        if self.context.is_static {
            return Err(VmError::WriteInStaticContext);
        }

        let value = self.stack.pop()?;
        let offset = self.stack.pop()?.as_usize();
        let size = self.stack.pop()?.as_usize();

        if self.config.limit_init_code_size && size > limits::MAX_INIT_CODE_SIZE {
            return Err(VmError::InitCodeSizeExceeded {
                size,
                max: limits::MAX_INIT_CODE_SIZE,
            });
        }

        let words_added = self.memory.expand(offset + size)?;
        let mem_gas = memory_expansion_cost(
            self.memory.word_size() - words_added,
            self.memory.word_size(),
        );
        if !self.consume_gas(mem_gas) {
            return Err(VmError::OutOfGas);
        }

        let hash_gas = gas::create_gas_cost(size) - costs::CREATE;
        if !self.consume_gas(hash_gas) {
            return Err(VmError::OutOfGas);
        }
        if self.config.limit_init_code_size {
            let word_count = size.div_ceil(32) as u64;
            if !self.consume_gas(costs::INIT_CODE_WORD * word_count) {
                return Err(VmError::OutOfGas);
            }
        }

        let init_code = self.memory.read_bytes(offset, size);

        if self.context.depth >= limits::MAX_CALL_DEPTH {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let balance = self.state.get_balance(self.context.address).await?;
        if balance < value {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let creator_nonce = self.state.get_nonce(self.context.address).await?;
        let new_address = match salt {
            Some(salt_value) => {
                let mut salt_bytes = [0u8; 32];
                salt_value.to_big_endian(&mut salt_bytes);
                compute_contract_address_create2(
                    self.context.address,
                    Hash::new(salt_bytes),
                    &init_code,
                )
            }
            None => compute_contract_address(self.context.address, creator_nonce),
        };

        let collision = match self.state.get_account(new_address).await? {
            Some(account) => account.nonce != 0 || account.is_contract(),
            None => false,
        };
        if collision {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        if self.config.increment_nonce_on_create {
            self.state.increment_nonce(self.context.address).await?;
        }

        let child_gas = gas::calculate_call_gas(self.gas_remaining, self.gas_remaining, false);
        if !self.consume_gas(child_gas) {
            return Err(VmError::OutOfGas);
        }

        let snapshot = self.state.snapshot();
        self.state
            .set_account(new_address, AccountState::new_eoa(U256::zero(), 1))
            .await?;
        if !value.is_zero() {
            self.state
                .transfer(self.context.address, new_address, value)
                .await?;
        }

        let child_context = self.context.child_create(new_address, value, child_gas);
        let mut child = Interpreter::with_config(
            child_context,
            &init_code,
            self.state,
            &mut *self.access_list,
            self.transient,
            self.config.clone(),
        );
        let result = Box::pin(child.execute()).await;

        match result {
            Err(_) => {
                self.state.revert_to(snapshot);
                self.return_data = Bytes::new();
                self.stack.push(U256::zero())?;
            }
            Ok(exec_result) if !exec_result.success => {
                self.state.revert_to(snapshot);
                let unused = child_gas.saturating_sub(exec_result.gas_used);
                self.gas_remaining = self.gas_remaining.saturating_add(unused);
                self.return_data = exec_result.output;
                self.stack.push(U256::zero())?;
            }
            Ok(exec_result) => {
                let deployed_code = exec_result.output;
                let remaining_after_exec = child_gas.saturating_sub(exec_result.gas_used);
                let deposit_cost = costs::CODE_DEPOSIT.saturating_mul(deployed_code.len() as u64);
                let code_too_large = self
                    .config
                    .limit_contract_code_size
                    .is_some_and(|max| deployed_code.len() > max);
                let bad_prefix = deployed_code.as_slice().first() == Some(&0xEF);
                let cannot_afford_deposit = deposit_cost > remaining_after_exec;

                if code_too_large
                    || bad_prefix
                    || (cannot_afford_deposit && self.config.fail_contract_creation_on_oog)
                {
                    self.state.revert_to(snapshot);
                    self.return_data = Bytes::new();
                    self.stack.push(U256::zero())?;
                } else {
                    // Pre-Homestead, a deposit the creator can't afford is
                    // simply skipped rather than failing the creation.
                    let deposit_cost = if cannot_afford_deposit {
                        0
                    } else {
                        self.state.set_code(new_address, deployed_code).await?;
                        deposit_cost
                    };
                    let total_used = exec_result.gas_used.saturating_add(deposit_cost);
                    let unused = child_gas.saturating_sub(total_used);
                    self.gas_remaining = self.gas_remaining.saturating_add(unused);
                    self.gas_refund += exec_result.gas_refund;
                    self.state_changes.extend(exec_result.state_changes);
                    self.logs.extend(exec_result.logs);
                    if self.config.increment_nonce_on_create {
                        self.state_changes.push(StateChange::NonceIncrement {
                            address: self.context.address,
                        });
                    }

                    self.return_data = Bytes::new();
                    let mut addr_bytes = [0u8; 32];
                    addr_bytes[12..].copy_from_slice(new_address.as_bytes());
                    self.stack.push(U256::from_big_endian(&addr_bytes))?;
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Analyze bytecode to find valid JUMPDEST locations.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;

    while i < code.len() {
        let op = code[i];
        if op == 0x5B {
            // JUMPDEST
            dests.insert(i);
        }
        // Skip PUSH data bytes
        if (0x60..=0x7F).contains(&op) {
            let size = (op - 0x5F) as usize;
            i += size;
        }
        i += 1;
    }

    dests
}

/// Convert U256 to address (take lower 20 bytes).
fn u256_to_address(value: U256) -> Address {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes[12..32]);
    Address::new(addr)
}

/// Convert a U256 stack value to a gas amount, saturating at `u64::MAX`.
fn u256_to_gas(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Signed less than comparison.
fn signed_lt(a: U256, b: U256) -> bool {
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    match (a_neg, b_neg) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed division.
fn signed_div(a: U256, b: U256) -> U256 {
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    let a_abs = if a_neg {
        (!a).overflowing_add(U256::one()).0
    } else {
        a
    };
    let b_abs = if b_neg {
        (!b).overflowing_add(U256::one()).0
    } else {
        b
    };
    let result = a_abs / b_abs;
    if a_neg == b_neg {
        result
    } else {
        (!result).overflowing_add(U256::one()).0
    }
}

/// Signed modulo.
fn signed_mod(a: U256, b: U256) -> U256 {
    let a_neg = a.bit(255);
    let a_abs = if a_neg {
        (!a).overflowing_add(U256::one()).0
    } else {
        a
    };
    let b_abs = if b.bit(255) {
        (!b).overflowing_add(U256::one()).0
    } else {
        b
    };
    let result = a_abs % b_abs;
    if a_neg {
        (!result).overflowing_add(U256::one()).0
    } else {
        result
    }
}

/// Arithmetic shift right.
fn sar(value: U256, shift: U256) -> U256 {
    if shift >= U256::from(256) {
        if value.bit(255) {
            U256::MAX
        } else {
            U256::zero()
        }
    } else {
        let shift = shift.as_usize();
        let is_negative = value.bit(255);
        let shifted = value >> shift;
        if is_negative {
            // Fill with 1s
            let mask = U256::MAX << (256 - shift);
            shifted | mask
        } else {
            shifted
        }
    }
}

/// Exponentiation by squaring.
fn exp_by_squaring(base: U256, mut exp: U256) -> U256 {
    if exp.is_zero() {
        return U256::one();
    }

    let mut result = U256::one();
    let mut base = base;

    while !exp.is_zero() {
        if exp.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exp >>= 1;
        base = base.overflowing_mul(base).0;
    }

    result
}

/// Convert U256 to U512 for addmod/mulmod.
fn u256_to_u512(value: U256) -> primitive_types::U512 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes[32..]);
    primitive_types::U512::from_big_endian(&bytes)
}

/// Convert U512 back to U256.
fn u512_to_u256(value: primitive_types::U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_jump_dests() {
        // Code: PUSH1 0x04 JUMP JUMPDEST STOP
        let code = vec![0x60, 0x04, 0x56, 0x5B, 0x00];
        let dests = analyze_jump_dests(&code);
        assert!(dests.contains(&3)); // JUMPDEST at position 3
        assert!(!dests.contains(&0));
    }

    #[test]
    fn test_u256_to_address() {
        let value = U256::from(0x1234u64);
        let addr = u256_to_address(value);
        assert_eq!(addr.as_bytes()[19], 0x34);
        assert_eq!(addr.as_bytes()[18], 0x12);
    }

    #[test]
    fn test_exp_by_squaring() {
        assert_eq!(exp_by_squaring(U256::from(2), U256::from(0)), U256::one());
        assert_eq!(exp_by_squaring(U256::from(2), U256::from(1)), U256::from(2));
        assert_eq!(
            exp_by_squaring(U256::from(2), U256::from(10)),
            U256::from(1024)
        );
        assert_eq!(
            exp_by_squaring(U256::from(3), U256::from(3)),
            U256::from(27)
        );
    }

    #[test]
    fn test_signed_lt() {
        let neg_one = !U256::zero(); // -1 in two's complement
        let one = U256::one();

        assert!(signed_lt(neg_one, one)); // -1 < 1
        assert!(!signed_lt(one, neg_one)); // 1 > -1
        assert!(!signed_lt(one, one)); // 1 == 1
    }

    use crate::adapters::{InMemoryAccessList, InMemoryState};
    use crate::domain::entities::BlockContext;

    fn ctx(code_address: Address, gas_limit: u64) -> ExecutionContext {
        ExecutionContext::new_transaction(
            Address::new([0xAA; 20]),
            code_address,
            U256::zero(),
            Bytes::new(),
            gas_limit,
            U256::one(),
            BlockContext::default(),
        )
    }

    #[tokio::test]
    async fn sstore_write_then_restore_original_refunds_net_cost() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let addr = Address::new([0x01; 20]);

        // PUSH1 1 PUSH1 0 SSTORE  (slot 0: 0 -> 1, dirty write, no refund yet)
        // PUSH1 0 PUSH1 0 SSTORE  (slot 0: 1 -> 0, back to its original value)
        //
        // Restoring a slot to its pre-transaction value mid-transaction
        // refunds the net cost of the original write (EIP-2200): here
        // SSTORE_SET minus the warm-slot read cost already paid.
        let code = vec![
            0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0x55,
        ];
        let context = ctx(addr, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::with_config(
            context,
            &code,
            &state,
            &mut access_list,
            &transient,
            Config::shanghai(),
        );

        let result = interp.execute().await.unwrap();
        assert!(result.success);
        assert_eq!(result.gas_refund, costs::SSTORE_SET - costs::WARM_SLOAD);
    }

    #[tokio::test]
    async fn sstore_clearing_a_nonzero_original_refunds_clear_schedule() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let addr = Address::new([0x01; 20]);
        let key = StorageKey::new([0u8; 32]);
        state.set_storage_value(addr, key, StorageValue::from_u256(U256::from(7)));

        // PUSH1 0 PUSH1 0 SSTORE (slot 0: original 7 -> 0, a clear)
        let code = vec![0x60, 0x00, 0x60, 0x00, 0x55];
        let context = ctx(addr, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);

        let result = interp.execute().await.unwrap();
        assert!(result.success);
        assert_eq!(result.gas_refund, costs::SSTORE_CLEAR_REFUND);
    }

    #[tokio::test]
    async fn selfdestruct_emits_contract_destroy_and_stops() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let addr = Address::new([0x01; 20]);
        let beneficiary = Address::new([0x02; 20]);
        state.set_balance(addr, U256::from(1000));

        // PUSH20 <beneficiary> SELFDESTRUCT
        let mut code = vec![0x73];
        code.extend_from_slice(beneficiary.as_bytes());
        code.push(0xFF);

        let context = ctx(addr, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);
        let result = interp.execute().await.unwrap();

        assert!(result.success);
        assert!(interp.stopped);
        assert_eq!(
            result.state_changes,
            vec![StateChange::ContractDestroy {
                address: addr,
                beneficiary,
            }]
        );
    }

    #[tokio::test]
    async fn extcodesize_reads_deployed_code_length() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let target = Address::new([0x03; 20]);
        state.set_code(target, Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0xF3]));

        // PUSH20 <target> EXTCODESIZE
        let mut code = vec![0x73];
        code.extend_from_slice(target.as_bytes());
        code.push(0x3B);

        let addr = Address::new([0x01; 20]);
        let context = ctx(addr, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);
        interp.execute().await.unwrap();

        assert_eq!(interp.stack.pop().unwrap(), U256::from(5));
    }

    #[tokio::test]
    async fn call_forwards_input_and_returns_callee_output() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let caller = Address::new([0x01; 20]);
        let target = Address::new([0x02; 20]);

        // PUSH1 0x2a PUSH1 0x00 MSTORE PUSH1 0x20 PUSH1 0x00 RETURN
        let callee_code = vec![0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        state.set_code(target, Bytes::from_slice(&callee_code));

        let mut code = vec![
            0x60, 0x20, // retSize
            0x60, 0x00, // retOffset
            0x60, 0x00, // argsSize
            0x60, 0x00, // argsOffset
            0x60, 0x00, // value
            0x73, // PUSH20 target
        ];
        code.extend_from_slice(target.as_bytes());
        code.extend_from_slice(&[0x61, 0x27, 0x10]); // PUSH2 gas = 10000
        code.push(0xf1); // CALL
        code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0xf3]); // RETURN(0, 32)

        let context = ctx(caller, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);
        let result = interp.execute().await.unwrap();

        assert!(result.success);
        assert_eq!(result.output.len(), 32);
        assert_eq!(result.output.as_slice()[31], 0x2a);
    }

    #[tokio::test]
    async fn call_reverting_callee_propagates_revert_output_and_pushes_zero() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let caller = Address::new([0x01; 20]);
        let target = Address::new([0x02; 20]);

        // PUSH1 0x2a PUSH1 0x00 MSTORE PUSH1 0x20 PUSH1 0x00 REVERT
        let callee_code = vec![0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xfd];
        state.set_code(target, Bytes::from_slice(&callee_code));

        let mut code = vec![
            0x60, 0x00, // retSize
            0x60, 0x00, // retOffset
            0x60, 0x00, // argsSize
            0x60, 0x00, // argsOffset
            0x60, 0x00, // value
            0x73, // PUSH20 target
        ];
        code.extend_from_slice(target.as_bytes());
        code.extend_from_slice(&[0x61, 0x27, 0x10]); // PUSH2 gas = 10000
        code.push(0xf1); // CALL
        code.push(0x00); // STOP

        let context = ctx(caller, 200_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);
        let result = interp.execute().await.unwrap();

        assert!(result.success); // the caller itself didn't revert
        assert_eq!(interp.stack.pop().unwrap(), U256::zero());
    }

    #[tokio::test]
    async fn create_deploys_code_at_the_expected_address() {
        let state = InMemoryState::new();
        let mut access_list = InMemoryAccessList::new();
        let creator = Address::new([0x01; 20]);

        // Init code: store STOP (0x00) at memory[0], return 1 byte.
        let init_code = vec![0x60, 0x00, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
        let init_len = init_code.len() as u8;

        let mut code = vec![
            0x60, init_len, // PUSH1 len
            0x60, 15, // PUSH1 init_offset (length of the preamble below)
            0x60, 0x00, // PUSH1 dest
            0x39, // CODECOPY
            0x60, 0x00, // PUSH1 value
            0x60, 0x00, // PUSH1 offset
            0x60, init_len, // PUSH1 size
            0xf0, // CREATE
            0x00, // STOP
        ];
        assert_eq!(code.len(), 15);
        code.extend_from_slice(&init_code);

        let expected_address = compute_contract_address(creator, 0);

        let context = ctx(creator, 500_000);
        let transient = RefCell::new(TransientStorage::new());
        let mut interp = Interpreter::new(context, &code, &state, &mut access_list, &transient);
        let result = interp.execute().await.unwrap();

        assert!(result.success);
        assert_eq!(interp.stack.pop().unwrap(), address_to_u256(expected_address));

        let deployed = state.get_code(expected_address).await.unwrap();
        assert_eq!(deployed.as_slice(), &[0x00]);
        assert_eq!(state.get_nonce(creator).await.unwrap(), 1);
    }

    fn address_to_u256(address: Address) -> U256 {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(address.as_bytes());
        U256::from_big_endian(&bytes)
    }
}
