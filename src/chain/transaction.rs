//! # Contract Calls
//!
//! The state-changing entry points of the confidential token contract.

use crate::chain::Address;
use crate::coprocessor::EncryptedInput;
use serde::Serialize;

/// A mutation submitted to the token contract.
///
/// Calls that move confidential value carry an [`EncryptedInput`]; the input
/// is moved into the call so it cannot be submitted twice.
#[derive(Serialize, Debug)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ContractCall {
    MintPrivate {
        to: Address,
        input: EncryptedInput,
    },
    MintClear {
        to: Address,
        amount: u128,
    },
    TransferPrivate {
        to: Address,
        input: EncryptedInput,
    },
    /// Moves `amount` from the caller's clear ledger into its encrypted balance.
    EncryptFromClear {
        amount: u128,
        input: EncryptedInput,
    },
    /// Moves `amount` from the caller's encrypted balance into its clear ledger.
    DecryptToClear {
        amount: u128,
        input: EncryptedInput,
    },
    /// Carries `value` wei; credited to the clear ledger.
    DepositEth {
        value: u128,
    },
    /// Carries `value` wei; credited to the encrypted balance.
    DepositAndEncrypt {
        value: u128,
        input: EncryptedInput,
    },
    WithdrawEth {
        amount: u128,
    },
}

impl ContractCall {
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::MintPrivate { .. } => "mintPrivate",
            ContractCall::MintClear { .. } => "mintClear",
            ContractCall::TransferPrivate { .. } => "transferPrivate",
            ContractCall::EncryptFromClear { .. } => "encryptFromClear",
            ContractCall::DecryptToClear { .. } => "decryptToClear",
            ContractCall::DepositEth { .. } => "depositETH",
            ContractCall::DepositAndEncrypt { .. } => "depositAndEncrypt",
            ContractCall::WithdrawEth { .. } => "withdrawETH",
        }
    }

    /// Native currency attached to the call.
    pub fn attached_value(&self) -> u128 {
        match self {
            ContractCall::DepositEth { value } | ContractCall::DepositAndEncrypt { value, .. } => {
                *value
            }
            _ => 0,
        }
    }
}
