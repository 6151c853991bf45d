//! # Receipts
//!
//! Confirmation records for submitted contract calls.

use crate::chain::TxHash;
use serde::{Deserialize, Serialize};

/// Execution status reported by the chain once a transaction is included.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Succeeded,
    Reverted, // Included, but the contract rejected the call
}

impl TxStatus {
    /// Numeric form printed as `status=<n>` (1 = success, 0 = revert).
    pub fn code(self) -> u8 {
        match self {
            TxStatus::Succeeded => 1,
            TxStatus::Reverted => 0,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TxStatus::Succeeded),
            0 => Some(TxStatus::Reverted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Succeeded => "succeeded",
            TxStatus::Reverted => "reverted",
        }
    }
}

/// A confirmed inclusion of a transaction.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: TxStatus,
    pub timestamp: i64,
}

/// What an operation reports after its transaction was confirmed.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    pub status: TxStatus,
}

impl From<Receipt> for TransactionOutcome {
    fn from(receipt: Receipt) -> Self {
        TransactionOutcome {
            tx_hash: receipt.tx_hash,
            status: receipt.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TxStatus::Succeeded.code(), 1);
        assert_eq!(TxStatus::Reverted.code(), 0);
        assert_eq!(TxStatus::from_code(1), Some(TxStatus::Succeeded));
        assert_eq!(TxStatus::from_code(0), Some(TxStatus::Reverted));
        assert_eq!(TxStatus::from_code(2), None);
    }
}
