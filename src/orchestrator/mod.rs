//! # Operation Orchestrator
//!
//! Runs one confidential-token operation to completion:
//! validate → co-processor handshake → encrypted input → submit → confirm.
//!
//! Nothing is cached between operations. Each call resolves its signer,
//! contract and co-processor session afresh.

pub mod error;
pub mod operations;
pub mod transcript;


pub use error::OperationError;
pub use transcript::Transcript;

use crate::chain::{Address, Handle, TokenContract, TransactionOutcome};
use crate::coprocessor::{Coprocessor, RetryPolicy};
use crate::wallet::SignerSet;
use std::sync::Arc;

/// The operations the bridge knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetAddress,
    ListAccounts,
    GetBalance,
    Mint,
    MintClear,
    Transfer,
    EncryptFromClear,
    DecryptToClear,
    DepositEth,
    DepositAndEncrypt,
    WithdrawEth,
}

impl OperationKind {
    /// True for operations that end in an on-chain submission.
    pub fn submits(self) -> bool {
        !matches!(
            self,
            OperationKind::GetAddress | OperationKind::ListAccounts | OperationKind::GetBalance
        )
    }

    /// Whether the operation takes a recipient.
    pub fn needs_recipient(self) -> bool {
        matches!(
            self,
            OperationKind::Mint | OperationKind::MintClear | OperationKind::Transfer
        )
    }
}

/// Raw request parameters, still untyped. Parsing them is part of the
/// operation so that every failure carries the same taxonomy.
#[derive(Debug, Clone, Default)]
pub struct OperationParams {
    pub to: Option<String>,
    pub value: Option<String>,
    pub address: Option<String>,
    pub from_index: Option<String>,
    pub contract: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub params: OperationParams,
}

impl Operation {
    pub fn new(kind: OperationKind, params: OperationParams) -> Self {
        Operation { kind, params }
    }
}

/// Point-in-time view of one account. Never cached.
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    pub account: Address,
    pub native_balance: u128,
    pub encrypted_handle: Handle,
    pub clear_balance: u128,
    /// 0 when there is no ciphertext, the co-processor is down, or decryption failed.
    pub decrypted_balance: u128,
}

#[derive(Debug, Clone)]
pub enum OperationOutput {
    Address(Address),
    Accounts(Vec<Address>),
    Balance(BalanceSnapshot),
    Transaction(TransactionOutcome),
}

/// Terminal state of one operation plus everything it printed on the way.
#[derive(Debug)]
pub struct Execution {
    pub transcript: Transcript,
    pub result: Result<OperationOutput, OperationError>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub network: String,
    pub retry: RetryPolicy,
}

pub struct Orchestrator {
    contract: Arc<dyn TokenContract>,
    coprocessor: Arc<dyn Coprocessor>,
    signers: SignerSet,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        contract: Arc<dyn TokenContract>,
        coprocessor: Arc<dyn Coprocessor>,
        signers: SignerSet,
        settings: OrchestratorSettings,
    ) -> Self {
        Orchestrator {
            contract,
            coprocessor,
            signers,
            settings,
        }
    }

    /// Runs `op` and always returns a transcript, even on failure.
    pub async fn execute(&self, op: &Operation) -> Execution {
        let mut transcript = Transcript::new();
        log::debug!("[{}] executing {:?}", self.settings.network, op.kind);

        let p = &op.params;
        let t = &mut transcript;
        let result = match op.kind {
            OperationKind::GetAddress => self.get_address(t).await,
            OperationKind::ListAccounts => self.list_accounts(t),
            OperationKind::GetBalance => {
                self.get_balance(p.address.as_deref(), p.from_index.as_deref(), p.contract.as_deref(), t)
                    .await
            }
            OperationKind::Mint => self.mint(p, t).await,
            OperationKind::MintClear => self.mint_clear(p, t).await,
            OperationKind::Transfer => self.transfer(p, t).await,
            OperationKind::EncryptFromClear => self.encrypt_from_clear(p, t).await,
            OperationKind::DecryptToClear => self.decrypt_to_clear(p, t).await,
            OperationKind::DepositEth => self.deposit_eth(p, t).await,
            OperationKind::DepositAndEncrypt => self.deposit_and_encrypt(p, t).await,
            OperationKind::WithdrawEth => self.withdraw_eth(p, t).await,
        };

        if let Err(e) = &result {
            log::error!("[{}] {:?} failed ({}): {}", self.settings.network, op.kind, e.kind(), e);
            transcript.line(format!("Error: {}", e));
        }

        Execution { transcript, result }
    }
}
