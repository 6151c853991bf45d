//! # Token Contract Interface
//!
//! What the orchestrator needs from the chain: the deployment record of the
//! confidential token, balance reads, and signed submission with a
//! confirmation wait.

pub mod address;
pub mod receipt;
pub mod transaction;

pub use address::*;
pub use receipt::*;
pub use transaction::*;

use async_trait::async_trait;

/// Failures of the chain collaborator itself. A reverted call is not an
/// error; it is a [`Receipt`] with [`TxStatus::Reverted`].
#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error("no deployment found for {0}")]
    NotDeployed(String),
    #[error("no contract at {0}")]
    UnknownContract(String),
    #[error("insufficient funds for {0}: balance {1} wei, required {2} wei")]
    InsufficientFunds(String, u128, u128),
    #[error("unknown transaction {0}")]
    UnknownTransaction(String),
    #[error("rpc error: {0}")]
    Rpc(String),
}

#[async_trait]
pub trait TokenContract: Send + Sync {
    /// Resolves the deployed token address for the current network.
    async fn deployed_address(&self) -> Result<Address, ChainError>;

    /// Native currency balance in wei.
    async fn native_balance(&self, who: &Address) -> Result<u128, ChainError>;

    /// Encrypted balance handle; the zero sentinel when nothing was written.
    async fn encrypted_balance(&self, contract: &Address, who: &Address)
        -> Result<Handle, ChainError>;

    /// Plaintext ledger entry held by the contract.
    async fn clear_balance(&self, contract: &Address, who: &Address) -> Result<u128, ChainError>;

    /// Signs `call` as `from` and broadcasts it. Returns once accepted into
    /// the pending pool; inclusion is awaited separately.
    async fn submit(
        &self,
        contract: &Address,
        from: &Address,
        call: ContractCall,
    ) -> Result<TxHash, ChainError>;

    /// Blocks until `hash` is included and returns its receipt.
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, ChainError>;
}
