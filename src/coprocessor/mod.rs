//! # Co-processor Interface
//!
//! The confidential-computing service that builds verifiable encrypted
//! inputs and decrypts handles for authorized signers.

pub mod session;

pub use session::{ensure_ready, CoprocessorSession, RetryPolicy};

use crate::chain::{Address, Handle};
use async_trait::async_trait;
use serde::Serialize;

/// Ciphertext handle plus the proof binding it to one (contract, caller) pair.
///
/// Not `Clone`: an input is moved into exactly one [`crate::chain::ContractCall`].
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: Handle,
    pub proof: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoprocessorError {
    #[error("co-processor unavailable: {0}")]
    Unavailable(String),
    #[error("{signer} is not authorized to decrypt {handle}")]
    Unauthorized { handle: String, signer: String },
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(String),
    #[error("co-processor request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Coprocessor: Send + Sync {
    /// Handshake with the service. Must succeed before inputs or decryptions.
    async fn initialize(&self) -> Result<(), CoprocessorError>;

    /// Encrypts `value` for use by `caller` against `contract`.
    async fn build_encrypted_input(
        &self,
        contract: &Address,
        caller: &Address,
        value: u128,
    ) -> Result<EncryptedInput, CoprocessorError>;

    /// Decrypts `handle` on behalf of `signer`, scoped to `contract`.
    async fn user_decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        signer: &Address,
    ) -> Result<u128, CoprocessorError>;
}
