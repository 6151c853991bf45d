//! Orchestrator error types.

use crate::chain::ChainError;
use crate::coprocessor::CoprocessorError;
use thiserror::Error;

/// Terminal failures of one operation. All variants except [`OperationError::Chain`]
/// are raised before anything is submitted.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("--fromindex is out of range: {0} (available signers: {1})")]
    SignerOutOfRange(String, usize),

    #[error("Amount exceeds uint128 maximum: {0}")]
    AmountOverflow(String),

    #[error("co-processor unavailable: {0}")]
    CoprocessorUnavailable(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl OperationError {
    /// Caller-correctable failures that never touched a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OperationError::InvalidArgument(_)
                | OperationError::SignerOutOfRange(..)
                | OperationError::AmountOverflow(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::InvalidArgument(_) => "InvalidArgument",
            OperationError::SignerOutOfRange(..) => "SignerOutOfRange",
            OperationError::AmountOverflow(_) => "AmountOverflow",
            OperationError::CoprocessorUnavailable(_) => "CoprocessorUnavailable",
            OperationError::Chain(_) => "ChainError",
        }
    }
}

impl From<CoprocessorError> for OperationError {
    fn from(e: CoprocessorError) -> Self {
        match e {
            CoprocessorError::Unavailable(msg) => OperationError::CoprocessorUnavailable(msg),
            other => OperationError::CoprocessorUnavailable(other.to_string()),
        }
    }
}
