//! # Bridge Constants
//!
//! All global constants used by the orchestrator and the gateway.

use std::time::Duration;

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Listening port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Network used when a request carries no override
pub const DEFAULT_NETWORK: &str = "localhost";

/// External tool used by the command backend (program followed by leading args)
pub const DEFAULT_COMMAND: &str = "npx hardhat";

/// Static asset root, relative to the working directory
pub const DEFAULT_ASSET_ROOT: &str = "public";

/// Document served for `/`
pub const INDEX_DOCUMENT: &str = "index.html";

// ============================================================================
// Co-processor Handshake
// ============================================================================

/// Total handshake attempts (first try plus two retries)
pub const COPROCESSOR_HANDSHAKE_ATTEMPTS: u32 = 3;

/// Fixed delay between handshake attempts
pub const COPROCESSOR_RETRY_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// Token
// ============================================================================

/// Deployment record name of the confidential token contract
pub const TOKEN_CONTRACT_NAME: &str = "RedactedToken";

/// Canonical handle of an encrypted balance that was never written
pub const ZERO_HANDLE: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Decimals of the native currency (1 ETH = 10^18 wei)
pub const ETH_DECIMALS: usize = 18;

/// Largest magnitude the token's encrypted type can hold (2^128 - 1)
pub const TOKEN_MAX_AMOUNT: u128 = u128::MAX;

// ============================================================================
// Devnet
// ============================================================================

/// Number of provisioned devnet signers
pub const DEFAULT_DEVNET_ACCOUNTS: usize = 20;

/// Native balance each devnet signer starts with (10 000 ETH)
pub const DEVNET_INITIAL_BALANCE_WEI: u128 = 10_000 * 1_000_000_000_000_000_000;
