//! # Mock Co-processor
//!
//! Stands in for the confidential-computing service on the devnet. Values are
//! kept in plaintext behind random handles; access is governed by a per-handle
//! ACL the same way the real service gates user decryption.

use crate::chain::{Address, Handle};
use crate::coprocessor::{Coprocessor, CoprocessorError, EncryptedInput};
use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

struct Ciphertext {
    value: u128,
    acl: HashSet<String>,
}

/// Handle registry shared by the devnet contract and the mock co-processor.
#[derive(Default)]
pub struct CiphertextStore {
    entries: Mutex<HashMap<Handle, Ciphertext>>,
}

impl CiphertextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under a fresh handle readable by `allowed`.
    pub fn insert(&self, value: u128, allowed: &[&Address]) -> Handle {
        let mut bytes = [0u8; 32];
        let handle = loop {
            rand::thread_rng().fill_bytes(&mut bytes);
            let candidate = Handle::from_bytes(&bytes);
            if !candidate.is_zero() {
                break candidate;
            }
        };
        let acl = allowed.iter().map(|a| a.canonical()).collect();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(handle.clone(), Ciphertext { value, acl });
        handle
    }

    pub fn value(&self, handle: &Handle) -> Option<u128> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(handle).map(|c| c.value)
    }

    pub fn is_allowed(&self, handle: &Handle, who: &Address) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(handle)
            .map(|c| c.acl.contains(&who.canonical()))
            .unwrap_or(false)
    }

    /// Forgets a handle. Used for consumed inputs and superseded balances;
    /// a removed handle is unknown from then on.
    pub fn remove(&self, handle: &Handle) -> Option<u128> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(handle).map(|c| c.value)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proof binding an input handle to the (contract, caller) pair it was built for.
pub fn input_proof(handle: &Handle, contract: &Address, caller: &Address) -> String {
    let mut hasher = Sha256::new();
    hasher.update(handle.as_str().as_bytes());
    hasher.update(contract.canonical().as_bytes());
    hasher.update(caller.canonical().as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

pub struct MockCoprocessor {
    store: Arc<CiphertextStore>,
    available: AtomicBool,
    failing_handshakes: AtomicU32,
    handshakes: AtomicU32,
    inputs_built: AtomicU32,
}

impl MockCoprocessor {
    pub fn new(store: Arc<CiphertextStore>) -> Self {
        MockCoprocessor {
            store,
            available: AtomicBool::new(true),
            failing_handshakes: AtomicU32::new(0),
            handshakes: AtomicU32::new(0),
            inputs_built: AtomicU32::new(0),
        }
    }

    /// Takes the whole service down (or back up).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next `n` handshakes fail even while available.
    pub fn fail_next_handshakes(&self, n: u32) {
        self.failing_handshakes.store(n, Ordering::SeqCst);
    }

    pub fn handshake_count(&self) -> u32 {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn inputs_built(&self) -> u32 {
        self.inputs_built.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CoprocessorError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoprocessorError::Unavailable("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl Coprocessor for MockCoprocessor {
    async fn initialize(&self) -> Result<(), CoprocessorError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        let pending_failures = self
            .failing_handshakes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending_failures.is_ok() {
            return Err(CoprocessorError::Unavailable("handshake timed out".to_string()));
        }
        self.check_available()
    }

    async fn build_encrypted_input(
        &self,
        contract: &Address,
        caller: &Address,
        value: u128,
    ) -> Result<EncryptedInput, CoprocessorError> {
        self.check_available()?;
        self.inputs_built.fetch_add(1, Ordering::SeqCst);
        let handle = self.store.insert(value, &[]);
        let proof = input_proof(&handle, contract, caller);
        Ok(EncryptedInput { handle, proof })
    }

    async fn user_decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        signer: &Address,
    ) -> Result<u128, CoprocessorError> {
        self.check_available()?;
        let value = self
            .store
            .value(handle)
            .ok_or_else(|| CoprocessorError::UnknownHandle(handle.to_string()))?;
        if !self.store.is_allowed(handle, signer) || !self.store.is_allowed(handle, contract) {
            return Err(CoprocessorError::Unauthorized {
                handle: handle.to_string(),
                signer: signer.to_string(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes(&[b; 20])
    }

    #[tokio::test]
    async fn test_decrypt_respects_acl() {
        let store = Arc::new(CiphertextStore::new());
        let cp = MockCoprocessor::new(store.clone());
        let (contract, owner, stranger) = (addr(1), addr(2), addr(3));

        let handle = store.insert(42, &[&owner, &contract]);
        assert_eq!(cp.user_decrypt(&handle, &contract, &owner).await.unwrap(), 42);
        assert!(matches!(
            cp.user_decrypt(&handle, &contract, &stranger).await,
            Err(CoprocessorError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_next_handshakes() {
        let cp = MockCoprocessor::new(Arc::new(CiphertextStore::new()));
        cp.fail_next_handshakes(2);
        assert!(cp.initialize().await.is_err());
        assert!(cp.initialize().await.is_err());
        assert!(cp.initialize().await.is_ok());
        assert_eq!(cp.handshake_count(), 3);
    }

    #[tokio::test]
    async fn test_input_proof_binds_caller() {
        let cp = MockCoprocessor::new(Arc::new(CiphertextStore::new()));
        let (contract, caller) = (addr(1), addr(2));
        let input = cp.build_encrypted_input(&contract, &caller, 5).await.unwrap();
        assert_eq!(input.proof, input_proof(&input.handle, &contract, &caller));
        assert_ne!(input.proof, input_proof(&input.handle, &contract, &addr(3)));
    }
}
