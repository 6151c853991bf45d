//! # Devnet
//!
//! A deterministic in-memory network hosting one confidential token
//! deployment. It implements the same collaborator interfaces a live network
//! would, so the bridge can run and be tested self-contained.

pub mod coprocessor;

pub use coprocessor::{CiphertextStore, MockCoprocessor};

use crate::chain::{
    Address, ChainError, ContractCall, Handle, Receipt, TokenContract, TxHash, TxStatus,
};
use crate::coprocessor::EncryptedInput;
use crate::utils::constants::{DEVNET_INITIAL_BALANCE_WEI, TOKEN_CONTRACT_NAME};
use crate::wallet::SignerSet;
use async_trait::async_trait;
use coprocessor::input_proof;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn derive_address(seed: &str) -> Address {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::from_bytes(&bytes)
}

#[derive(Default)]
struct Ledger {
    native: HashMap<String, u128>,
    clear: HashMap<String, u128>,
    encrypted: HashMap<String, Handle>,
    receipts: HashMap<TxHash, Receipt>,
    nonce: u64,
    block_number: u64,
    submissions: usize,
}

/// Balance changes of one successful call, applied all at once.
#[derive(Default)]
struct Effects {
    native: Vec<(Address, u128)>,
    clear: Vec<(Address, u128)>,
    encrypted: Vec<(Address, u128)>,
    consumed: Option<Handle>,
}

pub struct Devnet {
    store: Arc<CiphertextStore>,
    coprocessor: Arc<MockCoprocessor>,
    contract: Address,
    accounts: Vec<Address>,
    ledger: Mutex<Ledger>,
}

impl Devnet {
    /// Creates a network with `accounts` funded signers and the token deployed.
    pub fn new(accounts: usize) -> Self {
        let store = Arc::new(CiphertextStore::new());
        let coprocessor = Arc::new(MockCoprocessor::new(store.clone()));
        let accounts: Vec<Address> = (0..accounts)
            .map(|i| derive_address(&format!("redact-devnet-account-{}", i)))
            .collect();

        let mut ledger = Ledger::default();
        for account in &accounts {
            ledger
                .native
                .insert(account.canonical(), DEVNET_INITIAL_BALANCE_WEI);
        }

        Devnet {
            store,
            coprocessor,
            contract: derive_address(&format!("redact-devnet-contract-{}", TOKEN_CONTRACT_NAME)),
            accounts,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn signers(&self) -> SignerSet {
        SignerSet::new(self.accounts.clone())
    }

    pub fn coprocessor(&self) -> Arc<MockCoprocessor> {
        self.coprocessor.clone()
    }

    pub fn contract_address(&self) -> &Address {
        &self.contract
    }

    /// Number of transactions accepted so far (included or reverted).
    pub fn submission_count(&self) -> usize {
        self.ledger().submissions
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_contract(&self, contract: &Address) -> Result<(), ChainError> {
        if contract.same_as(&self.contract) {
            Ok(())
        } else {
            Err(ChainError::UnknownContract(contract.to_string()))
        }
    }

    fn encrypted_value(&self, ledger: &Ledger, who: &Address) -> u128 {
        ledger
            .encrypted
            .get(&who.canonical())
            .and_then(|h| self.store.value(h))
            .unwrap_or(0)
    }

    /// Verifies an input was built for (this contract, `caller`) and is still
    /// live. Does not consume it.
    fn read_input(&self, input: &EncryptedInput, caller: &Address) -> Result<u128, String> {
        if input.proof != input_proof(&input.handle, &self.contract, caller) {
            return Err("invalid input proof".to_string());
        }
        // Consumed inputs are dropped from the store, so a replay lands here.
        self.store
            .value(&input.handle)
            .ok_or_else(|| "unknown or already used input handle".to_string())
    }

    /// Runs `call` against the current ledger without mutating it.
    fn execute(&self, ledger: &Ledger, from: &Address, call: &ContractCall) -> Result<Effects, String> {
        let clear_of = |who: &Address| ledger.clear.get(&who.canonical()).copied().unwrap_or(0);
        let native_of = |who: &Address| ledger.native.get(&who.canonical()).copied().unwrap_or(0);
        let overflow = || "arithmetic overflow".to_string();
        let mut fx = Effects::default();

        match call {
            ContractCall::MintPrivate { to, input } => {
                let value = self.read_input(input, to)?;
                let bal = self.encrypted_value(ledger, to);
                fx.encrypted.push((to.clone(), bal.checked_add(value).ok_or_else(overflow)?));
                fx.consumed = Some(input.handle.clone());
            }
            ContractCall::MintClear { to, amount } => {
                fx.clear.push((to.clone(), clear_of(to).checked_add(*amount).ok_or_else(overflow)?));
            }
            ContractCall::TransferPrivate { to, input } => {
                let value = self.read_input(input, from)?;
                let sender_bal = self.encrypted_value(ledger, from);
                // Confidential select: an overdraft silently moves nothing.
                let moved = if value <= sender_bal { value } else { 0 };
                if to.same_as(from) {
                    fx.encrypted.push((from.clone(), sender_bal));
                } else {
                    let recv_bal = self.encrypted_value(ledger, to);
                    fx.encrypted.push((from.clone(), sender_bal - moved));
                    fx.encrypted
                        .push((to.clone(), recv_bal.checked_add(moved).ok_or_else(overflow)?));
                }
                fx.consumed = Some(input.handle.clone());
            }
            ContractCall::EncryptFromClear { amount, input } => {
                let value = self.read_input(input, from)?;
                if value != *amount {
                    return Err("ciphertext does not match amount".to_string());
                }
                let clear = clear_of(from);
                if clear < *amount {
                    return Err("insufficient clear balance".to_string());
                }
                let enc = self.encrypted_value(ledger, from);
                fx.clear.push((from.clone(), clear - amount));
                fx.encrypted.push((from.clone(), enc.checked_add(*amount).ok_or_else(overflow)?));
                fx.consumed = Some(input.handle.clone());
            }
            ContractCall::DecryptToClear { amount, input } => {
                let value = self.read_input(input, from)?;
                if value != *amount {
                    return Err("ciphertext does not match amount".to_string());
                }
                let enc = self.encrypted_value(ledger, from);
                if enc < *amount {
                    return Err("insufficient encrypted balance".to_string());
                }
                let clear = clear_of(from);
                fx.encrypted.push((from.clone(), enc - amount));
                fx.clear.push((from.clone(), clear.checked_add(*amount).ok_or_else(overflow)?));
                fx.consumed = Some(input.handle.clone());
            }
            ContractCall::DepositEth { value } => {
                fx.native.push((from.clone(), native_of(from) - value));
                fx.clear.push((from.clone(), clear_of(from).checked_add(*value).ok_or_else(overflow)?));
            }
            ContractCall::DepositAndEncrypt { value, input } => {
                let encrypted = self.read_input(input, from)?;
                if encrypted != *value {
                    return Err("ciphertext does not match deposit".to_string());
                }
                let enc = self.encrypted_value(ledger, from);
                fx.native.push((from.clone(), native_of(from) - value));
                fx.encrypted.push((from.clone(), enc.checked_add(*value).ok_or_else(overflow)?));
                fx.consumed = Some(input.handle.clone());
            }
            ContractCall::WithdrawEth { amount } => {
                let clear = clear_of(from);
                if clear < *amount {
                    return Err("insufficient clear balance".to_string());
                }
                fx.clear.push((from.clone(), clear - amount));
                fx.native
                    .push((from.clone(), native_of(from).checked_add(*amount).ok_or_else(overflow)?));
            }
        }
        Ok(fx)
    }

    fn apply(&self, ledger: &mut Ledger, fx: Effects) {
        for (who, value) in fx.native {
            ledger.native.insert(who.canonical(), value);
        }
        for (who, value) in fx.clear {
            ledger.clear.insert(who.canonical(), value);
        }
        for (who, value) in fx.encrypted {
            let handle = self.store.insert(value, &[&who, &self.contract]);
            if let Some(superseded) = ledger.encrypted.insert(who.canonical(), handle) {
                self.store.remove(&superseded);
            }
        }
        if let Some(input) = fx.consumed {
            self.store.remove(&input);
        }
    }
}

#[async_trait]
impl TokenContract for Devnet {
    async fn deployed_address(&self) -> Result<Address, ChainError> {
        Ok(self.contract.clone())
    }

    async fn native_balance(&self, who: &Address) -> Result<u128, ChainError> {
        Ok(self.ledger().native.get(&who.canonical()).copied().unwrap_or(0))
    }

    async fn encrypted_balance(
        &self,
        contract: &Address,
        who: &Address,
    ) -> Result<Handle, ChainError> {
        self.check_contract(contract)?;
        Ok(self
            .ledger()
            .encrypted
            .get(&who.canonical())
            .cloned()
            .unwrap_or_else(Handle::zero))
    }

    async fn clear_balance(&self, contract: &Address, who: &Address) -> Result<u128, ChainError> {
        self.check_contract(contract)?;
        Ok(self.ledger().clear.get(&who.canonical()).copied().unwrap_or(0))
    }

    async fn submit(
        &self,
        contract: &Address,
        from: &Address,
        call: ContractCall,
    ) -> Result<TxHash, ChainError> {
        self.check_contract(contract)?;
        let mut ledger = self.ledger();

        let attached = call.attached_value();
        let native = ledger.native.get(&from.canonical()).copied().unwrap_or(0);
        if attached > native {
            return Err(ChainError::InsufficientFunds(from.to_string(), native, attached));
        }

        ledger.nonce += 1;
        ledger.block_number += 1;
        ledger.submissions += 1;

        let mut hasher = Sha256::new();
        hasher.update(ledger.nonce.to_le_bytes());
        hasher.update(from.canonical().as_bytes());
        hasher.update(call.method().as_bytes());
        hasher.update(serde_json::to_vec(&call).map_err(|e| ChainError::Rpc(e.to_string()))?);
        let digest: [u8; 32] = hasher.finalize().into();
        let hash = TxHash::from_bytes(&digest);

        let status = match self.execute(&ledger, from, &call) {
            Ok(fx) => {
                self.apply(&mut ledger, fx);
                TxStatus::Succeeded
            }
            Err(reason) => {
                log::info!("devnet: {} from {} reverted: {}", call.method(), from, reason);
                TxStatus::Reverted
            }
        };

        let receipt = Receipt {
            tx_hash: hash.clone(),
            block_number: ledger.block_number,
            status,
            timestamp: chrono::Utc::now().timestamp(),
        };
        ledger.receipts.insert(hash.clone(), receipt);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, ChainError> {
        self.ledger()
            .receipts
            .get(hash)
            .cloned()
            .ok_or_else(|| ChainError::UnknownTransaction(hash.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coprocessor::Coprocessor;

    #[test]
    fn test_accounts_are_deterministic() {
        let a = Devnet::new(3);
        let b = Devnet::new(3);
        assert_eq!(a.signers().len(), 3);
        assert_eq!(
            a.signers().addresses().collect::<Vec<_>>(),
            b.signers().addresses().collect::<Vec<_>>()
        );
        assert_eq!(a.contract_address(), b.contract_address());
    }

    #[tokio::test]
    async fn test_input_is_single_use() {
        let net = Devnet::new(2);
        let contract = net.contract_address().clone();
        let alice = net.accounts[0].clone();
        let cp = net.coprocessor();

        let input = cp.build_encrypted_input(&contract, &alice, 10).await.unwrap();
        let replay = EncryptedInput {
            handle: input.handle.clone(),
            proof: input.proof.clone(),
        };

        let first = net
            .submit(&contract, &alice, ContractCall::MintPrivate { to: alice.clone(), input })
            .await
            .unwrap();
        let second = net
            .submit(&contract, &alice, ContractCall::MintPrivate { to: alice.clone(), input: replay })
            .await
            .unwrap();

        assert_eq!(net.wait_for_receipt(&first).await.unwrap().status, TxStatus::Succeeded);
        assert_eq!(net.wait_for_receipt(&second).await.unwrap().status, TxStatus::Reverted);
    }

    #[tokio::test]
    async fn test_store_keeps_only_live_handles() {
        let net = Devnet::new(2);
        let contract = net.contract_address().clone();
        let alice = net.accounts[0].clone();
        let cp = net.coprocessor();

        for _ in 0..5 {
            let input = cp.build_encrypted_input(&contract, &alice, 10).await.unwrap();
            net.submit(&contract, &alice, ContractCall::MintPrivate { to: alice.clone(), input })
                .await
                .unwrap();
        }

        // One balance handle for alice; inputs and old balances are gone.
        assert_eq!(net.store.len(), 1);
        let handle = net.encrypted_balance(&contract, &alice).await.unwrap();
        assert_eq!(net.store.value(&handle), Some(50));
    }

    #[tokio::test]
    async fn test_input_bound_to_other_caller_reverts() {
        let net = Devnet::new(2);
        let contract = net.contract_address().clone();
        let (alice, bob) = (net.accounts[0].clone(), net.accounts[1].clone());
        net.submit(&contract, &alice, ContractCall::MintClear { to: alice.clone(), amount: 50 })
            .await
            .unwrap();

        // Built for bob, submitted by alice.
        let input = net
            .coprocessor()
            .build_encrypted_input(&contract, &bob, 5)
            .await
            .unwrap();
        let hash = net
            .submit(&contract, &alice, ContractCall::EncryptFromClear { amount: 5, input })
            .await
            .unwrap();
        assert_eq!(net.wait_for_receipt(&hash).await.unwrap().status, TxStatus::Reverted);
        assert_eq!(net.clear_balance(&contract, &alice).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_withdraw_more_than_clear_reverts() {
        let net = Devnet::new(1);
        let contract = net.contract_address().clone();
        let alice = net.accounts[0].clone();
        let hash = net
            .submit(&contract, &alice, ContractCall::WithdrawEth { amount: 1 })
            .await
            .unwrap();
        assert_eq!(net.wait_for_receipt(&hash).await.unwrap().status, TxStatus::Reverted);
        assert_eq!(net.native_balance(&alice).await.unwrap(), DEVNET_INITIAL_BALANCE_WEI);
    }

    #[tokio::test]
    async fn test_value_beyond_native_balance_is_rejected() {
        let net = Devnet::new(1);
        let contract = net.contract_address().clone();
        let alice = net.accounts[0].clone();
        let err = net
            .submit(
                &contract,
                &alice,
                ContractCall::DepositEth { value: DEVNET_INITIAL_BALANCE_WEI + 1 },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds(..)));
        assert_eq!(net.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_contract() {
        let net = Devnet::new(1);
        let bogus = Address::from_bytes(&[9; 20]);
        assert!(matches!(
            net.clear_balance(&bogus, &net.accounts[0]).await,
            Err(ChainError::UnknownContract(_))
        ));
    }
}
