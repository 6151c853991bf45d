//! Per-operation procedures. Each one validates every input before the first
//! collaborator call and only builds ciphertext right before submission.

use crate::chain::{Address, ContractCall, TransactionOutcome, TxStatus};
use crate::coprocessor::{ensure_ready, CoprocessorError, CoprocessorSession, EncryptedInput};
use crate::orchestrator::{
    BalanceSnapshot, OperationError, OperationOutput, OperationParams, Orchestrator, Transcript,
};
use crate::utils::amount::{format_ether, parse_ether, parse_positive_token_amount, parse_token_amount};
use crate::utils::constants::TOKEN_CONTRACT_NAME;
use crate::wallet::Signer;

type OpResult = Result<OperationOutput, OperationError>;

fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str, OperationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OperationError::InvalidArgument(format!("--{} is required", flag)))
}

fn parse_address(raw: &str, flag: &str) -> Result<Address, OperationError> {
    Address::parse(raw).ok_or_else(|| {
        OperationError::InvalidArgument(format!("--{} must be a 0x-prefixed 20-byte address", flag))
    })
}

impl Orchestrator {
    // ------------------------------------------------------------------
    //  Shared steps
    // ------------------------------------------------------------------

    fn signer(&self, from_index: Option<&str>) -> Result<Signer, OperationError> {
        self.signers.resolve(from_index).cloned()
    }

    async fn resolve_contract(&self, contract: Option<&str>) -> Result<Address, OperationError> {
        match contract.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_address(raw, "contract"),
            None => Ok(self.contract.deployed_address().await?),
        }
    }

    async fn handshake(&self, t: &mut Transcript) -> CoprocessorSession {
        ensure_ready(self.coprocessor.as_ref(), self.settings.retry, |notice| t.line(notice)).await
    }

    /// Handshake, then encrypt `value` for (`contract`, `owner`).
    async fn encrypted_input(
        &self,
        contract: &Address,
        owner: &Address,
        value: u128,
        t: &mut Transcript,
    ) -> Result<EncryptedInput, OperationError> {
        self.handshake(t).await.require()?;
        Ok(self
            .coprocessor
            .build_encrypted_input(contract, owner, value)
            .await?)
    }

    async fn submit_and_confirm(
        &self,
        contract: &Address,
        sender: &Signer,
        call: ContractCall,
        t: &mut Transcript,
    ) -> Result<TransactionOutcome, OperationError> {
        let method = call.method();
        let hash = self.contract.submit(contract, &sender.address, call).await?;
        t.line(format!("Wait for tx:{}...", hash));

        let receipt = self.contract.wait_for_receipt(&hash).await?;
        t.line(format!("tx:{} status={}", hash, receipt.status.code()));
        if receipt.status == TxStatus::Reverted {
            log::warn!(
                "[{}] {} from signer {} reverted in block {}",
                self.settings.network,
                method,
                sender.index,
                receipt.block_number
            );
        }
        Ok(receipt.into())
    }

    // ------------------------------------------------------------------
    //  Reads
    // ------------------------------------------------------------------

    pub async fn get_address(&self, t: &mut Transcript) -> OpResult {
        let address = self.contract.deployed_address().await?;
        t.line(format!("{} address is {}", TOKEN_CONTRACT_NAME, address));
        Ok(OperationOutput::Address(address))
    }

    pub fn list_accounts(&self, t: &mut Transcript) -> OpResult {
        let accounts: Vec<Address> = self.signers.addresses().cloned().collect();
        for account in &accounts {
            t.line(account.to_string());
        }
        Ok(OperationOutput::Accounts(accounts))
    }

    /// Reads native, encrypted and clear balances, then tries to decrypt.
    /// Decryption problems never fail the read; they zero the figure.
    pub async fn get_balance(
        &self,
        address: Option<&str>,
        from_index: Option<&str>,
        contract: Option<&str>,
        t: &mut Transcript,
    ) -> OpResult {
        let signer = self.signer(from_index)?;
        let account = match address.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_address(raw, "address")?,
            None => signer.address.clone(),
        };
        let contract = self.resolve_contract(contract).await?;

        let session = self.handshake(t).await;
        if !session.ready {
            let reason = session
                .last_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            t.line(format!(
                "Warning: co-processor unavailable ({}), decryption will be skipped",
                reason
            ));
        }

        let native_balance = self.contract.native_balance(&account).await?;
        let encrypted_handle = self.contract.encrypted_balance(&contract, &account).await?;
        let clear_balance = self.contract.clear_balance(&contract, &account).await?;

        let decrypted_balance = if encrypted_handle.is_zero() {
            log::debug!("{} has no ciphertext yet", account);
            0
        } else if !session.ready {
            0
        } else {
            match self
                .coprocessor
                .user_decrypt(&encrypted_handle, &contract, &signer.address)
                .await
            {
                Ok(value) => value,
                Err(e) => {
                    match &e {
                        CoprocessorError::Unauthorized { .. } => log::warn!(
                            "decryption refused: signer {} lacks access to {}'s balance",
                            signer.index,
                            account
                        ),
                        CoprocessorError::Unavailable(_) | CoprocessorError::Transport(_) => {
                            log::warn!("decryption failed on transport: {}", e)
                        }
                        CoprocessorError::UnknownHandle(_) => {
                            log::warn!("decryption failed, handle unknown to co-processor: {}", e)
                        }
                    }
                    t.line("Decryption failed (no permission or network error)");
                    0
                }
            }
        };

        t.line(format!("Wallet ETH balance: {}", native_balance));
        t.line(format!("Encrypted balance: {}", encrypted_handle));
        t.line(format!("Decrypted balance: {}", decrypted_balance));
        t.line(format!("Clear balance    : {}", clear_balance));

        Ok(OperationOutput::Balance(BalanceSnapshot {
            account,
            native_balance,
            encrypted_handle,
            clear_balance,
            decrypted_balance,
        }))
    }

    // ------------------------------------------------------------------
    //  Mutations
    // ------------------------------------------------------------------

    pub async fn mint(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let to = parse_address(required(&p.to, "to")?, "to")?;
        let amount = parse_token_amount(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        // Minted ciphertext is bound to the recipient, not the sender.
        let input = self.encrypted_input(&contract, &to, amount, t).await?;
        let outcome = self
            .submit_and_confirm(&contract, &sender, ContractCall::MintPrivate { to, input }, t)
            .await?;
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn mint_clear(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let to = parse_address(required(&p.to, "to")?, "to")?;
        let amount = parse_token_amount(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let outcome = self
            .submit_and_confirm(&contract, &sender, ContractCall::MintClear { to, amount }, t)
            .await?;
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn transfer(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let to = parse_address(required(&p.to, "to")?, "to")?;
        let amount = parse_positive_token_amount(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let input = self
            .encrypted_input(&contract, &sender.address, amount, t)
            .await?;
        let outcome = self
            .submit_and_confirm(&contract, &sender, ContractCall::TransferPrivate { to, input }, t)
            .await?;

        match self.contract.encrypted_balance(&contract, &sender.address).await {
            Ok(handle) => t.line(format!("Encrypted balance after transfer: {}", handle)),
            Err(e) => log::warn!("could not re-read sender balance after transfer: {}", e),
        }
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn encrypt_from_clear(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let amount = parse_positive_token_amount(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let input = self
            .encrypted_input(&contract, &sender.address, amount, t)
            .await?;
        let outcome = self
            .submit_and_confirm(
                &contract,
                &sender,
                ContractCall::EncryptFromClear { amount, input },
                t,
            )
            .await?;
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn decrypt_to_clear(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let amount = parse_positive_token_amount(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let input = self
            .encrypted_input(&contract, &sender.address, amount, t)
            .await?;
        let outcome = self
            .submit_and_confirm(
                &contract,
                &sender,
                ContractCall::DecryptToClear { amount, input },
                t,
            )
            .await?;
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn deposit_eth(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let value = parse_ether(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let outcome = self
            .submit_and_confirm(&contract, &sender, ContractCall::DepositEth { value }, t)
            .await?;
        t.line(format!("Deposited {} ETH ({} wei)", format_ether(value), value));
        Ok(OperationOutput::Transaction(outcome))
    }

    /// Deposit and encrypt in a single call carrying both the native value and
    /// the ciphertext of the same amount.
    pub async fn deposit_and_encrypt(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let value = parse_ether(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let input = self
            .encrypted_input(&contract, &sender.address, value, t)
            .await?;
        let outcome = self
            .submit_and_confirm(
                &contract,
                &sender,
                ContractCall::DepositAndEncrypt { value, input },
                t,
            )
            .await?;
        t.line(format!(
            "Deposited and encrypted {} ETH ({} wei)",
            format_ether(value),
            value
        ));
        Ok(OperationOutput::Transaction(outcome))
    }

    pub async fn withdraw_eth(&self, p: &OperationParams, t: &mut Transcript) -> OpResult {
        let amount = parse_ether(required(&p.value, "value")?)?;
        let sender = self.signer(p.from_index.as_deref())?;
        let contract = self.resolve_contract(p.contract.as_deref()).await?;

        let outcome = self
            .submit_and_confirm(&contract, &sender, ContractCall::WithdrawEth { amount }, t)
            .await?;
        t.line(format!("Withdrawn {} ETH ({} wei)", format_ether(amount), amount));
        Ok(OperationOutput::Transaction(outcome))
    }
}
