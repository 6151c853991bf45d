//! # Dispatch
//!
//! The gateway hands every request to a [`Dispatcher`]. Two backends exist:
//!
//! - [`InProcessDispatcher`] runs the [`Orchestrator`] against a registry of
//!   networks living in this process.
//! - [`CommandDispatcher`] spawns an external tool once per request and reads
//!   its combined output.
//!
//! Both return the same [`Completed`] shape, so routing does not care which
//! one is configured.

use crate::api::extract::{extract, ResponseFields};
use crate::chain::TokenContract;
use crate::coprocessor::{Coprocessor, RetryPolicy};
use crate::devnet::Devnet;
use crate::orchestrator::{
    Operation, OperationError, OperationKind, OperationOutput, OperationParams, Orchestrator,
    OrchestratorSettings,
};
use crate::wallet::SignerSet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// One validated request, ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub kind: OperationKind,
    pub params: OperationParams,
    pub network: String,
}

/// A finished run: the fields recovered from it and its full output.
#[derive(Debug, Clone)]
pub struct Completed {
    pub fields: ResponseFields,
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The operation ran and refused or failed. `raw` holds its output so far.
    #[error("{source}")]
    Rejected {
        #[source]
        source: OperationError,
        raw: String,
    },

    #[error("{diagnostic}")]
    InvocationFailed { diagnostic: String, raw: String },

    #[error("invocation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

impl DispatchError {
    pub fn raw(&self) -> Option<&str> {
        match self {
            DispatchError::Rejected { raw, .. } | DispatchError::InvocationFailed { raw, .. } => {
                Some(raw)
            }
            DispatchError::TimedOut(_) | DispatchError::UnknownNetwork(_) => None,
        }
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, invocation: Invocation) -> Result<Completed, DispatchError>;

    /// Short backend label for logs.
    fn backend(&self) -> &'static str;
}

// ==========================================
// IN-PROCESS
// ==========================================

/// Collaborators for one network.
#[derive(Clone)]
pub struct NetworkBackend {
    pub contract: Arc<dyn TokenContract>,
    pub coprocessor: Arc<dyn Coprocessor>,
    pub signers: SignerSet,
}

impl NetworkBackend {
    pub fn devnet(devnet: Arc<Devnet>) -> Self {
        NetworkBackend {
            signers: devnet.signers(),
            coprocessor: devnet.coprocessor(),
            contract: devnet,
        }
    }
}

pub struct InProcessDispatcher {
    networks: HashMap<String, NetworkBackend>,
    retry: RetryPolicy,
}

impl InProcessDispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        InProcessDispatcher {
            networks: HashMap::new(),
            retry,
        }
    }

    pub fn with_network(mut self, name: impl Into<String>, backend: NetworkBackend) -> Self {
        self.networks.insert(name.into(), backend);
        self
    }
}

/// Aborts the spawned operation when the dispatch future is dropped before
/// it completes.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn fields_from_output(output: &OperationOutput) -> ResponseFields {
    match output {
        OperationOutput::Address(address) => ResponseFields {
            address: Some(address.to_string()),
            ..Default::default()
        },
        OperationOutput::Accounts(accounts) => ResponseFields {
            accounts: accounts.iter().map(ToString::to_string).collect(),
            ..Default::default()
        },
        OperationOutput::Balance(snapshot) => ResponseFields {
            wallet: Some(snapshot.native_balance.to_string()),
            encrypted: Some(snapshot.encrypted_handle.to_string()),
            clear: Some(snapshot.clear_balance.to_string()),
            decrypted: Some(snapshot.decrypted_balance.to_string()),
            ..Default::default()
        },
        OperationOutput::Transaction(outcome) => ResponseFields {
            tx: Some(outcome.tx_hash.to_string()),
            status: Some(outcome.status.as_str().to_string()),
            ..Default::default()
        },
    }
}

#[async_trait]
impl Dispatcher for InProcessDispatcher {
    async fn dispatch(&self, invocation: Invocation) -> Result<Completed, DispatchError> {
        let backend = self
            .networks
            .get(&invocation.network)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownNetwork(invocation.network.clone()))?;

        let orchestrator = Orchestrator::new(
            backend.contract,
            backend.coprocessor,
            backend.signers,
            OrchestratorSettings {
                network: invocation.network,
                retry: self.retry,
            },
        );
        let op = Operation::new(invocation.kind, invocation.params);

        // A panicking operation must not take the gateway down with it, and a
        // caller that gives up (timeout, disconnect) must not leave it running.
        let mut task = AbortOnDrop(tokio::spawn(async move { orchestrator.execute(&op).await }));
        let execution = (&mut task.0)
            .await
            .map_err(|e| DispatchError::InvocationFailed {
                diagnostic: format!("operation aborted: {}", e),
                raw: String::new(),
            })?;

        let raw = execution.transcript.render();
        match execution.result {
            Ok(output) => Ok(Completed {
                fields: fields_from_output(&output),
                raw,
            }),
            Err(source) => Err(DispatchError::Rejected { source, raw }),
        }
    }

    fn backend(&self) -> &'static str {
        "devnet"
    }
}

// ==========================================
// EXTERNAL COMMAND
// ==========================================

/// Task names understood by the external tool.
pub fn task_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::GetAddress => "redact:address",
        OperationKind::ListAccounts => "accounts",
        OperationKind::GetBalance => "redact:get-balance",
        OperationKind::Mint => "redact:mint",
        OperationKind::MintClear => "redact:mint-clear",
        OperationKind::Transfer => "redact:transfer",
        OperationKind::EncryptFromClear => "redact:encrypt-from-clear",
        OperationKind::DecryptToClear => "redact:decrypt-to-clear",
        OperationKind::DepositEth => "redact:deposit-eth",
        OperationKind::DepositAndEncrypt => "redact:deposit-and-encrypt",
        OperationKind::WithdrawEth => "redact:withdraw-eth",
    }
}

pub struct CommandDispatcher {
    program: String,
    base_args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandDispatcher {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, working_dir: PathBuf) -> Self {
        CommandDispatcher {
            program: program.into(),
            base_args,
            working_dir,
        }
    }

    /// Argument vector for one invocation. Every value travels as its own
    /// argument; nothing goes through a shell.
    pub fn arguments(&self, invocation: &Invocation) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push(task_name(invocation.kind).to_string());
        args.push("--network".to_string());
        args.push(invocation.network.clone());

        let p = &invocation.params;
        let flags = [
            ("--to", &p.to),
            ("--value", &p.value),
            ("--address", &p.address),
            ("--fromindex", &p.from_index),
            ("--contract", &p.contract),
        ];
        for (flag, value) in flags {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                args.push(flag.to_string());
                args.push(v.to_string());
            }
        }
        args
    }
}

#[async_trait]
impl Dispatcher for CommandDispatcher {
    async fn dispatch(&self, invocation: Invocation) -> Result<Completed, DispatchError> {
        let args = self.arguments(&invocation);
        log::debug!("spawning {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DispatchError::InvocationFailed {
                diagnostic: format!("failed to start {}: {}", self.program, e),
                raw: String::new(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let raw = format!("{}{}", stdout, stderr);

        if !output.status.success() {
            let diagnostic = match stderr.trim() {
                "" => format!("{} exited with {}", self.program, output.status),
                msg => msg.to_string(),
            };
            return Err(DispatchError::InvocationFailed { diagnostic, raw });
        }

        Ok(Completed {
            fields: extract(&raw),
            raw,
        })
    }

    fn backend(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(kind: OperationKind, params: OperationParams) -> Invocation {
        Invocation {
            kind,
            params,
            network: "localhost".to_string(),
        }
    }

    fn devnet_dispatcher() -> (InProcessDispatcher, Arc<Devnet>) {
        let devnet = Arc::new(Devnet::new(4));
        let dispatcher = InProcessDispatcher::new(RetryPolicy::with_delay(Duration::ZERO))
            .with_network("localhost", NetworkBackend::devnet(devnet.clone()));
        (dispatcher, devnet)
    }

    #[test]
    fn test_arguments_skip_missing_flags() {
        let dispatcher = CommandDispatcher::new("npx", vec!["hardhat".into()], PathBuf::from("."));
        let params = OperationParams {
            to: Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into()),
            value: Some("100".into()),
            from_index: Some("".into()),
            ..Default::default()
        };
        assert_eq!(
            dispatcher.arguments(&invocation(OperationKind::Mint, params)),
            vec![
                "hardhat",
                "redact:mint",
                "--network",
                "localhost",
                "--to",
                "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
                "--value",
                "100",
            ]
        );
    }

    #[test]
    fn test_arguments_keep_hostile_values_intact() {
        let dispatcher = CommandDispatcher::new("npx", vec![], PathBuf::from("."));
        let params = OperationParams {
            address: Some("0x1; rm -rf /".into()),
            ..Default::default()
        };
        let args = dispatcher.arguments(&invocation(OperationKind::GetBalance, params));
        assert_eq!(args.last().map(String::as_str), Some("0x1; rm -rf /"));
    }

    #[tokio::test]
    async fn test_in_process_mint_reports_tx() {
        let (dispatcher, devnet) = devnet_dispatcher();
        let to = devnet.signers().addresses().next().unwrap().to_string();
        let params = OperationParams {
            to: Some(to),
            value: Some("100".into()),
            ..Default::default()
        };

        let done = dispatcher
            .dispatch(invocation(OperationKind::Mint, params))
            .await
            .unwrap();
        assert_eq!(done.fields.status.as_deref(), Some("succeeded"));
        let tx = done.fields.tx.unwrap();
        assert!(done.raw.contains(&format!("tx:{} status=1", tx)));
    }

    #[tokio::test]
    async fn test_in_process_fields_match_extraction() {
        let (dispatcher, _devnet) = devnet_dispatcher();
        let done = dispatcher
            .dispatch(invocation(OperationKind::GetBalance, OperationParams::default()))
            .await
            .unwrap();
        let extracted = extract(&done.raw);
        assert_eq!(done.fields.wallet, extracted.wallet);
        assert_eq!(done.fields.encrypted, extracted.encrypted);
        assert_eq!(done.fields.clear, extracted.clear);
        assert_eq!(done.fields.decrypted, extracted.decrypted);
    }

    #[tokio::test]
    async fn test_in_process_rejection_keeps_transcript() {
        let (dispatcher, devnet) = devnet_dispatcher();
        let params = OperationParams {
            value: Some("1".into()),
            from_index: Some("99".into()),
            ..Default::default()
        };
        let err = dispatcher
            .dispatch(invocation(OperationKind::DepositEth, params))
            .await
            .unwrap_err();
        match err {
            DispatchError::Rejected { source, raw } => {
                assert!(matches!(source, OperationError::SignerOutOfRange(..)));
                assert!(raw.contains("Error: --fromindex is out of range"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(devnet.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_dispatch_never_submits() {
        let devnet = Arc::new(Devnet::new(2));
        let dispatcher = InProcessDispatcher::new(RetryPolicy::with_delay(Duration::from_millis(200)))
            .with_network("localhost", NetworkBackend::devnet(devnet.clone()));
        devnet.coprocessor().fail_next_handshakes(1);

        let to = devnet.signers().addresses().next().unwrap().to_string();
        let params = OperationParams {
            to: Some(to),
            value: Some("1".into()),
            ..Default::default()
        };
        let pending = dispatcher.dispatch(invocation(OperationKind::Mint, params));
        assert!(tokio::time::timeout(Duration::from_millis(50), pending)
            .await
            .is_err());

        // Long enough for the retry to finish had the operation kept running.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(devnet.submission_count(), 0);
        assert_eq!(devnet.coprocessor().handshake_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let (dispatcher, _devnet) = devnet_dispatcher();
        let mut inv = invocation(OperationKind::GetAddress, OperationParams::default());
        inv.network = "sepolia".into();
        assert!(matches!(
            dispatcher.dispatch(inv).await,
            Err(DispatchError::UnknownNetwork(n)) if n == "sepolia"
        ));
    }

    #[cfg(unix)]
    mod command {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn script(body: &str) -> tempfile::TempPath {
            let mut file = tempfile::Builder::new()
                .suffix(".sh")
                .tempfile()
                .unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            let path = file.into_temp_path();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn dispatcher(path: &tempfile::TempPath) -> CommandDispatcher {
            CommandDispatcher::new(
                path.to_string_lossy().into_owned(),
                vec![],
                std::env::temp_dir(),
            )
        }

        #[tokio::test]
        async fn test_command_output_is_extracted() {
            let path = script(
                "echo \"task $1 on $3\"\n\
                 echo 'RedactedToken address is 0x5FbDB2315678afecb367f032d93F642f64180aa3'\n\
                 echo 'compiled' >&2",
            );
            let done = dispatcher(&path)
                .dispatch(invocation(OperationKind::GetAddress, OperationParams::default()))
                .await
                .unwrap();
            assert_eq!(
                done.fields.address.as_deref(),
                Some("0x5FbDB2315678afecb367f032d93F642f64180aa3")
            );
            assert!(done.raw.starts_with("task redact:address on localhost\n"));
            assert!(done.raw.ends_with("compiled\n"));
        }

        #[tokio::test]
        async fn test_command_failure_carries_stderr() {
            let path = script("echo 'partial'\necho 'HH108: Cannot connect' >&2\nexit 1");
            let err = dispatcher(&path)
                .dispatch(invocation(OperationKind::GetAddress, OperationParams::default()))
                .await
                .unwrap_err();
            match err {
                DispatchError::InvocationFailed { diagnostic, raw } => {
                    assert_eq!(diagnostic, "HH108: Cannot connect");
                    assert!(raw.contains("partial"));
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_missing_program() {
            let dispatcher = CommandDispatcher::new(
                "/nonexistent/redact-tool",
                vec![],
                std::env::temp_dir(),
            );
            let err = dispatcher
                .dispatch(invocation(OperationKind::ListAccounts, OperationParams::default()))
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with("failed to start /nonexistent/redact-tool"));
        }
    }
}
