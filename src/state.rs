use crate::api::dispatch::Dispatcher;
use crate::coprocessor::RetryPolicy;
use crate::utils::constants::{
    DEFAULT_ASSET_ROOT, DEFAULT_COMMAND, DEFAULT_DEVNET_ACCOUNTS, DEFAULT_NETWORK, DEFAULT_PORT,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum BackendKind {
    /// Orchestrator against the in-process devnet.
    Devnet,
    /// External tool spawned per request.
    Command,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devnet" => Ok(BackendKind::Devnet),
            "command" => Ok(BackendKind::Command),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct BridgeSettings {
    pub port: u16,
    pub network: String,
    pub backend: BackendKind,
    /// Program followed by its leading arguments, e.g. `npx hardhat`.
    pub command: Vec<String>,
    /// Static assets, relative to `working_dir` unless absolute.
    pub asset_root: PathBuf,
    /// Where spawned tools run.
    pub working_dir: PathBuf,
    pub invocation_timeout_secs: Option<u64>,
    pub devnet_accounts: usize,
    pub coprocessor_retry_delay_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            network: DEFAULT_NETWORK.to_string(),
            backend: BackendKind::Devnet,
            command: DEFAULT_COMMAND.split_whitespace().map(String::from).collect(),
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            working_dir: PathBuf::from("."),
            invocation_timeout_secs: None,
            devnet_accounts: DEFAULT_DEVNET_ACCOUNTS,
            coprocessor_retry_delay_ms: RetryPolicy::default().delay.as_millis() as u64,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring malformed {}={:?}, using default", key, raw);
            None
        }
    }
}

impl BridgeSettings {
    /// Reads `PORT` and the `REDACT_*` variables; anything unset or malformed
    /// keeps its default.
    pub fn from_env() -> Self {
        let mut settings = Self::from_lookup(|key| std::env::var(key).ok());
        if let Ok(cwd) = std::env::current_dir() {
            settings.working_dir = cwd;
        }
        settings
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Self::default();

        if let Some(port) = parsed(&lookup, "PORT") {
            s.port = port;
        }
        if let Some(network) = lookup("REDACT_NETWORK").filter(|v| !v.trim().is_empty()) {
            s.network = network.trim().to_string();
        }
        if let Some(backend) = parsed(&lookup, "REDACT_BACKEND") {
            s.backend = backend;
        }
        if let Some(command) = lookup("REDACT_COMMAND") {
            let parts: Vec<String> = command.split_whitespace().map(String::from).collect();
            if parts.is_empty() {
                log::warn!("ignoring empty REDACT_COMMAND, using default");
            } else {
                s.command = parts;
            }
        }
        if let Some(root) = lookup("REDACT_ASSET_ROOT").filter(|v| !v.trim().is_empty()) {
            s.asset_root = PathBuf::from(root);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "REDACT_INVOCATION_TIMEOUT_SECS") {
            s.invocation_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(accounts) = parsed::<usize>(&lookup, "REDACT_DEVNET_ACCOUNTS") {
            if accounts == 0 {
                log::warn!("REDACT_DEVNET_ACCOUNTS must be positive, using default");
            } else {
                s.devnet_accounts = accounts;
            }
        }
        if let Some(ms) = parsed(&lookup, "REDACT_COPROCESSOR_RETRY_DELAY_MS") {
            s.coprocessor_retry_delay_ms = ms;
        }
        s
    }

    pub fn asset_dir(&self) -> PathBuf {
        if self.asset_root.is_absolute() {
            self.asset_root.clone()
        } else {
            self.working_dir.join(&self.asset_root)
        }
    }

    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_delay(Duration::from_millis(self.coprocessor_retry_delay_ms))
    }
}

// Shared state
pub struct AppState {
    pub settings: BridgeSettings,
    pub dispatcher: Arc<dyn Dispatcher>,
}
