pub mod api;
pub mod chain;
pub mod coprocessor;
pub mod devnet;
pub mod orchestrator;
pub mod state;
pub mod utils;
pub mod wallet;

use crate::api::dispatch::{CommandDispatcher, Dispatcher, InProcessDispatcher, NetworkBackend};
use crate::devnet::Devnet;
use crate::state::{AppState, BackendKind, BridgeSettings};
use anyhow::Context;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Stderr logging by default. With `REDACT_LOG_DIR` set, also rotating files
/// in that directory.
pub fn init_logging() -> anyhow::Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str("info, redact_bridge_lib=debug")?;
    let handle = match std::env::var("REDACT_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => logger
            .log_to_file(FileSpec::default().directory(dir).basename("redact-bridge"))
            .duplicate_to_stderr(Duplicate::Info)
            .write_mode(WriteMode::Async)
            .rotate(
                Criterion::Size(10 * 1024 * 1024), // 10MB
                Naming::Timestamps,
                Cleanup::KeepLogFiles(7),
            )
            .start()?,
        _ => logger.log_to_stderr().start()?,
    };
    Ok(handle)
}

pub fn build_dispatcher(settings: &BridgeSettings) -> Arc<dyn Dispatcher> {
    match settings.backend {
        BackendKind::Devnet => {
            let devnet = Arc::new(Devnet::new(settings.devnet_accounts));
            log::info!(
                "devnet '{}' ready: {} signers, token at {}",
                settings.network,
                settings.devnet_accounts,
                devnet.contract_address()
            );
            Arc::new(
                InProcessDispatcher::new(settings.retry_policy())
                    .with_network(settings.network.clone(), NetworkBackend::devnet(devnet)),
            )
        }
        BackendKind::Command => {
            let command = if settings.command.is_empty() {
                BridgeSettings::default().command
            } else {
                settings.command.clone()
            };
            let mut parts = command.into_iter();
            let program = parts.next().unwrap_or_default();
            log::info!(
                "dispatching to '{}' in {}",
                program,
                settings.working_dir.display()
            );
            Arc::new(CommandDispatcher::new(
                program,
                parts.collect(),
                settings.working_dir.clone(),
            ))
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let _logger = init_logging()?;
    let settings = BridgeSettings::from_env();
    log::info!("Starting Redact Bridge ({:?} backend)...", settings.backend);

    let state = Arc::new(AppState {
        dispatcher: build_dispatcher(&settings),
        settings,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("UI server listening at http://localhost:{}", addr.port());
    axum::serve(listener, app).await?;
    Ok(())
}
