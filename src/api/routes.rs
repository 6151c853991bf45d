//! HTTP surface of the bridge.
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/api/address` | GetAddress |
//! | GET | `/api/accounts` | ListAccounts |
//! | GET | `/api/balance` | GetBalance |
//! | POST | `/api/mint` | Mint |
//! | POST | `/api/mint-clear` | MintClear |
//! | POST | `/api/transfer` | Transfer |
//! | POST | `/api/encrypt` | EncryptFromClear |
//! | POST | `/api/decrypt` | DecryptToClear |
//! | POST | `/api/deposit-eth` | DepositEth |
//! | POST | `/api/deposit-and-encrypt` | DepositAndEncrypt |
//! | POST | `/api/withdraw-eth` | WithdrawEth |
//!
//! Anything else falls through to the static assets.

use crate::api::assets;
use crate::api::dispatch::{DispatchError, Invocation};
use crate::api::response::{completed, dispatch_failure, failure};
use crate::orchestrator::{OperationKind, OperationParams};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/address", read_route(OperationKind::GetAddress))
        .route("/api/accounts", read_route(OperationKind::ListAccounts))
        .route("/api/balance", read_route(OperationKind::GetBalance))
        .route("/api/mint", mutation_route(OperationKind::Mint))
        .route("/api/mint-clear", mutation_route(OperationKind::MintClear))
        .route("/api/transfer", mutation_route(OperationKind::Transfer))
        .route("/api/encrypt", mutation_route(OperationKind::EncryptFromClear))
        .route("/api/decrypt", mutation_route(OperationKind::DecryptToClear))
        .route("/api/deposit-eth", mutation_route(OperationKind::DepositEth))
        .route(
            "/api/deposit-and-encrypt",
            mutation_route(OperationKind::DepositAndEncrypt),
        )
        .route("/api/withdraw-eth", mutation_route(OperationKind::WithdrawEth))
        .fallback(assets::serve)
        .layer(cors)
        .layer(middleware::from_fn(preflight))
        .with_state(state)
}

/// Answers every OPTIONS request with 204, whatever the path.
async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}

// ==========================================
// REQUEST PARSING
// ==========================================

#[derive(Deserialize, Debug, Default)]
pub struct ReadQuery {
    address: Option<String>,
    #[serde(rename = "fromIndex")]
    from_index: Option<String>,
    network: Option<String>,
    contract: Option<String>,
}

/// Mutation body. Numeric fields may arrive as JSON numbers or strings.
#[derive(Deserialize, Debug, Default)]
pub struct MutationBody {
    to: Option<Value>,
    value: Option<Value>,
    #[serde(rename = "fromIndex")]
    from_index: Option<Value>,
    network: Option<String>,
    contract: Option<String>,
}

fn scalar(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// An empty body reads as `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<MutationBody, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(MutationBody::default());
    }
    serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON body: {}", e))
}

/// Presence checks done by the gateway before dispatch. Content is checked by
/// the operation itself.
fn check_required(kind: OperationKind, params: &OperationParams) -> Result<(), &'static str> {
    if kind.needs_recipient() {
        if params.to.is_none() || params.value.is_none() {
            return Err("Missing to or value");
        }
    } else if params.value.is_none() {
        return Err("Missing value");
    }
    Ok(())
}

// ==========================================
// HANDLERS
// ==========================================

fn read_route(kind: OperationKind) -> MethodRouter<Arc<AppState>> {
    get(
        move |State(state): State<Arc<AppState>>, Query(q): Query<ReadQuery>| async move {
            let network = non_empty(q.network).unwrap_or_else(|| state.settings.network.clone());
            let params = OperationParams {
                address: non_empty(q.address),
                from_index: non_empty(q.from_index),
                contract: non_empty(q.contract),
                ..Default::default()
            };
            run(&state, Invocation { kind, params, network }).await
        },
    )
}

fn mutation_route(kind: OperationKind) -> MethodRouter<Arc<AppState>> {
    post(move |State(state): State<Arc<AppState>>, body: Bytes| async move {
        let body = match parse_body(&body) {
            Ok(body) => body,
            Err(e) => return failure(StatusCode::BAD_REQUEST, e, None),
        };
        let params = OperationParams {
            to: non_empty(scalar(body.to)),
            value: non_empty(scalar(body.value)),
            from_index: non_empty(scalar(body.from_index)),
            contract: non_empty(body.contract),
            address: None,
        };
        if let Err(msg) = check_required(kind, &params) {
            return failure(StatusCode::BAD_REQUEST, msg, None);
        }
        let network = non_empty(body.network).unwrap_or_else(|| state.settings.network.clone());
        run(&state, Invocation { kind, params, network }).await
    })
}

async fn run(state: &AppState, invocation: Invocation) -> Response {
    let request_id = Uuid::new_v4();
    let kind = invocation.kind;
    log::info!(
        "[{}] {:?} on {} via {}",
        request_id,
        kind,
        invocation.network,
        state.dispatcher.backend()
    );

    let dispatch = state.dispatcher.dispatch(invocation);
    let result = match state.settings.invocation_timeout() {
        Some(limit) => tokio::time::timeout(limit, dispatch)
            .await
            .unwrap_or(Err(DispatchError::TimedOut(limit))),
        None => dispatch.await,
    };

    match result {
        Ok(done) => {
            log::info!("[{}] {:?} completed", request_id, kind);
            completed(kind, &done)
        }
        Err(e) => {
            log::warn!("[{}] {:?} failed: {}", request_id, kind, e);
            dispatch_failure(&e)
        }
    }
}
