//! JSON bodies and status codes returned by the gateway.

use crate::api::dispatch::{Completed, DispatchError};
use crate::api::extract::ResponseFields;
use crate::orchestrator::OperationKind;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

/// Success body for `kind`. Only the fields that endpoint reports are
/// included; unmatched ones are `null`.
pub fn success_body(kind: OperationKind, fields: &ResponseFields, raw: &str) -> Value {
    match kind {
        OperationKind::GetAddress => json!({
            "ok": true,
            "address": fields.address,
            "raw": raw,
        }),
        OperationKind::ListAccounts => json!({
            "ok": true,
            "accounts": fields.accounts,
            "raw": raw,
        }),
        OperationKind::GetBalance => json!({
            "ok": true,
            "wallet": fields.wallet,
            "encrypted": fields.encrypted,
            "clear": fields.clear,
            "decrypted": fields.decrypted,
            "raw": raw,
        }),
        _ => json!({
            "ok": true,
            "tx": fields.tx,
            "status": fields.status,
            "raw": raw,
        }),
    }
}

pub fn completed(kind: OperationKind, done: &Completed) -> Response {
    Json(success_body(kind, &done.fields, &done.raw)).into_response()
}

/// `{ ok: false, error, raw? }` with the given status.
pub fn failure(status: StatusCode, error: impl Into<String>, raw: Option<&str>) -> Response {
    let mut body = json!({ "ok": false, "error": error.into() });
    if let Some(raw) = raw {
        body["raw"] = Value::String(raw.to_string());
    }
    (status, Json(body)).into_response()
}

pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Rejected { source, .. } if source.is_client_error() => {
            StatusCode::BAD_REQUEST
        }
        DispatchError::Rejected { .. } | DispatchError::InvocationFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DispatchError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::UnknownNetwork(_) => StatusCode::BAD_REQUEST,
    }
}

pub fn dispatch_failure(err: &DispatchError) -> Response {
    failure(status_for(err), err.to_string(), err.raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OperationError;
    use std::time::Duration;

    #[test]
    fn test_transaction_body_nulls_missing_fields() {
        let fields = ResponseFields {
            tx: Some("0xabc".into()),
            ..Default::default()
        };
        let body = success_body(OperationKind::Transfer, &fields, "tx:0xabc\n");
        assert_eq!(
            body,
            json!({ "ok": true, "tx": "0xabc", "status": null, "raw": "tx:0xabc\n" })
        );
    }

    #[test]
    fn test_balance_body_has_only_balance_fields() {
        let fields = ResponseFields {
            clear: Some("4".into()),
            tx: Some("0xabc".into()),
            ..Default::default()
        };
        let body = success_body(OperationKind::GetBalance, &fields, "");
        assert_eq!(body["clear"], "4");
        assert!(body["decrypted"].is_null());
        assert!(body.get("tx").is_none());
    }

    #[test]
    fn test_accounts_body_is_always_an_array() {
        let body = success_body(OperationKind::ListAccounts, &ResponseFields::default(), "");
        assert_eq!(body["accounts"], json!([]));
    }

    #[test]
    fn test_status_mapping() {
        let rejected = |source| DispatchError::Rejected {
            source,
            raw: String::new(),
        };
        assert_eq!(
            status_for(&rejected(OperationError::InvalidArgument("x".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&rejected(OperationError::CoprocessorUnavailable("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&DispatchError::InvocationFailed {
                diagnostic: "boom".into(),
                raw: String::new()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&DispatchError::TimedOut(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
