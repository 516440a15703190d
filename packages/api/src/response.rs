// ABOUTME: Shared API response envelope and error mapping
// ABOUTME: Every body carries the legacy `result` string next to an optional payload

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use crowbox_sandbox::{ResultCode, SandboxError};
use serde_json::{Map, Value};

pub const BAD_REQUEST: &str = "BAD REQUEST...";

pub fn status_for(code: ResultCode) -> StatusCode {
    match code {
        ResultCode::Success => StatusCode::OK,
        ResultCode::NoSuch => StatusCode::NOT_FOUND,
        ResultCode::Duplicate => StatusCode::CONFLICT,
        ResultCode::Wrong => StatusCode::BAD_REQUEST,
        ResultCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        ResultCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// `{"result": "SUCCESS", <key>: <value>}`
pub fn success(payload: Option<(&str, Value)>) -> Response {
    envelope(StatusCode::OK, ResultCode::Success.as_str(), payload)
}

pub fn failure(err: &SandboxError) -> Response {
    let code = err.result_code();
    envelope(
        status_for(code),
        code.as_str(),
        Some(("message", Value::String(err.to_string()))),
    )
}

pub fn bad_request(message: impl Into<String>) -> Response {
    envelope(
        StatusCode::BAD_REQUEST,
        BAD_REQUEST,
        Some(("message", Value::String(message.into()))),
    )
}

fn envelope(status: StatusCode, result: &str, payload: Option<(&str, Value)>) -> Response {
    let mut body = Map::new();
    body.insert("result".to_string(), Value::String(result.to_string()));
    if let Some((key, value)) = payload {
        body.insert(key.to_string(), value);
    }
    (status, ResponseJson(Value::Object(body))).into_response()
}
