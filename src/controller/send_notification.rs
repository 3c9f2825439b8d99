//! Dispatch entry point used by the admin UI.

use actix_web::{http::header, web, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    configuration::{AppState, State},
    error::Error,
    types::NotificationPayload,
};

const ALLOWED_METHODS: &str = "POST, OPTIONS";

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub count: usize,
    pub attempted: usize,
    pub failed: usize,
}

pub async fn index(
    state: web::Data<AppState<State>>,
    body: web::Bytes,
) -> Result<HttpResponse, Error> {
    let dispatcher = state.ready_dispatcher()?;

    let request: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };

    let payload = NotificationPayload::from_request(&request);
    let report = dispatcher.notify_all(&payload).await?;

    Ok(HttpResponse::Ok().json(Response {
        success: true,
        count: report.total_sent,
        attempted: report.total_attempted,
        failed: report.failed(),
    }))
}

pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS))
        .insert_header((
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization",
        ))
        .finish()
}

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, ALLOWED_METHODS))
        .json(serde_json::json!({
            "success": false,
            "error": "Method Not Allowed",
            "status": 405,
        }))
}
