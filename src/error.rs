use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use anyhow::Error as ANYHOW_ERROR;
use base64::DecodeError as BASE64_DECODE_ERROR;
use ece::Error as ECE_ERROR;
use jsonwebtoken::errors::Error as JWT_ERROR;
use reqwest::header::{
    InvalidHeaderName as INVALID_HEADER_NAME,
    InvalidHeaderValue as INVALID_HEADER_VALUE,
};
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use sqlx::error::Error as SQL_ERROR;
use std::{
    env::VarError, io::Error as IO_ERROR, num::ParseIntError,
    str::ParseBoolError as PARSE_BOOL_ERROR,
};
use thiserror::Error;
use tokio::{
    sync::AcquireError as ACQUIRE_ERROR, task::JoinError, time::error::Elapsed,
};
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    SQL(#[from] SQL_ERROR),

    #[error("{0}")]
    VAR(#[from] VarError),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("{0}")]
    TokioElapsedError(#[from] Elapsed),

    #[error("{0}")]
    Base64DecodeError(#[from] BASE64_DECODE_ERROR),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("{0}")]
    ParseBoolError(#[from] PARSE_BOOL_ERROR),

    #[error("{0}")]
    ReqwestError(#[from] REQWEST_ERROR),

    #[error("{0}")]
    InvalidHeaderName(#[from] INVALID_HEADER_NAME),

    #[error("{0}")]
    InvalidHeaderValue(#[from] INVALID_HEADER_VALUE),

    #[error("Ece error: {0}")]
    EceError(#[from] ECE_ERROR),

    #[error("JWT error: {0}")]
    JWT(#[from] JWT_ERROR),

    #[error("{0}")]
    AcquireError(#[from] ACQUIRE_ERROR),

    #[error("{0}")]
    AnyHowError(#[from] ANYHOW_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Missing configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    #[error("Invalid option: {option}")]
    InvalidOption { option: String },

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Subscription store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Push notifications are not supported")]
    PushUnsupported,

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Server end with error: {0}")]
    ServerError(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request - client sent invalid input
            Error::InvalidOption { .. }
            | Error::InvalidSubscription(_)
            | Error::JsonError(_)
            | Error::INT(_)
            | Error::ParseBoolError(_)
            | Error::Base64DecodeError(_)
            | Error::URL(_) => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway - push service error
            Error::ReqwestError(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable - store could not be reached
            Error::SQL(_) | Error::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            },

            // 504 Gateway Timeout - upstream timed out
            Error::TokioElapsedError(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error - everything else
            Error::Io(_)
            | Error::VAR(_)
            | Error::TokioJoinError(_)
            | Error::InvalidHeaderName(_)
            | Error::InvalidHeaderValue(_)
            | Error::EceError(_)
            | Error::JWT(_)
            | Error::AcquireError(_)
            | Error::AnyHowError(_)
            | Error::SetGlobalDefaultError(_)
            | Error::ConfigurationError(_)
            | Error::MissingConfiguration(_)
            | Error::PermissionDenied
            | Error::PushUnsupported
            | Error::Platform(_)
            | Error::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "success": false,
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        if let Error::MissingConfiguration(items) = self {
            body["missing"] = serde_json::json!(items);
        }

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_names_every_item() {
        let err = Error::MissingConfiguration(vec![
            String::from("VAPID_PUBLIC_KEY"),
            String::from("VAPID_SUBJECT"),
        ]);

        assert_eq!(
            err.to_string(),
            "Missing configuration: VAPID_PUBLIC_KEY, VAPID_SUBJECT"
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_errors_map_to_unavailable() {
        let err = Error::StoreUnavailable(String::from("no database"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = Error::InvalidSubscription(String::from("endpoint"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
