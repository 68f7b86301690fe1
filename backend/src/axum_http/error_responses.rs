use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::{checkout::CheckoutError, stripe_webhook::WebhookError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

pub fn error_response(status: StatusCode, message: String) -> Response {
    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });
    (status, body).into_response()
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            CheckoutError::Validation(msg) => msg,
            // Don't leak internal error detail to client
            CheckoutError::Internal(_) => "Internal server error".to_string(),
        };
        error_response(status, message)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            WebhookError::InvalidWebhook(msg) => msg,
            WebhookError::Internal(_) => "Internal server error".to_string(),
        };
        error_response(status, message)
    }
}
