//! Universal error handling for the API

use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use identity_verifier::{ConfigError, DeepLinkError, ValidationError, VerifierError};
use schemars::JsonSchema;
use serde::Serialize;

use crate::pool::PoolError;

/// API error response envelope
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    error: ErrorBody,
}

/// Error body containing code and message
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: Cow<'static, str>,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(
        status: StatusCode,
        code: &'static str,
        msg: &'static str,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody {
                    code,
                    message: Cow::Borrowed(msg),
                },
            },
        }
    }

    /// Request validation failure with a caller-facing message
    #[must_use]
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            inner: ApiErrorResponse {
                allow_retry: false,
                error: ErrorBody {
                    code: "validation_error",
                    message: message.into(),
                },
            },
        }
    }

    /// HTTP status of the error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.inner.error.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Malformed request input, the message is safe to return verbatim
impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        tracing::error!("Policy resolution failed: {err}");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "policy_unavailable",
            "Verification policy unavailable",
            true,
        )
    }
}

impl From<DeepLinkError> for AppError {
    fn from(err: DeepLinkError) -> Self {
        match &err {
            DeepLinkError::Invalid(validation) => validation.clone().into(),
            DeepLinkError::ConfigTooLarge { .. } => Self {
                status: StatusCode::BAD_REQUEST,
                inner: ApiErrorResponse {
                    allow_retry: false,
                    error: ErrorBody {
                        code: "config_too_large",
                        message: Cow::Owned(err.to_string()),
                    },
                },
            },
            DeepLinkError::InvalidUri(_)
            | DeepLinkError::MissingPayload
            | DeepLinkError::MalformedPayload(_) => {
                tracing::error!("Deep link encoding failed: {err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
        }
    }
}

impl From<VerifierError> for AppError {
    fn from(err: VerifierError) -> Self {
        tracing::error!("Proof verification backend error: {err}");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_error",
            "Proof verification service temporarily unavailable",
            true,
        )
    }
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ServiceBusy => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_busy",
                "Too many verifications in progress, try again shortly",
                true,
            ),
            PoolError::Closed => {
                tracing::error!("Verification pool is closed");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Verification is shutting down",
                    true,
                )
            }
        }
    }
}

impl OperationOutput for AppError {
    type Inner = ApiErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ApiErrorResponse>::operation_response(ctx, operation)
    }
}
