//! API error envelope.
//!
//! Every error response carries the same JSON shape: an `error` object
//! with a machine-readable type and code, plus a `meta` object with a
//! request id and timestamp so a client report can be matched to logs.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use billgate_ledger::BillingError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Coarse error classification, mirrored in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Validation,
    Authentication,
    NotFound,
    Api,
    Internal,
    RateLimit,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Validation => "validation_error",
            ErrorType::Authentication => "authentication_error",
            ErrorType::NotFound => "not_found",
            ErrorType::Api => "api_error",
            ErrorType::Internal => "internal_error",
            ErrorType::RateLimit => "rate_limit_error",
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: ErrorType,
    pub code: &'static str,
    pub message: String,
    pub description: Option<String>,
    pub field: Option<String>,
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error_type: ErrorType,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type,
            code,
            message: message.into(),
            description: None,
            field: None,
            retry_after_seconds: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorType::Validation,
            "VALIDATION_FAILED",
            message,
        )
        .with_field(field)
    }

    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorType::Validation,
            "INVALID_BODY",
            message,
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorType::Authentication,
            "UNAUTHORIZED",
            message,
        )
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorType::RateLimit,
            "RATE_LIMIT_EXCEEDED",
            "Rate limit exceeded",
        );
        err.retry_after_seconds = Some(retry_after_seconds);
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::Internal,
            "INTERNAL_ERROR",
            message,
        )
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound(what) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorType::NotFound,
                "CUSTOMER_NOT_FOUND",
                format!("Not found: {}", what),
            ),
            BillingError::NoStripeCustomer(user_id) => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorType::Validation,
                "NO_STRIPE_CUSTOMER",
                format!("User {} has no billing history to manage", user_id),
            ),
            BillingError::Conflict(detail) => Self::new(
                StatusCode::CONFLICT,
                ErrorType::Api,
                "ALREADY_EXISTS",
                "Conflicting record already exists",
            )
            .with_description(detail),
            BillingError::WebhookSignatureInvalid => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorType::Validation,
                "INVALID_SIGNATURE",
                "Webhook signature verification failed",
            ),
            BillingError::WebhookPayloadInvalid(detail) => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorType::Validation,
                "INVALID_PAYLOAD",
                "Webhook payload could not be processed",
            )
            .with_description(detail),
            BillingError::Stripe(e) => {
                tracing::error!(error = %e, "Stripe API error");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    ErrorType::Api,
                    "STRIPE_ERROR",
                    "Payment processor request failed",
                )
            }
            BillingError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorType::Api,
                    "DATABASE_ERROR",
                    "Database operation failed",
                )
            }
            BillingError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal billing error");
                Self::internal("Internal error")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    error_type: &'a str,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorMeta {
    request_id: Uuid,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
    meta: ErrorMeta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string());

        if self.status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                code = self.code,
                message = %self.message,
                "Request failed"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                code = self.code,
                message = %self.message,
                "Request rejected"
            );
        }

        let body = Json(ErrorEnvelope {
            error: ErrorBody {
                error_type: self.error_type.as_str(),
                code: self.code,
                message: &self.message,
                description: self.description.as_deref(),
                field: self.field.as_deref(),
            },
            meta: ErrorMeta {
                request_id,
                timestamp,
            },
        });

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after_seconds {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_strings() {
        assert_eq!(ErrorType::Validation.as_str(), "validation_error");
        assert_eq!(ErrorType::Authentication.as_str(), "authentication_error");
        assert_eq!(ErrorType::RateLimit.as_str(), "rate_limit_error");
    }

    #[test]
    fn test_billing_error_mapping() {
        let err: ApiError = BillingError::NotFound("customer u1".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "CUSTOMER_NOT_FOUND");

        let err: ApiError = BillingError::Conflict("dup".to_string()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "ALREADY_EXISTS");

        let err: ApiError = BillingError::NoStripeCustomer("u1".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "NO_STRIPE_CUSTOMER");
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = ApiError::rate_limited(42);
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_after_seconds, Some(42));
    }
}
