use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Failures surfaced to API clients. Each variant renders as
/// `{"error": <message>, "code": <stable code>}`.
#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    ReferenceNotFound(String),

    #[display(
        fmt = "Family {} still has {} other member(s); remove them first",
        family_id,
        count
    )]
    DependentsExist { family_id: String, count: i64 },

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Could not allocate a unique family id after {} attempts", _0)]
    FamilyIdExhausted(u32),

    #[display(fmt = "Something went wrong, Contact with system admin")]
    StoreUnavailable,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ReferenceNotFound(_) => "reference_not_found",
            ServiceError::DependentsExist { .. } => "dependents_exist",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::FamilyIdExhausted(_) => "family_id_exhausted",
            ServiceError::StoreUnavailable => "store_unavailable",
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ReferenceNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::DependentsExist { .. }
            | ServiceError::Conflict(_)
            | ServiceError::FamilyIdExhausted(_) => StatusCode::CONFLICT,
            ServiceError::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(detail) => {
                ServiceError::Conflict(format!("Record already exists: {}", detail))
            }
            StoreError::Unavailable(detail) => {
                // detail stays in the server log
                error!(error = %detail, "Store operation failed");
                ServiceError::StoreUnavailable
            }
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from(err).into()
    }
}
