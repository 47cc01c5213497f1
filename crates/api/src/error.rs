use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sketchdesk_domain::error::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    HierarchyMismatch(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::HierarchyMismatch(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "bad_request",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::HierarchyMismatch(_) => "hierarchy_mismatch",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal => "internal_error",
        }
    }
}

pub fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::Forbidden(message) => ApiError::Forbidden(message),
        err @ DomainError::NotFound(_) => ApiError::NotFound(err.to_string()),
        DomainError::HierarchyMismatch { message, .. } => ApiError::HierarchyMismatch(message),
        DomainError::Conflict(message) => ApiError::Conflict(message),
        DomainError::Storage(message) => {
            tracing::error!(error = %message, "storage failure");
            ApiError::Internal
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = self.to_string();
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.error_code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchdesk_domain::hierarchy::HierarchyLevel;

    #[test]
    fn mismatch_is_reported_as_not_found_class() {
        let err = map_domain_error(DomainError::mismatch(
            HierarchyLevel::SubDistrict,
            HierarchyLevel::SubRegion,
        ));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "hierarchy_mismatch");
    }

    #[test]
    fn storage_details_stay_internal() {
        let err = map_domain_error(DomainError::Storage("socket closed".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal error");
    }
}
