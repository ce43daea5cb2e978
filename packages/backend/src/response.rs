use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::assessment::AssessmentError;
use crate::services::concept::ConceptError;
use crate::services::mastery::MasteryError;
use crate::services::plan::PlanServiceError;
use crate::services::profile::ProfileError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = %self.code, error = %self.message, "request failed");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
        is_operational: true,
    }
}

impl From<ConceptError> for AppError {
    fn from(err: ConceptError) -> Self {
        match err {
            ConceptError::NotFound(_) => AppError::not_found(err.to_string()),
            ConceptError::AlreadyExists(_) => AppError::conflict(err.to_string()),
            ConceptError::SelfPrerequisite(_) | ConceptError::Invalid(_) => {
                AppError::validation(err.to_string())
            }
            ConceptError::Sql(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<MasteryError> for AppError {
    fn from(err: MasteryError) -> Self {
        match err {
            MasteryError::UnknownConcept(_) => AppError::not_found(err.to_string()),
            MasteryError::Invalid(_) => AppError::validation(err.to_string()),
            MasteryError::Sql(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<PlanServiceError> for AppError {
    fn from(err: PlanServiceError) -> Self {
        match err {
            PlanServiceError::InvalidRequest(_) | PlanServiceError::MissingUser => {
                AppError::validation(err.to_string())
            }
            PlanServiceError::NotFound(_) => AppError::not_found(err.to_string()),
            PlanServiceError::Sql(_) | PlanServiceError::Corrupt(_) => {
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<AssessmentError> for AppError {
    fn from(err: AssessmentError) -> Self {
        match err {
            AssessmentError::NotFound(_) => AppError::not_found(err.to_string()),
            AssessmentError::NotOwner { .. } => AppError::forbidden(err.to_string()),
            AssessmentError::AlreadyCompleted(_) => AppError::conflict(err.to_string()),
            AssessmentError::Invalid(_) => AppError::validation(err.to_string()),
            AssessmentError::Sql(_) | AssessmentError::Json(_) => {
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(_) => AppError::not_found(err.to_string()),
            ProfileError::AlreadyExists(_) => AppError::conflict(err.to_string()),
            ProfileError::Invalid(_) => AppError::validation(err.to_string()),
            ProfileError::Sql(_) | ProfileError::Json(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}
