use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::attendance::state::IllegalTransition;
use crate::store::StoreError;

/// Failures surfaced to the employee as an inline message.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("No employee id found for this session")]
    MissingEmployeeId,

    #[error("No employee profile found")]
    ProfileNotFound,

    #[error("You have no work centers assigned")]
    NoWorkCenters,

    #[error("Work center '{0}' is not assigned to you")]
    UnknownWorkCenter(String),

    #[error("A work center can only be selected before clocking in")]
    SelectionLocked,

    #[error("Action not allowed: {0}")]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Another attendance action is still in progress")]
    Busy,

    #[error("Could not reach the attendance store, please try again")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProfileNotFound(_) => AttendanceError::ProfileNotFound,
            other => AttendanceError::Store(other),
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::MissingEmployeeId => StatusCode::FORBIDDEN,
            AttendanceError::ProfileNotFound => StatusCode::NOT_FOUND,
            AttendanceError::NoWorkCenters
            | AttendanceError::UnknownWorkCenter(_)
            | AttendanceError::SelectionLocked => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::IllegalTransition(_) | AttendanceError::Busy => StatusCode::CONFLICT,
            AttendanceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}
