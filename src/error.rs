use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;
use serde_json::json;

use crate::leave::overlap::Conflict;
use crate::model::leave_request::LeaveStatus;

/// Errors raised by the leave engine.
///
/// Validation variants are user-correctable and carry enough context for
/// the caller to fix the input. `UnknownReference` is fatal on mutation
/// paths; reporting never raises it.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum LeaveError {
    #[display(fmt = "start date {} is after end date {}", start, end)]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[display(fmt = "leave request overlaps an existing pending or approved request")]
    OverlappingRequest { conflicts: Vec<Conflict> },

    #[display(
        fmt = "insufficient balance: requested {} day(s), available {}",
        requested,
        available
    )]
    InsufficientBalance { requested: f64, available: f64 },

    #[display(fmt = "unknown {} reference {}", entity, id)]
    UnknownReference { entity: &'static str, id: u64 },

    #[display(fmt = "invalid day count {}", days)]
    InvalidDays { days: f64 },

    #[display(fmt = "leave type {} is not active", id)]
    InactiveLeaveType { id: u64 },

    #[display(fmt = "leave request already {}", status)]
    AlreadyDecided { status: LeaveStatus },

    #[display(fmt = "a comment is required when rejecting a leave request")]
    MissingComment,

    #[display(fmt = "only an admin or manager may decide leave requests")]
    NotAnApprover,

    #[display(fmt = "malformed {} value '{}' in stored record", field, value)]
    MalformedRecord { field: &'static str, value: String },
}

impl std::error::Error for LeaveError {}

impl LeaveError {
    pub fn unknown(entity: &'static str, id: u64) -> Self {
        LeaveError::UnknownReference { entity, id }
    }
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::InvalidDateRange { .. }
            | LeaveError::InvalidDays { .. }
            | LeaveError::MissingComment => StatusCode::BAD_REQUEST,
            LeaveError::OverlappingRequest { .. } | LeaveError::AlreadyDecided { .. } => {
                StatusCode::CONFLICT
            }
            LeaveError::InsufficientBalance { .. } | LeaveError::InactiveLeaveType { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LeaveError::UnknownReference { .. } => StatusCode::NOT_FOUND,
            LeaveError::NotAnApprover => StatusCode::FORBIDDEN,
            LeaveError::MalformedRecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            LeaveError::OverlappingRequest { conflicts } => json!({
                "message": self.to_string(),
                "conflicts": conflicts,
            }),
            LeaveError::InsufficientBalance {
                requested,
                available,
            } => json!({
                "message": self.to_string(),
                "requested": requested,
                "available": available,
            }),
            LeaveError::MalformedRecord { .. } => {
                tracing::error!(error = %self, "Stored record failed validation");
                json!({ "message": "Internal Server Error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
