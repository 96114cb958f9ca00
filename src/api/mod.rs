use actix_web::error::ErrorInternalServerError;
use serde::Serialize;
use utoipa::ToSchema;

pub mod accrual;
pub mod department;
pub mod employee;
pub mod leave_request;
pub mod leave_type;
pub mod notification;
pub mod report;

/// Logs an infrastructure failure and hides it behind a plain 500.
pub(crate) fn internal<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> actix_web::Error {
    move |e| {
        tracing::error!(error = %e, "{}", context);
        ErrorInternalServerError("Internal Server Error")
    }
}

#[derive(Serialize, ToSchema)]
#[aliases(LeavePage = Page<crate::api::leave_request::LeaveResponse>, EmployeePage = Page<crate::model::employee::Employee>)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

/// `(page, per_page, offset)` with the page 1-based and at most 100 rows.
pub(crate) fn paginate(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, u64) {
    let per_page = per_page.unwrap_or(10).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    (page, per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(paginate(None, None), (1, 10, 0));
        assert_eq!(paginate(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(paginate(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(paginate(Some(2), Some(0)), (2, 1, 1));
    }
}
