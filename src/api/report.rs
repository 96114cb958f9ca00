use actix_web::{HttpResponse, Responder, http::header, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::IntoParams;

use crate::api::internal;
use crate::auth::auth::AuthUser;
use crate::leave::report::{self, ReportFilter};
use crate::repo::{self, Snapshot};

#[derive(Deserialize, IntoParams)]
pub struct TotalsQuery {
    /// Count only approved requests (default true)
    pub approved_only: Option<bool>,
}

async fn snapshot(auth: &AuthUser, pool: &MySqlPool) -> actix_web::Result<Snapshot> {
    auth.require_approver()?;
    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let snapshot = repo::load_snapshot(&mut conn)
        .await
        .map_err(internal("Failed to load report data"))?;
    debug!(
        requests = snapshot.requests.len(),
        employees = snapshot.employees.len(),
        "Report snapshot loaded"
    );
    Ok(snapshot)
}

#[utoipa::path(
    get,
    path = "/api/reports/employee",
    params(ReportFilter, TotalsQuery),
    responses(
        (status = 200, description = "Days per employee, largest first", body = [crate::leave::report::EmployeeTotal]),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn employee_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<ReportFilter>,
    totals: web::Query<TotalsQuery>,
) -> actix_web::Result<impl Responder> {
    let s = snapshot(&auth, pool.get_ref()).await?;
    let requests = filter.apply(&s.requests, &s.employees);
    let rows = report::by_employee(requests, &s.employees, totals.approved_only.unwrap_or(true));
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/reports/department",
    params(ReportFilter),
    responses(
        (status = 200, description = "Approved days per department", body = [crate::leave::report::DepartmentTotal]),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn department_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    let s = snapshot(&auth, pool.get_ref()).await?;
    let requests = filter.apply(&s.requests, &s.employees);
    Ok(HttpResponse::Ok().json(report::by_department(requests, &s.employees, &s.departments)))
}

#[utoipa::path(
    get,
    path = "/api/reports/leave-type",
    params(ReportFilter),
    responses(
        (status = 200, description = "Approved days per leave type with its color", body = [crate::leave::report::LeaveTypeTotal]),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn leave_type_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    let s = snapshot(&auth, pool.get_ref()).await?;
    let requests = filter.apply(&s.requests, &s.employees);
    Ok(HttpResponse::Ok().json(report::by_leave_type(requests, &s.leave_types)))
}

#[utoipa::path(
    get,
    path = "/api/reports/balance",
    params(ReportFilter),
    responses(
        (status = 200, description = "Remaining days per leave type across employees", body = [crate::leave::report::BalanceTotal]),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn balance_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    let mut s = snapshot(&auth, pool.get_ref()).await?;
    if let Some(department_id) = filter.department_id {
        s.employees.retain(|e| e.department_id == Some(department_id));
    }
    if let Some(leave_type_id) = filter.leave_type_id {
        s.leave_types.retain(|lt| lt.id == leave_type_id);
    }
    Ok(HttpResponse::Ok().json(report::balance_summary(&s.employees, &s.leave_types)))
}

#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    responses(
        (status = 200, description = "Request counts by status and staff head-count", body = crate::leave::report::Dashboard),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn dashboard(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let s = snapshot(&auth, pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(report::dashboard(&s.requests, &s.employees)))
}

#[utoipa::path(
    get,
    path = "/api/reports/export.csv",
    params(ReportFilter),
    responses(
        (status = 200, description = "One line per request", content_type = "text/csv", body = String),
        (status = 403, description = "Admin or manager only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn export_csv(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    let s = snapshot(&auth, pool.get_ref()).await?;
    let requests = filter.apply(&s.requests, &s.employees);
    let rows = report::csv_rows(requests, &s.employees, &s.leave_types, &s.departments);

    let mut body = Vec::new();
    report::write_csv(&rows, &mut body).map_err(internal("Failed to write CSV export"))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((header::CONTENT_DISPOSITION, "attachment; filename=\"leave-report.csv\""))
        .body(body))
}
