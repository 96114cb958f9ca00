use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::api::{Page, internal, paginate};
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::calendar::{self, CalendarIndex};
use crate::leave::ledger::BalanceLedger;
use crate::leave::overlap::ensure_no_conflicts;
use crate::leave::period::DateRange;
use crate::leave::workflow;
use crate::model::leave_request::{DayPortion, LeaveRequest, LeaveRequestRow, LeaveStatus};
use crate::repo::{self, NewLeave};
use crate::utils::leave_type_cache;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-04-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub portion: DayPortion,
    #[schema(example = "Family visit")]
    pub reason: Option<String>,
    /// Reference to an uploaded supporting document
    pub document: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct Decision {
    #[schema(example = "Enjoy your break")]
    pub comment: Option<String>,
    /// Overrides the computed debit, e.g. to skip weekends
    #[schema(example = 3.0)]
    pub days: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID (ignored for staff)
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    pub leave_type_id: Option<u64>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct CalendarQuery {
    /// First day shown, defaults to the first of the current month
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub department_id: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct UpcomingQuery {
    /// Defaults to 5
    pub limit: Option<usize>,
}

enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 12,
    "leave_type_id": 1,
    "start_date": "2025-04-01",
    "end_date": "2025-04-05",
    "portion": "FULL_DAY",
    "days": 5.0,
    "reason": "Family visit",
    "document": null,
    "status": "APPROVED",
    "requested_at": "2025-03-20T09:15:00Z",
    "approver_id": 3,
    "approver_comment": "Enjoy",
    "debited_days": 5.0
}))]
pub struct LeaveResponse {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub portion: DayPortion,
    pub days: f64,
    /// Monday to Friday days inside the range
    pub working_days: i64,
    pub reason: String,
    pub document: Option<String>,
    pub status: LeaveStatus,
    #[schema(format = "date-time", value_type = String)]
    pub requested_at: DateTime<Utc>,
    pub approver_id: Option<u64>,
    pub approver_comment: Option<String>,
    pub debited_days: Option<f64>,
}

impl From<&LeaveRequest> for LeaveResponse {
    fn from(r: &LeaveRequest) -> Self {
        LeaveResponse {
            id: r.id,
            employee_id: r.employee_id,
            leave_type_id: r.leave_type_id,
            start_date: r.start(),
            end_date: r.end(),
            portion: r.portion,
            days: r.reported_days(),
            working_days: r.period.working_days(),
            reason: r.reason.clone(),
            document: r.document.clone(),
            status: r.status,
            requested_at: r.requested_at,
            approver_id: r.approver_id,
            approver_comment: r.approver_comment.clone(),
            debited_days: r.debited_days,
        }
    }
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted",
            "id": 42,
            "status": "PENDING"
        })),
        (status = 400, description = "Start date after end date"),
        (status = 404, description = "Unknown leave type"),
        (status = 409, description = "Overlaps a pending or approved request", body = Object, example = json!({
            "message": "leave request overlaps an existing pending or approved request",
            "conflicts": [{"request_id": 7, "start_date": "2025-04-01", "end_date": "2025-04-05", "status": "APPROVED"}]
        })),
        (status = 422, description = "Leave type is inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(skip(pool, payload, auth), fields(employee_id = auth.employee_id))]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id;
    let period = DateRange::new(payload.start_date, payload.end_date)?;

    let leave_type = leave_type_cache::get(pool.get_ref(), payload.leave_type_id)
        .await
        .map_err(internal("Failed to load leave type"))?
        .ok_or(LeaveError::unknown("leave type", payload.leave_type_id))?;

    if !leave_type.is_active {
        return Err(LeaveError::InactiveLeaveType { id: leave_type.id }.into());
    }

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    // Holding these rows serializes concurrent applications of one employee.
    let existing = repo::lock_open_requests(&mut tx, employee_id)
        .await
        .map_err(internal("Failed to load existing requests"))?;
    ensure_no_conflicts(employee_id, &period, None, &existing)?;

    let id = repo::insert_request(
        &mut tx,
        &NewLeave {
            employee_id,
            leave_type_id: leave_type.id,
            period,
            portion: payload.portion,
            reason: payload.reason.as_deref().map(str::trim).unwrap_or_default(),
            document: payload.document.as_deref(),
        },
    )
    .await
    .map_err(internal("Failed to create leave request"))?;

    tx.commit().await.map_err(internal("Failed to commit leave request"))?;

    info!(request_id = id, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "status": LeaveStatus::Pending,
    })))
}

/* =========================
Approve leave (Admin/Manager)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    request_body(content = Decision, description = "Optional comment and day override"),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave approved",
            "debited_days": 5.0,
            "balance": 10.0
        })),
        (status = 403, description = "Not an approver"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided"),
        (status = 422, description = "Insufficient balance", body = Object, example = json!({
            "message": "insufficient balance: requested 5 day(s), available 3",
            "requested": 5.0,
            "available": 3.0
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(skip(pool, body, auth), fields(approver = auth.employee_id))]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<Decision>>,
) -> actix_web::Result<impl Responder> {
    let approver = auth.require_approver()?;
    let leave_id = path.into_inner();
    let decision = body.map(web::Json::into_inner).unwrap_or_default();

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    let mut request = repo::lock_request(&mut tx, leave_id)
        .await
        .map_err(internal("Failed to load leave request"))?
        .ok_or(LeaveError::unknown("leave request", leave_id))?;

    let leave_type = repo::load_leave_type(&mut tx, request.leave_type_id, false)
        .await
        .map_err(internal("Failed to load leave type"))?
        .ok_or(LeaveError::unknown("leave type", request.leave_type_id))?;

    let balance = repo::lock_balance(&mut tx, request.employee_id, leave_type.id)
        .await
        .map_err(internal("Failed to lock balance"))?;

    let mut ledger = BalanceLedger::new([&leave_type]);
    match balance {
        Some(b) => ledger.open(request.employee_id, leave_type.id, b),
        None => {
            let exists = repo::employee_exists(&mut tx, request.employee_id)
                .await
                .map_err(internal("Failed to check employee"))?;
            if exists {
                ledger.open(request.employee_id, leave_type.id, 0.0);
            }
        }
    }

    let remaining = workflow::approve(&mut request, &mut ledger, &approver, decision.comment, decision.days)?;

    repo::apply_entries(&mut tx, &ledger.take_entries())
        .await
        .map_err(internal("Failed to record ledger entries"))?;

    let stored = repo::store_decision(&mut tx, &request)
        .await
        .map_err(internal("Failed to store approval"))?;
    if !stored {
        return Err(LeaveError::AlreadyDecided { status: request.status }.into());
    }

    let debited = request.debited_days.unwrap_or_default();
    repo::notify(
        &mut tx,
        request.employee_id,
        &format!(
            "Your {} leave from {} to {} was approved ({} day(s)).",
            leave_type.name,
            request.start(),
            request.end(),
            debited
        ),
    )
    .await
    .map_err(internal("Failed to create notification"))?;

    tx.commit().await.map_err(internal("Failed to commit approval"))?;

    info!(leave_id, debited, remaining, "Leave approved");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved",
        "debited_days": debited,
        "balance": remaining,
    })))
}

/* =========================
Reject leave (Admin/Manager)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    request_body = Decision,
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({"message": "Leave rejected"})),
        (status = 400, description = "Comment missing"),
        (status = 403, description = "Not an approver"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(skip(pool, body, auth), fields(approver = auth.employee_id))]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Decision>,
) -> actix_web::Result<impl Responder> {
    let approver = auth.require_approver()?;
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    let mut request = repo::lock_request(&mut tx, leave_id)
        .await
        .map_err(internal("Failed to load leave request"))?
        .ok_or(LeaveError::unknown("leave request", leave_id))?;

    workflow::reject(&mut request, &approver, body.into_inner().comment)?;

    let stored = repo::store_decision(&mut tx, &request)
        .await
        .map_err(internal("Failed to store rejection"))?;
    if !stored {
        return Err(LeaveError::AlreadyDecided { status: request.status }.into());
    }

    repo::notify(
        &mut tx,
        request.employee_id,
        &format!(
            "Your leave from {} to {} was rejected: {}",
            request.start(),
            request.end(),
            request.approver_comment.as_deref().unwrap_or_default()
        ),
    )
    .await
    .map_err(internal("Failed to create notification"))?;

    tx.commit().await.map_err(internal("Failed to commit rejection"))?;

    info!(leave_id, "Leave rejected");

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "unknown leave request reference 9"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let request = repo::load_request(&mut conn, leave_id)
        .await
        .map_err(internal("Failed to fetch leave request"))?
        // staff get the same 404 for other people's requests
        .filter(|r| auth.can_view(r.employee_id))
        .ok_or(LeaveError::unknown("leave request", leave_id))?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(&request)))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeavePage),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let employee_filter = if auth.is_staff() {
        Some(auth.employee_id)
    } else {
        query.employee_id
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = employee_filter {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = &query.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.as_ref()));
    }

    if let Some(leave_type_id) = query.leave_type_id {
        where_sql.push_str(" AND leave_type_id = ?");
        args.push(FilterValue::U64(leave_type_id));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(internal("Failed to count leave requests"))?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, leave_type_id, start_date, end_date, is_full_day, reason,
               document, status, requested_at, approver_id, approver_comment, debited_days
        FROM leave_requests
        {}
        ORDER BY requested_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRequestRow>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(internal("Failed to fetch leave list"))?;

    let data = rows
        .into_iter()
        .map(|row| LeaveRequest::try_from(row).map(|r| LeaveResponse::from(&r)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(Page {
        data,
        page,
        per_page,
        total,
    }))
}

/// Approved leave laid out per day.
#[utoipa::path(
    get,
    path = "/api/leave/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Approved leave per day inside the window", body = Object, example = json!({
            "from": "2025-04-01",
            "to": "2025-04-30",
            "days": [{"date": "2025-04-01", "requests": [1, 4]}],
            "summaries": [{"date": "2025-04-01", "total": 2, "by_leave_type": {"1": 2}}],
            "requests": []
        })),
        (status = 400, description = "from is after to")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_calendar(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CalendarQuery>,
) -> actix_web::Result<impl Responder> {
    let month = DateRange::month_of(Utc::now().date_naive());
    let window = DateRange::new(
        query.from.unwrap_or(month.start()),
        query.to.unwrap_or(month.end()),
    )?;

    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let mut approved = repo::load_approved_between(&mut conn, &window)
        .await
        .map_err(internal("Failed to load approved leave"))?;

    if let Some(department_id) = query.department_id {
        let employees = repo::load_employees(&mut conn)
            .await
            .map_err(internal("Failed to load employees"))?;
        let members: Vec<u64> = employees
            .iter()
            .filter(|e| e.department_id == Some(department_id))
            .map(|e| e.id)
            .collect();
        approved.retain(|r| members.contains(&r.employee_id));
    }

    let index = CalendarIndex::build(&approved, window);

    let days: Vec<_> = index
        .days()
        .map(|(date, bucket)| json!({ "date": date, "requests": bucket.iter().map(|r| r.id).collect::<Vec<_>>() }))
        .collect();
    let requests: Vec<LeaveResponse> = index
        .between(window.start(), window.end())
        .into_iter()
        .map(LeaveResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "from": window.start(),
        "to": window.end(),
        "days": days,
        "summaries": index.day_summaries(),
        "requests": requests,
    })))
}

#[utoipa::path(
    get,
    path = "/api/leave/upcoming",
    params(UpcomingQuery),
    responses((status = 200, description = "Approved leave starting today or later, soonest first", body = [LeaveResponse])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn upcoming_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UpcomingQuery>,
) -> actix_web::Result<impl Responder> {
    let today = Utc::now().date_naive();
    let limit = query.limit.unwrap_or(5).min(100);

    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let approved = repo::load_approved_from(&mut conn, today)
        .await
        .map_err(internal("Failed to load upcoming leave"))?;

    let visible = approved.iter().filter(|r| auth.can_view(r.employee_id));
    let data: Vec<LeaveResponse> = calendar::upcoming(visible, today, limit)
        .into_iter()
        .map(LeaveResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(data))
}
