use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::api::internal;
use crate::auth::auth::AuthUser;
use crate::leave::ledger::BalanceLedger;
use crate::repo;

#[derive(Deserialize, ToSchema, Default)]
pub struct AccrualRun {
    /// Month being accrued as `YYYY-MM`; defaults to the current month
    #[schema(example = "2025-04")]
    pub period: Option<String>,
}

/// Normalizes the requested accrual month to `YYYY-MM`.
fn accrual_period(requested: Option<&str>, today: NaiveDate) -> Result<String, String> {
    match requested.map(str::trim) {
        None | Some("") => Ok(today.format("%Y-%m").to_string()),
        Some(p) => NaiveDate::parse_from_str(&format!("{p}-01"), "%Y-%m-%d")
            .map(|d| d.format("%Y-%m").to_string())
            .map_err(|_| format!("period '{p}' is not a YYYY-MM month")),
    }
}

/// Credits one month of accrual to every balance of an accruing leave type.
/// Each month can be run once.
#[utoipa::path(
    post,
    path = "/api/accrual/monthly",
    request_body = AccrualRun,
    responses(
        (status = 200, description = "Accrual applied", body = Object, example = json!({
            "message": "Monthly accrual applied",
            "period": "2025-04",
            "entries": 42
        })),
        (status = 400, description = "Malformed period"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Month already accrued")
    ),
    security(("bearer_auth" = [])),
    tag = "Accrual"
)]
#[instrument(skip(pool, body, auth), fields(run_by = auth.employee_id))]
pub async fn run_monthly_accrual(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: Option<web::Json<AccrualRun>>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let run = body.map(web::Json::into_inner).unwrap_or_default();
    let period = match accrual_period(run.period.as_deref(), Utc::now().date_naive()) {
        Ok(p) => p,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(json!({ "message": msg }))),
    };

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    // claims the month; a second run hits the primary key
    let claimed = sqlx::query("INSERT INTO accrual_runs (period, entries, run_by) VALUES (?, 0, ?)")
        .bind(&period)
        .bind(auth.employee_id)
        .execute(&mut *tx)
        .await;
    match claimed {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": format!("Accrual for {period} already ran")
            })));
        }
        Err(e) => return Err(internal("Failed to record accrual run")(e)),
    }

    let leave_types = repo::load_leave_types(&mut tx)
        .await
        .map_err(internal("Failed to load leave types"))?;
    let balances = repo::lock_all_balances(&mut tx)
        .await
        .map_err(internal("Failed to lock balances"))?;

    let mut ledger = BalanceLedger::new(&leave_types);
    for b in &balances {
        ledger.open(b.employee_id, b.leave_type_id, b.balance);
    }
    let employee_ids = repo::load_employee_ids(&mut tx)
        .await
        .map_err(internal("Failed to load employees"))?;
    ledger.open_missing(employee_ids);
    let entries = ledger.accrue_monthly();

    repo::apply_entries(&mut tx, &entries)
        .await
        .map_err(internal("Failed to store accrual"))?;

    sqlx::query("UPDATE accrual_runs SET entries = ? WHERE period = ?")
        .bind(entries.len() as u32)
        .bind(&period)
        .execute(&mut *tx)
        .await
        .map_err(internal("Failed to finish accrual run"))?;

    tx.commit().await.map_err(internal("Failed to commit accrual"))?;

    info!(period = %period, entries = entries.len(), "Monthly accrual applied");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Monthly accrual applied",
        "period": period,
        "entries": entries.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 17).unwrap()
    }

    #[test]
    fn period_defaults_to_current_month() {
        assert_eq!(accrual_period(None, today()).unwrap(), "2025-04");
        assert_eq!(accrual_period(Some("  "), today()).unwrap(), "2025-04");
    }

    #[test]
    fn explicit_period_is_normalized() {
        assert_eq!(accrual_period(Some("2025-1"), today()).unwrap(), "2025-01");
        assert_eq!(accrual_period(Some("2024-12"), today()).unwrap(), "2024-12");
    }

    #[test]
    fn malformed_period_is_rejected() {
        assert!(accrual_period(Some("2025-13"), today()).is_err());
        assert!(accrual_period(Some("April"), today()).is_err());
    }
}
