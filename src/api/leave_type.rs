use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::api::internal;
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::model::leave_type::LeaveType;
use crate::repo;
use crate::utils::leave_type_cache;

#[derive(Deserialize, ToSchema)]
pub struct LeaveTypeInput {
    #[schema(example = "PTO")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "#4CAF50")]
    pub color: Option<String>,
    #[schema(example = 20.0)]
    pub default_days: f64,
    #[serde(default)]
    #[schema(example = 1.67)]
    pub monthly_accrual: f64,
    #[serde(default)]
    #[schema(example = 5.0)]
    pub max_carry_forward: f64,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl LeaveTypeInput {
    /// Name must be present and every day figure finite and non-negative.
    fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty");
        }
        let figures = [self.default_days, self.monthly_accrual, self.max_carry_forward];
        if figures.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err("day figures must be non-negative numbers");
        }
        Ok(())
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23000"))
}

#[utoipa::path(
    get,
    path = "/api/leave-types",
    responses((status = 200, description = "All leave types", body = [LeaveType])),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn list_leave_types(_auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let types = repo::load_leave_types(&mut conn)
        .await
        .map_err(internal("Failed to list leave types"))?;
    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    get,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type ID")),
    responses(
        (status = 200, description = "Leave type found", body = LeaveType),
        (status = 404, description = "Leave type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn get_leave_type(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let lt = leave_type_cache::get(pool.get_ref(), id)
        .await
        .map_err(internal("Failed to fetch leave type"))?
        .ok_or(LeaveError::unknown("leave type", id))?;
    Ok(HttpResponse::Ok().json(lt))
}

#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body = LeaveTypeInput,
    responses(
        (status = 201, description = "Leave type created", body = LeaveType),
        (status = 400, description = "Invalid figures"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LeaveTypeInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    if let Err(msg) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": msg })));
    }

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_types
            (name, description, color, default_days, monthly_accrual, max_carry_forward, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.description.as_deref())
    .bind(payload.color.as_deref())
    .bind(payload.default_days)
    .bind(payload.monthly_accrual)
    .bind(payload.max_carry_forward)
    .bind(payload.is_active)
    .execute(&mut *tx)
    .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({ "message": "Leave type name already exists" })));
        }
        Err(e) => return Err(internal("Failed to create leave type")(e)),
    };

    // employees already on staff get the new type at its annual allocation
    if payload.is_active {
        sqlx::query(
            r#"
            INSERT INTO leave_balances (employee_id, leave_type_id, balance)
            SELECT id, ?, ? FROM employees
            "#,
        )
        .bind(id)
        .bind(payload.default_days)
        .execute(&mut *tx)
        .await
        .map_err(internal("Failed to seed balances"))?;
    }

    tx.commit().await.map_err(internal("Failed to commit leave type"))?;

    let payload = payload.into_inner();
    let created = LeaveType {
        id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        color: payload.color,
        default_days: payload.default_days,
        monthly_accrual: payload.monthly_accrual,
        max_carry_forward: payload.max_carry_forward,
        is_active: payload.is_active,
    };
    leave_type_cache::put(created.clone()).await;

    info!(leave_type_id = id, "Leave type created");
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type ID")),
    request_body = LeaveTypeInput,
    responses(
        (status = 200, description = "Leave type updated", body = Object, example = json!({"message": "Leave type updated"})),
        (status = 400, description = "Invalid figures"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Leave type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn update_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<LeaveTypeInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();
    if let Err(msg) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": msg })));
    }

    let result = sqlx::query(
        r#"
        UPDATE leave_types
        SET name = ?, description = ?, color = ?, default_days = ?,
            monthly_accrual = ?, max_carry_forward = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.description.as_deref())
    .bind(payload.color.as_deref())
    .bind(payload.default_days)
    .bind(payload.monthly_accrual)
    .bind(payload.max_carry_forward)
    .bind(payload.is_active)
    .bind(id)
    .execute(pool.get_ref())
    .await;

    leave_type_cache::invalidate(id).await;

    match result {
        // MySQL reports 0 affected rows for an unchanged row too
        Ok(_) => {}
        Err(e) if is_duplicate(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({ "message": "Leave type name already exists" })));
        }
        Err(e) => return Err(internal("Failed to update leave type")(e)),
    }

    let exists = leave_type_cache::get(pool.get_ref(), id)
        .await
        .map_err(internal("Failed to reload leave type"))?
        .is_some();
    if !exists {
        return Err(LeaveError::unknown("leave type", id).into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave type updated" })))
}

/// Deletes an unused leave type; one that requests or balances still
/// reference is deactivated instead.
#[utoipa::path(
    delete,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type ID")),
    responses(
        (status = 200, description = "Deleted or deactivated", body = Object, example = json!({
            "message": "Leave type deactivated",
            "deleted": false
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Leave type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn delete_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    repo::load_leave_type(&mut tx, id, true)
        .await
        .map_err(internal("Failed to lock leave type"))?
        .ok_or(LeaveError::unknown("leave type", id))?;

    let references = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT (SELECT COUNT(*) FROM leave_requests WHERE leave_type_id = ?)
             + (SELECT COUNT(*) FROM leave_balances WHERE leave_type_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(internal("Failed to count leave type references"))?;

    let deleted = references == 0;
    let sql = if deleted {
        "DELETE FROM leave_types WHERE id = ?"
    } else {
        "UPDATE leave_types SET is_active = FALSE WHERE id = ?"
    };
    sqlx::query(sql)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(internal("Failed to remove leave type"))?;

    tx.commit().await.map_err(internal("Failed to commit leave type removal"))?;
    leave_type_cache::invalidate(id).await;

    info!(leave_type_id = id, deleted, "Leave type removed");

    let message = if deleted { "Leave type deleted" } else { "Leave type deactivated" };
    Ok(HttpResponse::Ok().json(json!({ "message": message, "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, default_days: f64) -> LeaveTypeInput {
        LeaveTypeInput {
            name: name.into(),
            description: None,
            color: None,
            default_days,
            monthly_accrual: 0.0,
            max_carry_forward: 0.0,
            is_active: true,
        }
    }

    #[test]
    fn validation_rejects_blank_names_and_bad_figures() {
        assert!(input("PTO", 20.0).validate().is_ok());
        assert!(input("  ", 20.0).validate().is_err());
        assert!(input("PTO", -1.0).validate().is_err());
        assert!(input("PTO", f64::INFINITY).validate().is_err());
    }

    #[test]
    fn omitted_flags_default_to_active() {
        let parsed: LeaveTypeInput = serde_json::from_str(r#"{"name": "Sick", "default_days": 10}"#).unwrap();
        assert!(parsed.is_active);
        assert_eq!(parsed.monthly_accrual, 0.0);
    }
}
