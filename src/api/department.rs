use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::api::internal;
use crate::auth::auth::AuthUser;
use crate::model::department::Department;
use crate::repo;

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Finance")]
    pub name: String,
    #[schema(example = 3)]
    pub manager_id: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/department",
    responses((status = 200, description = "All departments by name", body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(_auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let departments = repo::load_departments(&mut conn)
        .await
        .map_err(internal("Failed to list departments"))?;
    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    post,
    path = "/api/department",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "Department name required" })));
    }

    let result = sqlx::query("INSERT INTO departments (name, manager_id) VALUES (?, ?)")
        .bind(name)
        .bind(payload.manager_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(r) => Ok(HttpResponse::Created().json(Department {
            id: r.last_insert_id(),
            name: name.to_string(),
            manager_id: payload.manager_id,
        })),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            Ok(HttpResponse::Conflict().json(json!({ "message": "Department already exists" })))
        }
        Err(e) => Err(internal("Failed to create department")(e)),
    }
}
