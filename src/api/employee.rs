use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::{Page, internal, paginate};
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::error::LeaveError;
use crate::leave::ledger::BalanceLedger;
use crate::leave::report::usage_percent;
use crate::model::employee::{self, Employee, EmployeeRow};
use crate::model::role::Role;
use crate::repo;
use crate::utils::db_utils::{build_update_sql, execute_update};

/// Columns a partial update may touch.
const UPDATABLE: &[&str] = &["name", "position", "department_id", "start_date"];

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Ama Mensah")]
    pub name: String,
    #[schema(example = "ama@africahr.com", format = "email")]
    pub email: String,
    #[schema(example = "Software Developer")]
    #[serde(default)]
    pub position: String,
    #[schema(example = 1)]
    pub department_id: Option<u64>,
    #[schema(example = "2021-03-15", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[serde(default = "staff")]
    pub role: Role,
    /// Initial login password
    #[schema(example = "s3cret-pass", format = "password")]
    pub password: String,
}

#[derive(Debug)]
enum Binding {
    U64(u64),
    Str(String),
}

fn staff() -> Role {
    Role::Staff
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub department_id: Option<u64>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceView {
    pub leave_type_id: u64,
    pub name: String,
    pub color: String,
    pub allocation: f64,
    pub balance: f64,
    /// Share of the allocation already used, 0 to 100
    pub usage_percent: u8,
}

#[derive(Deserialize, ToSchema)]
pub struct BalanceAdjustment {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    /// Positive adds days (capped by carry-forward policy), negative removes them
    #[schema(example = 2.5)]
    pub days: f64,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created with default balances", body = Object, example = json!({
            "message": "Employee created",
            "id": 12
        })),
        (status = 400, description = "Missing name, email or password"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let email = payload.email.trim().to_lowercase();
    if payload.name.trim().is_empty() || email.is_empty() || payload.password.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Name, email and password are required"
        })));
    }

    let hashed = hash_password(&payload.password).map_err(internal("Failed to hash password"))?;

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO employees (name, email, position, department_id, start_date, role)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(payload.position.trim())
    .bind(payload.department_id)
    .bind(payload.start_date)
    .bind(payload.role.as_ref())
    .execute(&mut *tx)
    .await;

    let employee_id = match inserted {
        Ok(r) => r.last_insert_id(),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            return Ok(HttpResponse::Conflict().json(json!({ "message": "Email already in use" })));
        }
        Err(e) => {
            error!(error = %e, "Failed to create employee");
            return Ok(HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" })));
        }
    };

    sqlx::query("INSERT INTO users (email, password, employee_id) VALUES (?, ?, ?)")
        .bind(&email)
        .bind(&hashed)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(internal("Failed to create login"))?;

    // every active type starts at its annual allocation
    sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, leave_type_id, balance)
        SELECT ?, id, default_days FROM leave_types WHERE is_active = TRUE
        "#,
    )
    .bind(employee_id)
    .execute(&mut *tx)
    .await
    .map_err(internal("Failed to seed balances"))?;

    tx.commit().await.map_err(internal("Failed to commit employee"))?;

    info!(employee_id, "Employee created");
    Ok(HttpResponse::Created().json(json!({ "message": "Employee created", "id": employee_id })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeePage),
        (status = 403, description = "Admin or manager only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_approver()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let mut conditions = Vec::new();
    let mut bindings: Vec<Binding> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(Binding::U64(department_id));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(Binding::Str(like.clone()));
        bindings.push(Binding::Str(like));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            Binding::U64(v) => count_query.bind(*v),
            Binding::Str(v) => count_query.bind(v.as_str()),
        };
    }
    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(internal("Failed to count employees"))?;

    let data_sql = format!(
        "SELECT id, name, email, position, department_id, start_date, role FROM employees {} \
         ORDER BY id LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, EmployeeRow>(&data_sql);
    for b in &bindings {
        data_query = match b {
            Binding::U64(v) => data_query.bind(*v),
            Binding::Str(v) => data_query.bind(v.as_str()),
        };
    }
    let rows = data_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(internal("Failed to fetch employees"))?;

    let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let balances = repo::load_balances_of(&mut conn, &ids)
        .await
        .map_err(internal("Failed to fetch balances"))?;

    let data = employee::assemble(rows, &balances)?;

    Ok(HttpResponse::Ok().json(Page {
        data,
        page,
        per_page,
        total,
    }))
}

async fn visible_employee(auth: &AuthUser, pool: &MySqlPool, employee_id: u64) -> actix_web::Result<Employee> {
    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let employee = repo::load_employee(&mut conn, employee_id)
        .await
        .map_err(internal("Failed to fetch employee"))?
        .filter(|e| auth.can_view(e.id))
        .ok_or(LeaveError::unknown("employee", employee_id))?;
    Ok(employee)
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = visible_employee(&auth, pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Partial update; accepts `name`, `position`, `department_id`, `start_date`.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, example = json!({"position": "Team Lead", "department_id": 2})),
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Unknown or read-only field"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, "id", employee_id)?;

    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    if !repo::employee_exists(&mut conn, employee_id)
        .await
        .map_err(internal("Failed to check employee"))?
    {
        return Err(LeaveError::unknown("employee", employee_id).into());
    }

    execute_update(&mut conn, update)
        .await
        .map_err(internal("Failed to update employee"))?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/balances",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Balance and usage per leave type", body = [BalanceView]),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = visible_employee(&auth, pool.get_ref(), path.into_inner()).await?;

    let mut conn = pool.acquire().await.map_err(internal("Failed to acquire connection"))?;
    let leave_types = repo::load_leave_types(&mut conn)
        .await
        .map_err(internal("Failed to load leave types"))?;

    Ok(HttpResponse::Ok().json(balance_views(&employee, &leave_types)))
}

fn balance_views(employee: &Employee, leave_types: &[crate::model::leave_type::LeaveType]) -> Vec<BalanceView> {
    leave_types
        .iter()
        .filter(|lt| lt.is_active || employee.balances.contains_key(&lt.id))
        .map(|lt| BalanceView {
            leave_type_id: lt.id,
            name: lt.name.clone(),
            color: lt.color_or_default().to_string(),
            allocation: lt.default_days,
            balance: employee.balance(lt.id),
            usage_percent: usage_percent(employee, lt),
        })
        .collect()
}

/// Admin correction of one balance, journaled as an adjustment.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/balances",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = BalanceAdjustment,
    responses(
        (status = 200, description = "Balance adjusted", body = Object, example = json!({
            "message": "Balance adjusted",
            "balance": 12.5
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee or leave type not found"),
        (status = 422, description = "Adjustment would make the balance negative")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn adjust_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<BalanceAdjustment>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let mut tx = pool.begin().await.map_err(internal("Failed to open transaction"))?;

    if !repo::employee_exists(&mut tx, employee_id)
        .await
        .map_err(internal("Failed to check employee"))?
    {
        return Err(LeaveError::unknown("employee", employee_id).into());
    }

    let leave_type = repo::load_leave_type(&mut tx, payload.leave_type_id, false)
        .await
        .map_err(internal("Failed to load leave type"))?
        .ok_or(LeaveError::unknown("leave type", payload.leave_type_id))?;

    let current = repo::lock_balance(&mut tx, employee_id, leave_type.id)
        .await
        .map_err(internal("Failed to lock balance"))?
        .unwrap_or(0.0);

    let mut ledger = BalanceLedger::new([&leave_type]);
    ledger.open(employee_id, leave_type.id, current);
    let balance = ledger.adjust(employee_id, leave_type.id, payload.days)?;

    repo::apply_entries(&mut tx, &ledger.take_entries())
        .await
        .map_err(internal("Failed to record adjustment"))?;

    tx.commit().await.map_err(internal("Failed to commit adjustment"))?;

    info!(employee_id, leave_type_id = leave_type.id, days = payload.days, balance, "Balance adjusted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Balance adjusted", "balance": balance })))
}
