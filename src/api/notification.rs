use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::api::internal;
use crate::auth::auth::AuthUser;
use crate::model::notification::Notification;

#[derive(Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Only unread notifications
    #[serde(default)]
    pub unread: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkRead {
    /// Notifications to mark; all of the caller's when omitted
    pub ids: Option<Vec<u64>>,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses((status = 200, description = "The caller's notifications, newest first", body = [Notification])),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> actix_web::Result<impl Responder> {
    let sql = if query.unread {
        "SELECT id, employee_id, message, is_read, created_at FROM notifications \
         WHERE employee_id = ? AND is_read = FALSE ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT id, employee_id, message, is_read, created_at FROM notifications \
         WHERE employee_id = ? ORDER BY created_at DESC, id DESC"
    };

    let notifications = sqlx::query_as::<_, Notification>(sql)
        .bind(auth.employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(internal("Failed to fetch notifications"))?;

    Ok(HttpResponse::Ok().json(notifications))
}

#[utoipa::path(
    put,
    path = "/api/notifications/mark-as-read",
    request_body = MarkRead,
    responses((status = 200, description = "Notifications marked", body = Object, example = json!({"updated": 3}))),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_as_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: Option<web::Json<MarkRead>>,
) -> actix_web::Result<impl Responder> {
    let ids = body.and_then(|b| b.into_inner().ids);

    let result = match ids.as_deref() {
        Some([]) => return Ok(HttpResponse::Ok().json(json!({ "updated": 0 }))),
        Some(ids) => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "UPDATE notifications SET is_read = TRUE WHERE employee_id = ? AND id IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(auth.employee_id);
            for id in ids {
                query = query.bind(*id);
            }
            query.execute(pool.get_ref()).await
        }
        None => {
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE employee_id = ? AND is_read = FALSE")
                .bind(auth.employee_id)
                .execute(pool.get_ref())
                .await
        }
    }
    .map_err(internal("Failed to mark notifications read"))?;

    Ok(HttpResponse::Ok().json(json!({ "updated": result.rows_affected() })))
}
