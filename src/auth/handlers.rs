use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::auth::jwt::{Subject, generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::verify_password;
use crate::config::Config;
use crate::model::role::Role;
use crate::model::user::User;
use crate::models::{Claims, LoginReqDto, TokenPair, TokenType};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

const USER_BY_EMAIL: &str = r#"
    SELECT u.id, u.email, u.password, u.employee_id, e.role
    FROM users u
    JOIN employees e ON e.id = u.employee_id
    WHERE u.email = ?
"#;

const USER_BY_ID: &str = r#"
    SELECT u.id, u.email, u.password, u.employee_id, e.role
    FROM users u
    JOIN employees e ON e.id = u.employee_id
    WHERE u.id = ?
"#;

/// Token subject built from the stored user, so the role is always the
/// employee's current one.
fn subject_of(user: &User) -> Option<Subject> {
    let role = user.role.parse::<Role>().ok()?;
    Some(Subject {
        user_id: user.id,
        email: user.email.clone(),
        role: role.id(),
        employee_id: user.employee_id,
    })
}

/// Issues an access/refresh pair and records the refresh token.
async fn issue_pair(pool: &MySqlPool, config: &Config, subject: &Subject) -> Result<TokenPair, HttpResponse> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            HttpResponse::InternalServerError().finish()
        })?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let email = user.email.trim();
    if email.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().json(json!({"message": "Email and password required"}));
    }

    let db_user = match sqlx::query_as::<_, User>(USER_BY_EMAIL)
        .bind(email)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
    }

    let Some(subject) = subject_of(&db_user) else {
        error!(role = %db_user.role, "Stored employee role is not recognised");
        return HttpResponse::InternalServerError().finish();
    };

    let pair = match issue_pair(pool.get_ref(), &config, &subject).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    HttpResponse::Ok().json(pair)
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::Unauthorized().finish();
    };

    // check and revoke in one statement; a token rotates exactly once
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    match revoked {
        Ok(r) if r.rows_affected() == 1 => {}
        Ok(_) => {
            info!(user_id = claims.user_id, "Refresh with unknown or revoked token");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    // role and email are re-read; the old token's copies may be stale
    let db_user = match sqlx::query_as::<_, User>(USER_BY_ID)
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(user_id = claims.user_id, "Refresh for a user that no longer exists");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Database error while reloading user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(subject) = subject_of(&db_user) else {
        error!(role = %db_user.role, "Stored employee role is not recognised");
        return HttpResponse::InternalServerError().finish();
    };

    match issue_pair(pool.get_ref(), &config, &subject).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(req: HttpRequest, pool: web::Data<MySqlPool>, config: web::Data<Config>) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: 4,
            email: "ama@africahr.com".into(),
            password: String::new(),
            employee_id: 12,
            role: role.into(),
        }
    }

    #[test]
    fn subject_carries_the_stored_role() {
        let subject = subject_of(&user("STAFF")).unwrap();
        assert_eq!(subject.role, Role::Staff.id());
        assert_eq!(subject.user_id, 4);
        assert_eq!(subject.employee_id, 12);

        let promoted = subject_of(&user("MANAGER")).unwrap();
        assert_eq!(promoted.role, Role::Manager.id());
    }

    #[test]
    fn unknown_stored_role_yields_no_subject() {
        assert!(subject_of(&user("INTERN")).is_none());
    }
}
