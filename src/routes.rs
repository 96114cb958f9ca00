use std::sync::Arc;

use actix_governor::{Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

use crate::{
    api::{accrual, department, employee, leave_request, leave_type, notification, report},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let per_ms = 60_000 / u64::from(requests_per_min.max(1));
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("Invalid rate limit configuration")?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limits.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limits.protected.clone())
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // fixed segments before /{id}
                    .service(web::resource("/calendar").route(web::get().to(leave_request::leave_calendar)))
                    .service(web::resource("/upcoming").route(web::get().to(leave_request::upcoming_leave)))
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(web::resource("/{id}/approve").route(web::put().to(leave_request::approve_leave)))
                    .service(web::resource("/{id}/reject").route(web::put().to(leave_request::reject_leave))),
            )
            .service(
                web::scope("/leave-types")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_type::list_leave_types))
                            .route(web::post().to(leave_type::create_leave_type)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_type::get_leave_type))
                            .route(web::put().to(leave_type::update_leave_type))
                            .route(web::delete().to(leave_type::delete_leave_type)),
                    ),
            )
            .service(
                web::scope("/employee")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee)),
                    )
                    .service(
                        web::resource("/{id}/balances")
                            .route(web::get().to(employee::get_balances))
                            .route(web::put().to(employee::adjust_balance)),
                    ),
            )
            .service(
                web::resource("/department")
                    .route(web::get().to(department::list_departments))
                    .route(web::post().to(department::create_department)),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/employee").route(web::get().to(report::employee_report)))
                    .service(web::resource("/department").route(web::get().to(report::department_report)))
                    .service(web::resource("/leave-type").route(web::get().to(report::leave_type_report)))
                    .service(web::resource("/balance").route(web::get().to(report::balance_report)))
                    .service(web::resource("/dashboard").route(web::get().to(report::dashboard)))
                    .service(web::resource("/export.csv").route(web::get().to(report::export_csv))),
            )
            .service(web::resource("/accrual/monthly").route(web::post().to(accrual::run_monthly_accrual)))
            .service(
                web::scope("/notifications")
                    .service(web::resource("").route(web::get().to(notification::list_notifications)))
                    .service(web::resource("/mark-as-read").route(web::put().to(notification::mark_as_read))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new access/refresh pair
