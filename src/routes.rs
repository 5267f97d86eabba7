use crate::{
    api::{attendance, dashboard},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = 60_000 / requests_per_min as u64;
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(employee_routes),
    );
}

/// Employee portal routes; callers wrap them with authentication.
pub fn employee_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)))
        .service(
            web::scope("/attendance")
                // /attendance
                .service(web::resource("").route(web::get().to(attendance::time_control)))
                // /attendance/work-center
                .service(
                    web::resource("/work-center")
                        .route(web::put().to(attendance::select_work_center)),
                )
                // /attendance/actions/{action}
                .service(
                    web::resource("/actions/{action}")
                        .route(web::post().to(attendance::record_action)),
                ),
        );
}

// LOGIN
//  ├─ access_token (15 min, carries employee_id)
//  └─ refresh_token (7 days)

// TIME CLOCK
//  ├─ GET  /attendance                 page load, state from latest entry
//  ├─ PUT  /attendance/work-center     pick center when several assigned
//  └─ POST /attendance/actions/{kind}  clock_in | break_start | break_end | clock_out

// LOGOUT
//  └─ POST /logout closes the time clock session; a refresh_token is also revoked
