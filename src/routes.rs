use crate::{
    api::{expense, income, ledger, member, tax},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter keyed by peer IP
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let forgot_limiter = Arc::new(build_limiter(config.rate_forgot_per_min));
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
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(forgot_limiter.clone())
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(forgot_limiter)
                    .route(web::post().to(handlers::reset_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(protected_routes),
    );
}

/// Everything behind the bearer token, relative to the API prefix.
pub fn protected_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tax")
            .service(
                web::resource("/rates/{year}")
                    .route(web::get().to(tax::get_rates))
                    .route(web::put().to(tax::set_rates)),
            )
            .service(web::resource("/generate/{year}").route(web::post().to(tax::generate)))
            .service(
                web::resource("/payment/{payment_id}").route(web::put().to(tax::update_payment)),
            )
            .service(web::resource("/summary").route(web::get().to(tax::year_summary)))
            .service(
                web::resource("/summary/all-years").route(web::get().to(tax::all_years_summary)),
            )
            .service(web::resource("/details").route(web::get().to(tax::details)))
            .service(
                web::resource("/details/all-years").route(web::get().to(tax::all_years_details)),
            )
            .service(web::resource("/export").route(web::get().to(tax::export)))
            .service(
                web::resource("/export/all-years").route(web::get().to(tax::all_years_export)),
            )
            .service(
                web::resource("/members/{member_id}/payment")
                    .route(web::get().to(tax::member_payment)),
            )
            .service(web::resource("/family-heads").route(web::get().to(tax::family_heads)))
            .service(web::resource("/years").route(web::get().to(tax::years))),
    )
    .service(
        web::scope("/members")
            // /members
            .service(
                web::resource("")
                    .route(web::post().to(member::create_member))
                    .route(web::get().to(member::list_members)),
            )
            // fixed segments before /{id}
            .service(web::resource("/heads").route(web::get().to(member::list_heads)))
            .service(
                web::resource("/family/{family_id}").route(web::get().to(member::family_members)),
            )
            // /members/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(member::get_member))
                    .route(web::put().to(member::update_member))
                    .route(web::delete().to(member::delete_member)),
            ),
    )
    .service(
        web::scope("/incomes").service(
            web::resource("")
                .route(web::get().to(income::list_incomes))
                .route(web::post().to(income::create_income)),
        ),
    )
    .service(
        web::scope("/expenses")
            .service(
                web::resource("")
                    .route(web::get().to(expense::list_expenses))
                    .route(web::post().to(expense::create_expense)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(expense::get_expense))
                    .route(web::put().to(expense::update_expense))
                    .route(web::delete().to(expense::delete_expense)),
            ),
    )
    .service(web::resource("/ledger/balance").route(web::get().to(ledger::balance)));
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair, the old refresh token is revoked
