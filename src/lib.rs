use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post, put},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod demo;
pub mod gateway;
pub mod identity;
pub mod lifecycle;
pub mod moderation;
pub mod routes;

use config::AppConfig;
use db::SharedStore;
use identity::IdentityProvider;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<AppConfig>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

async fn health_check() -> &'static str {
    "OK"
}

/// Every route plus tracing and security headers. CORS and rate limiting are
/// layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/signup", post(routes::account::sign_up))
        .route("/auth/session", get(routes::account::session))
        .route("/auth/password/reset", post(routes::account::request_password_reset))
        .route("/auth/password/update", post(routes::account::update_password))
        .route("/auth/verification/resend", post(routes::account::resend_verification))
        .route("/api/me", get(auth::me))
        // Management
        .route("/api/users", get(routes::users::list_users).post(routes::users::create_user))
        .route(
            "/api/users/{id}",
            get(routes::users::get_user).put(routes::users::update_user).delete(routes::users::delete_user),
        )
        .route("/api/shelters", get(routes::shelters::list_shelters).post(routes::shelters::create_shelter))
        .route(
            "/api/shelters/{id}",
            get(routes::shelters::get_shelter)
                .put(routes::shelters::update_shelter)
                .delete(routes::shelters::delete_shelter),
        )
        .route("/api/shelters/{id}/review", post(routes::shelters::review_shelter))
        .route("/api/sponsees", get(routes::sponsees::list_sponsees).post(routes::sponsees::create_sponsee))
        .route(
            "/api/sponsees/{id}",
            get(routes::sponsees::get_sponsee)
                .put(routes::sponsees::update_sponsee)
                .delete(routes::sponsees::delete_sponsee),
        )
        // Donor flows
        .route("/api/payment-methods", get(routes::payment_methods::list_payment_methods))
        .route("/api/payment-methods/register", post(routes::payment_methods::register_payment_method))
        .route("/api/payment-methods/{id}", axum::routing::delete(routes::payment_methods::delete_payment_method))
        .route("/api/payment-methods/{id}/default", put(routes::payment_methods::set_default_payment_method))
        .route("/api/sponsorships", get(routes::sponsorships::list_sponsorships))
        .route("/api/sponsorships/checkout", post(routes::sponsorships::checkout))
        .route("/api/sponsorships/{id}/cancel", post(routes::sponsorships::cancel_sponsorship))
        .route(
            "/api/sponsorships/{id}/messages",
            get(routes::chat::list_messages).post(routes::chat::send_message),
        )
        // Reports
        .route("/api/reports", get(routes::reports::list_reports).post(routes::reports::create_report))
        .route(
            "/api/reports/{id}",
            put(routes::reports::update_report).delete(routes::reports::delete_report),
        )
        .route("/api/reports/{id}/submit", post(routes::reports::submit_report))
        .route("/api/reports/{id}/review", post(routes::reports::review_report))
        .route("/api/reports/{id}/publish", post(routes::reports::publish_report))
        // Compliance
        .route(
            "/api/audit",
            get(routes::audit::list_audit).delete(routes::audit::clear_audit),
        )
        .route("/api/audit/export", get(routes::audit::export_audit_csv))
        // Demo controls
        .route(
            "/api/demo/scenario",
            get(routes::demo::get_scenario).put(routes::demo::update_scenario),
        )
        .route("/api/demo/reset", post(routes::demo::reset))
        // Payment simulation
        .route(gateway::GATEWAY_PATH, get(routes::gateway::gateway))
        .route(gateway::CALLBACK_PATH, get(routes::gateway::callback))
        .route(gateway::RETRY_PATH, get(routes::gateway::retry))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}
