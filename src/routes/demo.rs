use axum::{
    extract::{State, Json},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, NewAuditEvent, Role};
use crate::demo::DemoScenarioPatch;

pub async fn get_scenario(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let scenario = state.store.lock().scenario().clone();
    AxumJson(scenario)
}

pub async fn update_scenario(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(patch): Json<DemoScenarioPatch>,
) -> impl IntoResponse {
    let scenario = state.store.lock().update_scenario(patch);
    tracing::info!("Demo scenario updated by {}: {:?}", user.id, scenario);
    AxumJson(scenario)
}

/// Restores seed data and the default scenario.
pub async fn reset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    store.reset();
    store.log_event(NewAuditEvent::new(user.actor(), "Reset demo data", "system", AuditResult::Ok));
    (StatusCode::OK, "Reset").into_response()
}
