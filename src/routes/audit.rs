use axum::{
    extract::{State, Query},
    response::{IntoResponse, Json as AxumJson, Response},
    http::{HeaderValue, StatusCode, header},
};
use crate::AppState;
use crate::audit::{self, AuditFilter};
use crate::auth::AuthenticatedUser;
use crate::db::models::Role;

pub async fn list_audit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<AuditFilter>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let store = state.store.lock();
    let events = filter.apply(store.audit_log());
    AxumJson(serde_json::json!({ "events": events })).into_response()
}

pub async fn export_audit_csv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<AuditFilter>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let csv = {
        let store = state.store.lock();
        audit::to_csv(filter.apply(store.audit_log()))
    };
    let filename = audit::export_filename(chrono::Utc::now().date_naive());

    let mut resp = Response::new(csv.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={}", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    resp
}

/// Demo reset of the compliance log.
pub async fn clear_audit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    state.store.lock().clear_audit();
    tracing::info!("Audit log cleared by {}", user.id);
    (StatusCode::OK, "Cleared").into_response()
}
