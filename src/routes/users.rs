use axum::{
    extract::{State, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, NewAuditEvent, Role, Shelter, ShelterPatch, ShelterStatus, User, UserPatch};
use super::shelters::ShelterRegistration;
use super::{email_taken, new_id, not_found, FieldErrors};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: Option<ShelterStatus>,
    /// Required for shelter accounts.
    pub shelter: Option<ShelterRegistration>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let store = state.store.lock();
    AxumJson(serde_json::json!({ "users": store.list::<User>() })).into_response()
}

pub async fn get_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let store = state.store.lock();
    match store.get::<User>(&id) {
        Some(found) => AxumJson(found.clone()).into_response(),
        None => not_found("User"),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let mut errors = FieldErrors::default();
    errors.require("name", &req.name);
    errors.email("email", &req.email);
    if req.role == Role::Shelter {
        ShelterRegistration::check(req.shelter.as_ref(), &mut errors);
    }
    if email_taken(&store, &req.email) {
        errors.add("email", "E-mail already registered");
    }
    if let Err(response) = errors.into_result() {
        return response;
    }

    let created = User {
        id: new_id(if req.role == Role::Shelter { "u-ch" } else { "u" }),
        role: req.role,
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        status: (req.role == Role::Shelter).then(|| req.status.unwrap_or(ShelterStatus::Pending)),
    };
    // A shelter account and its Shelter record share one id.
    if let (Some(status), Some(details)) = (created.status, req.shelter) {
        store.add(details.into_shelter(created.id.clone(), &created.name, &created.email, status));
    }
    store.add(created.clone());
    store.log_event(
        NewAuditEvent::new(user.actor(), "Create user", "user", AuditResult::Ok).with_ref(created.id.clone()),
    );
    (StatusCode::CREATED, AxumJson(created)).into_response()
}

pub async fn update_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(patch): Json<UserPatch>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let mut errors = FieldErrors::default();
    if let Some(email) = &patch.email {
        errors.email("email", email);
    }
    if let Some(name) = &patch.name {
        errors.require("name", name);
    }
    if let Err(response) = errors.into_result() {
        return response;
    }

    let status = patch.status;
    let mut store = state.store.lock();
    if !store.update::<User>(&id, patch) {
        return not_found("User");
    }
    if let Some(status) = status {
        store.update::<Shelter>(&id, ShelterPatch { status: Some(status), ..Default::default() });
    }
    store.log_event(NewAuditEvent::new(user.actor(), "Update user", "user", AuditResult::Ok).with_ref(id.clone()));
    match store.get::<User>(&id) {
        Some(updated) => AxumJson(updated.clone()).into_response(),
        None => not_found("User"),
    }
}

pub async fn delete_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    if id == user.id {
        return (StatusCode::CONFLICT, "Cannot delete your own account").into_response();
    }
    let mut store = state.store.lock();
    if !store.remove::<User>(&id) {
        return not_found("User");
    }
    store.log_event(NewAuditEvent::new(user.actor(), "Delete user", "user", AuditResult::Ok).with_ref(id));
    (StatusCode::OK, "Deleted").into_response()
}
