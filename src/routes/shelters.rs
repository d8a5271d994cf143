use axum::{
    extract::{State, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, NewAuditEvent, Role, Shelter, ShelterPatch, ShelterStatus, User, UserPatch};
use super::{email_taken, new_id, not_found, FieldErrors};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShelterRequest {
    pub name: String,
    pub location: String,
    pub description: String,
    pub representative: String,
    pub founding_date: NaiveDate,
    pub phone: String,
    pub email: String,
    pub website: Option<String>,
    pub status: Option<ShelterStatus>,
}

/// Organisation details collected when a shelter account is opened, either
/// by sign-up or by an admin.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterRegistration {
    pub location: String,
    pub description: String,
    pub representative: String,
    pub founding_date: NaiveDate,
    pub phone: String,
    pub website: Option<String>,
}

impl ShelterRegistration {
    pub fn check(details: Option<&Self>, errors: &mut FieldErrors) {
        match details {
            None => errors.add("shelter", "Shelter details are required"),
            Some(details) => {
                errors.require("shelter.location", &details.location);
                errors.require("shelter.representative", &details.representative);
                errors.require("shelter.phone", &details.phone);
            }
        }
    }

    /// The Shelter record of account `id`; it shares the user's id.
    pub fn into_shelter(self, id: String, name: &str, email: &str, status: ShelterStatus) -> Shelter {
        Shelter {
            id,
            name: name.to_string(),
            status,
            location: self.location,
            description: self.description,
            representative: self.representative,
            founding_date: self.founding_date,
            phone: self.phone,
            email: email.to_string(),
            website: self.website.filter(|w| !w.trim().is_empty()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShelterDecision {
    Approve,
    Reject,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub action: ShelterDecision,
}

/// Admins see every shelter; everyone else only those allowed to operate.
pub async fn list_shelters(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let store = state.store.lock();
    let shelters: Vec<&Shelter> = store
        .list::<Shelter>()
        .iter()
        .filter(|s| user.role == Role::Admin || s.status.is_operational() || s.id == user.id)
        .collect();
    AxumJson(serde_json::json!({ "shelters": shelters }))
}

pub async fn get_shelter(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let store = state.store.lock();
    match store.get::<Shelter>(&id) {
        Some(shelter) => AxumJson(shelter.clone()).into_response(),
        None => not_found("Shelter"),
    }
}

/// Opens the organisation together with its shelter account, under one id.
pub async fn create_shelter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateShelterRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let mut errors = FieldErrors::default();
    errors.require("name", &req.name);
    errors.require("location", &req.location);
    errors.require("representative", &req.representative);
    errors.require("phone", &req.phone);
    errors.email("email", &req.email);
    if email_taken(&store, &req.email) {
        errors.add("email", "E-mail already registered");
    }
    if let Err(response) = errors.into_result() {
        return response;
    }

    let shelter = Shelter {
        id: new_id("u-ch"),
        name: req.name.trim().to_string(),
        status: req.status.unwrap_or(ShelterStatus::Pending),
        location: req.location,
        description: req.description,
        representative: req.representative,
        founding_date: req.founding_date,
        phone: req.phone,
        email: req.email.trim().to_string(),
        website: req.website.filter(|w| !w.trim().is_empty()),
    };
    store.add(User {
        id: shelter.id.clone(),
        role: Role::Shelter,
        name: shelter.name.clone(),
        email: shelter.email.clone(),
        status: Some(shelter.status),
    });
    store.add(shelter.clone());
    store.log_event(
        NewAuditEvent::new(user.actor(), "Create shelter", "shelter", AuditResult::Ok).with_ref(shelter.id.clone()),
    );
    (StatusCode::CREATED, AxumJson(shelter)).into_response()
}

pub async fn update_shelter(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(patch): Json<ShelterPatch>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    if let Some(email) = &patch.email {
        let mut errors = FieldErrors::default();
        errors.email("email", email);
        if let Err(response) = errors.into_result() {
            return response;
        }
    }

    // The account mirrors the organisation's name, e-mail and status.
    let account = UserPatch {
        name: patch.name.clone(),
        email: patch.email.clone(),
        status: patch.status,
        ..Default::default()
    };
    let mut store = state.store.lock();
    if !store.update::<Shelter>(&id, patch) {
        return not_found("Shelter");
    }
    store.update::<User>(&id, account);
    store.log_event(NewAuditEvent::new(user.actor(), "Update shelter", "shelter", AuditResult::Ok).with_ref(id.clone()));
    match store.get::<Shelter>(&id) {
        Some(shelter) => AxumJson(shelter.clone()).into_response(),
        None => not_found("Shelter"),
    }
}

/// Sponsees that point at the removed shelter are left as they are.
pub async fn delete_shelter(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    if !store.remove::<Shelter>(&id) {
        return not_found("Shelter");
    }
    store.log_event(NewAuditEvent::new(user.actor(), "Delete shelter", "shelter", AuditResult::Ok).with_ref(id));
    (StatusCode::OK, "Deleted").into_response()
}

/// Approve or reject a registration; the shelter's user account follows.
pub async fn review_shelter(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ReviewRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let (status, result, verb) = match req.action {
        ShelterDecision::Approve => (ShelterStatus::Approved, AuditResult::Approved, "approved"),
        ShelterDecision::Reject => (ShelterStatus::Rejected, AuditResult::Rejected, "rejected"),
    };

    let mut store = state.store.lock();
    let patch = ShelterPatch { status: Some(status), ..Default::default() };
    if !store.update::<Shelter>(&id, patch) {
        return not_found("Shelter");
    }
    store.update::<User>(&id, UserPatch { status: Some(status), ..Default::default() });
    store.log_event(NewAuditEvent::new(user.actor(), "Review shelter", "shelter", result).with_ref(id.clone()));

    let Some(shelter) = store.get::<Shelter>(&id).cloned() else {
        return not_found("Shelter");
    };
    let notifications = vec![
        format!("Shelter {} {}", shelter.name, verb),
        format!("Notification e-mail queued for {}", shelter.email),
    ];
    AxumJson(serde_json::json!({ "shelter": shelter, "notifications": notifications })).into_response()
}
