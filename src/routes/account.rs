//! Account flows delegated to the external identity provider. Each call is
//! audited with `OK` or `Error`, and the response tells the client which
//! branch to show (verified or not, link valid or expired).

use std::sync::Arc;

use axum::{
    extract::{State, Json},
    response::{IntoResponse, Json as AxumJson, Response},
    http::{HeaderMap, StatusCode, header},
};
use serde::Deserialize;
use crate::AppState;
use crate::db::models::{AuditResult, NewAuditEvent, Role, ShelterStatus, User};
use crate::identity::{IdentityError, IdentityProvider};
use super::shelters::ShelterRegistration;
use super::{email_taken, new_id, password_problem, FieldErrors};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    pub shelter: Option<ShelterRegistration>,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub access_token: String,
    pub password: String,
    pub confirm_password: String,
}

fn provider(state: &AppState) -> Result<Arc<dyn IdentityProvider>, Response> {
    state
        .identity
        .clone()
        .ok_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, "Identity provider not configured").into_response())
}

fn audit(state: &AppState, action: &str, result: AuditResult, reference: Option<String>) {
    let mut event = NewAuditEvent::new("system", action, "auth", result);
    event.reference = reference;
    state.store.lock().log_event(event);
}

fn check_passwords(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if let Some(problem) = password_problem(password) {
        errors.add("password", problem);
    }
    if password != confirm {
        errors.add("confirmPassword", "Passwords do not match");
    }
}

fn provider_failure(action: &str, e: &IdentityError) -> Response {
    tracing::error!("{} failed: {}", action, e);
    (StatusCode::BAD_GATEWAY, AxumJson(serde_json::json!({ "error": format!("{} failed, please try again", action) })))
        .into_response()
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("name", &req.name);
    errors.email("email", &req.email);
    check_passwords(&mut errors, &req.password, &req.confirm_password);
    match req.role {
        Role::Admin => errors.add("role", "Admin accounts cannot sign up"),
        Role::Shelter => ShelterRegistration::check(req.shelter.as_ref(), &mut errors),
        Role::Donor => {}
    }
    let email = req.email.trim().to_string();
    if email_taken(&state.store.lock(), &email) {
        errors.add("email", "E-mail already registered");
    }
    if let Err(response) = errors.into_result() {
        return response;
    }

    let provider = match provider(&state) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let outcome = match provider.sign_up(&email, &req.password).await {
        Ok(outcome) => outcome,
        Err(e) => {
            audit(&state, "Sign up", AuditResult::Error, Some(email));
            return provider_failure("Sign up", &e);
        }
    };

    let user_id = match req.role {
        Role::Shelter => new_id("u-ch"),
        _ => new_id("u"),
    };
    let mut store = state.store.lock();
    if let (Role::Shelter, Some(details)) = (req.role, req.shelter) {
        store.add(details.into_shelter(user_id.clone(), req.name.trim(), &email, ShelterStatus::Pending));
    }
    store.add(User {
        id: user_id.clone(),
        role: req.role,
        name: req.name.trim().to_string(),
        email,
        status: (req.role == Role::Shelter).then_some(ShelterStatus::Pending),
    });
    store.log_event(NewAuditEvent::new("system", "Sign up", "auth", AuditResult::Ok).with_ref(user_id.clone()));

    let message = if outcome.email_confirmed {
        "Account ready"
    } else {
        "Check your inbox to verify your e-mail"
    };
    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "userId": user_id, "verified": outcome.email_confirmed, "message": message })),
    )
        .into_response()
}

/// Checks a provider session (e.g. right after the verification link).
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
    else {
        return (StatusCode::UNAUTHORIZED, "Missing session token").into_response();
    };
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match provider.session(&token).await {
        Ok(info) => {
            audit(&state, "Session check", AuditResult::Ok, None);
            AxumJson(serde_json::json!({ "email": info.email, "verified": info.email_confirmed })).into_response()
        }
        Err(e) => {
            audit(&state, "Session check", AuditResult::Error, None);
            provider_failure("Session check", &e)
        }
    }
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.email("email", &req.email);
    if let Err(response) = errors.into_result() {
        return response;
    }
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let email = req.email.trim().to_string();
    match provider.request_password_reset(&email).await {
        Ok(()) => {
            audit(&state, "Password reset request", AuditResult::Ok, Some(email));
            AxumJson(serde_json::json!({ "message": "If the address is registered, a reset link is on its way" }))
                .into_response()
        }
        Err(e) => {
            audit(&state, "Password reset request", AuditResult::Error, Some(email));
            provider_failure("Password reset", &e)
        }
    }
}

pub async fn update_password(
    State(state): State<AppState>,
    Json(req): Json<UpdatePasswordRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("accessToken", &req.access_token);
    check_passwords(&mut errors, &req.password, &req.confirm_password);
    if let Err(response) = errors.into_result() {
        return response;
    }
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match provider.update_password(&req.access_token, &req.password).await {
        Ok(()) => {
            audit(&state, "Password update", AuditResult::Ok, None);
            AxumJson(serde_json::json!({ "valid": true, "message": "Password updated" })).into_response()
        }
        Err(IdentityError::ExpiredLink) => {
            audit(&state, "Password update", AuditResult::Error, None);
            (
                StatusCode::GONE,
                AxumJson(serde_json::json!({ "valid": false, "message": "The reset link is invalid or has expired" })),
            )
                .into_response()
        }
        Err(e) => {
            audit(&state, "Password update", AuditResult::Error, None);
            provider_failure("Password update", &e)
        }
    }
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.email("email", &req.email);
    if let Err(response) = errors.into_result() {
        return response;
    }
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let email = req.email.trim().to_string();
    match provider.resend_verification(&email).await {
        Ok(()) => {
            audit(&state, "Resend verification", AuditResult::Ok, Some(email));
            AxumJson(serde_json::json!({ "message": "Verification e-mail sent" })).into_response()
        }
        Err(e) => {
            audit(&state, "Resend verification", AuditResult::Error, Some(email));
            provider_failure("Resend verification", &e)
        }
    }
}
