use axum::{
    extract::{State, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, NewAuditEvent, PaymentMethod, PaymentMethodPatch, Role};
use crate::gateway::{CardDetails, GatewayContext, GatewayRequest};
use super::{not_found, FieldErrors};

#[derive(Deserialize)]
pub struct RegisterCardRequest {
    pub brand: String,
    pub last4: String,
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let store = state.store.lock();
    let methods: Vec<&PaymentMethod> = store
        .list::<PaymentMethod>()
        .iter()
        .filter(|m| m.donor_id == user.id)
        .collect();
    AxumJson(serde_json::json!({ "paymentMethods": methods })).into_response()
}

/// Starts card registration. Nothing is stored until the gateway approves.
pub async fn register_payment_method(
    user: AuthenticatedUser,
    Json(req): Json<RegisterCardRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let mut errors = FieldErrors::default();
    errors.require("brand", &req.brand);
    if req.last4.len() != 4 || !req.last4.chars().all(|c| c.is_ascii_digit()) {
        errors.add("last4", "Must be the last four digits of the card");
    }
    if let Err(response) = errors.into_result() {
        return response;
    }

    let request = GatewayRequest {
        context: GatewayContext::PaymentMethod,
        id: user.id.clone(),
        amount: None,
        payment_date: None,
        method_id: None,
        card: None,
    };
    let card = CardDetails { brand: req.brand.trim().to_string(), last4: req.last4 };
    match request.with_card(&card) {
        Ok(request) => AxumJson(serde_json::json!({ "redirect": request.gateway_url() })).into_response(),
        Err(e) => {
            tracing::error!("Card payload encoding failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Gateway Error").into_response()
        }
    }
}

/// Marks one method as the donor's card in use and clears the flag on the rest.
pub async fn set_default_payment_method(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    match store.get::<PaymentMethod>(&id) {
        Some(method) if method.donor_id == user.id => {}
        _ => return not_found("Payment method"),
    }

    let own_ids: Vec<String> = store
        .list::<PaymentMethod>()
        .iter()
        .filter(|m| m.donor_id == user.id)
        .map(|m| m.id.clone())
        .collect();
    for method_id in own_ids {
        let in_use = method_id == id;
        store.update::<PaymentMethod>(&method_id, PaymentMethodPatch { in_use: Some(in_use), ..Default::default() });
    }
    store.log_event(
        NewAuditEvent::new(user.actor(), "Set default payment method", "payment_method", AuditResult::Ok)
            .with_ref(id.clone()),
    );
    match store.get::<PaymentMethod>(&id) {
        Some(method) => AxumJson(method.clone()).into_response(),
        None => not_found("Payment method"),
    }
}

pub async fn delete_payment_method(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    match store.get::<PaymentMethod>(&id) {
        Some(method) if method.donor_id == user.id => {}
        _ => return not_found("Payment method"),
    }
    store.remove::<PaymentMethod>(&id);
    store.log_event(
        NewAuditEvent::new(user.actor(), "Delete payment method", "payment_method", AuditResult::Ok).with_ref(id),
    );
    (StatusCode::OK, "Deleted").into_response()
}
