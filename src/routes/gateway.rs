use axum::{
    extract::{State, Query},
    response::{IntoResponse, Json as AxumJson, Redirect, Response},
    http::StatusCode,
};
use uuid::Uuid;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{
    AuditResult, NewAuditEvent, PaymentMethod, Role, Sponsorship, SponsorshipStatus, SPONSORSHIP_CURRENCY,
};
use crate::demo::Outcome;
use crate::gateway::{GatewayCallback, GatewayContext, GatewayRequest};
use super::sponsorships::check_sponsorable;
use super::{new_id, not_found};

/// The simulated payment provider. It never touches the store: it only
/// decides the outcome and forwards the donor to the callback.
pub async fn gateway(
    State(state): State<AppState>,
    Query(request): Query<GatewayRequest>,
) -> impl IntoResponse {
    let outcome = state.store.lock().scenario().gateway_outcome;
    tracing::info!("Gateway {} for {} -> {:?}", request.context.as_str(), request.id, outcome);
    Redirect::to(&request.resolve(outcome).callback_url())
}

/// Applies the gateway's decision. Approved payments create the sponsorship
/// or card; rejected ones change nothing and send the donor to retry.
pub async fn callback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(callback): Query<GatewayCallback>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    if callback.result == Outcome::Rejected {
        return Redirect::to(&callback.request().retry_url()).into_response();
    }
    match callback.context {
        GatewayContext::Sponsorship => approve_sponsorship(&state, &user, &callback),
        GatewayContext::PaymentMethod => approve_payment_method(&state, &user, &callback),
    }
}

fn approve_sponsorship(state: &AppState, user: &AuthenticatedUser, callback: &GatewayCallback) -> Response {
    let Some(amount) = callback.amount.filter(|a| a.is_finite() && *a > 0.0) else {
        return (StatusCode::BAD_REQUEST, "Missing or invalid amount").into_response();
    };

    // A callback may be replayed or arrive without a checkout.
    let mut store = state.store.lock();
    let sponsee_name = match check_sponsorable(&store, &user.id, &callback.id) {
        Ok(sponsee) => sponsee.name.clone(),
        Err(response) => return response,
    };
    if let Some(method_id) = &callback.method_id {
        match store.get::<PaymentMethod>(method_id) {
            Some(method) if method.donor_id == user.id => {}
            _ => return not_found("Payment method"),
        }
    }

    let sponsorship = Sponsorship {
        id: new_id("sp"),
        donor_id: user.id.clone(),
        sponsee_id: callback.id.clone(),
        amount,
        currency: SPONSORSHIP_CURRENCY.to_string(),
        payment_date: callback.payment_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
        status: SponsorshipStatus::Active,
    };
    store.add(sponsorship.clone());
    store.log_event(
        NewAuditEvent::new(user.actor(), "Create sponsorship", "sponsorship", AuditResult::Ok)
            .with_ref(sponsorship.id.clone()),
    );

    let notifications = vec![
        "Payment approved".to_string(),
        format!("You are now sponsoring {}", sponsee_name),
        format!("Receipt sent to {}", user.email),
    ];
    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "approved", "sponsorship": sponsorship, "notifications": notifications })),
    )
        .into_response()
}

fn approve_payment_method(state: &AppState, user: &AuthenticatedUser, callback: &GatewayCallback) -> Response {
    if callback.id != user.id {
        return (StatusCode::FORBIDDEN, "Card registration belongs to another donor").into_response();
    }
    let card = match callback.card_details() {
        Ok(Some(card)) => card,
        Ok(None) => return (StatusCode::BAD_REQUEST, "Missing card details").into_response(),
        Err(e) => {
            tracing::warn!("Malformed card payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Malformed card details").into_response();
        }
    };

    let mut store = state.store.lock();
    let first_card = !store.list::<PaymentMethod>().iter().any(|m| m.donor_id == user.id);
    let method = PaymentMethod {
        id: new_id("pm"),
        donor_id: user.id.clone(),
        brand: card.brand,
        last4: card.last4,
        token: format!("tok_sim_{}", Uuid::new_v4().simple()),
        in_use: first_card,
    };
    store.add(method.clone());
    store.log_event(
        NewAuditEvent::new(user.actor(), "Register payment method", "payment_method", AuditResult::Ok)
            .with_ref(method.id.clone()),
    );

    let notifications = vec![format!("{} ending in {} saved", method.brand, method.last4)];
    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "approved", "paymentMethod": method, "notifications": notifications })),
    )
        .into_response()
}

/// Where a rejected payment lands: retry with the same details or pick
/// another card.
pub async fn retry(Query(request): Query<GatewayRequest>) -> impl IntoResponse {
    let change_method = match request.context {
        GatewayContext::Sponsorship => "/api/payment-methods",
        GatewayContext::PaymentMethod => "/api/payment-methods/register",
    };
    AxumJson(serde_json::json!({
        "status": "rejected",
        "message": "The payment was declined. No charge was made.",
        "retryUrl": request.gateway_url(),
        "changeMethodUrl": change_method,
    }))
}
