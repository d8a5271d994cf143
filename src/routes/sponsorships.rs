use axum::{
    extract::{State, Json, Path},
    response::{IntoResponse, Json as AxumJson, Response},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{
    AuditResult, NewAuditEvent, PaymentMethod, Role, Sponsee, SponseeStatus, Sponsorship, SponsorshipStatus,
};
use crate::db::DomainStore;
use crate::gateway::{GatewayContext, GatewayRequest};
use crate::lifecycle::SponsorshipAction;
use super::sponsees::shelter_is_listed;
use super::{not_found, store_error_response, FieldErrors};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub sponsee_id: String,
    pub amount: f64,
    pub method_id: String,
    pub payment_date: Option<NaiveDate>,
}

/// Sponsorships visible to `user`: donors their own, shelters those of their
/// sponsees, admins all.
pub fn visible_sponsorships(store: &DomainStore, user: &AuthenticatedUser) -> Vec<Sponsorship> {
    store
        .list::<Sponsorship>()
        .iter()
        .filter(|s| match user.role {
            Role::Admin => true,
            Role::Donor => s.donor_id == user.id,
            Role::Shelter => store
                .get::<Sponsee>(&s.sponsee_id)
                .is_some_and(|sponsee| sponsee.shelter_id == user.id),
        })
        .cloned()
        .collect()
}

/// Refuses a new sponsorship of `sponsee_id` by `donor_id` unless the child
/// is open for sponsorship (scenario override applied), belongs to a listed
/// shelter, and is not already actively sponsored by this donor.
pub fn check_sponsorable<'a>(store: &'a DomainStore, donor_id: &str, sponsee_id: &str) -> Result<&'a Sponsee, Response> {
    let Some(sponsee) = store.get::<Sponsee>(sponsee_id) else {
        return Err(not_found("Sponsee"));
    };
    if store.scenario().effective_sponsee_status(sponsee.status) != SponseeStatus::Active
        || !shelter_is_listed(store, &sponsee.shelter_id)
    {
        return Err((StatusCode::CONFLICT, "Sponsee is not open for sponsorship").into_response());
    }
    let already = store
        .list::<Sponsorship>()
        .iter()
        .any(|s| s.donor_id == donor_id && s.sponsee_id == sponsee_id && s.status == SponsorshipStatus::Active);
    if already {
        return Err((StatusCode::CONFLICT, "You already sponsor this child").into_response());
    }
    Ok(sponsee)
}

pub async fn list_sponsorships(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let store = state.store.lock();
    let sponsorships = visible_sponsorships(&store, &user);
    AxumJson(serde_json::json!({ "sponsorships": sponsorships }))
}

/// Validates the checkout and hands the donor to the gateway. The
/// sponsorship itself is only created by the gateway callback.
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CheckoutRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let mut errors = FieldErrors::default();
    if !(req.amount.is_finite() && req.amount > 0.0) {
        errors.add("amount", "Amount must be greater than zero");
    }
    errors.require("methodId", &req.method_id);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let store = state.store.lock();
    if let Err(response) = check_sponsorable(&store, &user.id, &req.sponsee_id) {
        return response;
    }
    match store.get::<PaymentMethod>(&req.method_id) {
        Some(method) if method.donor_id == user.id => {}
        _ => return not_found("Payment method"),
    }

    let request = GatewayRequest {
        context: GatewayContext::Sponsorship,
        id: req.sponsee_id,
        amount: Some(req.amount),
        payment_date: Some(req.payment_date.unwrap_or_else(|| chrono::Utc::now().date_naive())),
        method_id: Some(req.method_id),
        card: None,
    };
    AxumJson(serde_json::json!({ "redirect": request.gateway_url() })).into_response()
}

pub async fn cancel_sponsorship(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Donor]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    match store.get::<Sponsorship>(&id) {
        Some(s) if s.donor_id == user.id => {}
        _ => return not_found("Sponsorship"),
    }
    match store.transition_sponsorship(&id, SponsorshipAction::Cancel) {
        Ok(sponsorship) => {
            store.log_event(
                NewAuditEvent::new(user.actor(), "Cancel sponsorship", "sponsorship", AuditResult::Ok).with_ref(id),
            );
            let notifications = vec![
                "Sponsorship cancelled".to_string(),
                "No further charges will be made".to_string(),
            ];
            AxumJson(serde_json::json!({ "sponsorship": sponsorship, "notifications": notifications })).into_response()
        }
        Err(e) => store_error_response(e),
    }
}
