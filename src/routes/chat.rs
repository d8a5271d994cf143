use axum::{
    extract::{State, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, ChatMessage, NewAuditEvent, Role, Sponsee, Sponsorship};
use crate::db::DomainStore;
use crate::moderation::{self, Verdict};
use super::{new_id, not_found, FieldErrors};

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

/// The donor and the sponsee's shelter take part in a sponsorship's chat.
fn is_party(store: &DomainStore, sponsorship: &Sponsorship, user: &AuthenticatedUser) -> bool {
    match user.role {
        Role::Donor => sponsorship.donor_id == user.id,
        Role::Shelter => store
            .get::<Sponsee>(&sponsorship.sponsee_id)
            .is_some_and(|s| s.shelter_id == user.id),
        Role::Admin => false,
    }
}

pub async fn list_messages(
    Path(sponsorship_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let store = state.store.lock();
    let Some(sponsorship) = store.get::<Sponsorship>(&sponsorship_id) else {
        return not_found("Sponsorship");
    };
    if user.role != Role::Admin && !is_party(&store, sponsorship, &user) {
        return not_found("Sponsorship");
    }
    let messages: Vec<&ChatMessage> = store
        .list::<ChatMessage>()
        .iter()
        .filter(|m| m.sponsorship_id == sponsorship_id)
        .collect();
    AxumJson(serde_json::json!({ "messages": messages })).into_response()
}

/// Messages sharing contact details are not delivered; the attempt is
/// audited as `BLOCKED` instead.
pub async fn send_message(
    Path(sponsorship_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("body", &req.body);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let mut store = state.store.lock();
    let Some(sponsorship) = store.get::<Sponsorship>(&sponsorship_id) else {
        return not_found("Sponsorship");
    };
    if !is_party(&store, sponsorship, &user) {
        return not_found("Sponsorship");
    }

    if let Verdict::Blocked { reason } = moderation::review_message(&req.body) {
        tracing::info!("Blocked chat message on {}: {}", sponsorship_id, reason);
        store.log_event(
            NewAuditEvent::new(user.actor(), "Send message", "chat", AuditResult::Blocked).with_ref(sponsorship_id),
        );
        return AxumJson(serde_json::json!({
            "status": "blocked",
            "reason": reason,
            "notifications": ["Message not sent: sharing contact details is not allowed"],
        }))
        .into_response();
    }

    let message = ChatMessage {
        id: new_id("m"),
        sponsorship_id,
        sender_id: user.id.clone(),
        sender_role: user.role,
        body: req.body.trim().to_string(),
        sent_at: chrono::Utc::now(),
    };
    store.add(message.clone());
    (StatusCode::CREATED, AxumJson(serde_json::json!({ "status": "sent", "message": message }))).into_response()
}
