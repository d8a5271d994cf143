use axum::{
    extract::{State, Query, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{AuditResult, NewAuditEvent, Role, Shelter, Sponsee, SponseePatch, SponseeStatus};
use crate::db::DomainStore;
use crate::demo::DemoScenario;
use super::{new_id, not_found, FieldErrors};

/// Candidate list filters. Blank criteria match everything.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SponseeFilter {
    pub shelter_id: Option<String>,
    pub status: Option<String>,
    pub gender: Option<String>,
    /// Case-insensitive substring of the name or the need.
    pub q: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SponseeFilter {
    pub fn matches(&self, sponsee: &Sponsee) -> bool {
        if let Some(shelter_id) = criterion(&self.shelter_id) {
            if sponsee.shelter_id != shelter_id {
                return false;
            }
        }
        if let Some(status) = criterion(&self.status) {
            if !sponsee.status.to_string().eq_ignore_ascii_case(status) {
                return false;
            }
        }
        if let Some(gender) = criterion(&self.gender) {
            if !sponsee.gender.eq_ignore_ascii_case(gender) {
                return false;
            }
        }
        if let Some(q) = criterion(&self.q) {
            let q = q.to_lowercase();
            if !sponsee.name.to_lowercase().contains(&q) && !sponsee.need.to_lowercase().contains(&q) {
                return false;
            }
        }
        if self.min_age.is_some_and(|min| sponsee.age < min) {
            return false;
        }
        if self.max_age.is_some_and(|max| sponsee.age > max) {
            return false;
        }
        true
    }
}

/// The sponsee as shown to users: scenario status override applied.
fn presented(sponsee: &Sponsee, scenario: &DemoScenario) -> Sponsee {
    let mut shown = sponsee.clone();
    shown.status = scenario.effective_sponsee_status(sponsee.status);
    shown
}

/// Whether donors may see and sponsor children of `shelter_id`: the shelter
/// must exist and be operational.
pub fn shelter_is_listed(store: &DomainStore, shelter_id: &str) -> bool {
    store.get::<Shelter>(shelter_id).is_some_and(|s| s.status.is_operational())
}

/// Sponsees visible to `user`, scenario applied. Admins see everything,
/// shelters their own, donors only those of listed shelters.
pub fn visible_sponsees(store: &DomainStore, user: &AuthenticatedUser, filter: &SponseeFilter) -> Vec<Sponsee> {
    let scenario = store.scenario();
    store
        .list::<Sponsee>()
        .iter()
        .filter(|s| match user.role {
            Role::Admin => true,
            Role::Shelter => s.shelter_id == user.id,
            Role::Donor => shelter_is_listed(store, &s.shelter_id),
        })
        .map(|s| presented(s, scenario))
        .filter(|s| filter.matches(s))
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSponseeRequest {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub need: String,
    /// Ignored for shelter accounts, which always create under themselves.
    pub shelter_id: Option<String>,
    pub status: Option<SponseeStatus>,
    pub photo: Option<String>,
}

pub async fn list_sponsees(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<SponseeFilter>,
) -> impl IntoResponse {
    let store = state.store.lock();
    let sponsees = visible_sponsees(&store, &user, &filter);
    AxumJson(serde_json::json!({ "sponsees": sponsees }))
}

pub async fn get_sponsee(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let store = state.store.lock();
    match store.get::<Sponsee>(&id) {
        Some(sponsee) => AxumJson(presented(sponsee, store.scenario())).into_response(),
        None => not_found("Sponsee"),
    }
}

pub async fn create_sponsee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateSponseeRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter, Role::Admin]) {
        return rejection.into_response();
    }
    let shelter_id = match user.role {
        Role::Shelter => user.id.clone(),
        _ => req.shelter_id.clone().unwrap_or_default(),
    };

    let mut errors = FieldErrors::default();
    errors.require("name", &req.name);
    errors.require("gender", &req.gender);
    errors.require("need", &req.need);
    errors.require("shelterId", &shelter_id);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let mut store = state.store.lock();
    if store.get::<Shelter>(&shelter_id).is_none() {
        return not_found("Shelter");
    }
    if user.role == Role::Shelter {
        if let Some(status) = store.shelter_block(&user.id) {
            return (StatusCode::FORBIDDEN, format!("Shelter account is {}", status)).into_response();
        }
    }
    let sponsee = Sponsee {
        id: new_id("s"),
        name: req.name.trim().to_string(),
        age: req.age,
        gender: req.gender,
        need: req.need,
        shelter_id,
        status: req.status.unwrap_or(SponseeStatus::Active),
        photo: req.photo.filter(|p| !p.trim().is_empty()),
    };
    store.add(sponsee.clone());
    store.log_event(
        NewAuditEvent::new(user.actor(), "Create sponsee", "sponsee", AuditResult::Ok).with_ref(sponsee.id.clone()),
    );
    (StatusCode::CREATED, AxumJson(sponsee)).into_response()
}

pub async fn update_sponsee(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(mut patch): Json<SponseePatch>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter, Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let Some(existing) = store.get::<Sponsee>(&id) else {
        return not_found("Sponsee");
    };
    if user.role == Role::Shelter {
        if existing.shelter_id != user.id {
            return (StatusCode::FORBIDDEN, "Sponsee belongs to another shelter").into_response();
        }
        patch.shelter_id = None;
    }

    store.update::<Sponsee>(&id, patch);
    store.log_event(NewAuditEvent::new(user.actor(), "Update sponsee", "sponsee", AuditResult::Ok).with_ref(id.clone()));
    match store.get::<Sponsee>(&id) {
        Some(sponsee) => AxumJson(sponsee.clone()).into_response(),
        None => not_found("Sponsee"),
    }
}

pub async fn delete_sponsee(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter, Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let Some(existing) = store.get::<Sponsee>(&id) else {
        return not_found("Sponsee");
    };
    if user.role == Role::Shelter && existing.shelter_id != user.id {
        return (StatusCode::FORBIDDEN, "Sponsee belongs to another shelter").into_response();
    }
    store.remove::<Sponsee>(&id);
    store.log_event(NewAuditEvent::new(user.actor(), "Delete sponsee", "sponsee", AuditResult::Ok).with_ref(id));
    (StatusCode::OK, "Deleted").into_response()
}
