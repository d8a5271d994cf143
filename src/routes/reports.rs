use axum::{
    extract::{State, Query, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::StatusCode,
};
use serde::Deserialize;
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db::models::{
    AuditResult, NewAuditEvent, Report, ReportPatch, ReportStatus, Role, Sponsee, Sponsorship, SponsorshipStatus,
};
use crate::db::DomainStore;
use crate::demo::Outcome;
use crate::lifecycle::ReportAction;
use super::{new_id, not_found, store_error_response, FieldErrors};

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub status: Option<ReportStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub sponsee_id: String,
    pub title: String,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub period: Option<String>,
    pub content: Option<String>,
    /// Submit straight for review instead of saving a draft.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewDecision,
}

fn shelter_of(store: &DomainStore, report: &Report) -> Option<String> {
    report
        .shelter_id
        .clone()
        .or_else(|| store.get::<Sponsee>(&report.sponsee_id).map(|s| s.shelter_id.clone()))
}

fn donor_sponsors(store: &DomainStore, donor_id: &str, sponsee_id: &str) -> bool {
    store
        .list::<Sponsorship>()
        .iter()
        .any(|s| s.donor_id == donor_id && s.sponsee_id == sponsee_id && s.status == SponsorshipStatus::Active)
}

/// Reports `user` may read. Donors only see reviewed reports about children
/// they actively sponsor.
pub fn visible_reports(store: &DomainStore, user: &AuthenticatedUser) -> Vec<Report> {
    store
        .list::<Report>()
        .iter()
        .filter(|r| match user.role {
            Role::Admin => true,
            Role::Shelter => shelter_of(store, r).as_deref() == Some(user.id.as_str()),
            Role::Donor => r.status.is_visible_to_donors() && donor_sponsors(store, &user.id, &r.sponsee_id),
        })
        .cloned()
        .collect()
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let store = state.store.lock();
    if user.role == Role::Donor && !store.scenario().report_access_enabled {
        return (StatusCode::FORBIDDEN, "Report access is disabled").into_response();
    }
    let reports: Vec<Report> = visible_reports(&store, &user)
        .into_iter()
        .filter(|r| params.status.map_or(true, |status| r.status == status))
        .collect();
    AxumJson(serde_json::json!({ "reports": reports })).into_response()
}

pub async fn create_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateReportRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter]) {
        return rejection.into_response();
    }
    let mut errors = FieldErrors::default();
    errors.require("title", &req.title);
    errors.require("sponseeId", &req.sponsee_id);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let mut store = state.store.lock();
    if let Some(status) = store.shelter_block(&user.id) {
        return (StatusCode::FORBIDDEN, format!("Shelter account is {}", status)).into_response();
    }
    match store.get::<Sponsee>(&req.sponsee_id) {
        Some(sponsee) if sponsee.shelter_id == user.id => {}
        Some(_) => return (StatusCode::FORBIDDEN, "Sponsee belongs to another shelter").into_response(),
        None => return not_found("Sponsee"),
    }

    let status = if req.submit { ReportStatus::Pending } else { ReportStatus::Draft };
    let report = Report {
        id: new_id("r"),
        sponsee_id: req.sponsee_id,
        title: req.title.trim().to_string(),
        status,
        summary: req.summary,
        report_type: req.report_type,
        period: req.period,
        content: req.content,
        shelter_id: Some(user.id.clone()),
    };
    store.add(report.clone());
    let (action, result) = if req.submit {
        ("Submit report", AuditResult::Pending)
    } else {
        ("Save report draft", AuditResult::Ok)
    };
    store.log_event(NewAuditEvent::new(user.actor(), action, "report", result).with_ref(report.id.clone()));
    (StatusCode::CREATED, AxumJson(report)).into_response()
}

/// Shelters may edit their own reports until they pass review.
pub async fn update_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(patch): Json<ReportPatch>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter, Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let Some(report) = store.get::<Report>(&id) else {
        return not_found("Report");
    };
    if user.role == Role::Shelter {
        if shelter_of(&store, report).as_deref() != Some(user.id.as_str()) {
            return not_found("Report");
        }
        if report.status.is_visible_to_donors() {
            return (StatusCode::CONFLICT, "Reviewed reports cannot be edited").into_response();
        }
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        let mut errors = FieldErrors::default();
        errors.add("title", "Required");
        if let Err(response) = errors.into_result() {
            return response;
        }
    }

    store.update::<Report>(&id, patch);
    store.log_event(NewAuditEvent::new(user.actor(), "Update report", "report", AuditResult::Ok).with_ref(id.clone()));
    match store.get::<Report>(&id) {
        Some(report) => AxumJson(report.clone()).into_response(),
        None => not_found("Report"),
    }
}

pub async fn delete_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter, Role::Admin]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let Some(report) = store.get::<Report>(&id) else {
        return not_found("Report");
    };
    if user.role == Role::Shelter && shelter_of(&store, report).as_deref() != Some(user.id.as_str()) {
        return not_found("Report");
    }
    store.remove::<Report>(&id);
    store.log_event(NewAuditEvent::new(user.actor(), "Delete report", "report", AuditResult::Ok).with_ref(id));
    (StatusCode::OK, "Deleted").into_response()
}

/// Submits a draft, or resubmits a rejected report, for review.
pub async fn submit_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Shelter]) {
        return rejection.into_response();
    }
    let mut store = state.store.lock();
    let Some(report) = store.get::<Report>(&id) else {
        return not_found("Report");
    };
    if shelter_of(&store, report).as_deref() != Some(user.id.as_str()) {
        return not_found("Report");
    }
    match store.transition_report(&id, ReportAction::Submit) {
        Ok(report) => {
            store.log_event(
                NewAuditEvent::new(user.actor(), "Submit report", "report", AuditResult::Pending).with_ref(id),
            );
            AxumJson(serde_json::json!({
                "report": report,
                "notifications": ["Report submitted", "An administrator will review it shortly"],
            }))
            .into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub async fn review_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ReviewRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let (action, result, label) = match req.action {
        ReviewDecision::Approve => (ReportAction::Approve, AuditResult::Ok, "Approve report"),
        ReviewDecision::Reject => (ReportAction::Reject, AuditResult::Rejected, "Reject report"),
    };
    apply_review(&state, &user, &id, action, result, label)
}

/// Publishes a report; the outcome follows the demo scenario.
pub async fn publish_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    if let Err(rejection) = user.require(&[Role::Admin]) {
        return rejection.into_response();
    }
    let outcome = state.store.lock().scenario().report_publication_outcome;
    let (action, result, label) = match outcome {
        Outcome::Approved => (ReportAction::Publish, AuditResult::Ok, "Publish report"),
        Outcome::Rejected => (ReportAction::Reject, AuditResult::Rejected, "Publication rejected"),
    };
    apply_review(&state, &user, &id, action, result, label)
}

fn apply_review(
    state: &AppState,
    user: &AuthenticatedUser,
    id: &str,
    action: ReportAction,
    result: AuditResult,
    label: &str,
) -> axum::response::Response {
    let mut store = state.store.lock();
    match store.transition_report(id, action) {
        Ok(report) => {
            store.log_event(NewAuditEvent::new(user.actor(), label, "report", result).with_ref(id));
            let notifications = vec![
                format!("Report \"{}\" is now {}", report.title, report.status),
                "The shelter has been notified".to_string(),
            ];
            AxumJson(serde_json::json!({ "report": report, "notifications": notifications })).into_response()
        }
        Err(e) => {
            store.log_event(NewAuditEvent::new(user.actor(), label, "report", AuditResult::Error).with_ref(id));
            store_error_response(e)
        }
    }
}
