use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use isponsor::auth::{create_jwt, UserProfile};
use isponsor::config::AppConfig;
use isponsor::db::models::{
    AuditResult, ChatMessage, Report, Role, Shelter, ShelterStatus, Sponsee, Sponsorship, SponsorshipStatus, User,
    SPONSORSHIP_CURRENCY,
};
use isponsor::db::slot::FileSlot;
use isponsor::db::{self, DomainStore, SharedStore};
use isponsor::demo::Outcome;
use isponsor::gateway::{GatewayContext, GatewayRequest};
use isponsor::identity::{IdentityError, IdentityProvider, SessionInfo, SignUpOutcome};
use isponsor::AppState;

const SECRET: &str = "integration-test-secret";

fn app_with(identity: Option<Arc<dyn IdentityProvider>>) -> (Router, SharedStore) {
    let store = db::shared(DomainStore::seeded());
    let state = AppState {
        store: store.clone(),
        config: Arc::new(AppConfig::for_tests(SECRET)),
        identity,
    };
    (isponsor::router(state), store)
}

fn app() -> (Router, SharedStore) {
    app_with(None)
}

fn token(id: &str, role: Role) -> String {
    let profile = UserProfile {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: id.to_string(),
        role,
    };
    create_jwt(&profile, SECRET).expect("jwt")
}

struct Reply {
    status: StatusCode,
    location: Option<String>,
    content_disposition: Option<String>,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let header_str = |name| response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let location = header_str(header::LOCATION);
    let content_disposition = header_str(header::CONTENT_DISPOSITION);
    let body = response.into_body().collect().await.expect("body").to_bytes().to_vec();
    Reply { status, location, content_disposition, body }
}

/// Checkout, then follow the gateway redirect. Returns the callback URL.
async fn checkout_callback_url(app: &Router, donor: &str) -> String {
    let checkout = send(
        app,
        "POST",
        "/api/sponsorships/checkout",
        Some(donor),
        Some(json!({ "sponseeId": "s-1", "amount": 25.0, "methodId": "pm-1", "paymentDate": "2026-10-01" })),
    )
    .await;
    assert_eq!(checkout.status, StatusCode::OK);
    let gateway_url = checkout.json()["redirect"].as_str().expect("redirect").to_string();
    assert!(gateway_url.starts_with("/gateway?context=sponsorship"));

    let gateway = send(app, "GET", &gateway_url, None, None).await;
    assert_eq!(gateway.status, StatusCode::SEE_OTHER);
    let callback_url = gateway.location.expect("callback location");
    assert!(callback_url.starts_with("/gateway/callback?"));
    callback_url
}

async fn pay_for_sponsorship(app: &Router, donor: &str) -> Reply {
    let callback_url = checkout_callback_url(app, donor).await;
    send(app, "GET", &callback_url, Some(donor), None).await
}

#[tokio::test]
async fn demo_login_accepts_any_password_for_known_accounts() {
    let (app, store) = app();
    let reply = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "LAURA@example.com", "password": "whatever" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["user"]["role"], "Donor");

    let token = body["token"].as_str().expect("token");
    let me = send(&app, "GET", "/api/me", Some(token), None).await;
    assert_eq!(me.json()["id"], "u-d1");
    assert_eq!(store.lock().scenario().active_role, Role::Donor);

    let unknown = send(&app, "POST", "/auth/login", None, Some(json!({ "email": "nobody@example.com" }))).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_lockout_and_pending_shelters_are_refused() {
    let (app, store) = app();
    let admin = token("u-admin", Role::Admin);

    let reply = send(&app, "PUT", "/api/demo/scenario", Some(&admin), Some(json!({ "loginLockout": true }))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let locked = send(&app, "POST", "/auth/login", None, Some(json!({ "email": "laura@example.com" }))).await;
    assert_eq!(locked.status, StatusCode::LOCKED);
    assert_eq!(store.lock().audit_log().last().map(|e| e.result), Some(AuditResult::Error));

    send(
        &app,
        "PUT",
        "/api/demo/scenario",
        Some(&admin),
        Some(json!({ "loginLockout": false, "shelterAccountStatus": "Pending" })),
    )
    .await;
    let shelter = send(&app, "POST", "/auth/login", None, Some(json!({ "email": "contacto@hogaresperanza.org" }))).await;
    assert_eq!(shelter.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn shelter_review_status_gates_login_and_reports() {
    let (app, store) = app();
    let admin = token("u-admin", Role::Admin);
    let login = |email: &'static str| {
        let app = app.clone();
        async move { send(&app, "POST", "/auth/login", None, Some(json!({ "email": email }))).await.status }
    };

    // u-ch2 is still pending review.
    assert_eq!(login("hola@casasol.org").await, StatusCode::FORBIDDEN);
    let pending = token("u-ch2", Role::Shelter);
    let report = send(
        &app,
        "POST",
        "/api/reports",
        Some(&pending),
        Some(json!({ "sponseeId": "s-3", "title": "First report", "submit": true })),
    )
    .await;
    assert_eq!(report.status, StatusCode::FORBIDDEN);
    assert!(store.lock().list::<Report>().iter().all(|r| r.sponsee_id != "s-3"));

    send(&app, "POST", "/api/shelters/u-ch2/review", Some(&admin), Some(json!({ "action": "approve" }))).await;
    assert_eq!(login("hola@casasol.org").await, StatusCode::OK);

    send(&app, "POST", "/api/shelters/u-ch1/review", Some(&admin), Some(json!({ "action": "reject" }))).await;
    assert_eq!(login("contacto@hogaresperanza.org").await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approved_payment_creates_exactly_one_active_sponsorship() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);

    let callback = pay_for_sponsorship(&app, &donor).await;
    assert_eq!(callback.status, StatusCode::CREATED);
    let body = callback.json();
    assert_eq!(body["status"], "approved");
    assert_eq!(body["notifications"].as_array().map(Vec::len), Some(3));

    let list = send(&app, "GET", "/api/sponsorships", Some(&donor), None).await.json();
    let sponsorships = list["sponsorships"].as_array().expect("array");
    assert_eq!(sponsorships.len(), 1);
    assert_eq!(sponsorships[0]["status"], "Active");
    assert_eq!(sponsorships[0]["sponseeId"], "s-1");
    assert_eq!(sponsorships[0]["currency"], "USD");
    assert_eq!(sponsorships[0]["paymentDate"], "2026-10-01");

    let event = store.lock().audit_log().last().cloned().expect("audit event");
    assert_eq!(event.action, "Create sponsorship");
    assert_eq!(event.result, AuditResult::Ok);
}

#[tokio::test]
async fn replayed_callback_does_not_duplicate_the_sponsorship() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);

    let callback_url = checkout_callback_url(&app, &donor).await;
    let first = send(&app, "GET", &callback_url, Some(&donor), None).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let replay = send(&app, "GET", &callback_url, Some(&donor), None).await;
    assert_eq!(replay.status, StatusCode::CONFLICT);

    let again = send(
        &app,
        "POST",
        "/api/sponsorships/checkout",
        Some(&donor),
        Some(json!({ "sponseeId": "s-1", "amount": 25.0, "methodId": "pm-1" })),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(store.lock().list::<Sponsorship>().len(), 1);
}

#[tokio::test]
async fn callback_without_checkout_respects_sponsee_status() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);

    // s-2 is self-sufficient: checkout refuses it, and so must a hand-made callback.
    let checkout = send(
        &app,
        "POST",
        "/api/sponsorships/checkout",
        Some(&donor),
        Some(json!({ "sponseeId": "s-2", "amount": 25.0, "methodId": "pm-1" })),
    )
    .await;
    assert_eq!(checkout.status, StatusCode::CONFLICT);

    let forged = GatewayRequest {
        context: GatewayContext::Sponsorship,
        id: "s-2".to_string(),
        amount: Some(25.0),
        payment_date: None,
        method_id: Some("pm-1".to_string()),
        card: None,
    }
    .resolve(Outcome::Approved)
    .callback_url();
    let reply = send(&app, "GET", &forged, Some(&donor), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    // The scenario override closes s-1 as well.
    send(&app, "PUT", "/api/demo/scenario", Some(&donor), Some(json!({ "sponseeStatus": "Inactive" }))).await;
    let forged = forged.replace("id=s-2", "id=s-1");
    let reply = send(&app, "GET", &forged, Some(&donor), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    assert!(store.lock().list::<Sponsorship>().is_empty());
}

#[tokio::test]
async fn children_of_unapproved_shelters_cannot_be_sponsored() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);

    let listed = send(&app, "GET", "/api/sponsees", Some(&donor), None).await.json();
    let ids: Vec<&str> = listed["sponsees"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert!(!ids.contains(&"s-3"));

    let checkout = send(
        &app,
        "POST",
        "/api/sponsorships/checkout",
        Some(&donor),
        Some(json!({ "sponseeId": "s-3", "amount": 10.0, "methodId": "pm-1" })),
    )
    .await;
    assert_eq!(checkout.status, StatusCode::CONFLICT);
    assert!(store.lock().list::<Sponsorship>().is_empty());
}

#[tokio::test]
async fn rejected_payment_creates_nothing_and_routes_to_retry() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);
    send(&app, "PUT", "/api/demo/scenario", Some(&donor), Some(json!({ "gatewayOutcome": "Rejected" }))).await;
    let audit_before = store.lock().audit_log().len();

    let callback = pay_for_sponsorship(&app, &donor).await;
    assert_eq!(callback.status, StatusCode::SEE_OTHER);
    let retry_url = callback.location.expect("retry location");
    assert!(retry_url.starts_with("/gateway/retry?"));

    assert!(store.lock().list::<Sponsorship>().is_empty());
    assert_eq!(store.lock().audit_log().len(), audit_before);

    let retry = send(&app, "GET", &retry_url, Some(&donor), None).await;
    assert_eq!(retry.status, StatusCode::OK);
    let body = retry.json();
    assert_eq!(body["status"], "rejected");
    assert!(body["retryUrl"].as_str().expect("retry url").starts_with("/gateway?"));
}

#[tokio::test]
async fn card_registration_goes_through_the_gateway() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);

    let start = send(
        &app,
        "POST",
        "/api/payment-methods/register",
        Some(&donor),
        Some(json!({ "brand": "Mastercard", "last4": "5100" })),
    )
    .await;
    assert_eq!(start.status, StatusCode::OK);
    assert_eq!(store.lock().list::<isponsor::db::models::PaymentMethod>().len(), 1);

    let gateway_url = start.json()["redirect"].as_str().expect("redirect").to_string();
    let gateway = send(&app, "GET", &gateway_url, None, None).await;
    let callback = send(&app, "GET", &gateway.location.expect("location"), Some(&donor), None).await;
    assert_eq!(callback.status, StatusCode::CREATED);
    let method = &callback.json()["paymentMethod"];
    assert_eq!(method["last4"], "5100");
    assert_eq!(method["inUse"], false);
    assert!(method["token"].as_str().expect("token").starts_with("tok_sim_"));

    let bad = send(
        &app,
        "POST",
        "/api/payment-methods/register",
        Some(&donor),
        Some(json!({ "brand": "Visa", "last4": "12" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(bad.json()["errors"]["last4"].is_string());
}

#[tokio::test]
async fn admin_approval_of_a_pending_report_is_audited() {
    let (app, store) = app();
    let shelter = token("u-ch1", Role::Shelter);
    let admin = token("u-admin", Role::Admin);

    let created = send(
        &app,
        "POST",
        "/api/reports",
        Some(&shelter),
        Some(json!({ "sponseeId": "s-1", "title": "Third quarter", "period": "2026-Q3", "submit": true })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let report = created.json();
    assert_eq!(report["status"], "Pending");
    let report_id = report["id"].as_str().expect("id").to_string();

    let reviewed = send(
        &app,
        "POST",
        &format!("/api/reports/{}/review", report_id),
        Some(&admin),
        Some(json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(reviewed.status, StatusCode::OK);
    assert_eq!(reviewed.json()["report"]["status"], "Approved");

    let store = store.lock();
    assert!(store
        .audit_log()
        .iter()
        .any(|e| e.result == AuditResult::Ok && e.reference.as_deref() == Some(report_id.as_str())));
}

#[tokio::test]
async fn invalid_report_transitions_conflict() {
    let (app, _store) = app();
    let admin = token("u-admin", Role::Admin);
    let shelter = token("u-ch1", Role::Shelter);

    // r-3 is a draft: it cannot be approved before it is submitted.
    let reply = send(&app, "POST", "/api/reports/r-3/review", Some(&admin), Some(json!({ "action": "approve" }))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let submitted = send(&app, "POST", "/api/reports/r-3/submit", Some(&shelter), None).await;
    assert_eq!(submitted.json()["report"]["status"], "Pending");

    let rejected = send(&app, "POST", "/api/reports/r-3/review", Some(&admin), Some(json!({ "action": "reject" }))).await;
    assert_eq!(rejected.json()["report"]["status"], "Rejected");

    let resubmitted = send(&app, "POST", "/api/reports/r-3/submit", Some(&shelter), None).await;
    assert_eq!(resubmitted.status, StatusCode::OK);
    assert_eq!(resubmitted.json()["report"]["status"], "Pending");

    let missing = send(&app, "POST", "/api/reports/r-404/publish", Some(&admin), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn donors_see_reports_only_when_access_is_enabled() {
    let (app, _store) = app();
    let donor = token("u-d1", Role::Donor);
    let callback = pay_for_sponsorship(&app, &donor).await;
    assert_eq!(callback.status, StatusCode::CREATED);

    let reports = send(&app, "GET", "/api/reports", Some(&donor), None).await.json();
    let ids: Vec<&str> = reports["reports"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["r-1"]);

    send(&app, "PUT", "/api/demo/scenario", Some(&donor), Some(json!({ "reportAccessEnabled": false }))).await;
    let denied = send(&app, "GET", "/api/reports", Some(&donor), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn chat_message_with_contact_info_is_blocked() {
    let (app, store) = app();
    store.lock().add(Sponsorship {
        id: "sp-chat".to_string(),
        donor_id: "u-d1".to_string(),
        sponsee_id: "s-1".to_string(),
        amount: 20.0,
        currency: SPONSORSHIP_CURRENCY.to_string(),
        payment_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).expect("date"),
        status: SponsorshipStatus::Active,
    });
    let donor = token("u-d1", Role::Donor);

    let blocked = send(
        &app,
        "POST",
        "/api/sponsorships/sp-chat/messages",
        Some(&donor),
        Some(json!({ "body": "Hola! cual es tu telefono?" })),
    )
    .await;
    assert_eq!(blocked.status, StatusCode::OK);
    assert_eq!(blocked.json()["status"], "blocked");
    {
        let store = store.lock();
        assert!(store.list::<ChatMessage>().is_empty());
        let event = store.audit_log().last().expect("audit event");
        assert_eq!(event.result, AuditResult::Blocked);
        assert_eq!(event.reference.as_deref(), Some("sp-chat"));
    }

    let sent = send(
        &app,
        "POST",
        "/api/sponsorships/sp-chat/messages",
        Some(&donor),
        Some(json!({ "body": "Happy birthday Mateo!" })),
    )
    .await;
    assert_eq!(sent.status, StatusCode::CREATED);

    let shelter = token("u-ch1", Role::Shelter);
    let thread = send(&app, "GET", "/api/sponsorships/sp-chat/messages", Some(&shelter), None).await.json();
    assert_eq!(thread["messages"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn audit_export_matches_filtered_rows() {
    let (app, store) = app();
    let admin = token("u-admin", Role::Admin);
    send(&app, "POST", "/api/reports/r-2/review", Some(&admin), Some(json!({ "action": "approve" }))).await;

    let expected = store.lock().audit_log().iter().filter(|e| e.actor == "Admin").count();
    let reply = send(&app, "GET", "/api/audit/export?actor=admin", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let disposition = reply.content_disposition.expect("content disposition");
    assert!(disposition.starts_with("attachment; filename=audit-log-"));
    assert!(disposition.ends_with(".csv"));

    let text = String::from_utf8(reply.body).expect("utf8");
    assert_eq!(text.lines().count(), expected + 1);

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers().expect("headers").iter().map(str::to_string).collect();
    assert_eq!(headers, ["timestamp", "actor", "action", "entity", "result", "reference"]);
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().expect("rows");
    assert_eq!(rows.len(), expected);
    assert!(rows.iter().all(|r| &r[1] == "Admin"));

    let blank = send(&app, "GET", "/api/audit?actor=&result=&q=&date=", Some(&admin), None).await.json();
    assert_eq!(blank["events"].as_array().map(Vec::len), Some(store.lock().audit_log().len()));

    let cleared = send(&app, "DELETE", "/api/audit", Some(&admin), None).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(store.lock().audit_log().is_empty());
}

#[tokio::test]
async fn role_checks_and_missing_ids() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);
    let admin = token("u-admin", Role::Admin);

    assert_eq!(send(&app, "GET", "/api/audit", Some(&donor), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, "GET", "/api/users", None, None).await.status, StatusCode::UNAUTHORIZED);

    let before = store.lock().list::<User>().to_vec();
    let missing = send(&app, "PUT", "/api/users/u-404", Some(&admin), Some(json!({ "name": "Ghost" }))).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    let missing = send(&app, "DELETE", "/api/users/u-404", Some(&admin), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(store.lock().list::<User>(), before.as_slice());
}

#[tokio::test]
async fn shelter_review_updates_shelter_and_account() {
    let (app, store) = app();
    let admin = token("u-admin", Role::Admin);
    let reply = send(&app, "POST", "/api/shelters/u-ch2/review", Some(&admin), Some(json!({ "action": "approve" }))).await;
    assert_eq!(reply.status, StatusCode::OK);

    let store = store.lock();
    assert_eq!(store.get::<Shelter>("u-ch2").map(|s| s.status), Some(ShelterStatus::Approved));
    assert_eq!(store.get::<User>("u-ch2").and_then(|u| u.status), Some(ShelterStatus::Approved));
    assert_eq!(store.audit_log().last().map(|e| e.result), Some(AuditResult::Approved));
}

#[tokio::test]
async fn admin_created_shelter_accounts_share_one_id() {
    let (app, store) = app();
    let admin = token("u-admin", Role::Admin);
    let details = json!({
        "location": "Cuenca, Ecuador",
        "description": "Day centre",
        "representative": "Rosa Paz",
        "foundingDate": "2010-06-15",
        "phone": "+593 7 555 0404"
    });

    let missing = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "name": "Casa Luna", "email": "info@casaluna.org", "role": "Shelter" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(missing.json()["errors"]["shelter"].is_string());

    let created = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({
            "name": "Casa Luna",
            "email": "info@casaluna.org",
            "role": "Shelter",
            "status": "Approved",
            "shelter": details.clone()
        })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let user_id = created.json()["id"].as_str().expect("id").to_string();
    assert_eq!(store.lock().get::<Shelter>(&user_id).map(|s| s.status), Some(ShelterStatus::Approved));

    let shelter_account = token(&user_id, Role::Shelter);
    let sponsee = send(
        &app,
        "POST",
        "/api/sponsees",
        Some(&shelter_account),
        Some(json!({ "name": "Lucía", "age": 7, "gender": "F", "need": "Shoes" })),
    )
    .await;
    assert_eq!(sponsee.status, StatusCode::CREATED);
    assert_eq!(sponsee.json()["shelterId"], user_id.as_str());

    let mut organisation = details;
    organisation["name"] = json!("Hogar Norte");
    organisation["email"] = json!("norte@example.org");
    let shelter = send(&app, "POST", "/api/shelters", Some(&admin), Some(organisation)).await;
    assert_eq!(shelter.status, StatusCode::CREATED);
    let shelter_id = shelter.json()["id"].as_str().expect("id").to_string();
    {
        let store = store.lock();
        let account = store.get::<User>(&shelter_id).expect("shelter account");
        assert_eq!(account.role, Role::Shelter);
        assert_eq!(account.email, "norte@example.org");
        assert_eq!(account.status, Some(ShelterStatus::Pending));
    }

    send(&app, "POST", &format!("/api/shelters/{}/review", shelter_id), Some(&admin), Some(json!({ "action": "approve" })))
        .await;
    let login = send(&app, "POST", "/auth/login", None, Some(json!({ "email": "norte@example.org" }))).await;
    assert_eq!(login.status, StatusCode::OK);

    let duplicate = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "name": "Copy", "email": "NORTE@example.org", "role": "Donor" })),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(store.lock().list::<Sponsee>().iter().any(|s| s.shelter_id == user_id));
}

#[tokio::test]
async fn demo_reset_is_admin_only() {
    let (app, store) = app();
    let donor = token("u-d1", Role::Donor);
    let admin = token("u-admin", Role::Admin);
    store.lock().remove::<Shelter>("u-ch2");

    assert_eq!(send(&app, "POST", "/api/demo/reset", Some(&donor), None).await.status, StatusCode::FORBIDDEN);
    assert!(store.lock().get::<Shelter>("u-ch2").is_none());

    assert_eq!(send(&app, "POST", "/api/demo/reset", Some(&admin), None).await.status, StatusCode::OK);
    assert!(store.lock().get::<Shelter>("u-ch2").is_some());
}

#[tokio::test]
async fn store_state_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut store = DomainStore::open(Box::new(FileSlot::new(dir.path())));
        store.remove::<Shelter>("u-ch2");
    }
    let store = DomainStore::open(Box::new(FileSlot::new(dir.path())));
    assert!(store.get::<Shelter>("u-ch2").is_none());
    assert!(store.get::<Shelter>("u-ch1").is_some());
}

struct StubProvider {
    confirmed: bool,
}

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn sign_up(&self, email: &str, _password: &str) -> Result<SignUpOutcome, IdentityError> {
        if email.starts_with("fail") {
            return Err(IdentityError::Rejected { status: 400, message: "rate limited".to_string() });
        }
        Ok(SignUpOutcome { provider_id: "prov-1".to_string(), email_confirmed: self.confirmed })
    }

    async fn session(&self, _access_token: &str) -> Result<SessionInfo, IdentityError> {
        Ok(SessionInfo { email: "new@example.com".to_string(), email_confirmed: self.confirmed })
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), IdentityError> {
        Ok(())
    }

    async fn update_password(&self, access_token: &str, _password: &str) -> Result<(), IdentityError> {
        if access_token == "expired" {
            Err(IdentityError::ExpiredLink)
        } else {
            Ok(())
        }
    }

    async fn resend_verification(&self, _email: &str) -> Result<(), IdentityError> {
        Ok(())
    }
}

#[tokio::test]
async fn shelter_sign_up_starts_pending_and_unverified() {
    let (app, store) = app_with(Some(Arc::new(StubProvider { confirmed: false })));
    let reply = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({
            "name": "Refugio Luz",
            "email": "info@refugioluz.org",
            "password": "Sponsor2026",
            "confirmPassword": "Sponsor2026",
            "role": "Shelter",
            "shelter": {
                "location": "Loja, Ecuador",
                "description": "Family-style home",
                "representative": "Ana Ruiz",
                "foundingDate": "2015-02-01",
                "phone": "+593 7 555 0303"
            }
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["verified"], false);
    let user_id = body["userId"].as_str().expect("user id").to_string();

    let store = store.lock();
    assert_eq!(store.get::<User>(&user_id).and_then(|u| u.status), Some(ShelterStatus::Pending));
    assert_eq!(store.get::<Shelter>(&user_id).map(|s| s.status), Some(ShelterStatus::Pending));
    assert_eq!(store.audit_log().last().map(|e| e.result), Some(AuditResult::Ok));
}

#[tokio::test]
async fn sign_up_validation_and_provider_errors() {
    let (app, store) = app_with(Some(Arc::new(StubProvider { confirmed: true })));
    let invalid = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({
            "name": "",
            "email": "laura@example.com",
            "password": "weak",
            "confirmPassword": "other",
            "role": "Donor"
        })),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &invalid.json()["errors"];
    for field in ["name", "email", "password", "confirmPassword"] {
        assert!(errors[field].is_string(), "missing error for {}", field);
    }

    let users_before = store.lock().list::<User>().len();
    let failed = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({
            "name": "Fail Case",
            "email": "fail@example.com",
            "password": "Sponsor2026",
            "confirmPassword": "Sponsor2026",
            "role": "Donor"
        })),
    )
    .await;
    assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
    let store = store.lock();
    assert_eq!(store.list::<User>().len(), users_before);
    assert_eq!(store.audit_log().last().map(|e| e.result), Some(AuditResult::Error));
}

#[tokio::test]
async fn expired_reset_link_is_reported() {
    let (app, _store) = app_with(Some(Arc::new(StubProvider { confirmed: true })));
    let expired = send(
        &app,
        "POST",
        "/auth/password/update",
        None,
        Some(json!({ "accessToken": "expired", "password": "Sponsor2026", "confirmPassword": "Sponsor2026" })),
    )
    .await;
    assert_eq!(expired.status, StatusCode::GONE);
    assert_eq!(expired.json()["valid"], false);

    let ok = send(
        &app,
        "POST",
        "/auth/password/update",
        None,
        Some(json!({ "accessToken": "fresh", "password": "Sponsor2026", "confirmPassword": "Sponsor2026" })),
    )
    .await;
    assert_eq!(ok.json()["valid"], true);
}

#[tokio::test]
async fn identity_routes_need_a_configured_provider() {
    let (app, _store) = app();
    let reply = send(&app, "POST", "/auth/password/reset", None, Some(json!({ "email": "laura@example.com" }))).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
}
