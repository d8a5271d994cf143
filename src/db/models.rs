use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, DateTime, Utc};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Donor,
    Shelter,
    Admin,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelterStatus {
    Pending,
    Approved,
    Rejected,
    Inactive,
    Active,
}

impl ShelterStatus {
    /// Whether a shelter in this status may sign in and operate.
    pub fn is_operational(self) -> bool {
        matches!(self, ShelterStatus::Approved | ShelterStatus::Active)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponseeStatus {
    Active,
    SelfSufficient,
    Inactive,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorshipStatus {
    Active,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Pending,
    Published,
    Rejected,
    Draft,
    Approved,
}

impl ReportStatus {
    /// Donors only ever see reports that passed review.
    pub fn is_visible_to_donors(self) -> bool {
        matches!(self, ReportStatus::Published | ReportStatus::Approved)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResult {
    Approved,
    Rejected,
    #[serde(rename = "OK")]
    Ok,
    Error,
    Pending,
    #[serde(rename = "BLOCKED")]
    Blocked,
}

impl AuditResult {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditResult::Approved => "Approved",
            AuditResult::Rejected => "Rejected",
            AuditResult::Ok => "OK",
            AuditResult::Error => "Error",
            AuditResult::Pending => "Pending",
            AuditResult::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! debug_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

debug_display!(Role, ShelterStatus, SponseeStatus, SponsorshipStatus, ReportStatus);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShelterStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sponsee {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub need: String,
    pub shelter_id: String,
    pub status: SponseeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shelter {
    pub id: String,
    pub name: String,
    pub status: ShelterStatus,
    pub location: String,
    pub description: String,
    pub representative: String,
    pub founding_date: NaiveDate,
    pub phone: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub donor_id: String,
    pub brand: String,
    pub last4: String,
    /// Opaque gateway reference; never a card number.
    pub token: String,
    pub in_use: bool,
}

pub const SPONSORSHIP_CURRENCY: &str = "USD";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    pub id: String,
    pub donor_id: String,
    pub sponsee_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_date: NaiveDate,
    pub status: SponsorshipStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub sponsee_id: String,
    pub title: String,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelter_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub result: AuditResult,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// An audit event before the store stamps it.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub result: AuditResult,
    pub reference: Option<String>,
}

impl NewAuditEvent {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, entity: impl Into<String>, result: AuditResult) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            entity: entity.into(),
            result,
            reference: None,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sponsorship_id: String,
    pub sender_id: String,
    pub sender_role: Role,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

// Patches: every field optional, ids deliberately absent.

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub role: Option<Role>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<ShelterStatus>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SponseePatch {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub need: Option<String>,
    pub shelter_id: Option<String>,
    pub status: Option<SponseeStatus>,
    pub photo: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShelterPatch {
    pub name: Option<String>,
    pub status: Option<ShelterStatus>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub representative: Option<String>,
    pub founding_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodPatch {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub in_use: Option<bool>,
}

/// Status is owned by the lifecycle module and cannot be patched.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipPatch {
    pub amount: Option<f64>,
    pub payment_date: Option<NaiveDate>,
}

/// Status is owned by the lifecycle module and cannot be patched.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub period: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChatMessagePatch {
    pub body: Option<String>,
}
