use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::demo::{DemoScenario, DemoScenarioPatch};
use crate::lifecycle::{self, ReportAction, SponsorshipAction, TransitionError};

pub mod models;
pub mod seed;
pub mod slot;

use models::*;
use slot::StateSlot;

/// Store handle shared by every request handler. Mutations run to completion
/// under the lock, so two of them never interleave.
pub type SharedStore = Arc<Mutex<DomainStore>>;

pub fn shared(store: DomainStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Everything the store persists: entity collections plus the demo scenario.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub users: Vec<User>,
    pub sponsees: Vec<Sponsee>,
    pub shelters: Vec<Shelter>,
    pub payment_methods: Vec<PaymentMethod>,
    pub sponsorships: Vec<Sponsorship>,
    pub reports: Vec<Report>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub audit: Vec<AuditEvent>,
    #[serde(default)]
    pub scenario: DemoScenario,
}

/// An entity kept in one of the store's id-keyed collections.
pub trait Record: Clone {
    type Patch;
    const KIND: &'static str;

    fn id(&self) -> &str;
    /// Shallow merge: fields present in the patch overwrite, the rest stay.
    fn apply(&mut self, patch: Self::Patch);
    fn collection(snapshot: &StoreSnapshot) -> &Vec<Self>;
    fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Vec<Self>;
}

macro_rules! record {
    ($ty:ty, $patch:ty, $kind:literal, $field:ident, set [$($set:ident),*], opt [$($opt:ident),*]) => {
        impl Record for $ty {
            type Patch = $patch;
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn apply(&mut self, patch: $patch) {
                $(if let Some(value) = patch.$set { self.$set = value; })*
                $(if let Some(value) = patch.$opt { self.$opt = Some(value); })*
            }

            fn collection(snapshot: &StoreSnapshot) -> &Vec<Self> {
                &snapshot.$field
            }

            fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Vec<Self> {
                &mut snapshot.$field
            }
        }
    };
}

record!(User, UserPatch, "user", users, set [role, name, email], opt [status]);
record!(Sponsee, SponseePatch, "sponsee", sponsees,
    set [name, age, gender, need, shelter_id, status], opt [photo]);
record!(Shelter, ShelterPatch, "shelter", shelters,
    set [name, status, location, description, representative, founding_date, phone, email], opt [website]);
record!(PaymentMethod, PaymentMethodPatch, "payment_method", payment_methods,
    set [brand, last4, in_use], opt []);
record!(Sponsorship, SponsorshipPatch, "sponsorship", sponsorships,
    set [amount, payment_date], opt []);
record!(Report, ReportPatch, "report", reports,
    set [title], opt [summary, report_type, period, content]);
record!(ChatMessage, ChatMessagePatch, "message", messages, set [body], opt []);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub struct DomainStore {
    state: StoreSnapshot,
    slot: Option<Box<dyn StateSlot>>,
}

impl DomainStore {
    /// Seed data, no persistence.
    pub fn seeded() -> Self {
        Self::from_snapshot(seed::snapshot())
    }

    pub fn from_snapshot(state: StoreSnapshot) -> Self {
        Self { state, slot: None }
    }

    /// Loads the persisted snapshot from `slot`, falling back to seed data
    /// when nothing was stored or the blob cannot be read.
    pub fn open(slot: Box<dyn StateSlot>) -> Self {
        let state = match slot.load() {
            Ok(Some(blob)) => match serde_json::from_str::<StoreSnapshot>(&blob) {
                Ok(state) => {
                    tracing::info!("Restored store state from {}", slot::STORE_KEY);
                    state
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable store state: {}", e);
                    seed::snapshot()
                }
            },
            Ok(None) => {
                tracing::info!("No persisted store state, loading seed data");
                seed::snapshot()
            }
            Err(e) => {
                tracing::warn!("Store slot read failed, loading seed data: {}", e);
                seed::snapshot()
            }
        };
        Self { state, slot: Some(slot) }
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.state
    }

    pub fn is_persistent(&self) -> bool {
        self.slot.is_some()
    }

    pub fn list<E: Record>(&self) -> &[E] {
        E::collection(&self.state)
    }

    pub fn get<E: Record>(&self, id: &str) -> Option<&E> {
        E::collection(&self.state).iter().find(|r| r.id() == id)
    }

    /// Appends without checking for duplicate ids; callers mint fresh ids.
    pub fn add<E: Record>(&mut self, record: E) {
        E::collection_mut(&mut self.state).push(record);
        self.flush();
    }

    /// Returns `false`, leaving the collection untouched, when `id` is unknown.
    pub fn update<E: Record>(&mut self, id: &str, patch: E::Patch) -> bool {
        let Some(record) = E::collection_mut(&mut self.state).iter_mut().find(|r| r.id() == id) else {
            return false;
        };
        record.apply(patch);
        self.flush();
        true
    }

    /// Returns `false` when `id` is unknown.
    pub fn remove<E: Record>(&mut self, id: &str) -> bool {
        let collection = E::collection_mut(&mut self.state);
        let before = collection.len();
        collection.retain(|r| r.id() != id);
        if collection.len() == before {
            return false;
        }
        self.flush();
        true
    }

    pub fn audit_log(&self) -> &[AuditEvent] {
        &self.state.audit
    }

    /// Stamps and appends an audit event. Timestamps never go backwards, even
    /// if the wall clock does.
    pub fn log_event(&mut self, event: NewAuditEvent) -> AuditEvent {
        let mut timestamp = Utc::now();
        if let Some(last) = self.state.audit.last() {
            if last.timestamp > timestamp {
                timestamp = last.timestamp;
            }
        }
        let stamped = AuditEvent {
            timestamp,
            actor: event.actor,
            action: event.action,
            entity: event.entity,
            result: event.result,
            reference: event.reference,
        };
        self.state.audit.push(stamped.clone());
        self.flush();
        stamped
    }

    pub fn clear_audit(&mut self) {
        self.state.audit.clear();
        self.flush();
    }

    pub fn scenario(&self) -> &DemoScenario {
        &self.state.scenario
    }

    /// A shelter account's own review status: the Shelter record first, then
    /// the user's status. Unknown accounts count as Pending.
    pub fn shelter_status(&self, id: &str) -> ShelterStatus {
        self.get::<Shelter>(id)
            .map(|s| s.status)
            .or_else(|| self.get::<User>(id).and_then(|u| u.status))
            .unwrap_or(ShelterStatus::Pending)
    }

    /// The status keeping shelter `id` from operating, if any. Its own review
    /// status is checked before the scenario's demo override.
    pub fn shelter_block(&self, id: &str) -> Option<ShelterStatus> {
        let own = self.shelter_status(id);
        if !own.is_operational() {
            return Some(own);
        }
        let demo = self.state.scenario.shelter_account_status;
        (!demo.is_operational()).then_some(demo)
    }

    pub fn update_scenario(&mut self, patch: DemoScenarioPatch) -> DemoScenario {
        self.state.scenario.apply(patch);
        self.flush();
        self.state.scenario.clone()
    }

    pub fn transition_sponsorship(&mut self, id: &str, action: SponsorshipAction) -> Result<Sponsorship, StoreError> {
        let sponsorship = self
            .state
            .sponsorships
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound { kind: Sponsorship::KIND, id: id.to_string() })?;
        sponsorship.status = lifecycle::next_sponsorship_status(sponsorship.status, action)?;
        let updated = sponsorship.clone();
        self.flush();
        Ok(updated)
    }

    pub fn transition_report(&mut self, id: &str, action: ReportAction) -> Result<Report, StoreError> {
        let report = self
            .state
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound { kind: Report::KIND, id: id.to_string() })?;
        report.status = lifecycle::next_report_status(report.status, action)?;
        let updated = report.clone();
        self.flush();
        Ok(updated)
    }

    /// Demo reset: seed collections and the default scenario.
    pub fn reset(&mut self) {
        self.state = seed::snapshot();
        self.flush();
    }

    fn flush(&self) {
        let Some(slot) = &self.slot else {
            return;
        };
        match serde_json::to_string(&self.state) {
            Ok(blob) => {
                if let Err(e) = slot.save(&blob) {
                    tracing::error!("Store flush failed: {}", e);
                }
            }
            Err(e) => tracing::error!("Store serialization failed: {}", e),
        }
    }
}
