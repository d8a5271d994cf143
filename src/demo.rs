//! Demo scenario switches. They let a reviewer drive alternate paths (gateway
//! rejection, locked accounts, hidden reports) without a real backend.

use serde::{Deserialize, Serialize};

use crate::db::models::{Role, ShelterStatus, SponseeStatus};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DemoScenario {
    pub active_role: Role,
    pub gateway_outcome: Outcome,
    pub report_access_enabled: bool,
    pub shelter_account_status: ShelterStatus,
    pub login_lockout: bool,
    pub account_suspended: bool,
    pub report_publication_outcome: Outcome,
    /// Overrides every sponsee's status when set.
    pub sponsee_status: Option<SponseeStatus>,
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self {
            active_role: Role::Donor,
            gateway_outcome: Outcome::Approved,
            report_access_enabled: true,
            shelter_account_status: ShelterStatus::Approved,
            login_lockout: false,
            account_suspended: false,
            report_publication_outcome: Outcome::Approved,
            sponsee_status: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DemoScenarioPatch {
    pub active_role: Option<Role>,
    pub gateway_outcome: Option<Outcome>,
    pub report_access_enabled: Option<bool>,
    pub shelter_account_status: Option<ShelterStatus>,
    pub login_lockout: Option<bool>,
    pub account_suspended: Option<bool>,
    pub report_publication_outcome: Option<Outcome>,
    pub sponsee_status: Option<SponseeStatus>,
    #[serde(default)]
    pub clear_sponsee_status: bool,
}

impl DemoScenario {
    pub fn apply(&mut self, patch: DemoScenarioPatch) {
        if let Some(role) = patch.active_role {
            self.active_role = role;
        }
        if let Some(outcome) = patch.gateway_outcome {
            self.gateway_outcome = outcome;
        }
        if let Some(enabled) = patch.report_access_enabled {
            self.report_access_enabled = enabled;
        }
        if let Some(status) = patch.shelter_account_status {
            self.shelter_account_status = status;
        }
        if let Some(locked) = patch.login_lockout {
            self.login_lockout = locked;
        }
        if let Some(suspended) = patch.account_suspended {
            self.account_suspended = suspended;
        }
        if let Some(outcome) = patch.report_publication_outcome {
            self.report_publication_outcome = outcome;
        }
        if patch.clear_sponsee_status {
            self.sponsee_status = None;
        } else if let Some(status) = patch.sponsee_status {
            self.sponsee_status = Some(status);
        }
    }

    pub fn effective_sponsee_status(&self, actual: SponseeStatus) -> SponseeStatus {
        self.sponsee_status.unwrap_or(actual)
    }
}
