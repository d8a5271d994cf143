//! Status machines for sponsorships and reports. Every status change goes
//! through one of these functions; anything not listed is refused.

use std::fmt;

use serde::Deserialize;

use crate::db::models::{ReportStatus, SponsorshipStatus};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SponsorshipAction {
    Cancel,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    /// Draft -> Pending, or a rejected report resubmitted.
    Submit,
    Approve,
    Publish,
    Reject,
}

impl fmt::Display for SponsorshipAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancel")
    }
}

impl fmt::Display for ReportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportAction::Submit => "submit",
            ReportAction::Approve => "approve",
            ReportAction::Publish => "publish",
            ReportAction::Reject => "reject",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a {entity} that is {from}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub action: String,
}

pub fn next_sponsorship_status(
    current: SponsorshipStatus,
    action: SponsorshipAction,
) -> Result<SponsorshipStatus, TransitionError> {
    match (current, action) {
        (SponsorshipStatus::Active, SponsorshipAction::Cancel) => Ok(SponsorshipStatus::Cancelled),
        (from, action) => Err(TransitionError {
            entity: "sponsorship",
            from: from.to_string(),
            action: action.to_string(),
        }),
    }
}

pub fn next_report_status(current: ReportStatus, action: ReportAction) -> Result<ReportStatus, TransitionError> {
    use ReportAction::*;
    use ReportStatus::*;

    match (current, action) {
        (Draft | Rejected, Submit) => Ok(Pending),
        (Pending, Approve) => Ok(Approved),
        (Pending | Approved, Publish) => Ok(Published),
        (Pending | Approved, Reject) => Ok(Rejected),
        (from, action) => Err(TransitionError {
            entity: "report",
            from: from.to_string(),
            action: action.to_string(),
        }),
    }
}
