//! Compliance view over the audit log: filtering and CSV export.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::models::AuditEvent;

pub const CSV_HEADER: &str = "timestamp,actor,action,entity,result,reference";

/// Each criterion is optional; blank or missing criteria match everything and
/// the remaining ones are ANDed.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub result: Option<String>,
    /// Case-insensitive substring of the action or the entity.
    pub q: Option<String>,
    /// Prefix of the RFC 3339 timestamp, e.g. `2026-04` or `2026-04-02`.
    pub date: Option<String>,
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(actor) = criterion(&self.actor) {
            if !event.actor.eq_ignore_ascii_case(actor) {
                return false;
            }
        }
        if let Some(result) = criterion(&self.result) {
            if !event.result.as_str().eq_ignore_ascii_case(result) {
                return false;
            }
        }
        if let Some(q) = criterion(&self.q) {
            let q = q.to_lowercase();
            if !event.action.to_lowercase().contains(&q) && !event.entity.to_lowercase().contains(&q) {
                return false;
            }
        }
        if let Some(date) = criterion(&self.date) {
            if !event.timestamp.to_rfc3339().starts_with(date) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, events: &'a [AuditEvent]) -> Vec<&'a AuditEvent> {
        events.iter().filter(|e| self.matches(e)).collect()
    }
}

fn csv_escape(s: &str) -> String {
    // Flatten line breaks so every row stays on one line.
    let s = s.replace("\r\n", " ").replace(['\r', '\n'], " ");
    if s.contains(',') || s.contains('"') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s
    }
}

pub fn to_csv<'a>(events: impl IntoIterator<Item = &'a AuditEvent>) -> String {
    let mut w = String::new();
    w.push_str(CSV_HEADER);
    w.push('\n');
    for e in events {
        let reference = e.reference.clone().unwrap_or_default();
        w.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_escape(&e.timestamp.to_rfc3339()),
            csv_escape(&e.actor),
            csv_escape(&e.action),
            csv_escape(&e.entity),
            csv_escape(e.result.as_str()),
            csv_escape(&reference),
        ));
    }
    w
}

pub fn export_filename(today: NaiveDate) -> String {
    format!("audit-log-{}.csv", today.format("%Y-%m-%d"))
}
