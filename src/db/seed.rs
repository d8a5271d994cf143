use chrono::{NaiveDate, TimeZone, Utc};

use super::models::*;
use super::StoreSnapshot;
use crate::demo::DemoScenario;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn s(value: &str) -> String {
    value.to_string()
}

/// Initial demo data, loaded when nothing was persisted and on reset.
pub fn snapshot() -> StoreSnapshot {
    StoreSnapshot {
        users: users(),
        sponsees: sponsees(),
        shelters: shelters(),
        payment_methods: vec![PaymentMethod {
            id: s("pm-1"),
            donor_id: s("u-d1"),
            brand: s("Visa"),
            last4: s("4242"),
            token: s("tok_sim_4242"),
            in_use: true,
        }],
        sponsorships: Vec::new(),
        reports: reports(),
        messages: Vec::new(),
        audit: audit(),
        scenario: DemoScenario::default(),
    }
}

fn users() -> Vec<User> {
    vec![
        User {
            id: s("u-admin"),
            role: Role::Admin,
            name: s("Administración iSponsor"),
            email: s("admin@isponsor.org"),
            status: None,
        },
        User {
            id: s("u-d1"),
            role: Role::Donor,
            name: s("Laura Méndez"),
            email: s("laura@example.com"),
            status: None,
        },
        User {
            id: s("u-ch1"),
            role: Role::Shelter,
            name: s("Hogar Esperanza"),
            email: s("contacto@hogaresperanza.org"),
            status: Some(ShelterStatus::Approved),
        },
        User {
            id: s("u-ch2"),
            role: Role::Shelter,
            name: s("Casa Sol"),
            email: s("hola@casasol.org"),
            status: Some(ShelterStatus::Pending),
        },
    ]
}

fn shelters() -> Vec<Shelter> {
    vec![
        Shelter {
            id: s("u-ch1"),
            name: s("Hogar Esperanza"),
            status: ShelterStatus::Approved,
            location: s("Quito, Ecuador"),
            description: s("Residential home for children aged 4 to 17."),
            representative: s("María Torres"),
            founding_date: date(2009, 4, 12),
            phone: s("+593 2 555 0101"),
            email: s("contacto@hogaresperanza.org"),
            website: Some(s("https://hogaresperanza.org")),
        },
        Shelter {
            id: s("u-ch2"),
            name: s("Casa Sol"),
            status: ShelterStatus::Pending,
            location: s("Cuenca, Ecuador"),
            description: s("Day centre offering meals and tutoring."),
            representative: s("Jorge Paredes"),
            founding_date: date(2018, 9, 3),
            phone: s("+593 7 555 0202"),
            email: s("hola@casasol.org"),
            website: None,
        },
    ]
}

fn sponsees() -> Vec<Sponsee> {
    vec![
        Sponsee {
            id: s("s-1"),
            name: s("Mateo"),
            age: 8,
            gender: s("M"),
            need: s("School supplies and uniform"),
            shelter_id: s("u-ch1"),
            status: SponseeStatus::Active,
            photo: None,
        },
        Sponsee {
            id: s("s-2"),
            name: s("Valentina"),
            age: 17,
            gender: s("F"),
            need: s("Vocational training"),
            shelter_id: s("u-ch1"),
            status: SponseeStatus::SelfSufficient,
            photo: None,
        },
        Sponsee {
            id: s("s-3"),
            name: s("Camila"),
            age: 6,
            gender: s("F"),
            need: s("Nutrition programme"),
            shelter_id: s("u-ch2"),
            status: SponseeStatus::Active,
            photo: None,
        },
    ]
}

fn reports() -> Vec<Report> {
    vec![
        Report {
            id: s("r-1"),
            sponsee_id: s("s-1"),
            title: s("First quarter progress"),
            status: ReportStatus::Published,
            summary: Some(s("Mateo started third grade and joined the reading club.")),
            report_type: Some(s("quarterly")),
            period: Some(s("2026-Q1")),
            content: None,
            shelter_id: Some(s("u-ch1")),
        },
        Report {
            id: s("r-2"),
            sponsee_id: s("s-1"),
            title: s("Second quarter progress"),
            status: ReportStatus::Pending,
            summary: Some(s("Grades improved in mathematics.")),
            report_type: Some(s("quarterly")),
            period: Some(s("2026-Q2")),
            content: None,
            shelter_id: Some(s("u-ch1")),
        },
        Report {
            id: s("r-3"),
            sponsee_id: s("s-2"),
            title: s("Apprenticeship update"),
            status: ReportStatus::Draft,
            summary: None,
            report_type: Some(s("milestone")),
            period: None,
            content: None,
            shelter_id: Some(s("u-ch1")),
        },
    ]
}

fn audit() -> Vec<AuditEvent> {
    vec![
        AuditEvent {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).single().unwrap_or_default(),
            actor: s("Admin"),
            action: s("Approve shelter"),
            entity: s("shelter"),
            result: AuditResult::Approved,
            reference: Some(s("u-ch1")),
        },
        AuditEvent {
            timestamp: Utc.with_ymd_and_hms(2026, 4, 2, 14, 30, 0).single().unwrap_or_default(),
            actor: s("Admin"),
            action: s("Publish report"),
            entity: s("report"),
            result: AuditResult::Ok,
            reference: Some(s("r-1")),
        },
    ]
}
