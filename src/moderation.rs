//! Chat moderation: donors and shelters may not exchange contact details.

use std::sync::LazyLock;

use regex::Regex;

/// Lowercase, accent-free keywords that mark an attempt to share contact info.
const BLOCKED_KEYWORDS: &[&str] = &[
    "telefono",
    "celular",
    "whatsapp",
    "telegram",
    "correo",
    "email",
    "e-mail",
    "instagram",
    "facebook",
    "direccion",
];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex"));

// Seven or more digits, allowing spaces, dots and dashes between them.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d(?:[\s.-]*\d){6,}").expect("valid phone regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked { reason: String },
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

pub fn review_message(body: &str) -> Verdict {
    let normalized = fold_accents(&body.to_lowercase());
    if let Some(keyword) = BLOCKED_KEYWORDS.iter().find(|k| normalized.contains(*k)) {
        return Verdict::Blocked { reason: format!("mentions \"{}\"", keyword) };
    }
    if EMAIL_RE.is_match(body) {
        return Verdict::Blocked { reason: "contains an email address".to_string() };
    }
    if PHONE_RE.is_match(body) {
        return Verdict::Blocked { reason: "contains a phone number".to_string() };
    }
    Verdict::Allowed
}
