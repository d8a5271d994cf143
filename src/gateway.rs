//! Handoff messages for the simulated payment gateway.
//!
//! The gateway endpoint receives a [`GatewayRequest`] as query parameters,
//! decides an outcome, and forwards a [`GatewayCallback`] to the callback
//! endpoint. Only the callback touches the store, and only on approval.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::demo::Outcome;

pub const GATEWAY_PATH: &str = "/gateway";
pub const CALLBACK_PATH: &str = "/gateway/callback";
pub const RETRY_PATH: &str = "/gateway/retry";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayContext {
    /// `id` is the sponsee being sponsored.
    Sponsorship,
    /// `id` is the donor registering a card.
    PaymentMethod,
}

impl GatewayContext {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayContext::Sponsorship => "sponsorship",
            GatewayContext::PaymentMethod => "payment_method",
        }
    }
}

/// Card brand and last four digits, JSON-encoded into the `card` parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub context: GatewayContext,
    pub id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub method_id: Option<String>,
    #[serde(default)]
    pub card: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallback {
    pub context: GatewayContext,
    pub id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub method_id: Option<String>,
    #[serde(default)]
    pub card: Option<String>,
    pub result: Outcome,
}

fn append_common(
    ser: &mut form_urlencoded::Serializer<'_, String>,
    context: GatewayContext,
    id: &str,
    amount: Option<f64>,
    payment_date: Option<NaiveDate>,
    method_id: Option<&str>,
    card: Option<&str>,
) {
    ser.append_pair("context", context.as_str());
    ser.append_pair("id", id);
    if let Some(amount) = amount {
        ser.append_pair("amount", &amount.to_string());
    }
    if let Some(date) = payment_date {
        ser.append_pair("paymentDate", &date.format("%Y-%m-%d").to_string());
    }
    if let Some(method_id) = method_id {
        ser.append_pair("methodId", method_id);
    }
    if let Some(card) = card {
        ser.append_pair("card", card);
    }
}

impl GatewayRequest {
    pub fn with_card(mut self, card: &CardDetails) -> Result<Self, serde_json::Error> {
        self.card = Some(serde_json::to_string(card)?);
        Ok(self)
    }

    pub fn query(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        append_common(
            &mut ser,
            self.context,
            &self.id,
            self.amount,
            self.payment_date,
            self.method_id.as_deref(),
            self.card.as_deref(),
        );
        ser.finish()
    }

    pub fn gateway_url(&self) -> String {
        format!("{}?{}", GATEWAY_PATH, self.query())
    }

    pub fn retry_url(&self) -> String {
        format!("{}?{}", RETRY_PATH, self.query())
    }

    /// What the gateway does: attach the outcome, keep everything else.
    pub fn resolve(self, result: Outcome) -> GatewayCallback {
        GatewayCallback {
            context: self.context,
            id: self.id,
            amount: self.amount,
            payment_date: self.payment_date,
            method_id: self.method_id,
            card: self.card,
            result,
        }
    }
}

impl GatewayCallback {
    pub fn request(&self) -> GatewayRequest {
        GatewayRequest {
            context: self.context,
            id: self.id.clone(),
            amount: self.amount,
            payment_date: self.payment_date,
            method_id: self.method_id.clone(),
            card: self.card.clone(),
        }
    }

    pub fn callback_url(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        append_common(
            &mut ser,
            self.context,
            &self.id,
            self.amount,
            self.payment_date,
            self.method_id.as_deref(),
            self.card.as_deref(),
        );
        ser.append_pair(
            "result",
            match self.result {
                Outcome::Approved => "Approved",
                Outcome::Rejected => "Rejected",
            },
        );
        format!("{}?{}", CALLBACK_PATH, ser.finish())
    }

    pub fn card_details(&self) -> Result<Option<CardDetails>, serde_json::Error> {
        self.card.as_deref().map(serde_json::from_str).transpose()
    }
}
