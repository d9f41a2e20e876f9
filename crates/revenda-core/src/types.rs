//! Domain types for the Revenda back office.
//!
//! Civil dates (`expiry_date`, `activation_date`) are `NaiveDate`,
//! serialized as `YYYY-MM-DD`. They deliberately carry no time or
//! timezone component: all date arithmetic in the scheduler is exact
//! calendar-day comparison, and a timestamp would reintroduce drift.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of recurring campaign kinds. Doubles as the unique
/// key of an [`AutomationConfig`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomationType {
    /// Billing reminders before (and on) the expiry day.
    #[serde(rename = "cobrancas")]
    Cobrancas,
    /// Win-back messages after the subscription lapsed.
    #[serde(rename = "reativacao")]
    Reativacao,
    /// Welcome/onboarding messages for fresh activations.
    #[serde(rename = "novosClientes")]
    NovosClientes,
}

impl AutomationType {
    pub fn as_key(&self) -> &'static str {
        match self {
            AutomationType::Cobrancas => "cobrancas",
            AutomationType::Reativacao => "reativacao",
            AutomationType::NovosClientes => "novosClientes",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "cobrancas" => Some(AutomationType::Cobrancas),
            "reativacao" => Some(AutomationType::Reativacao),
            "novosClientes" => Some(AutomationType::NovosClientes),
            _ => None,
        }
    }
}

impl std::fmt::Display for AutomationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// One configurable rule inside an automation (e.g. "expiring in 3
/// days"). Sub-items are value objects embedded in the parent config
/// and replaced wholesale on update — they are not separate rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubItem {
    /// Key unique within the parent config, e.g. `"3days"`.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Sub-item switch; both this and the config's `is_active` must be
    /// on for the sub-item to fire.
    pub active: bool,
    /// Message template to send; sub-item is skipped when absent.
    #[serde(default)]
    pub template_id: Option<i64>,
    /// Last-known cohort size. Advisory, shown in the dashboard only —
    /// never used for scheduling decisions.
    #[serde(default)]
    pub client_count: Option<u32>,
}

/// One recurring campaign definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub automation_type: AutomationType,
    pub is_active: bool,
    /// Civil time-of-day `HH:MM` (24h) in the panel timezone.
    pub scheduled_time: String,
    /// Outbound messaging channel, owned by the connection service.
    #[serde(default)]
    pub whatsapp_instance_id: Option<String>,
    pub sub_items: Vec<SubItem>,
    /// Destination for dispatch payloads.
    pub webhook_url: String,
    /// Last completed processing pass. Written once per pass, after
    /// all sub-items — the civil date of this timestamp is what
    /// enforces at-most-once-per-day.
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Subscription lifecycle state, literals preserved from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Ativa,
    Inativa,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Ativa => "Ativa",
            SubscriptionStatus::Inativa => "Inativa",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "Ativa" => Some(SubscriptionStatus::Ativa),
            "Inativa" => Some(SubscriptionStatus::Inativa),
            _ => None,
        }
    }
}

/// A subscriber record. Owned by the CRUD layer; the scheduler reads
/// it for cohort selection and flips `subscription_status` during
/// housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub expiry_date: NaiveDate,
    pub activation_date: NaiveDate,
    pub subscription_status: SubscriptionStatus,
    pub value: f64,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
}

/// A stored message template. `content` keeps its `{variable}`
/// placeholders raw; substitution happens downstream of the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automation_type_key_round_trip() {
        for t in [
            AutomationType::Cobrancas,
            AutomationType::Reativacao,
            AutomationType::NovosClientes,
        ] {
            assert_eq!(AutomationType::from_key(t.as_key()), Some(t));
        }
        assert_eq!(AutomationType::from_key("billing"), None);
    }

    #[test]
    fn automation_type_serde_uses_panel_literals() {
        let json = serde_json::to_string(&AutomationType::NovosClientes).unwrap();
        assert_eq!(json, "\"novosClientes\"");
    }

    #[test]
    fn client_dates_serialize_as_plain_days() {
        let client = Client {
            id: 1,
            name: "Ana".into(),
            phone: "5511999990000".into(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            activation_date: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
            subscription_status: SubscriptionStatus::Ativa,
            value: 35.0,
            plan: None,
            system: None,
        };
        let v = serde_json::to_value(&client).unwrap();
        assert_eq!(v["expiry_date"], "2026-03-14");
        assert_eq!(v["activation_date"], "2026-02-14");
        assert_eq!(v["subscription_status"], "Ativa");
    }

    #[test]
    fn sub_items_tolerate_missing_optional_fields() {
        let item: SubItem =
            serde_json::from_str(r#"{"id":"3days","name":"3 dias antes","active":true}"#).unwrap();
        assert_eq!(item.template_id, None);
        assert_eq!(item.client_count, None);
    }
}
