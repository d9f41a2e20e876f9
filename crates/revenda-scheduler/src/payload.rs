//! Outbound payload shaping.
//!
//! The scheduler does NOT substitute `{variable}` placeholders. The
//! payload carries the raw template content next to the structured
//! client fields, and the webhook consumer renders the final message.
//! Wire field names keep the panel's camelCase.

use chrono::{DateTime, Utc};
use revenda_core::{AutomationConfig, Client, MessageTemplate, SubItem};
use serde_json::{json, Value};

/// Look up a template by id in the batch fetched once per engine pass.
pub fn resolve(templates: &[MessageTemplate], template_id: i64) -> Option<&MessageTemplate> {
    templates.iter().find(|t| t.id == template_id)
}

/// Build the JSON body POSTed to the automation webhook.
pub fn build_payload(
    config: &AutomationConfig,
    item: &SubItem,
    template: &MessageTemplate,
    clients: &[Client],
    executed_at: DateTime<Utc>,
) -> Value {
    json!({
        "automationType": config.automation_type,
        "subItemId": item.id,
        "subItemName": item.name,
        "scheduledTime": config.scheduled_time,
        "whatsappInstanceId": config.whatsapp_instance_id,
        "template": {
            "id": template.id,
            "title": template.title,
            "content": template.content,
            "imageUrl": template.image_url,
        },
        "clients": clients.iter().map(project_client).collect::<Vec<_>>(),
        "clientCount": clients.len(),
        "executedAt": executed_at.to_rfc3339(),
    })
}

fn project_client(client: &Client) -> Value {
    json!({
        "id": client.id,
        "name": client.name,
        "phone": client.phone,
        "expiryDate": client.expiry_date.format("%Y-%m-%d").to_string(),
        "activationDate": client.activation_date.format("%Y-%m-%d").to_string(),
        "value": client.value,
        "plan": client.plan,
        "system": client.system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use revenda_core::{AutomationType, SubscriptionStatus};

    fn fixture() -> (AutomationConfig, SubItem, MessageTemplate, Vec<Client>) {
        let config = AutomationConfig {
            automation_type: AutomationType::Cobrancas,
            is_active: true,
            scheduled_time: "09:30".into(),
            whatsapp_instance_id: Some("inst-1".into()),
            sub_items: vec![],
            webhook_url: "https://hooks.example/cobrancas".into(),
            last_run_at: None,
        };
        let item = SubItem {
            id: "3days".into(),
            name: "3 dias antes".into(),
            active: true,
            template_id: Some(7),
            client_count: None,
        };
        let template = MessageTemplate {
            id: 7,
            title: "Lembrete".into(),
            content: "Olá {nome}, seu plano vence em {dias} dias.".into(),
            image_url: None,
        };
        let clients = vec![Client {
            id: 11,
            name: "Carla".into(),
            phone: "5511988887777".into(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 13).unwrap(),
            activation_date: NaiveDate::from_ymd_opt(2026, 1, 13).unwrap(),
            subscription_status: SubscriptionStatus::Ativa,
            value: 35.0,
            plan: Some("Mensal".into()),
            system: Some("p2p".into()),
        }];
        (config, item, template, clients)
    }

    #[test]
    fn resolve_finds_by_id() {
        let (_, _, template, _) = fixture();
        let templates = vec![template];
        assert!(resolve(&templates, 7).is_some());
        assert!(resolve(&templates, 8).is_none());
    }

    #[test]
    fn payload_carries_raw_template_and_projected_clients() {
        let (config, item, template, clients) = fixture();
        let executed = Utc.with_ymd_and_hms(2026, 3, 10, 12, 30, 0).unwrap();
        let payload = build_payload(&config, &item, &template, &clients, executed);

        assert_eq!(payload["automationType"], "cobrancas");
        assert_eq!(payload["subItemId"], "3days");
        assert_eq!(payload["whatsappInstanceId"], "inst-1");
        assert_eq!(payload["clientCount"], 1);
        // Placeholders survive untouched; substitution is downstream.
        assert_eq!(
            payload["template"]["content"],
            "Olá {nome}, seu plano vence em {dias} dias."
        );
        assert_eq!(payload["clients"][0]["expiryDate"], "2026-03-13");
        assert_eq!(payload["clients"][0]["phone"], "5511988887777");
        // Internal-only fields stay internal.
        assert!(payload["clients"][0].get("subscription_status").is_none());
        assert_eq!(payload["executedAt"], executed.to_rfc3339());
    }
}
