//! Automation engine — processes one campaign config per tick.
//!
//! Per config the pass walks `Evaluating → (Skipped | Running) → Done`:
//! the gates are config active, scheduled time matching the current
//! civil minute, and not having already run today (by the civil date
//! of `last_run_at` — checked even when the time matches, so a
//! duplicate or overlapping tick is a no-op). A completed pass writes
//! `last_run_at` once, after all sub-items, regardless of per-item
//! outcomes. There is no rollback and no within-tick retry; the next
//! opportunity is tomorrow's slot.

use std::sync::Arc;

use revenda_core::{AutomationConfig, MessageTemplate, Result, Storage, SubItem};
use serde::Serialize;

use crate::clock::{civil_date_of, Clock};
use crate::cohort;
use crate::dispatch::Dispatch;
use crate::payload;

/// Outcome of one sub-item within a pass. Outcomes are independent:
/// one failure never aborts the siblings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubItemOutcome {
    Success { clients: usize },
    WebhookFailed,
    NoClients,
    Skipped { reason: &'static str },
    Error { message: String },
}

/// Per-sub-item record returned by the manual trigger.
#[derive(Debug, Clone, Serialize)]
pub struct SubItemReport {
    pub sub_item_id: String,
    pub name: String,
    pub outcome: SubItemOutcome,
}

pub struct AutomationEngine {
    storage: Arc<dyn Storage>,
    dispatcher: Arc<dyn Dispatch>,
    clock: Arc<dyn Clock>,
}

impl AutomationEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        dispatcher: Arc<dyn Dispatch>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            clock,
        }
    }

    /// Scheduled entry point. Returns `None` when the config was
    /// skipped (inactive, wrong minute, or already ran today).
    pub async fn run_scheduled(
        &self,
        config: &AutomationConfig,
    ) -> Result<Option<Vec<SubItemReport>>> {
        if !config.is_active {
            tracing::debug!("automation '{}' inactive, skipping", config.automation_type);
            return Ok(None);
        }
        if config.scheduled_time != self.clock.civil_time_string() {
            return Ok(None);
        }
        if let Some(last_run) = config.last_run_at {
            if civil_date_of(last_run) == self.clock.civil_date() {
                tracing::info!(
                    "automation '{}' already ran today, skipping",
                    config.automation_type
                );
                return Ok(None);
            }
        }
        Ok(Some(self.process(config).await?))
    }

    /// Manual trigger for operator testing: ignores the active flag,
    /// the schedule, and the already-ran-today suppression.
    pub async fn run_manual(&self, config: &AutomationConfig) -> Result<Vec<SubItemReport>> {
        tracing::info!("manual trigger for automation '{}'", config.automation_type);
        self.process(config).await
    }

    async fn process(&self, config: &AutomationConfig) -> Result<Vec<SubItemReport>> {
        // One template fetch per pass, shared by every sub-item.
        let templates = self.storage.get_all_message_templates().await?;
        let today = self.clock.civil_date();

        tracing::info!(
            "🔔 processing automation '{}' ({} sub-items)",
            config.automation_type,
            config.sub_items.len()
        );

        let mut reports = Vec::with_capacity(config.sub_items.len());
        let mut aborted = false;
        for item in &config.sub_items {
            match self.process_sub_item(config, item, &templates, today).await {
                Ok(outcome) => {
                    tracing::info!(
                        "automation '{}' sub-item '{}': {:?}",
                        config.automation_type,
                        item.id,
                        outcome
                    );
                    reports.push(report(item, outcome));
                }
                Err(e) => {
                    // Storage is down; the remaining sub-items would hit
                    // the same wall. Abort this config's pass and leave
                    // last_run_at untouched so the next tick can retry.
                    tracing::error!(
                        "automation '{}' sub-item '{}' storage failure: {e}",
                        config.automation_type,
                        item.id
                    );
                    reports.push(report(
                        item,
                        SubItemOutcome::Error {
                            message: e.to_string(),
                        },
                    ));
                    aborted = true;
                    break;
                }
            }
        }

        if !aborted {
            self.storage
                .set_last_run_at(config.automation_type, self.clock.now_utc())
                .await?;
        }
        Ok(reports)
    }

    async fn process_sub_item(
        &self,
        config: &AutomationConfig,
        item: &SubItem,
        templates: &[MessageTemplate],
        today: chrono::NaiveDate,
    ) -> Result<SubItemOutcome> {
        if !item.active {
            return Ok(SubItemOutcome::Skipped { reason: "inactive" });
        }
        let Some(template_id) = item.template_id else {
            return Ok(SubItemOutcome::Skipped {
                reason: "no template configured",
            });
        };

        let clients =
            cohort::select(&*self.storage, config.automation_type, &item.id, today).await?;
        if clients.is_empty() {
            return Ok(SubItemOutcome::NoClients);
        }

        let Some(template) = payload::resolve(templates, template_id) else {
            tracing::warn!(
                "automation '{}' sub-item '{}': template {template_id} not found",
                config.automation_type,
                item.id
            );
            return Ok(SubItemOutcome::Skipped {
                reason: "template not found",
            });
        };

        let body = payload::build_payload(config, item, template, &clients, self.clock.now_utc());
        if self.dispatcher.send(&config.webhook_url, &body).await {
            Ok(SubItemOutcome::Success {
                clients: clients.len(),
            })
        } else {
            Ok(SubItemOutcome::WebhookFailed)
        }
    }
}

fn report(item: &SubItem, outcome: SubItemOutcome) -> SubItemReport {
    SubItemReport {
        sub_item_id: item.id.clone(),
        name: item.name.clone(),
        outcome,
    }
}
