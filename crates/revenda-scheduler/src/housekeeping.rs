//! Subscription housekeeping: flip lapsed clients to inactive.
//!
//! Runs on every scheduler wake, not just campaign slots. A client
//! expiring today is NOT lapsed — only a civil expiry date strictly
//! before today counts.

use chrono::NaiveDate;
use revenda_core::{Result, Storage, SubscriptionStatus};

/// Set every `Ativa` client with `expiry_date < today` to `Inativa`.
/// Returns how many were flipped.
pub async fn deactivate_expired_clients(storage: &dyn Storage, today: NaiveDate) -> Result<usize> {
    let active = storage.get_active_clients().await?;
    let mut flipped = 0;
    for client in &active {
        if client.expiry_date < today {
            storage
                .set_subscription_status(client.id, SubscriptionStatus::Inativa)
                .await?;
            tracing::debug!(
                "client {} lapsed on {}, marked Inativa",
                client.id,
                client.expiry_date
            );
            flipped += 1;
        }
    }
    if flipped > 0 {
        tracing::info!("housekeeping: {flipped} expired clients deactivated");
    }
    Ok(flipped)
}
