//! Cohort selection: which clients a sub-item targets today.
//!
//! Every predicate is an exact calendar-day match, not a range. A
//! client whose expiry is 3 days out matches the "3days" slot today
//! and only the "2days" slot tomorrow, so each passing day hits at
//! most one slot per offset.

use chrono::{Duration, NaiveDate};
use revenda_core::{AutomationType, Client, Result, Storage};

/// Date-offset predicate families, offsets in whole civil days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePredicate {
    /// `expiry_date == today + N`.
    ExpiringIn(i64),
    /// `expiry_date == today - N`.
    ExpiredFor(i64),
    /// `activation_date == today - N`.
    ActiveFor(i64),
}

impl DatePredicate {
    pub fn matches(&self, client: &Client, today: NaiveDate) -> bool {
        match *self {
            DatePredicate::ExpiringIn(n) => today
                .checked_add_signed(Duration::days(n))
                .is_some_and(|d| client.expiry_date == d),
            DatePredicate::ExpiredFor(n) => today
                .checked_sub_signed(Duration::days(n))
                .is_some_and(|d| client.expiry_date == d),
            DatePredicate::ActiveFor(n) => today
                .checked_sub_signed(Duration::days(n))
                .is_some_and(|d| client.activation_date == d),
        }
    }
}

/// The sub-item id convention. Offsets are declared here by id, not
/// stored on the config rows — the dashboard creates sub-items with
/// these well-known ids.
pub fn predicate_for(automation: AutomationType, sub_item_id: &str) -> Option<DatePredicate> {
    use AutomationType::*;
    use DatePredicate::*;
    let predicate = match (automation, sub_item_id) {
        (Cobrancas, "7days") => ExpiringIn(7),
        (Cobrancas, "3days") => ExpiringIn(3),
        (Cobrancas, "2days") => ExpiringIn(2),
        (Cobrancas, "1day") => ExpiringIn(1),
        (Cobrancas, "today") => ExpiringIn(0),
        (Reativacao, "1day") => ExpiredFor(1),
        (Reativacao, "3days") => ExpiredFor(3),
        (Reativacao, "7days") => ExpiredFor(7),
        (Reativacao, "15days") => ExpiredFor(15),
        (Reativacao, "30days") => ExpiredFor(30),
        (NovosClientes, "welcome") => ActiveFor(0),
        (NovosClientes, "1day") => ActiveFor(1),
        (NovosClientes, "3days") => ActiveFor(3),
        (NovosClientes, "7days") => ActiveFor(7),
        _ => return None,
    };
    Some(predicate)
}

/// Fetch the clients a sub-item targets on `today`.
///
/// An unmapped `(automation, sub_item_id)` pair is a configuration
/// gap, not an error: it logs a warning and selects nobody. Storage
/// failures propagate.
pub async fn select(
    storage: &dyn Storage,
    automation: AutomationType,
    sub_item_id: &str,
    today: NaiveDate,
) -> Result<Vec<Client>> {
    let Some(predicate) = predicate_for(automation, sub_item_id) else {
        tracing::warn!(
            "no cohort rule for automation '{automation}' sub-item '{sub_item_id}', selecting nobody"
        );
        return Ok(Vec::new());
    };

    let clients = storage.get_all_clients().await?;
    Ok(clients
        .into_iter()
        .filter(|c| predicate.matches(c, today))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revenda_core::{MemoryStorage, SubscriptionStatus};

    fn client(id: i64, expiry: NaiveDate, activation: NaiveDate) -> Client {
        Client {
            id,
            name: format!("cliente {id}"),
            phone: format!("55119999000{id}"),
            expiry_date: expiry,
            activation_date: activation,
            subscription_status: SubscriptionStatus::Ativa,
            value: 30.0,
            plan: None,
            system: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiring_in_is_exact_day_not_range() {
        let today = day(2026, 3, 10);
        let predicate = DatePredicate::ExpiringIn(3);

        let exact = client(1, day(2026, 3, 13), day(2026, 1, 1));
        let closer = client(2, day(2026, 3, 12), day(2026, 1, 1));
        let further = client(3, day(2026, 3, 14), day(2026, 1, 1));

        assert!(predicate.matches(&exact, today));
        assert!(!predicate.matches(&closer, today));
        assert!(!predicate.matches(&further, today));
    }

    #[test]
    fn expired_for_counts_backwards() {
        let today = day(2026, 3, 10);
        let predicate = DatePredicate::ExpiredFor(7);
        assert!(predicate.matches(&client(1, day(2026, 3, 3), day(2026, 1, 1)), today));
        assert!(!predicate.matches(&client(2, day(2026, 3, 4), day(2026, 1, 1)), today));
    }

    #[test]
    fn active_for_uses_activation_date() {
        let today = day(2026, 3, 10);
        let predicate = DatePredicate::ActiveFor(1);
        assert!(predicate.matches(&client(1, day(2027, 1, 1), day(2026, 3, 9)), today));
        assert!(!predicate.matches(&client(2, day(2027, 1, 1), day(2026, 3, 10)), today));
    }

    #[test]
    fn mapping_covers_known_slots_only() {
        assert_eq!(
            predicate_for(AutomationType::Cobrancas, "today"),
            Some(DatePredicate::ExpiringIn(0))
        );
        assert_eq!(
            predicate_for(AutomationType::Reativacao, "15days"),
            Some(DatePredicate::ExpiredFor(15))
        );
        assert_eq!(
            predicate_for(AutomationType::NovosClientes, "welcome"),
            Some(DatePredicate::ActiveFor(0))
        );
        // reativacao has no "today" slot; ids don't cross families.
        assert_eq!(predicate_for(AutomationType::Reativacao, "today"), None);
    }

    #[tokio::test]
    async fn select_filters_exactly_the_matching_clients() {
        let storage = MemoryStorage::new();
        let today = day(2026, 3, 10);
        storage.add_client(client(1, day(2026, 3, 13), day(2026, 1, 1)));
        storage.add_client(client(2, day(2026, 3, 13), day(2026, 1, 1)));
        storage.add_client(client(3, day(2026, 3, 20), day(2026, 1, 1)));

        let cohort = select(&storage, AutomationType::Cobrancas, "3days", today)
            .await
            .unwrap();
        let ids: Vec<i64> = cohort.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn unmapped_sub_item_selects_nobody() {
        let storage = MemoryStorage::new();
        storage.add_client(client(1, day(2026, 3, 13), day(2026, 1, 1)));
        let cohort = select(&storage, AutomationType::Cobrancas, "90days", day(2026, 3, 10))
            .await
            .unwrap();
        assert!(cohort.is_empty());
    }
}
