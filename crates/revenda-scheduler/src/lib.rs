//! # Revenda Scheduler
//!
//! The automation core of the Revenda back office: wakes at the civil
//! times configured on the recurring campaigns, selects the affected
//! client cohorts by calendar-day arithmetic, and dispatches message
//! payloads to the outbound webhook.
//!
//! ## Design
//! - All wall-clock reasoning is pinned to the panel timezone (GMT-3,
//!   a fixed offset — never the host zone, never DST rules).
//! - At-most-once per civil day per campaign, enforced by comparing
//!   the civil date of `last_run_at` against today.
//! - Webhook delivery is best-effort: one POST, bounded timeout, no
//!   retry. Campaign messages are advisory, and a retry would risk
//!   duplicate sends.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio sleep until next HH:MM)
//!   ├── housekeeping: expired Ativa clients → Inativa
//!   └── for each due AutomationConfig → AutomationEngine
//!         └── for each active sub-item:
//!               cohort (exact-day predicate)
//!                 → payload (raw template + client fields)
//!                   → webhook POST (15s, no retry)
//! ```

pub mod clock;
pub mod cohort;
pub mod dispatch;
pub mod engine;
pub mod housekeeping;
pub mod payload;
pub mod runner;

pub use clock::{Clock, SystemClock};
pub use cohort::DatePredicate;
pub use dispatch::{Dispatch, WebhookDispatcher};
pub use engine::{AutomationEngine, SubItemOutcome, SubItemReport};
pub use runner::{Scheduler, SchedulerHandle};
