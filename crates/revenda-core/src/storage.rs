//! Storage layer: the trait the scheduler consumes, plus the SQLite
//! implementation and an in-memory double for tests.
//!
//! Call volume is tiny (a handful of queries per scheduler wake), so
//! the SQLite backend holds one `rusqlite::Connection` behind a mutex
//! rather than a pool. Dates are stored as `YYYY-MM-DD` text and
//! timestamps as RFC 3339 text.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::error::{Result, RevendaError};
use crate::types::{
    AutomationConfig, AutomationType, Client, MessageTemplate, SubItem, SubscriptionStatus,
};

/// What the scheduler needs from persistence. The CRUD API implements
/// the same trait on its side; the scheduler never touches anything
/// beyond these calls.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_all_automation_configs(&self) -> Result<Vec<AutomationConfig>>;

    /// Record a completed processing pass for one automation.
    async fn set_last_run_at(
        &self,
        automation_type: AutomationType,
        when: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_all_clients(&self) -> Result<Vec<Client>>;

    /// Clients with `subscription_status == Ativa`, for housekeeping.
    async fn get_active_clients(&self) -> Result<Vec<Client>>;

    async fn set_subscription_status(
        &self,
        client_id: i64,
        status: SubscriptionStatus,
    ) -> Result<()>;

    async fn get_all_message_templates(&self) -> Result<Vec<MessageTemplate>>;
}

// ─── SQLite ───────────────────────────────────────────────

/// SQLite-backed storage.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the database and run migrations.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        tracing::debug!("sqlite schema ready at {}", path.display());
        Ok(storage)
    }

    /// In-memory database, handy for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RevendaError::Storage("connection mutex poisoned".into()))
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                expiry_date TEXT NOT NULL,          -- YYYY-MM-DD
                activation_date TEXT NOT NULL,      -- YYYY-MM-DD
                subscription_status TEXT NOT NULL DEFAULT 'Ativa',
                value REAL NOT NULL DEFAULT 0,
                plan TEXT,
                system TEXT
            );

            CREATE TABLE IF NOT EXISTS message_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                image_url TEXT
            );

            CREATE TABLE IF NOT EXISTS automation_configs (
                automation_type TEXT PRIMARY KEY,
                is_active INTEGER NOT NULL DEFAULT 1,
                scheduled_time TEXT NOT NULL,
                whatsapp_instance_id TEXT,
                sub_items TEXT NOT NULL DEFAULT '[]',  -- JSON array, replaced wholesale
                webhook_url TEXT NOT NULL,
                last_run_at TEXT                       -- RFC 3339
            );
            ",
        )?;
        Ok(())
    }

    /// Insert or replace a campaign definition. Used by the CRUD side
    /// and by tests; the scheduler itself only writes `last_run_at`.
    pub fn upsert_automation_config(&self, config: &AutomationConfig) -> Result<()> {
        let sub_items = serde_json::to_string(&config.sub_items)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO automation_configs
             (automation_type, is_active, scheduled_time, whatsapp_instance_id,
              sub_items, webhook_url, last_run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                config.automation_type.as_key(),
                config.is_active as i32,
                config.scheduled_time,
                config.whatsapp_instance_id,
                sub_items,
                config.webhook_url,
                config.last_run_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Insert a client and return its row id.
    pub fn insert_client(&self, client: &Client) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO clients
             (name, phone, expiry_date, activation_date, subscription_status, value, plan, system)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                client.name,
                client.phone,
                format_date(client.expiry_date),
                format_date(client.activation_date),
                client.subscription_status.as_str(),
                client.value,
                client.plan,
                client.system,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a template and return its row id.
    pub fn insert_template(&self, template: &MessageTemplate) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO message_templates (title, content, image_url) VALUES (?1, ?2, ?3)",
            params![template.title, template.content, template.image_url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_clients(&self, sql: &str) -> Result<Vec<Client>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut clients = Vec::new();
        for row in rows {
            let (id, name, phone, expiry, activation, status, value, plan, system) = row?;
            clients.push(Client {
                id,
                name,
                phone,
                expiry_date: parse_date(&expiry)?,
                activation_date: parse_date(&activation)?,
                subscription_status: SubscriptionStatus::from_str_opt(&status)
                    .ok_or_else(|| RevendaError::Storage(format!("unknown status '{status}'")))?,
                value,
                plan,
                system,
            });
        }
        Ok(clients)
    }
}

const CLIENT_COLUMNS: &str = "id, name, phone, expiry_date, activation_date, \
                              subscription_status, value, plan, system";

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_all_automation_configs(&self) -> Result<Vec<AutomationConfig>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT automation_type, is_active, scheduled_time, whatsapp_instance_id,
                    sub_items, webhook_url, last_run_at
             FROM automation_configs ORDER BY automation_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut configs = Vec::new();
        for row in rows {
            let (kind, active, time, instance, sub_items, url, last_run) = row?;
            let automation_type = AutomationType::from_key(&kind)
                .ok_or_else(|| RevendaError::Storage(format!("unknown automation '{kind}'")))?;
            let sub_items: Vec<SubItem> = serde_json::from_str(&sub_items)?;
            configs.push(AutomationConfig {
                automation_type,
                is_active: active != 0,
                scheduled_time: time,
                whatsapp_instance_id: instance,
                sub_items,
                webhook_url: url,
                last_run_at: last_run.as_deref().map(parse_timestamp).transpose()?,
            });
        }
        Ok(configs)
    }

    async fn set_last_run_at(
        &self,
        automation_type: AutomationType,
        when: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?.execute(
            "UPDATE automation_configs SET last_run_at = ?1 WHERE automation_type = ?2",
            params![when.to_rfc3339(), automation_type.as_key()],
        )?;
        Ok(())
    }

    async fn get_all_clients(&self) -> Result<Vec<Client>> {
        self.query_clients(&format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY id"))
    }

    async fn get_active_clients(&self) -> Result<Vec<Client>> {
        self.query_clients(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE subscription_status = 'Ativa' ORDER BY id"
        ))
    }

    async fn set_subscription_status(
        &self,
        client_id: i64,
        status: SubscriptionStatus,
    ) -> Result<()> {
        self.conn()?.execute(
            "UPDATE clients SET subscription_status = ?1 WHERE id = ?2",
            params![status.as_str(), client_id],
        )?;
        Ok(())
    }

    async fn get_all_message_templates(&self) -> Result<Vec<MessageTemplate>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, title, content, image_url FROM message_templates ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(MessageTemplate {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
                image_url: row.get(3)?,
            })
        })?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| RevendaError::InvalidDate(s.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RevendaError::Storage(format!("bad timestamp '{s}': {e}")))
}

// ─── In-memory ────────────────────────────────────────────

/// In-memory storage. Backs the scheduler tests behind the
/// `test-util` feature; never part of the production build.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
struct MemoryInner {
    configs: Vec<AutomationConfig>,
    clients: Vec<Client>,
    templates: Vec<MessageTemplate>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_config(&self, config: AutomationConfig) {
        self.lock().configs.push(config);
    }

    pub fn add_client(&self, client: Client) {
        self.lock().clients.push(client);
    }

    pub fn add_template(&self, template: MessageTemplate) {
        self.lock().templates.push(template);
    }

    /// Read back one config, for assertions.
    pub fn config(&self, automation_type: AutomationType) -> Option<AutomationConfig> {
        self.lock()
            .configs
            .iter()
            .find(|c| c.automation_type == automation_type)
            .cloned()
    }

    /// Read back one client, for assertions.
    pub fn client(&self, id: i64) -> Option<Client> {
        self.lock().clients.iter().find(|c| c.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A poisoned test double is already a failed test.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl Storage for MemoryStorage {
    async fn get_all_automation_configs(&self) -> Result<Vec<AutomationConfig>> {
        Ok(self.lock().configs.clone())
    }

    async fn set_last_run_at(
        &self,
        automation_type: AutomationType,
        when: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(config) = inner
            .configs
            .iter_mut()
            .find(|c| c.automation_type == automation_type)
        {
            config.last_run_at = Some(when);
        }
        Ok(())
    }

    async fn get_all_clients(&self) -> Result<Vec<Client>> {
        Ok(self.lock().clients.clone())
    }

    async fn get_active_clients(&self) -> Result<Vec<Client>> {
        Ok(self
            .lock()
            .clients
            .iter()
            .filter(|c| c.subscription_status == SubscriptionStatus::Ativa)
            .cloned()
            .collect())
    }

    async fn set_subscription_status(
        &self,
        client_id: i64,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(client) = inner.clients.iter_mut().find(|c| c.id == client_id) {
            client.subscription_status = status;
        }
        Ok(())
    }

    async fn get_all_message_templates(&self) -> Result<Vec<MessageTemplate>> {
        Ok(self.lock().templates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_client(expiry: NaiveDate) -> Client {
        Client {
            id: 0,
            name: "Bruno".into(),
            phone: "5521988887777".into(),
            expiry_date: expiry,
            activation_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            subscription_status: SubscriptionStatus::Ativa,
            value: 30.0,
            plan: Some("Mensal".into()),
            system: None,
        }
    }

    #[tokio::test]
    async fn sqlite_round_trips_clients() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let expiry = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let id = storage.insert_client(&sample_client(expiry)).unwrap();

        let clients = storage.get_all_clients().await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, id);
        assert_eq!(clients[0].expiry_date, expiry);
        assert_eq!(clients[0].plan.as_deref(), Some("Mensal"));
    }

    #[tokio::test]
    async fn sqlite_round_trips_configs_with_sub_items() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let config = AutomationConfig {
            automation_type: AutomationType::Cobrancas,
            is_active: true,
            scheduled_time: "09:30".into(),
            whatsapp_instance_id: Some("inst-1".into()),
            sub_items: vec![SubItem {
                id: "3days".into(),
                name: "3 dias antes".into(),
                active: true,
                template_id: Some(7),
                client_count: None,
            }],
            webhook_url: "https://hooks.example/cobrancas".into(),
            last_run_at: None,
        };
        storage.upsert_automation_config(&config).unwrap();

        let loaded = storage.get_all_automation_configs().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].sub_items.len(), 1);
        assert_eq!(loaded[0].sub_items[0].template_id, Some(7));
        assert_eq!(loaded[0].last_run_at, None);
    }

    #[tokio::test]
    async fn sqlite_set_last_run_at_persists() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let config = AutomationConfig {
            automation_type: AutomationType::Reativacao,
            is_active: true,
            scheduled_time: "10:00".into(),
            whatsapp_instance_id: None,
            sub_items: vec![],
            webhook_url: "https://hooks.example/reativacao".into(),
            last_run_at: None,
        };
        storage.upsert_automation_config(&config).unwrap();

        let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        storage
            .set_last_run_at(AutomationType::Reativacao, when)
            .await
            .unwrap();

        let loaded = storage.get_all_automation_configs().await.unwrap();
        assert_eq!(loaded[0].last_run_at, Some(when));
    }

    #[tokio::test]
    async fn sqlite_active_clients_filters_status() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let expiry = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let id_a = storage.insert_client(&sample_client(expiry)).unwrap();
        let id_b = storage.insert_client(&sample_client(expiry)).unwrap();
        storage
            .set_subscription_status(id_b, SubscriptionStatus::Inativa)
            .await
            .unwrap();

        let active = storage.get_active_clients().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id_a);
    }

    #[tokio::test]
    async fn memory_storage_mirrors_trait_behavior() {
        let storage = MemoryStorage::new();
        let mut client = sample_client(NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
        client.id = 42;
        storage.add_client(client);

        storage
            .set_subscription_status(42, SubscriptionStatus::Inativa)
            .await
            .unwrap();
        assert!(storage.get_active_clients().await.unwrap().is_empty());
        assert_eq!(
            storage.client(42).unwrap().subscription_status,
            SubscriptionStatus::Inativa
        );
    }
}
