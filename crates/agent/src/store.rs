use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{Alert, NewAlert, NewOutcome, NotificationOutcome, UserProfile};
use uuid::Uuid;

/// AlertStore is the persistence boundary for alerts and their notification
/// log. The notification log is append-only: outcomes are never updated, and
/// concurrent appends for the same alert each produce a distinct entry.
#[async_trait::async_trait]
pub trait AlertStore: std::fmt::Debug + Send + Sync {
    /// Returns the current time. Having dispatch read the time through the
    /// store allows tests to be deterministic.
    fn current_time(&self) -> DateTime<Utc>;

    async fn fetch_user(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;

    async fn insert_alert(&self, alert: NewAlert) -> anyhow::Result<Alert>;

    async fn fetch_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>>;

    /// Returns the user's alerts, most recent first.
    async fn list_alerts(&self, user_id: Uuid) -> anyhow::Result<Vec<Alert>>;

    /// Marks the alert as resolved, returning `None` if it doesn't exist.
    async fn resolve_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>>;

    /// Deletes the alert, returning `None` if it doesn't exist. Outcomes
    /// recorded for the alert are kept.
    async fn delete_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>>;

    async fn append_outcome(&self, outcome: NewOutcome) -> anyhow::Result<NotificationOutcome>;

    /// Returns every outcome recorded for the alert, oldest first.
    async fn fetch_outcomes(&self, alert_id: Uuid) -> anyhow::Result<Vec<NotificationOutcome>>;
}

/// An AlertStore backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait::async_trait]
impl AlertStore for PgStore {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn fetch_user(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let row = agent_sql::users::fetch_user(user_id, &self.pool)
            .await
            .context("fetching user")?;
        Ok(row.map(Into::into))
    }

    async fn insert_alert(&self, alert: NewAlert) -> anyhow::Result<Alert> {
        let row = agent_sql::alerts::insert_alert(&alert, self.current_time(), &self.pool)
            .await
            .context("inserting alert")?;
        Ok(row.into())
    }

    async fn fetch_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        let row = agent_sql::alerts::fetch_alert(alert_id, &self.pool)
            .await
            .context("fetching alert")?;
        Ok(row.map(Into::into))
    }

    async fn list_alerts(&self, user_id: Uuid) -> anyhow::Result<Vec<Alert>> {
        let rows = agent_sql::alerts::fetch_alerts_for_user(user_id, &self.pool)
            .await
            .context("fetching alerts for user")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn resolve_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        let row = agent_sql::alerts::resolve_alert(alert_id, self.current_time(), &self.pool)
            .await
            .context("resolving alert")?;
        Ok(row.map(Into::into))
    }

    async fn delete_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        let row = agent_sql::alerts::delete_alert(alert_id, &self.pool)
            .await
            .context("deleting alert")?;
        Ok(row.map(Into::into))
    }

    async fn append_outcome(&self, outcome: NewOutcome) -> anyhow::Result<NotificationOutcome> {
        outcome.check_consistency()?;
        let row = agent_sql::email_logs::insert_outcome(&outcome, &self.pool)
            .await
            .context("inserting into email_logs")?;
        Ok(row.into())
    }

    async fn fetch_outcomes(&self, alert_id: Uuid) -> anyhow::Result<Vec<NotificationOutcome>> {
        let rows = agent_sql::email_logs::fetch_outcomes_for_alert(alert_id, &self.pool)
            .await
            .context("fetching from email_logs")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
