use crate::alerts::{EmailSender, OutgoingEmail, SentEmail};
use crate::store::AlertStore;
use chrono::{DateTime, TimeZone, Utc};
use models::{
    Alert, AlertEvent, AlertKind, NewAlert, NewOutcome, NotificationOutcome, SubjectUser,
    UserProfile,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// An AlertEvent for a user named "Jane", addressed to her emergency contact.
pub fn alert_event(kind: AlertKind) -> AlertEvent {
    AlertEvent {
        id: Uuid::new_v4(),
        subject_user: SubjectUser {
            id: Uuid::new_v4(),
            display_name: "Jane".to_string(),
            contact_email: Some("jane@example.test".to_string()),
        },
        recipient_email: "contact@example.test".to_string(),
        kind,
        content: None,
        location: None,
        created_at: fixed_time(),
        threat_level: None,
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

#[derive(Debug, Default)]
struct SenderState {
    // Sends fail once this many have succeeded.
    fail_after: Option<usize>,
    sent: Vec<OutgoingEmail>,
    sent_total: usize,
    probe_error: Option<String>,
    probe_count: usize,
}

/// An EmailSender which records emails instead of sending them.
#[derive(Debug, Clone)]
pub struct TestSender {
    configured: bool,
    state: Arc<tokio::sync::Mutex<SenderState>>,
}

impl TestSender {
    pub fn new() -> Self {
        Self::with_configured(true)
    }

    pub fn unconfigured() -> Self {
        Self::with_configured(false)
    }

    fn with_configured(configured: bool) -> Self {
        TestSender {
            configured,
            state: Arc::new(tokio::sync::Mutex::new(SenderState::default())),
        }
    }

    pub async fn set_fail_after(&self, successes: usize) {
        self.state.lock().await.fail_after = Some(successes);
    }

    /// Returns emails sent since the last call.
    pub async fn take_sent(&self) -> Vec<OutgoingEmail> {
        std::mem::take(&mut self.state.lock().await.sent)
    }

    pub async fn fail_probes(&self, error: &str) {
        self.state.lock().await.probe_error = Some(error.to_string());
    }

    pub async fn heal_probes(&self) {
        self.state.lock().await.probe_error = None;
    }

    pub async fn probe_count(&self) -> usize {
        self.state.lock().await.probe_count
    }
}

impl EmailSender for TestSender {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send<'s>(&'s self, email: OutgoingEmail) -> anyhow::Result<SentEmail> {
        let mut state = self.state.lock().await;

        if state.fail_after.is_some_and(|limit| state.sent_total >= limit) {
            anyhow::bail!(
                "mock error sending alert email to {}",
                email.to.join(", ")
            );
        }
        state.sent_total += 1;
        let id = format!("test-email-{}", state.sent_total);
        state.sent.push(email);

        Ok(SentEmail { id })
    }

    async fn probe<'s>(&'s self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.probe_count += 1;

        match &state.probe_error {
            Some(error) => Err(anyhow::anyhow!("{error}")),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    users: Vec<UserProfile>,
    alerts: Vec<Alert>,
    outcomes: Vec<NotificationOutcome>,
}

/// An in-memory AlertStore, whose clock is fixed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn add_user(
        &self,
        full_name: &str,
        email: Option<&str>,
        emergency_contact_email: Option<&str>,
    ) -> UserProfile {
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            full_name: Some(full_name.to_string()),
            emergency_contact_email: emergency_contact_email.map(str::to_string),
        };
        self.state().users.push(user.clone());
        user
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state().alerts.clone()
    }

    pub fn outcomes(&self) -> Vec<NotificationOutcome> {
        self.state().outcomes.clone()
    }
}

#[async_trait::async_trait]
impl AlertStore for MemoryStore {
    fn current_time(&self) -> DateTime<Utc> {
        fixed_time()
    }

    async fn fetch_user(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.state().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn insert_alert(&self, alert: NewAlert) -> anyhow::Result<Alert> {
        let NewAlert {
            user_id,
            kind,
            content,
            location,
        } = alert;

        let alert = Alert {
            id: Uuid::new_v4(),
            user_id,
            kind,
            content,
            location,
            resolved: false,
            created_at: self.current_time(),
            updated_at: self.current_time(),
        };
        self.state().alerts.push(alert.clone());
        Ok(alert)
    }

    async fn fetch_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        Ok(self.state().alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn list_alerts(&self, user_id: Uuid) -> anyhow::Result<Vec<Alert>> {
        // Later inserts come first among alerts created at the same time.
        let mut alerts: Vec<Alert> = self
            .state()
            .alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn delete_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        let mut state = self.state();
        let index = state.alerts.iter().position(|a| a.id == alert_id);
        Ok(index.map(|index| state.alerts.remove(index)))
    }

    async fn resolve_alert(&self, alert_id: Uuid) -> anyhow::Result<Option<Alert>> {
        let now = self.current_time();
        let mut state = self.state();

        let Some(alert) = state.alerts.iter_mut().find(|a| a.id == alert_id) else {
            return Ok(None);
        };
        if !alert.resolved {
            alert.resolved = true;
            alert.updated_at = now;
        }
        Ok(Some(alert.clone()))
    }

    async fn append_outcome(&self, outcome: NewOutcome) -> anyhow::Result<NotificationOutcome> {
        outcome.check_consistency()?;
        let outcome = NotificationOutcome::from_new(Uuid::new_v4(), outcome);
        self.state().outcomes.push(outcome.clone());
        Ok(outcome)
    }

    async fn fetch_outcomes(&self, alert_id: Uuid) -> anyhow::Result<Vec<NotificationOutcome>> {
        Ok(self
            .state()
            .outcomes
            .iter()
            .filter(|o| o.alert_id == alert_id)
            .cloned()
            .collect())
    }
}
