use super::{EmailSender, HealthMonitor, OutgoingEmail, SentEmail};
use crate::store::AlertStore;
use anyhow::Context;
use models::{AlertEvent, DeliveryStatus, GatewayHealth, NewOutcome, NotificationOutcome};
use notifications::{RenderedNotification, Renderer, TemplateFields};
use std::sync::Arc;

/// How the dispatcher consults gateway health before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HealthGate {
    /// Skip delivery only if the gateway has no credentials configured.
    #[default]
    ConfigOnly,
    /// Also skip delivery if the most recent health check reported the
    /// gateway as unavailable.
    Cached,
    /// Probe the gateway before every send, and skip if it's unavailable.
    Probe,
}

/// The stage at which a dispatch attempt ended. Each stage either advances to
/// the next or ends the attempt with an undelivered status, and every attempt
/// is then recorded. Rendering has no stage because its failures are errors
/// which are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    CheckingHealth,
    Sending,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::CheckingHealth => "checking_health",
            Stage::Sending => "sending",
        }
    }
}

/// The result of an attempt, ready to be recorded.
struct Attempt {
    stage: Stage,
    status: DeliveryStatus,
    rendered: Option<RenderedNotification>,
    error_detail: Option<String>,
    provider_message_id: Option<String>,
}

/// Dispatcher delivers one notification per call to `dispatch`, and records
/// the outcome of every attempt in the store's append-only log.
///
/// Dispatches share no mutable state, so any number may run concurrently,
/// including for the same alert. Repeated dispatches of one alert each send
/// again and each append their own outcome.
#[derive(Debug)]
pub struct Dispatcher<ES> {
    renderer: Renderer,
    monitor: HealthMonitor<ES>,
    store: Arc<dyn AlertStore>,
    gate: HealthGate,
}

impl<ES: EmailSender> Dispatcher<ES> {
    pub fn new(sender: ES, store: Arc<dyn AlertStore>, gate: HealthGate) -> anyhow::Result<Self> {
        Ok(Dispatcher {
            renderer: Renderer::try_new().context("initializing notification templates")?,
            monitor: HealthMonitor::new(sender),
            store,
            gate,
        })
    }

    pub fn monitor(&self) -> &HealthMonitor<ES> {
        &self.monitor
    }

    /// Dispatches a notification for `event`, returning the recorded outcome.
    ///
    /// Delivery problems are reported through the outcome's status. An error
    /// is returned only if the event could not be rendered, which indicates a
    /// malformed event, or if the outcome could not be recorded.
    #[tracing::instrument(
        skip_all,
        fields(alert_id = %event.id, alert_type = %event.kind),
        err(level = tracing::Level::WARN),
    )]
    pub async fn dispatch(&self, event: &AlertEvent) -> anyhow::Result<NotificationOutcome> {
        let attempt = self.attempt(event).await?;
        self.record(event, attempt).await
    }

    async fn attempt(&self, event: &AlertEvent) -> anyhow::Result<Attempt> {
        let recipient = match validate(event) {
            Ok(recipient) => recipient,
            Err(detail) => {
                return Ok(Attempt {
                    stage: Stage::Validating,
                    status: DeliveryStatus::SkippedMissingContact,
                    rendered: None,
                    error_detail: Some(detail),
                    provider_message_id: None,
                });
            }
        };

        let rendered = self
            .renderer
            .render(&event.kind, &TemplateFields::from_event(event))
            .with_context(|| format!("rendering notification for alert {}", event.id))?;

        if let Some(reason) = self.unavailable_reason().await {
            return Ok(Attempt {
                stage: Stage::CheckingHealth,
                status: DeliveryStatus::SkippedServiceUnavailable,
                rendered: Some(rendered),
                error_detail: Some(reason),
                provider_message_id: None,
            });
        }

        let email = OutgoingEmail {
            to: vec![recipient.to_string()],
            cc: carbon_copy(event, recipient),
            subject: rendered.subject.clone(),
            html_body: rendered.body.clone(),
        };

        let attempt = match self.monitor.sender().send(email).await {
            Ok(SentEmail { id }) => Attempt {
                stage: Stage::Sending,
                status: DeliveryStatus::Sent,
                rendered: Some(rendered),
                error_detail: None,
                provider_message_id: Some(id),
            },
            Err(error) => Attempt {
                stage: Stage::Sending,
                status: DeliveryStatus::Failed,
                rendered: Some(rendered),
                error_detail: Some(format!("{error:#}")),
                provider_message_id: None,
            },
        };
        Ok(attempt)
    }

    /// Returns why delivery should be skipped, if it should be.
    async fn unavailable_reason(&self) -> Option<String> {
        if !self.monitor.sender().is_configured() {
            return Some("not configured".to_string());
        }
        let unavailable = |health: GatewayHealth| (!health.available).then(|| health.describe());

        match self.gate {
            HealthGate::ConfigOnly => None,
            HealthGate::Cached => self.monitor.last().and_then(unavailable),
            HealthGate::Probe => unavailable(self.monitor.check().await),
        }
    }

    async fn record(
        &self,
        event: &AlertEvent,
        attempt: Attempt,
    ) -> anyhow::Result<NotificationOutcome> {
        let Attempt {
            stage,
            status,
            rendered,
            error_detail,
            provider_message_id,
        } = attempt;

        let (subject_line, rendered_body) = match rendered {
            Some(RenderedNotification { subject, body, .. }) => (subject, body),
            None => (String::new(), String::new()),
        };

        let outcome = self
            .store
            .append_outcome(NewOutcome {
                alert_id: event.id,
                user_id: event.subject_user.id,
                recipient_email: event.recipient_email.trim().to_string(),
                subject_line,
                rendered_body,
                status,
                error_detail,
                provider_message_id,
                sent_at: self.store.current_time(),
            })
            .await
            .context("recording notification outcome")?;

        if status.is_sent() {
            tracing::info!(%status, outcome_id = %outcome.id, "alert notification sent");
        } else {
            tracing::warn!(
                %status,
                stage = stage.name(),
                error_detail = ?outcome.error_detail,
                outcome_id = %outcome.id,
                "alert notification was not delivered"
            );
        }
        Ok(outcome)
    }
}

/// Validates that the event can be delivered, returning the trimmed
/// recipient address, or a description of what's missing.
fn validate(event: &AlertEvent) -> Result<&str, String> {
    let recipient = event.recipient_email.trim();

    if recipient.is_empty() {
        return Err("missing emergency contact email".to_string());
    }
    if event.subject_user.display_name.trim().is_empty() {
        return Err("missing user name".to_string());
    }
    if !models::is_valid_email(recipient) {
        return Err(format!(
            "emergency contact email '{recipient}' is not a valid address"
        ));
    }
    Ok(recipient)
}

/// The acting user receives a copy of their own alerts, if they have a usable
/// address which differs from the recipient.
fn carbon_copy(event: &AlertEvent, recipient: &str) -> Option<Vec<String>> {
    let email = event.subject_user.contact_email.as_deref()?.trim();

    if email.is_empty() || email.eq_ignore_ascii_case(recipient) {
        return None;
    }
    if !models::is_valid_email(email) {
        tracing::warn!(user_email = %email, "not copying user on alert email: invalid address");
        return None;
    }
    Some(vec![email.to_string()])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{alert_event, MemoryStore, TestSender};
    use models::{AlertKind, Location, NewAlert};

    fn dispatcher(sender: &TestSender, store: &Arc<MemoryStore>, gate: HealthGate) -> Dispatcher<TestSender> {
        Dispatcher::new(sender.clone(), store.clone(), gate).unwrap()
    }

    #[tokio::test]
    async fn missing_recipient_is_skipped_without_sending() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        for recipient in ["", "   "] {
            let mut event = alert_event(AlertKind::Emergency);
            event.recipient_email = recipient.to_string();

            let outcome = dispatcher.dispatch(&event).await.unwrap();
            assert_eq!(outcome.status, DeliveryStatus::SkippedMissingContact);
            assert_eq!(
                outcome.error_detail.as_deref(),
                Some("missing emergency contact email")
            );
        }

        assert!(sender.take_sent().await.is_empty());
        assert_eq!(store.outcomes().len(), 2);
    }

    #[tokio::test]
    async fn missing_name_or_invalid_recipient_is_skipped() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        let mut event = alert_event(AlertKind::Emergency);
        event.subject_user.display_name = String::new();
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::SkippedMissingContact);
        assert_eq!(outcome.error_detail.as_deref(), Some("missing user name"));

        let mut event = alert_event(AlertKind::Emergency);
        event.recipient_email = "not-an-address".to_string();
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::SkippedMissingContact);
        assert_eq!(
            outcome.error_detail.as_deref(),
            Some("emergency contact email 'not-an-address' is not a valid address")
        );

        assert!(sender.take_sent().await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_skipped_and_recorded() {
        let sender = TestSender::unconfigured();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        let event = alert_event(AlertKind::Emergency);
        let outcome = dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(outcome.status, DeliveryStatus::SkippedServiceUnavailable);
        assert_eq!(outcome.error_detail.as_deref(), Some("not configured"));
        // The rendered notification is still captured for the log.
        assert_eq!(outcome.subject_line, "URGENT: SafeSpace Emergency Alert");
        assert!(sender.take_sent().await.is_empty());
        assert_eq!(store.outcomes(), vec![outcome]);
    }

    #[tokio::test]
    async fn gateway_failure_is_recorded_and_alert_stays_unresolved() {
        let sender = TestSender::new();
        sender.set_fail_after(0).await;
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Jane", Some("jane@example.test"), Some("a@b.com"));
        let alert = store
            .insert_alert(NewAlert {
                user_id: user.id,
                kind: AlertKind::Emergency,
                content: None,
                location: None,
            })
            .await
            .unwrap();

        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);
        let event = AlertEvent::for_alert(&alert, user.subject_user(), "a@b.com".to_string());
        let outcome = dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(outcome.status, DeliveryStatus::Failed);
        assert_eq!(
            outcome.error_detail.as_deref(),
            Some("mock error sending alert email to a@b.com")
        );
        assert_eq!(outcome.provider_message_id, None);

        let alert = store.fetch_alert(alert.id).await.unwrap().unwrap();
        assert!(!alert.resolved);
        assert_eq!(store.fetch_outcomes(alert.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resend_failure_detail_is_the_provider_message() {
        // Route every request through a proxy which refuses connections, so
        // the gateway call fails without leaving the host.
        let http_client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all("http://127.0.0.1:9").unwrap())
            .build()
            .unwrap();
        let sender = crate::alerts::Sender::resend(
            "re_test_key",
            crate::alerts::DEFAULT_FROM_ADDRESS.to_string(),
            None,
            http_client.clone(),
        );
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(sender, store.clone(), HealthGate::ConfigOnly).unwrap();

        let event = alert_event(AlertKind::Emergency);
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Failed);

        let provider_err = resend_rs::Resend::with_client("re_test_key", http_client)
            .emails
            .send(resend_rs::types::CreateEmailBaseOptions::new(
                crate::alerts::DEFAULT_FROM_ADDRESS,
                ["contact@example.test"],
                "subject",
            ))
            .await
            .unwrap_err();
        assert_eq!(outcome.error_detail, Some(provider_err.to_string()));
        assert_eq!(store.outcomes(), vec![outcome]);
    }

    #[tokio::test]
    async fn successful_send_copies_the_user() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        let mut event = alert_event(AlertKind::AudioDetection);
        event.content = Some("High-pitched sound detected".to_string());
        event.location = Some(Location {
            latitude: 37.422,
            longitude: -122.084,
        });

        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Sent);
        assert_eq!(outcome.error_detail, None);
        assert_eq!(outcome.provider_message_id.as_deref(), Some("test-email-1"));
        assert_eq!(outcome.subject_line, "SafeSpace Audio Alert Detection");
        assert!(outcome.rendered_body.contains("(37.422000, -122.084000)"));

        let sent = sender.take_sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["contact@example.test".to_string()]);
        assert_eq!(sent[0].cc, Some(vec!["jane@example.test".to_string()]));
        assert_eq!(sent[0].subject, outcome.subject_line);
        assert_eq!(sent[0].html_body, outcome.rendered_body);
    }

    #[tokio::test]
    async fn user_is_not_copied_when_they_are_the_recipient() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        let mut event = alert_event(AlertKind::Emergency);
        event.recipient_email = "Jane@Example.test".to_string();
        dispatcher.dispatch(&event).await.unwrap();

        event.recipient_email = "contact@example.test".to_string();
        event.subject_user.contact_email = Some("broken address".to_string());
        dispatcher.dispatch(&event).await.unwrap();

        let sent = sender.take_sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|email| email.cc.is_none()));
    }

    #[tokio::test]
    async fn concurrent_dispatches_of_one_alert_both_record() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);
        let event = alert_event(AlertKind::Emergency);

        let (first, second) = tokio::join!(dispatcher.dispatch(&event), dispatcher.dispatch(&event));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.status, DeliveryStatus::Sent);
        assert_eq!(second.status, DeliveryStatus::Sent);
        assert_ne!(first.id, second.id);
        assert_eq!(first.alert_id, second.alert_id);
        assert_eq!(store.fetch_outcomes(event.id).await.unwrap().len(), 2);
        assert_eq!(sender.take_sent().await.len(), 2);
    }

    #[tokio::test]
    async fn cached_gate_skips_after_failed_check() {
        let sender = TestSender::new();
        sender.fail_probes("connection refused").await;
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::Cached);
        let event = alert_event(AlertKind::Emergency);

        // No check has happened yet, so nothing gates the send.
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Sent);

        dispatcher.monitor().check().await;
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::SkippedServiceUnavailable);
        assert_eq!(
            outcome.error_detail.as_deref(),
            Some("delivery service error: connection refused")
        );

        sender.heal_probes().await;
        dispatcher.monitor().check().await;
        let outcome = dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Sent);

        assert_eq!(sender.take_sent().await.len(), 2);
        // Dispatch itself never probes under the cached gate.
        assert_eq!(sender.probe_count().await, 2);
    }

    #[tokio::test]
    async fn probe_gate_checks_before_each_send() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::Probe);
        let event = alert_event(AlertKind::TextThreat);

        assert_eq!(
            dispatcher.dispatch(&event).await.unwrap().status,
            DeliveryStatus::Sent
        );
        sender.fail_probes("503 service unavailable").await;
        assert_eq!(
            dispatcher.dispatch(&event).await.unwrap().status,
            DeliveryStatus::SkippedServiceUnavailable
        );
        assert_eq!(sender.probe_count().await, 2);
        assert_eq!(sender.take_sent().await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_event_is_an_error_and_records_nothing() {
        let sender = TestSender::new();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(&sender, &store, HealthGate::ConfigOnly);

        let event = alert_event(AlertKind::Other(String::new()));
        let err = dispatcher.dispatch(&event).await.unwrap_err();
        assert!(format!("{err:#}").contains("alert kind must not be empty"));

        assert!(store.outcomes().is_empty());
        assert!(sender.take_sent().await.is_empty());
    }
}
