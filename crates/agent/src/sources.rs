//! Event sources: the operations which create alerts and trigger their
//! notifications. Alert records are always persisted before any notification
//! is attempted, so gateway problems never prevent an alert from existing.
use crate::alerts::{Dispatcher, EmailSender, HealthMonitor};
use crate::store::AlertStore;
use crate::threat::ThreatScorer;
use models::{
    Alert, AlertEvent, AlertKind, DeliveryStatus, Location, NewAlert, NotificationOutcome,
    ThreatAssessment, ThreatLevel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("user {0} was not found")]
    UnknownUser(Uuid),
    #[error("alert {0} was not found")]
    UnknownAlert(Uuid),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An alert which was created, along with the outcome of notifying the
/// user's emergency contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaisedAlert {
    pub alert: Alert,
    pub notification: NotificationOutcome,
    /// Set when the alert was created but its notification wasn't delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextAnalysis {
    pub assessment: ThreatAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<RaisedAlert>,
}

/// Summary of one frame of microphone input. `level` is the average volume
/// on a 0-100 scale, and the energies are summed magnitudes of the bass, mid
/// and high frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AudioFrame {
    pub level: f64,
    pub bass_energy: f64,
    pub mid_energy: f64,
    pub high_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundDetection {
    pub sound_type: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<SoundDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<RaisedAlert>,
}

/// Threshold used when a client doesn't provide its own.
pub const DEFAULT_AUDIO_THRESHOLD: f64 = 70.0;

/// Classifies loud audio frames. Frames at or below `threshold` are ignored.
pub fn classify_audio(frame: &AudioFrame, threshold: f64) -> Option<SoundDetection> {
    let AudioFrame {
        level,
        bass_energy,
        mid_energy,
        high_energy,
    } = *frame;

    if level <= threshold || level <= 85.0 {
        return None;
    }

    if high_energy > mid_energy && high_energy > bass_energy {
        Some(SoundDetection {
            sound_type: "scream",
            message: "High-pitched sound detected",
        })
    } else if bass_energy > mid_energy && level > 90.0 {
        Some(SoundDetection {
            sound_type: "impact",
            message: "Loud impact sound detected",
        })
    } else if level > 90.0 {
        Some(SoundDetection {
            sound_type: "loud_noise",
            message: "Very loud noise detected",
        })
    } else {
        None
    }
}

/// Content stored for alerts which are raised without any.
fn default_content(kind: &AlertKind) -> Option<&'static str> {
    match kind {
        AlertKind::Emergency => Some(notifications::DEFAULT_EMERGENCY_CONTENT),
        AlertKind::ManualAudioAlert => Some("Manually triggered audio alert"),
        _ => None,
    }
}

#[derive(Debug)]
pub struct AlertService<ES> {
    store: Arc<dyn AlertStore>,
    dispatcher: Dispatcher<ES>,
    scorer: Arc<dyn ThreatScorer>,
}

impl<ES: EmailSender> AlertService<ES> {
    pub fn new(
        store: Arc<dyn AlertStore>,
        dispatcher: Dispatcher<ES>,
        scorer: Arc<dyn ThreatScorer>,
    ) -> Self {
        AlertService {
            store,
            dispatcher,
            scorer,
        }
    }

    pub fn store(&self) -> &Arc<dyn AlertStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher<ES> {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &HealthMonitor<ES> {
        self.dispatcher.monitor()
    }

    /// Creates an alert for the user and notifies their emergency contact.
    #[tracing::instrument(skip(self, content), fields(alert_id))]
    pub async fn raise_alert(
        &self,
        user_id: Uuid,
        kind: AlertKind,
        content: Option<String>,
        location: Option<Location>,
        threat_level: Option<ThreatLevel>,
    ) -> Result<RaisedAlert, SourceError> {
        let profile = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or(SourceError::UnknownUser(user_id))?;

        let content = content
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .or_else(|| default_content(&kind).map(str::to_string));

        let alert = self
            .store
            .insert_alert(NewAlert {
                user_id,
                kind,
                content,
                location,
            })
            .await?;
        tracing::Span::current().record("alert_id", tracing::field::display(alert.id));

        let recipient = profile.emergency_contact_email.clone().unwrap_or_default();
        let mut event = AlertEvent::for_alert(&alert, profile.subject_user(), recipient);
        event.threat_level = threat_level;

        let notification = self.dispatcher.dispatch(&event).await?;
        let warning = notification_warning(&notification);

        Ok(RaisedAlert {
            alert,
            notification,
            warning,
        })
    }

    /// Marks an alert as resolved. Notifications are never affected.
    pub async fn resolve_alert(&self, alert_id: Uuid) -> Result<Alert, SourceError> {
        let alert = self
            .store
            .resolve_alert(alert_id)
            .await?
            .ok_or(SourceError::UnknownAlert(alert_id))?;

        tracing::info!(%alert_id, "alert resolved");
        Ok(alert)
    }

    /// Deletes an alert. Its notification log is kept.
    pub async fn delete_alert(&self, alert_id: Uuid) -> Result<Alert, SourceError> {
        let alert = self
            .store
            .delete_alert(alert_id)
            .await?
            .ok_or(SourceError::UnknownAlert(alert_id))?;

        tracing::info!(%alert_id, "alert deleted");
        Ok(alert)
    }

    /// Returns the alert history of a user, most recent first.
    pub async fn alerts(&self, user_id: Uuid) -> Result<Vec<Alert>, SourceError> {
        if self.store.fetch_user(user_id).await?.is_none() {
            return Err(SourceError::UnknownUser(user_id));
        }
        Ok(self.store.list_alerts(user_id).await?)
    }

    pub async fn notifications(
        &self,
        alert_id: Uuid,
    ) -> Result<Vec<NotificationOutcome>, SourceError> {
        if self.store.fetch_alert(alert_id).await?.is_none() {
            return Err(SourceError::UnknownAlert(alert_id));
        }
        Ok(self.store.fetch_outcomes(alert_id).await?)
    }

    /// Scores `text`, and raises a text threat alert if the threat is high.
    pub async fn analyze_text(&self, user_id: Uuid, text: &str) -> Result<TextAnalysis, SourceError> {
        let assessment = self.scorer.score(text).await?;
        tracing::debug!(threat_level = %assessment.threat_level, indicators = ?assessment.indicators, "scored text");

        let alert = if assessment.threat_level == ThreatLevel::High {
            Some(
                self.raise_alert(
                    user_id,
                    AlertKind::TextThreat,
                    Some(text.to_string()),
                    None,
                    Some(assessment.threat_level),
                )
                .await?,
            )
        } else {
            None
        };

        Ok(TextAnalysis { assessment, alert })
    }

    /// Classifies an audio frame, and raises an audio alert if it contains a
    /// concerning sound.
    pub async fn report_audio(
        &self,
        user_id: Uuid,
        frame: &AudioFrame,
        threshold: Option<f64>,
        location: Option<Location>,
    ) -> Result<AudioReport, SourceError> {
        let Some(detection) = classify_audio(frame, threshold.unwrap_or(DEFAULT_AUDIO_THRESHOLD))
        else {
            return Ok(AudioReport {
                detection: None,
                alert: None,
            });
        };
        tracing::info!(sound_type = detection.sound_type, level = frame.level, "concerning sound detected");

        let alert = self
            .raise_alert(
                user_id,
                AlertKind::AudioDetection,
                Some(detection.message.to_string()),
                location,
                None,
            )
            .await?;

        Ok(AudioReport {
            detection: Some(detection),
            alert: Some(alert),
        })
    }
}

fn notification_warning(outcome: &NotificationOutcome) -> Option<String> {
    let detail = outcome.error_detail.as_deref().unwrap_or("unknown error");

    match outcome.status {
        DeliveryStatus::Sent => None,
        DeliveryStatus::SkippedMissingContact => Some(format!(
            "Alert created, but nobody was notified: {detail}"
        )),
        DeliveryStatus::SkippedServiceUnavailable | DeliveryStatus::Failed => Some(format!(
            "Alert created but there was an issue sending notifications: {detail}"
        )),
    }
}
