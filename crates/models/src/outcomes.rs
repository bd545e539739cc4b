use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The final status of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    SkippedServiceUnavailable,
    SkippedMissingContact,
}

impl DeliveryStatus {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::SkippedServiceUnavailable => "skipped_service_unavailable",
            DeliveryStatus::SkippedMissingContact => "skipped_missing_contact",
        }
    }

    fn all() -> &'static [DeliveryStatus] {
        &[
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
            DeliveryStatus::SkippedServiceUnavailable,
            DeliveryStatus::SkippedMissingContact,
        ]
    }

    pub fn from_name(name: &str) -> Option<DeliveryStatus> {
        DeliveryStatus::all()
            .iter()
            .find(|status| status.name() == name)
            .copied()
    }

    pub fn is_sent(&self) -> bool {
        *self == DeliveryStatus::Sent
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Type<sqlx::postgres::Postgres> for DeliveryStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::postgres::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::postgres::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Encode<'_, sqlx::postgres::Postgres> for DeliveryStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.name(), buf)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Decode<'_, sqlx::postgres::Postgres> for DeliveryStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::postgres::Postgres>>::decode(value)?;
        DeliveryStatus::from_name(s).ok_or_else(|| format!("Invalid delivery status: {}", s).into())
    }
}

/// A notification outcome which has not yet been appended to the log.
///
/// The subject and body are copies taken at send time, so that later template
/// changes never alter historical entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutcome {
    pub alert_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub recipient_email: String,
    pub subject_line: String,
    pub rendered_body: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NewOutcome {
    /// Returns an error if `error_detail` is not present exactly when the
    /// status is something other than `sent`.
    pub fn check_consistency(&self) -> anyhow::Result<()> {
        match (self.status.is_sent(), self.error_detail.is_some()) {
            (true, true) => anyhow::bail!("sent outcome must not carry an error detail"),
            (false, false) => {
                anyhow::bail!("{} outcome must carry an error detail", self.status)
            }
            _ => Ok(()),
        }
    }
}

/// An entry of the append-only notification log. Entries are never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub id: uuid::Uuid,
    pub alert_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub recipient_email: String,
    pub subject_line: String,
    pub rendered_body: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationOutcome {
    pub fn from_new(id: uuid::Uuid, new: NewOutcome) -> Self {
        let NewOutcome {
            alert_id,
            user_id,
            recipient_email,
            subject_line,
            rendered_body,
            status,
            error_detail,
            provider_message_id,
            sent_at,
        } = new;

        NotificationOutcome {
            id,
            alert_id,
            user_id,
            recipient_email,
            subject_line,
            rendered_body,
            status,
            error_detail,
            provider_message_id,
            sent_at,
        }
    }
}

/// Status of the delivery service, as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Connected,
    Error,
    NotConfigured,
}

/// Reason reported when no delivery credentials are configured.
pub const REASON_NOT_CONFIGURED: &str = "not_configured";
/// Reason reported when the delivery probe failed.
pub const REASON_ERROR: &str = "error";

/// The result of one delivery gateway health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub checked_at: DateTime<Utc>,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Underlying error message of a failed probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayHealth {
    pub fn connected(checked_at: DateTime<Utc>) -> Self {
        GatewayHealth {
            checked_at,
            available: true,
            reason: None,
            error: None,
        }
    }

    pub fn not_configured(checked_at: DateTime<Utc>) -> Self {
        GatewayHealth {
            checked_at,
            available: false,
            reason: Some(REASON_NOT_CONFIGURED.to_string()),
            error: None,
        }
    }

    pub fn probe_failed(checked_at: DateTime<Utc>, error: String) -> Self {
        GatewayHealth {
            checked_at,
            available: false,
            reason: Some(REASON_ERROR.to_string()),
            error: Some(error),
        }
    }

    pub fn service_status(&self) -> ServiceStatus {
        if self.available {
            ServiceStatus::Connected
        } else if self.reason.as_deref() == Some(REASON_NOT_CONFIGURED) {
            ServiceStatus::NotConfigured
        } else {
            ServiceStatus::Error
        }
    }

    /// A one-line description of why the gateway is unavailable.
    pub fn describe(&self) -> String {
        match (self.reason.as_deref(), self.error.as_deref()) {
            (Some(REASON_NOT_CONFIGURED), _) => "not configured".to_string(),
            (_, Some(error)) => format!("delivery service error: {error}"),
            (Some(reason), None) => reason.to_string(),
            (None, None) if self.available => "available".to_string(),
            (None, None) => "unavailable".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delivery_status_names_match_serde() {
        for status in DeliveryStatus::all() {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.name()));
            assert_eq!(DeliveryStatus::from_name(status.name()), Some(*status));
        }
        assert_eq!(DeliveryStatus::from_name("queued"), None);
    }

    #[test]
    fn error_detail_presence_follows_status() {
        let mut outcome = NewOutcome {
            alert_id: uuid::Uuid::nil(),
            user_id: uuid::Uuid::nil(),
            recipient_email: "contact@example.test".to_string(),
            subject_line: "subject".to_string(),
            rendered_body: "body".to_string(),
            status: DeliveryStatus::Sent,
            error_detail: None,
            provider_message_id: Some("msg-1".to_string()),
            sent_at: Utc::now(),
        };
        outcome.check_consistency().unwrap();

        outcome.status = DeliveryStatus::Failed;
        assert!(outcome.check_consistency().is_err());

        outcome.error_detail = Some("rejected".to_string());
        outcome.check_consistency().unwrap();
    }

    #[test]
    fn health_maps_to_service_status() {
        let now = Utc::now();
        assert_eq!(
            GatewayHealth::connected(now).service_status(),
            ServiceStatus::Connected
        );
        assert_eq!(
            GatewayHealth::not_configured(now).service_status(),
            ServiceStatus::NotConfigured
        );
        let failed = GatewayHealth::probe_failed(now, "401 unauthorized".to_string());
        assert_eq!(failed.service_status(), ServiceStatus::Error);
        assert_eq!(failed.describe(), "delivery service error: 401 unauthorized");
        assert_eq!(GatewayHealth::not_configured(now).describe(), "not configured");
    }
}
