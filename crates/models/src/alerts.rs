use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a safety alert. Known kinds select a dedicated notification
/// template, while anything else is carried through as `Other` and rendered
/// using the generic alert template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertKind {
    Emergency,
    TextThreat,
    AudioDetection,
    ManualAudioAlert,
    SafeZoneExit,
    Other(String),
}

impl AlertKind {
    pub fn name(&self) -> &str {
        match self {
            AlertKind::Emergency => "emergency",
            AlertKind::TextThreat => "text_threat",
            AlertKind::AudioDetection => "audio_detection",
            AlertKind::ManualAudioAlert => "manual_audio_alert",
            AlertKind::SafeZoneExit => "safe_zone_exit",
            AlertKind::Other(name) => name.as_str(),
        }
    }

    fn all() -> &'static [AlertKind] {
        &[
            AlertKind::Emergency,
            AlertKind::TextThreat,
            AlertKind::AudioDetection,
            AlertKind::ManualAudioAlert,
            AlertKind::SafeZoneExit,
        ]
    }

    pub fn from_name(name: &str) -> AlertKind {
        for kind in AlertKind::all() {
            if name == kind.name() {
                return kind.clone();
            }
        }
        AlertKind::Other(name.to_string())
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for AlertKind {
    fn from(name: String) -> Self {
        AlertKind::from_name(&name)
    }
}

impl From<AlertKind> for String {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::Other(name) => name,
            known => known.name().to_string(),
        }
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Type<sqlx::postgres::Postgres> for AlertKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::postgres::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::postgres::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Encode<'_, sqlx::postgres::Postgres> for AlertKind {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.name(), buf)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Decode<'_, sqlx::postgres::Postgres> for AlertKind {
    fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::postgres::Postgres>>::decode(value)?;
        Ok(AlertKind::from_name(s))
    }
}

/// A geographic position. Latitude and longitude are always present together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Builds a `Location` only when both coordinates are present and finite.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Location> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(Location {
                    latitude,
                    longitude,
                })
            }
            _ => None,
        }
    }

    pub fn into_parts(location: Option<Location>) -> (Option<f64>, Option<f64>) {
        match location {
            Some(Location {
                latitude,
                longitude,
            }) => (Some(latitude), Some(longitude)),
            None => (None, None),
        }
    }
}

/// The user on whose behalf an alert was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectUser {
    pub id: uuid::Uuid,
    pub display_name: String,
    /// The user's own address, which receives a copy of each notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

/// A user profile as held by the persistence store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: uuid::Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub emergency_contact_email: Option<String>,
}

/// Name used in notifications for users who never filled in a full name.
pub const DEFAULT_DISPLAY_NAME: &str = "SafeSpace User";

impl UserProfile {
    pub fn subject_user(&self) -> SubjectUser {
        let display_name = self
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string();

        SubjectUser {
            id: self.id,
            display_name,
            contact_email: self.email.clone(),
        }
    }
}

/// An alert record which has not yet been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub user_id: uuid::Uuid,
    pub kind: AlertKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A persisted alert record. `created_at` never changes after insertion,
/// and `resolved` is only ever changed by an explicit resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub kind: AlertKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to dispatch a notification for one alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: uuid::Uuid,
    pub subject_user: SubjectUser,
    /// The emergency contact who receives the notification.
    pub recipient_email: String,
    pub kind: AlertKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
    /// Threat level supplied by a text scorer, if the alert originated from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<crate::ThreatLevel>,
}

impl AlertEvent {
    pub fn for_alert(alert: &Alert, subject_user: SubjectUser, recipient_email: String) -> Self {
        AlertEvent {
            id: alert.id,
            subject_user,
            recipient_email,
            kind: alert.kind.clone(),
            content: alert.content.clone(),
            location: alert.location,
            created_at: alert.created_at,
            threat_level: None,
        }
    }
}
