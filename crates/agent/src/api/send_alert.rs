use super::{ApiError, App};
use crate::alerts::EmailSender;
use axum::http::StatusCode;
use models::{
    AlertEvent, AlertKind, DeliveryStatus, Location, NotificationOutcome, SubjectUser, ThreatLevel,
};
use std::sync::Arc;
use validator::Validate;

/// A request to notify an emergency contact about an alert which the caller
/// has already recorded. Contact and name are checked by the dispatcher, so
/// that their absence is recorded like any other undelivered notification.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct Request {
    user_id: uuid::Uuid,
    #[serde(default)]
    user_email: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    emergency_contact_email: Option<String>,
    alert_type: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    longitude: Option<f64>,
    alert_id: uuid::Uuid,
    #[serde(default)]
    threat_level: Option<ThreatLevel>,
}

#[derive(Debug, serde::Serialize)]
pub struct Sent {
    id: String,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Sent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    notification: Option<NotificationOutcome>,
}

pub async fn send_alert<ES: EmailSender>(
    axum::extract::State(app): axum::extract::State<Arc<App<ES>>>,
    super::Request(request): super::Request<Request>,
) -> Result<(StatusCode, axum::Json<Response>), ApiError> {
    let Request {
        user_id,
        user_email,
        user_name,
        emergency_contact_email,
        alert_type,
        content,
        latitude,
        longitude,
        alert_id,
        threat_level,
    } = request;

    let event = AlertEvent {
        id: alert_id,
        subject_user: SubjectUser {
            id: user_id,
            display_name: user_name.unwrap_or_default(),
            contact_email: user_email,
        },
        recipient_email: emergency_contact_email.unwrap_or_default(),
        kind: AlertKind::from_name(&alert_type),
        content,
        location: Location::from_parts(latitude, longitude),
        created_at: app.service.store().current_time(),
        threat_level,
    };

    let outcome = app.service.dispatcher().dispatch(&event).await?;
    Ok(into_response(outcome))
}

fn into_response(outcome: NotificationOutcome) -> (StatusCode, axum::Json<Response>) {
    let details = outcome.error_detail.clone();

    let (status, response) = match outcome.status {
        DeliveryStatus::Sent => (
            StatusCode::OK,
            Response {
                success: Some(true),
                data: outcome.provider_message_id.clone().map(|id| Sent { id }),
                ..Default::default()
            },
        ),
        DeliveryStatus::SkippedMissingContact => (
            StatusCode::BAD_REQUEST,
            Response {
                error: Some("Missing required fields"),
                details,
                ..Default::default()
            },
        ),
        DeliveryStatus::SkippedServiceUnavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Response {
                error: Some(if details.as_deref() == Some("not configured") {
                    "Email service not configured"
                } else {
                    "Email service unavailable"
                }),
                details,
                ..Default::default()
            },
        ),
        DeliveryStatus::Failed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Response {
                error: Some("Failed to send email"),
                details,
                ..Default::default()
            },
        ),
    };

    (
        status,
        axum::Json(Response {
            notification: Some(outcome),
            ..response
        }),
    )
}
