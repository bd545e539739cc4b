use super::{ApiError, App};
use crate::alerts::EmailSender;
use crate::sources::RaisedAlert;
use axum::extract::{Path, State};
use models::{Alert, AlertKind, Location, NotificationOutcome, ThreatLevel};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, serde::Deserialize, Validate)]
pub struct CreateRequest {
    user_id: Uuid,
    #[validate(length(min = 1))]
    alert_type: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    longitude: Option<f64>,
    #[serde(default)]
    threat_level: Option<ThreatLevel>,
}

pub async fn create_alert<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    super::Request(request): super::Request<CreateRequest>,
) -> Result<axum::Json<RaisedAlert>, ApiError> {
    let CreateRequest {
        user_id,
        alert_type,
        content,
        latitude,
        longitude,
        threat_level,
    } = request;

    let raised = app
        .service
        .raise_alert(
            user_id,
            AlertKind::from_name(&alert_type),
            content,
            Location::from_parts(latitude, longitude),
            threat_level,
        )
        .await?;

    Ok(axum::Json(raised))
}

pub async fn resolve_alert<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    Path(alert_id): Path<Uuid>,
) -> Result<axum::Json<Alert>, ApiError> {
    Ok(axum::Json(app.service.resolve_alert(alert_id).await?))
}

pub async fn delete_alert<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    Path(alert_id): Path<Uuid>,
) -> Result<axum::Json<Alert>, ApiError> {
    Ok(axum::Json(app.service.delete_alert(alert_id).await?))
}

pub async fn list_alerts<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    Path(user_id): Path<Uuid>,
) -> Result<axum::Json<Vec<Alert>>, ApiError> {
    Ok(axum::Json(app.service.alerts(user_id).await?))
}

pub async fn list_notifications<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    Path(alert_id): Path<Uuid>,
) -> Result<axum::Json<Vec<NotificationOutcome>>, ApiError> {
    Ok(axum::Json(app.service.notifications(alert_id).await?))
}
