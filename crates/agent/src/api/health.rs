use super::App;
use crate::alerts::EmailSender;
use chrono::{DateTime, Utc};
use models::ServiceStatus;
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
pub struct Services {
    delivery: ServiceStatus,
}

#[derive(Debug, serde::Serialize)]
pub struct Response {
    status: &'static str,
    services: Services,
    timestamp: DateTime<Utc>,
}

/// Reports the health of the delivery gateway. The service itself is always
/// "healthy" if it's able to respond.
pub async fn health<ES: EmailSender>(
    axum::extract::State(app): axum::extract::State<Arc<App<ES>>>,
) -> axum::Json<Response> {
    let health = app.service.monitor().check().await;

    axum::Json(Response {
        status: "healthy",
        services: Services {
            delivery: health.service_status(),
        },
        timestamp: health.checked_at,
    })
}
