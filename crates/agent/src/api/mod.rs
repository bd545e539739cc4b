use crate::alerts::EmailSender;
use crate::sources::AlertService;
use axum::http::StatusCode;
use std::sync::Arc;

mod alerts;
mod analysis;
mod error;
mod health;
mod send_alert;

pub use error::{ApiError, ApiErrorExt};

/// Request wraps a JSON-deserialized request type T which
/// also implements the validator::Validate trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<T>(pub T);

/// Rejection is an error type of reasons why an API request may fail.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    JsonError(#[from] axum::extract::rejection::JsonRejection),
}

#[derive(Debug)]
pub struct App<ES> {
    service: AlertService<ES>,
}

/// Build the alert service's API router.
pub fn build_router<ES: EmailSender>(service: AlertService<ES>) -> axum::Router<()> {
    let app = Arc::new(App { service });

    use axum::routing::{delete, get, post};

    axum::Router::new()
        .route("/api/send-alert", post(send_alert::send_alert::<ES>))
        .route("/api/health", get(health::health::<ES>))
        .route("/api/alerts", post(alerts::create_alert::<ES>))
        .route("/api/alerts/:alert_id", delete(alerts::delete_alert::<ES>))
        .route("/api/users/:user_id/alerts", get(alerts::list_alerts::<ES>))
        .route("/api/alerts/:alert_id/resolve", post(alerts::resolve_alert::<ES>))
        .route(
            "/api/alerts/:alert_id/notifications",
            get(alerts::list_notifications::<ES>),
        )
        .route("/api/text-analysis", post(analysis::analyze_text::<ES>))
        .route("/api/audio-events", post(analysis::report_audio::<ES>))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app)
}

#[axum::async_trait]
impl<T, S> axum::extract::FromRequest<S> for Request<T>
where
    T: serde::de::DeserializeOwned + validator::Validate,
    S: Send + Sync,
    axum::extract::Json<T>:
        axum::extract::FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
{
    type Rejection = Rejection;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Json(value) = axum::extract::Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Request(value))
    }
}

impl axum::response::IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            Rejection::ValidationError(inner) => {
                let message = format!("Input validation error: [{inner}]").replace('\n', ", ");
                axum::response::IntoResponse::into_response((StatusCode::BAD_REQUEST, message))
            }
            Rejection::JsonError(inner) => axum::response::IntoResponse::into_response(inner),
        }
    }
}
