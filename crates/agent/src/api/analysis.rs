use super::{ApiError, App};
use crate::alerts::EmailSender;
use crate::sources::{AudioFrame, AudioReport, TextAnalysis};
use axum::extract::State;
use models::Location;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, serde::Deserialize, Validate)]
pub struct TextRequest {
    user_id: Uuid,
    #[validate(length(min = 1, max = 10000))]
    text: String,
}

pub async fn analyze_text<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    super::Request(TextRequest { user_id, text }): super::Request<TextRequest>,
) -> Result<axum::Json<TextAnalysis>, ApiError> {
    Ok(axum::Json(app.service.analyze_text(user_id, &text).await?))
}

#[derive(Debug, serde::Deserialize, Validate)]
pub struct AudioRequest {
    user_id: Uuid,
    #[validate(range(min = 0.0, max = 100.0))]
    level: f64,
    #[validate(range(min = 0.0))]
    bass_energy: f64,
    #[validate(range(min = 0.0))]
    mid_energy: f64,
    #[validate(range(min = 0.0))]
    high_energy: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    threshold: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    longitude: Option<f64>,
}

pub async fn report_audio<ES: EmailSender>(
    State(app): State<Arc<App<ES>>>,
    super::Request(request): super::Request<AudioRequest>,
) -> Result<axum::Json<AudioReport>, ApiError> {
    let AudioRequest {
        user_id,
        level,
        bass_energy,
        mid_energy,
        high_energy,
        threshold,
        latitude,
        longitude,
    } = request;

    let frame = AudioFrame {
        level,
        bass_energy,
        mid_energy,
        high_energy,
    };
    let report = app
        .service
        .report_audio(
            user_id,
            &frame,
            threshold,
            Location::from_parts(latitude, longitude),
        )
        .await?;

    Ok(axum::Json(report))
}
