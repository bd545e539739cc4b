use super::EmailSender;
use chrono::Utc;
use models::GatewayHealth;
use std::sync::Mutex;

/// Checks whether the delivery gateway is configured and reachable, and
/// remembers the most recent result.
///
/// Health is advisory: an unavailable gateway only ever causes notifications
/// to be skipped, and never prevents alerts themselves from being recorded.
#[derive(Debug)]
pub struct HealthMonitor<ES> {
    sender: ES,
    last: Mutex<Option<GatewayHealth>>,
}

impl<ES: EmailSender> HealthMonitor<ES> {
    pub fn new(sender: ES) -> Self {
        HealthMonitor {
            sender,
            last: Mutex::new(None),
        }
    }

    pub fn sender(&self) -> &ES {
        &self.sender
    }

    /// Probes the gateway, caching and returning the result.
    #[tracing::instrument(skip_all)]
    pub async fn check(&self) -> GatewayHealth {
        let checked_at = Utc::now();

        let health = if !self.sender.is_configured() {
            GatewayHealth::not_configured(checked_at)
        } else {
            match self.sender.probe().await {
                Ok(()) => GatewayHealth::connected(checked_at),
                Err(error) => {
                    tracing::warn!(error = %format!("{error:#}"), "delivery gateway probe failed");
                    GatewayHealth::probe_failed(checked_at, format!("{error:#}"))
                }
            }
        };

        tracing::debug!(available = health.available, reason = ?health.reason, "checked delivery gateway health");
        *self.last.lock().unwrap_or_else(|poison| poison.into_inner()) = Some(health.clone());
        health
    }

    /// Returns the result of the most recent check, if any, without probing.
    pub fn last(&self) -> Option<GatewayHealth> {
        self.last
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}
