//! Domain types shared by the alert notification service and its store.

mod alerts;
mod outcomes;
mod threats;

pub use alerts::{
    Alert, AlertEvent, AlertKind, Location, NewAlert, SubjectUser, UserProfile,
    DEFAULT_DISPLAY_NAME,
};
pub use outcomes::{
    DeliveryStatus, GatewayHealth, NewOutcome, NotificationOutcome, ServiceStatus, REASON_ERROR,
    REASON_NOT_CONFIGURED,
};
pub use threats::{ThreatAssessment, ThreatLevel};

use validator::ValidateEmail;

/// Returns true if `email` is a syntactically valid email address.
/// Surrounding whitespace is not tolerated.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.trim() == email && email.validate_email()
}
