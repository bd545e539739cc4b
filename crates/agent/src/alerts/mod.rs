//! Alert notifications overview
//!
//! Every alert raised for a user results in one call to
//! [`Dispatcher::dispatch`], which runs the stages of a single notification
//! attempt in order:
//!
//! - validating: the emergency contact address and the user's name must be
//!   present, and the address must be well formed. Otherwise the attempt is
//!   recorded as `skipped_missing_contact` without contacting the gateway.
//! - rendering: the alert kind selects a template from the `notifications`
//!   crate. Rendering errors mean the alert itself is malformed, and are
//!   returned as errors rather than recorded.
//! - checking_health: an unconfigured gateway, or (depending on the
//!   [`HealthGate`]) an unhealthy one, results in `skipped_service_unavailable`.
//! - sending: exactly one call to the [`EmailSender`]. A gateway error results
//!   in `failed`, with the gateway's message as the error detail. There are no
//!   automatic retries: a caller may simply dispatch again.
//! - recording: exactly one outcome is appended to the store's notification
//!   log, whatever happened before.
//!
//! The outcome is written only after the gateway call completes, so a crash
//! between sending and recording loses the log entry for an email which was
//! in fact delivered.
mod dispatcher;
mod health;
mod notifier;

pub use dispatcher::{Dispatcher, HealthGate};
pub use health::HealthMonitor;
pub use notifier::{
    EmailSender, OutgoingEmail, ResendSender, SentEmail, Sender, DEFAULT_FROM_ADDRESS,
};
