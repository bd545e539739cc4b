//! SQL for the tables backing alert notifications: `users`, `alerts` and the
//! append-only `email_logs`.
pub mod alerts;
pub mod email_logs;
pub mod users;
