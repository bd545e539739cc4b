pub mod alerts;
pub mod api;
pub mod sources;
pub mod store;
pub mod threat;

#[cfg(test)]
mod test_util;

pub use sources::{AlertService, SourceError};
pub use store::{AlertStore, PgStore};
pub use threat::{KeywordScorer, ThreatScorer};
