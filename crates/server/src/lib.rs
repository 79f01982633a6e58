//! HTTP service for weeklybot: Slack routes, the submission relay and the
//! outbound time-tracking and document integrations.

pub mod bootstrap;
pub mod google_docs;
pub mod health;
pub mod outbound;
pub mod relay;
pub mod routes;
pub mod time_tracking;
