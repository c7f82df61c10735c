//! Mail triage — intake, dedup, classify, route.
//!
//! Turns unstructured inbound email (or its document attachments) into
//! structured, team-routed service requests: normalize content, skip
//! duplicates, extract intent through an external classifier constrained
//! to a fixed taxonomy, and assign the owning team.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod message;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod taxonomy;
