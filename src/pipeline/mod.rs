//! Intake processing pipeline.
//!
//! Every inbound message flows through, in strict sequence:
//! 1. `ContentNormalizer` — body text or attachment-extracted text
//! 2. `Deduplicator` — atomic content-fingerprint test-and-insert
//! 3. `IntentClassifier` — external model call + taxonomy validation
//! 4. `TaxonomyRouter` — request type → owning team
//! 5. `ResultSink` — one routed request record per unique message
//!
//! Duplicates short-circuit after step 2 without touching the classifier.
//! Failures are contained to the single message; a batch never aborts.

pub mod processor;

pub use processor::{IntakePipeline, ProcessOutcome};
