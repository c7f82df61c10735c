//! Pipeline orchestration — normalize, dedupe, classify, route, emit.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::classify::IntentClassifier;
use crate::dedup::{DedupStatus, Deduplicator};
use crate::error::{ClassificationError, ProcessError};
use crate::message::{RawMessage, RoutedRequest};
use crate::normalize::ContentNormalizer;
use crate::sink::ResultSink;
use crate::taxonomy::{RequestTaxonomy, TaxonomyRouter};

/// How many messages of one batch run through the pipeline at once.
/// Classification calls are additionally bounded by the classifier permits.
const BATCH_CONCURRENCY: usize = 8;

/// Terminal state of one message's pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Message classified, routed, and emitted to the sink.
    Routed(RoutedRequest),
    /// Content already processed in this run. Expected steady-state outcome
    /// for repeat traffic, not an error.
    DuplicateSkipped,
}

/// The intake pipeline. No cross-message state except the dedup set; one
/// instance serves concurrent messages.
pub struct IntakePipeline {
    normalizer: ContentNormalizer,
    dedup: Deduplicator,
    classifier: IntentClassifier,
    taxonomy: RequestTaxonomy,
    router: TaxonomyRouter,
    sink: Arc<dyn ResultSink>,
    classify_permits: Semaphore,
}

impl IntakePipeline {
    /// Build a pipeline. `max_inflight_classifications` bounds concurrent
    /// calls to the external classifier across the whole batch.
    pub fn new(
        normalizer: ContentNormalizer,
        classifier: IntentClassifier,
        taxonomy: RequestTaxonomy,
        router: TaxonomyRouter,
        sink: Arc<dyn ResultSink>,
        max_inflight_classifications: usize,
    ) -> Self {
        Self {
            normalizer,
            dedup: Deduplicator::new(),
            classifier,
            taxonomy,
            router,
            sink,
            classify_permits: Semaphore::new(max_inflight_classifications.max(1)),
        }
    }

    /// Process a single inbound message through the full pipeline.
    ///
    /// Duplicates short-circuit before the classifier is invoked. The
    /// dedup mark is taken before classification starts, so a concurrent
    /// duplicate never triggers a second classifier call for the same
    /// content.
    pub async fn process(&self, message: RawMessage) -> Result<ProcessOutcome, ProcessError> {
        info!(
            id = %message.id,
            sender = %message.sender,
            subject = %message.subject,
            "Processing inbound message"
        );

        let payload = self.normalizer.normalize(&message)?;

        if self.dedup.check_and_mark(payload.as_str()) == DedupStatus::Duplicate {
            debug!(id = %message.id, "Duplicate content, skipping");
            return Ok(ProcessOutcome::DuplicateSkipped);
        }

        let result = {
            let _permit = self.classify_permits.acquire().await.map_err(|_| {
                ClassificationError::ServiceUnavailable {
                    reason: "classifier permit pool closed".to_string(),
                }
            })?;
            self.classifier.classify(&payload, &self.taxonomy).await?
        };

        let assigned_team = self.router.route(&result.request_type).to_string();
        let routed = RoutedRequest {
            subject: message.subject,
            sender: message.sender,
            request_type: result.request_type,
            sub_request_type: result.sub_request_type,
            attributes: result.attributes,
            assigned_team,
        };

        self.sink.emit(&routed).await?;

        info!(
            id = %message.id,
            request_type = %routed.request_type,
            sub_request_type = %routed.sub_request_type,
            team = %routed.assigned_team,
            "Routed request"
        );
        Ok(ProcessOutcome::Routed(routed))
    }

    /// Process a fetch batch. Messages run concurrently; every failure is
    /// contained to its message, so a batch of N with one bad message still
    /// yields N-1 routed requests.
    pub async fn process_batch(&self, messages: Vec<RawMessage>) -> Vec<RoutedRequest> {
        let total = messages.len();
        info!(total, "Processing message batch");

        let outcomes: Vec<(String, Result<ProcessOutcome, ProcessError>)> =
            stream::iter(messages)
                .map(|message| async move {
                    let id = message.id.clone();
                    (id, self.process(message).await)
                })
                .buffer_unordered(BATCH_CONCURRENCY)
                .collect()
                .await;

        let mut routed = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(ProcessOutcome::Routed(request)) => routed.push(request),
                Ok(ProcessOutcome::DuplicateSkipped) => {
                    debug!(id = %id, "Skipped duplicate in batch");
                }
                Err(e) => {
                    error!(id = %id, error = %e, "Failed to process message in batch");
                }
            }
        }

        info!(routed = routed.len(), total, "Batch processing complete");
        routed
    }

    /// Distinct payloads seen so far in this run.
    pub fn seen_count(&self) -> usize {
        self.dedup.len()
    }
}
