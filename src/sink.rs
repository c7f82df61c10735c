//! Result sink — where routed requests go.
//!
//! The sink is a narrow collaborator: the pipeline emits one record per
//! successfully processed unique message and does not care whether that
//! lands on stdout, a queue, or a database.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::message::RoutedRequest;

/// Structured-record consumer for pipeline output.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn emit(&self, request: &RoutedRequest) -> Result<(), SinkError>;
}

/// Prints each routed request to stdout as a pretty JSON record.
pub struct JsonStdoutSink;

#[async_trait]
impl ResultSink for JsonStdoutSink {
    async fn emit(&self, request: &RoutedRequest) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(request)?;
        println!("{json}");
        Ok(())
    }
}

/// Collects routed requests in memory. Test helper, also useful for
/// one-shot embedding.
#[derive(Default)]
pub struct MemorySink {
    records: std::sync::Mutex<Vec<RoutedRequest>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RoutedRequest> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn emit(&self, request: &RoutedRequest) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed() -> RoutedRequest {
        RoutedRequest {
            subject: "Fee Request".into(),
            sender: "a@b.com".into(),
            request_type: "Fee Payment".into(),
            sub_request_type: "Ongoing Fee".into(),
            attributes: serde_json::Map::new(),
            assigned_team: "Finance Team".into(),
        }
    }

    #[tokio::test]
    async fn stdout_sink_emits() {
        JsonStdoutSink.emit(&routed()).await.unwrap();
    }

    #[tokio::test]
    async fn memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        let mut second = routed();
        second.subject = "Second".into();

        sink.emit(&routed()).await.unwrap();
        sink.emit(&second).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject, "Fee Request");
        assert_eq!(records[1].subject, "Second");
    }
}
