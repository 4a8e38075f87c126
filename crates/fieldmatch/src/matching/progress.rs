//! Progress reporting for match runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of a match run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Requested,
    Resolving,
    Batching,
    Transforming,
    Validating,
    Aggregating,
    Done,
    Error,
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPhase::Requested => write!(f, "Requested"),
            MatchPhase::Resolving => write!(f, "Resolving mappings"),
            MatchPhase::Batching => write!(f, "Batching documents"),
            MatchPhase::Transforming => write!(f, "Transforming fields"),
            MatchPhase::Validating => write!(f, "Merging and validating rows"),
            MatchPhase::Aggregating => write!(f, "Aggregating statistics"),
            MatchPhase::Done => write!(f, "Done"),
            MatchPhase::Error => write!(f, "Error"),
        }
    }
}

/// Progress event for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchProgressEvent {
    pub run_id: String,
    pub template_instance_id: String,
    pub phase: MatchPhase,
    pub message: String,
    pub processed_documents: usize,
    pub total_documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted by the engine while a run progresses.
pub enum ProgressEvent {
    Phase {
        phase: MatchPhase,
        message: String,
    },
    BatchCompleted {
        batch: usize,
        processed_documents: usize,
    },
    Completed {
        processed_documents: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers that do not observe progress.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Publishes run progress on a broadcast channel.
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<MatchProgressEvent>>,
    run_id: String,
    template_instance_id: String,
    total_documents: usize,
    processed: std::sync::atomic::AtomicUsize,
}

impl BroadcastProgress {
    pub fn new(
        sender: Arc<broadcast::Sender<MatchProgressEvent>>,
        run_id: &str,
        template_instance_id: &str,
        total_documents: usize,
    ) -> Self {
        Self {
            sender,
            run_id: run_id.to_string(),
            template_instance_id: template_instance_id.to_string(),
            total_documents,
            processed: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Creates a broadcast channel sized for progress streaming.
    pub fn channel(capacity: usize) -> Arc<broadcast::Sender<MatchProgressEvent>> {
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(sender)
    }

    fn send(&self, phase: MatchPhase, message: String, batch: Option<usize>, error: Option<String>) {
        let event = MatchProgressEvent {
            run_id: self.run_id.clone(),
            template_instance_id: self.template_instance_id.clone(),
            phase,
            message,
            processed_documents: self.processed.load(std::sync::atomic::Ordering::Relaxed),
            total_documents: self.total_documents,
            batch,
            error,
            timestamp: Utc::now(),
        };
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        use std::sync::atomic::Ordering;

        match event {
            ProgressEvent::Phase { phase, message } => self.send(phase, message, None, None),
            ProgressEvent::BatchCompleted {
                batch,
                processed_documents,
            } => {
                self.processed.store(processed_documents, Ordering::Relaxed);
                self.send(
                    MatchPhase::Validating,
                    format!("Batch {} completed", batch + 1),
                    Some(batch),
                    None,
                );
            }
            ProgressEvent::Completed {
                processed_documents,
            } => {
                self.processed.store(processed_documents, Ordering::Relaxed);
                self.send(MatchPhase::Done, "Match run completed".to_string(), None, None);
            }
            ProgressEvent::Failed { error } => {
                self.send(MatchPhase::Error, "Match run failed".to_string(), None, Some(error));
            }
        }
    }
}
