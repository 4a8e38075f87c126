//! Batch matching of source documents into template instance rows.

pub mod cancel;
pub mod engine;
pub mod error;
pub mod options;
pub mod plan;
pub mod progress;
pub mod result;
pub mod sink;

pub use cancel::CancellationToken;
pub use engine::MatchingEngine;
pub use error::MatchError;
pub use options::{MatchOptions, MatchRequest};
pub use plan::{DocumentTransform, TransformPlan};
pub use progress::{
    BroadcastProgress, MatchPhase, MatchProgressEvent, NoopProgress, ProgressEvent,
    ProgressReporter,
};
pub use result::{DocumentOutcome, DocumentStatus, MatchResult, RowSummary};
