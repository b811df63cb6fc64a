//! Wire and domain schemas for the flowcast analytics engine.
//!
//! This crate holds data only: event records, the reconstructed issue model,
//! the analysis window value type, and the result envelopes the engine
//! produces. Behavior that needs more than one of these types together lives
//! in `flowcast-engine`.

mod event;
mod histogram;
mod issue;
mod simulation;
mod status;
mod window;
mod xmr;

pub use event::{EventType, IssueEvent};
pub use histogram::{Histogram, HistogramMeta};
pub use issue::{DomainIssue, Transition};
pub use simulation::{
    PercentileLabels, PercentileSet, Predictability, SimulationMode, SimulationResult,
    SpreadStats,
};
pub use status::{Outcome, Role, StatusMetadata, Tier, WorkflowMapping};
pub use window::{AnalysisWindow, Bucket};
pub use xmr::{ProcessStatus, Signal, SignalType, XmRResult};
