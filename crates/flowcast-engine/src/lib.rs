//! Probabilistic forecasting and flow-diagnostic analytics engine (§4.2-§4.9).
//!
//! Pure, storage-agnostic computation over `flowcast_types` domain objects.
//! Every operation here takes already-loaded events/issues and a reference
//! time; none of it touches the filesystem — that is `flowcast-store`'s job.

pub mod discovery;
pub mod flow;
pub mod histogram;
pub mod reconstruct;
pub mod session;
pub mod simulation;
pub mod stats;
pub mod walkforward;
pub mod xmr;

pub use discovery::{discover, DiscoveredStatus, DiscoveryResult};
pub use flow::{
    calculate_inventory_age, cadence, cumulative_flow_diagram, flow_debt, pressure, status_persistence, tier_summary, yield_ratio,
    AgingEntry, CadenceStats, CfdPoint, StatusPersistenceEntry, TierSummary,
};
pub use histogram::{build_histogram, HistogramInputs};
pub use reconstruct::{reconstruct_all, reconstruct_issue, IsFinished, ReconstructOptions};
pub use session::{is_delivered, project, AnalysisSession, Partition, Projection};
pub use simulation::{simulate, SimulationConfig, SimulationTask, WipContext};
pub use walkforward::{run_walk_forward, Checkpoint, WalkForwardConfig, WalkForwardMode, WalkForwardResult};
pub use xmr::{subgroup_averages, three_way, wip_run_chart, wip_stability, xmr as compute_xmr, WipInterval};
