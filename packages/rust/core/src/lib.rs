//! Pipeline orchestration and domain logic for LeadConsole.
//!
//! This crate ties the task registry, step log generation, result rendering
//! and session state together into the run lifecycle driven by
//! [`PipelineOrchestrator`](pipeline::PipelineOrchestrator).

pub mod cache;
pub mod cancel;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod scope;
pub mod session;
pub mod steps;

pub use cache::ResultCache;
pub use cancel::CancellationSignal;
pub use pipeline::{
    Pacing, PipelineObserver, PipelineOrchestrator, PipelineSnapshot, SilentObserver,
    TaskSnapshot,
};
pub use registry::TaskDescriptor;
pub use scope::{EntityScopeGuard, ScopeOutcome};
pub use session::PipelineSessionState;
