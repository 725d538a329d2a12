//! Lock orchestration: worker pool, live-process state and the orchestrator.
//!
//! - [`WorkerPool`]: Semaphore-based limiter for concurrent lock operations.
//! - [`OrchestratorState`]: Live child processes and locked paths for one run.
//! - [`LockOrchestrator`]: Runs one lock operation per path with timeout,
//!   terminate/kill escalation and cooperative cancellation.

pub mod orchestrator;
pub mod outcome;
pub mod pool;
pub mod process;
pub mod state;

pub use orchestrator::{LockOrchestrator, OrchestratorConfig, RunLimits};
pub use outcome::{FailureReason, LockOutcome};
pub use pool::WorkerPool;
pub use state::OrchestratorState;
