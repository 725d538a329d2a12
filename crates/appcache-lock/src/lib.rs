//! AppCache-Lock Library
//!
//! Budgeted admission and concurrent locking of directories into the page
//! cache:
//! - Candidate gathering from configured commands and resource directories
//! - Lock tool abstraction (`vmtouch`)
//! - Bounded worker pool with per-operation timeout and terminate/kill escalation
//! - Run supervision with signal-triggered graceful shutdown
//! - Run reporting

pub mod candidates;
pub mod locker;
pub mod orchestration;
pub mod report;
pub mod shutdown;
pub mod supervisor;

pub use locker::{LockCommand, VmtouchLocker};
pub use orchestration::{
    FailureReason, LockOrchestrator, LockOutcome, OrchestratorConfig, OrchestratorState, RunLimits,
};
pub use shutdown::{ShutdownHandle, ShutdownPhase};
pub use supervisor::{RunReport, RunStatus, RunSupervisor};
