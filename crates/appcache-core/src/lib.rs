//! `AppCache-Lock` Core Library
//!
//! Shared functionality for `AppCache-Lock` components:
//! - Candidate directory catalog and budgeted admission
//! - Configuration loading (command/directory lists, settings)
//! - Directory discovery, validation and size measurement
//! - System memory inspection
//! - Common error types

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod format;
pub mod memory;
pub mod selector;
pub mod sizes;
pub mod tracing_init;

pub use catalog::{CandidateEntry, DirectoryCatalog, DirectoryRecord, Source};
pub use config::Settings;
pub use error::{Error, Result};
pub use selector::{Decision, SelectionResult, select};
