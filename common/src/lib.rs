//! Common utilities and abstractions for the taskgrade harness.
//!
//! This crate provides the error taxonomy and the named-table store shared by
//! the fixture generator and the graders.

pub mod error;
pub mod storage;

pub use error::{CommonError, Diagnose, ErrorCategory, ErrorContext, ErrorSeverity, Result};
pub use storage::{StoreBackend, StoreConfig, StoreStats, TableStore, TableStoreBuilder};
