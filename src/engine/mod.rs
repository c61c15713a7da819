// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the operation scheduler
//! - the main runtime event loop that reacts to:
//!   - operation completion events
//!   - cancellation requests (e.g. Ctrl-C)
//! - the final execution report
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::dag::OperationKey;
use crate::exec::OperationResult;

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An operation finished (successfully or not).
    OperationCompleted {
        key: OperationKey,
        result: OperationResult,
    },
    /// Stop the run: abort unstarted operations, terminate in-flight ones.
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::{ExecutionReport, OperationRecord};
pub use runtime::Runtime;
