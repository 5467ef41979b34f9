//! # Reconcile
//!
//! Persisted-state core for converging a Kafka cluster onto a declared
//! topology.
//!
//! This crate owns everything between "a diff producer decided what to
//! change" and "the outcome is durably recorded": the access binding
//! model, the state backends, the cache and its controller, and the
//! single-use execution plan.
//!
//! ## Core Concepts
//!
//! - **AccessBinding**: One ACL entry (resource, pattern, principal, operation)
//! - **Backend**: Durable store for applied bindings (local file or Redis)
//! - **StateCache**: Deduplicated in-memory mirror of a backend
//! - **StateController**: The only owner of a backend's lifecycle
//! - **ExecutionPlan**: Ordered actions, previewed or applied exactly once
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{BackendSettings, ExecutionPlan, ReportSink, StateController};
//!
//! let controller = StateController::from_settings(&BackendSettings::default());
//! let mut plan = ExecutionPlan::init(controller, ReportSink::stdout())?;
//!
//! // Diff producers inspect plan.bindings() and push actions
//! plan.add(Box::new(my_action))?;
//!
//! // Apply, then persist the resulting binding set
//! let summary = plan.run(false)?;
//! println!("{} actions executed", summary.executed);
//! ```
//!
//! ## Backends
//!
//! - [`backend::file::FileBackend`]: JSON document written atomically
//! - [`backend::redis::RedisBackend`]: RESP2 over TCP, one set per deployment
//!
//! New backends implement [`Backend`]; callers only ever reach them
//! through a [`StateController`].

#![warn(missing_docs)]

pub mod action;
pub mod backend;
pub mod binding;
pub mod cache;
pub mod controller;
pub mod error;
pub mod plan;
pub mod report;

// Re-export main types at crate root
pub use action::{Action, ActionKind, BindingEffect, BoxedAction};
pub use backend::{Backend, BackendKind, BackendSettings, DEFAULT_STATE_FILE};
pub use binding::{AccessBinding, Operation, PatternType, Permission, ResourceType};
pub use cache::{STORE_TYPE, StateCache};
pub use controller::StateController;
pub use error::{Error, ErrorCategory, Result};
pub use plan::{ExecutionPlan, PlanState, PlanSummary};
pub use report::{ReportSink, SharedBuffer};
