//! Diff producers - compare desired and live state, append actions to a plan.
//!
//! Producers run in a fixed order: topics first, then access control, since
//! a binding may reference a topic the same run creates.

pub mod acls;
pub mod topics;

pub use acls::AccessControlManager;
pub use topics::TopicManager;

use crate::topology::Topology;
use reconcile::{ExecutionPlan, Result};
use std::io::Write;

pub trait DiffProducer {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Append every action needed to converge the cluster onto `topology`.
    ///
    /// Producers are idempotent: against an already converged cluster they
    /// append nothing.
    fn apply(&mut self, topology: &Topology, plan: &mut ExecutionPlan) -> Result<()>;

    /// Write this producer's view of the reconciled state.
    fn print_current_state(&self, plan: &ExecutionPlan, out: &mut dyn Write) -> Result<()>;
}
