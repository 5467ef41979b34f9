//! Execution plan - single-use, ordered list of cluster mutations
//!
//! Lifecycle:
//!
//! ```text
//! Empty --add--> Building --run(dry_run=true)--> Previewed
//!   |                |
//!   |                +----run(dry_run=false)---> Applied (state flushed)
//!   +--run-----------------------------------> Previewed | Applied
//! ```
//!
//! Any state reached by `run` is closed: further `add` or `run` calls fail
//! with [`Error::PlanClosed`].

use crate::action::{BindingEffect, BoxedAction};
use crate::binding::AccessBinding;
use crate::controller::StateController;
use crate::error::{Error, Result};
use crate::report::ReportSink;
use std::collections::HashSet;

/// Where a plan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    /// No actions yet
    Empty,
    /// Producers are appending actions
    Building,
    /// Ran in dry-run mode
    Previewed,
    /// Ran against the cluster and flushed state
    Applied,
    /// An action or the final flush failed
    Failed,
}

impl PlanState {
    /// Whether the plan already ran.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Previewed | Self::Applied | Self::Failed)
    }
}

/// Outcome counters for one plan run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Actions executed against the cluster
    pub executed: usize,
    /// Actions only described (dry run)
    pub previewed: usize,
    /// Bindings added to the applied set
    pub granted: usize,
    /// Bindings removed from the applied set
    pub revoked: usize,
}

impl PlanSummary {
    /// Total number of actions handled.
    pub fn total(&self) -> usize {
        self.executed + self.previewed
    }
}

/// Ordered collection of pending actions bound to a state controller.
pub struct ExecutionPlan {
    actions: Vec<BoxedAction>,
    bindings: HashSet<AccessBinding>,
    controller: StateController,
    sink: ReportSink,
    state: PlanState,
}

impl ExecutionPlan {
    /// Create an empty plan.
    ///
    /// Loads the controller so producers can see the previously-applied
    /// bindings through [`ExecutionPlan::bindings`]. The backend is released
    /// again right after loading; only a successful apply reopens it.
    pub fn init(mut controller: StateController, sink: ReportSink) -> Result<Self> {
        let loaded = controller.load();
        controller.close();
        loaded?;
        let bindings = controller.bindings();
        log::debug!(
            "Initialized execution plan with {} applied bindings from the {} backend",
            bindings.len(),
            controller.backend_name()
        );

        Ok(Self {
            actions: Vec::new(),
            bindings,
            controller,
            sink,
            state: PlanState::Empty,
        })
    }

    /// Append an action.
    pub fn add(&mut self, action: BoxedAction) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::PlanClosed);
        }
        log::debug!("Planned: {}", action.description());
        self.actions.push(action);
        self.state = PlanState::Building;
        Ok(())
    }

    /// Append several actions, keeping their order.
    pub fn add_all<I>(&mut self, actions: I) -> Result<()>
    where
        I: IntoIterator<Item = BoxedAction>,
    {
        for action in actions {
            self.add(action)?;
        }
        Ok(())
    }

    /// Bindings applied by previous runs (updated after a successful apply).
    pub fn bindings(&self) -> &HashSet<AccessBinding> {
        &self.bindings
    }

    /// Planned actions in execution order.
    pub fn actions(&self) -> &[BoxedAction] {
        &self.actions
    }

    /// Number of planned actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing was planned.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlanState {
        self.state
    }

    /// The controller persisting this plan's outcome.
    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    /// Release the plan, handing back its controller.
    pub fn into_controller(self) -> StateController {
        self.controller
    }

    /// Run the plan once: describe it (`dry_run`) or apply and persist it.
    pub fn run(&mut self, dry_run: bool) -> Result<PlanSummary> {
        if self.state.is_closed() {
            return Err(Error::PlanClosed);
        }

        if dry_run {
            self.preview()
        } else {
            self.apply()
        }
    }

    fn preview(&mut self) -> Result<PlanSummary> {
        self.state = PlanState::Previewed;

        if self.actions.is_empty() {
            self.sink.line("Execution plan (dry run): no changes")?;
            return Ok(PlanSummary::default());
        }

        self.sink.line(&format!(
            "Execution plan (dry run): {} actions",
            self.actions.len()
        ))?;
        for action in &self.actions {
            self.sink.line(&format!(
                "  {} {}",
                action.kind().symbol(),
                action.description()
            ))?;
        }

        Ok(PlanSummary {
            previewed: self.actions.len(),
            ..Default::default()
        })
    }

    fn apply(&mut self) -> Result<PlanSummary> {
        let mut summary = PlanSummary::default();
        let mut applied = self.bindings.clone();

        for action in &self.actions {
            let description = action.description();
            log::info!("Applying: {description}");

            if let Err(e) = action.run() {
                self.state = PlanState::Failed;
                log::debug!(
                    "Aborting plan after {} of {} actions",
                    summary.executed,
                    self.actions.len()
                );
                return Err(match e {
                    Error::Execution { .. } => e,
                    other => Error::Execution {
                        action: description,
                        message: other.to_string(),
                    },
                });
            }
            summary.executed += 1;

            match action.effect() {
                BindingEffect::None => {}
                BindingEffect::Grant(bindings) => {
                    for binding in bindings {
                        if applied.insert(binding) {
                            summary.granted += 1;
                        }
                    }
                }
                BindingEffect::Revoke(bindings) => {
                    for binding in &bindings {
                        if applied.remove(binding) {
                            summary.revoked += 1;
                        }
                    }
                }
            }
        }

        self.controller.reset();
        self.controller.add_all(applied.iter().cloned());
        if let Err(e) = self.controller.flush_and_close() {
            // Keep the cache equal to what the backend last accepted
            self.controller.reset();
            self.controller.add_all(self.bindings.iter().cloned());
            self.state = PlanState::Failed;
            return Err(e);
        }

        self.bindings = applied;
        self.state = PlanState::Applied;
        Ok(summary)
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("state", &self.state)
            .field("actions", &self.actions)
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}
