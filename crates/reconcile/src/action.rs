//! Action trait for execution plans
//!
//! An Action is one mutation against the live cluster, produced by a diff
//! producer and executed (or only described) by an [`ExecutionPlan`].
//!
//! [`ExecutionPlan`]: crate::plan::ExecutionPlan

use crate::binding::AccessBinding;
use crate::error::Result;
use std::fmt;

/// Broad category of an action, used for reporting and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Create a missing topic
    CreateTopic,
    /// Alter config entries of an existing topic
    UpdateTopicConfig,
    /// Delete topics no longer described
    DeleteTopics,
    /// Grant bindings
    CreateBindings,
    /// Revoke bindings
    ClearBindings,
}

impl ActionKind {
    /// Whether the action changes topics rather than bindings.
    pub fn is_topic(&self) -> bool {
        matches!(
            self,
            Self::CreateTopic | Self::UpdateTopicConfig | Self::DeleteTopics
        )
    }

    /// Marker used in previews.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::CreateTopic | Self::CreateBindings => "+",
            Self::UpdateTopicConfig => "~",
            Self::DeleteTopics | Self::ClearBindings => "-",
        }
    }
}

/// How a successful action changes the set of applied bindings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BindingEffect {
    /// Bindings are unaffected
    #[default]
    None,
    /// These bindings now exist on the cluster
    Grant(Vec<AccessBinding>),
    /// These bindings no longer exist on the cluster
    Revoke(Vec<AccessBinding>),
}

/// Core trait for plan entries
///
/// # Example
///
/// ```ignore
/// use reconcile::{Action, ActionKind};
///
/// #[derive(Debug)]
/// struct CreateTopic { name: String }
///
/// impl Action for CreateTopic {
///     fn kind(&self) -> ActionKind { ActionKind::CreateTopic }
///     fn description(&self) -> String { format!("create topic {}", self.name) }
///     fn run(&self) -> reconcile::Result<()> { /* call the admin API */ Ok(()) }
/// }
/// ```
pub trait Action: fmt::Debug {
    /// Category of the action.
    fn kind(&self) -> ActionKind;

    /// Human-readable, single-line description used in previews and errors.
    fn description(&self) -> String;

    /// Perform the mutation.
    fn run(&self) -> Result<()>;

    /// Effect on the applied binding set once `run` succeeded.
    fn effect(&self) -> BindingEffect {
        BindingEffect::None
    }
}

/// A boxed action for type-erased storage
pub type BoxedAction = Box<dyn Action>;
