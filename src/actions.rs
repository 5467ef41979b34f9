//! Cluster mutations planned by the diff producers.

use crate::admin::{SharedAdmin, TopicSpec};
use reconcile::{AccessBinding, Action, ActionKind, BindingEffect, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Create one topic.
pub struct CreateTopic {
    admin: SharedAdmin,
    spec: TopicSpec,
}

impl CreateTopic {
    pub fn new(admin: SharedAdmin, spec: TopicSpec) -> Self {
        Self { admin, spec }
    }
}

impl Action for CreateTopic {
    fn kind(&self) -> ActionKind {
        ActionKind::CreateTopic
    }

    fn description(&self) -> String {
        let mut details = Vec::new();
        if let Some(partitions) = self.spec.partitions {
            details.push(format!("partitions={partitions}"));
        }
        if let Some(replication) = self.spec.replication_factor {
            details.push(format!("replication={replication}"));
        }
        details.extend(self.spec.config.iter().map(|(k, v)| format!("{k}={v}")));

        if details.is_empty() {
            format!("create topic {}", self.spec.name)
        } else {
            format!("create topic {} ({})", self.spec.name, details.join(", "))
        }
    }

    fn run(&self) -> Result<()> {
        self.admin.create_topic(&self.spec)
    }
}

/// Set configuration entries on an existing topic.
pub struct UpdateTopicConfig {
    admin: SharedAdmin,
    topic: String,
    changes: BTreeMap<String, String>,
}

impl UpdateTopicConfig {
    pub fn new(admin: SharedAdmin, topic: String, changes: BTreeMap<String, String>) -> Self {
        Self {
            admin,
            topic,
            changes,
        }
    }
}

impl Action for UpdateTopicConfig {
    fn kind(&self) -> ActionKind {
        ActionKind::UpdateTopicConfig
    }

    fn description(&self) -> String {
        let changes: Vec<_> = self
            .changes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("update topic {} config ({})", self.topic, changes.join(", "))
    }

    fn run(&self) -> Result<()> {
        self.admin.update_topic_config(&self.topic, &self.changes)
    }
}

/// Delete topics no longer described.
pub struct DeleteTopics {
    admin: SharedAdmin,
    topics: BTreeSet<String>,
}

impl DeleteTopics {
    pub fn new(admin: SharedAdmin, topics: BTreeSet<String>) -> Self {
        Self { admin, topics }
    }
}

impl Action for DeleteTopics {
    fn kind(&self) -> ActionKind {
        ActionKind::DeleteTopics
    }

    fn description(&self) -> String {
        let names: Vec<_> = self.topics.iter().map(String::as_str).collect();
        format!("delete topics {}", names.join(", "))
    }

    fn run(&self) -> Result<()> {
        for topic in &self.topics {
            self.admin.delete_topic(topic)?;
        }
        Ok(())
    }
}

/// Create access bindings; they join the applied set on success.
pub struct CreateBindings {
    admin: SharedAdmin,
    bindings: Vec<AccessBinding>,
}

impl CreateBindings {
    pub fn new(admin: SharedAdmin, bindings: Vec<AccessBinding>) -> Self {
        Self { admin, bindings }
    }
}

impl Action for CreateBindings {
    fn kind(&self) -> ActionKind {
        ActionKind::CreateBindings
    }

    fn description(&self) -> String {
        format!("create bindings [{}]", join(&self.bindings))
    }

    fn run(&self) -> Result<()> {
        self.admin.create_bindings(&self.bindings)
    }

    fn effect(&self) -> BindingEffect {
        BindingEffect::Grant(self.bindings.clone())
    }
}

/// Remove stale access bindings; they leave the applied set on success.
pub struct ClearBindings {
    admin: SharedAdmin,
    bindings: Vec<AccessBinding>,
}

impl ClearBindings {
    pub fn new(admin: SharedAdmin, bindings: Vec<AccessBinding>) -> Self {
        Self { admin, bindings }
    }
}

impl Action for ClearBindings {
    fn kind(&self) -> ActionKind {
        ActionKind::ClearBindings
    }

    fn description(&self) -> String {
        format!("clear bindings [{}]", join(&self.bindings))
    }

    fn run(&self) -> Result<()> {
        self.admin.delete_bindings(&self.bindings)
    }

    fn effect(&self) -> BindingEffect {
        BindingEffect::Revoke(self.bindings.clone())
    }
}

fn join(bindings: &[AccessBinding]) -> String {
    bindings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

macro_rules! debug_via_description {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.description())
                }
            }
        )+
    };
}

debug_via_description!(
    CreateTopic,
    UpdateTopicConfig,
    DeleteTopics,
    CreateBindings,
    ClearBindings,
);
