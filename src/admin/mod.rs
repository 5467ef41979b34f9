//! Cluster admin port.
//!
//! Diff producers read the live cluster through [`ClusterAdmin`] and the
//! actions they plan mutate it through the same handle. The builder owns the
//! handle and closes it exactly once.

pub mod rest;

use reconcile::{AccessBinding, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Everything needed to create one topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSpec {
    /// Fully-qualified topic name
    pub name: String,
    /// Broker default when absent
    pub partitions: Option<u32>,
    /// Broker default when absent
    pub replication_factor: Option<u16>,
    pub config: BTreeMap<String, String>,
}

/// Administrative operations against a Kafka cluster.
pub trait ClusterAdmin {
    /// Names of all non-internal topics.
    fn list_topics(&self) -> Result<BTreeSet<String>>;

    /// Configuration entries explicitly set on a topic.
    fn topic_config(&self, topic: &str) -> Result<BTreeMap<String, String>>;

    fn create_topic(&self, spec: &TopicSpec) -> Result<()>;

    /// Set the given entries, leaving the others untouched.
    fn update_topic_config(&self, topic: &str, entries: &BTreeMap<String, String>) -> Result<()>;

    fn delete_topic(&self, topic: &str) -> Result<()>;

    fn create_bindings(&self, bindings: &[AccessBinding]) -> Result<()>;

    fn delete_bindings(&self, bindings: &[AccessBinding]) -> Result<()>;

    /// Release the connection. Later calls fail.
    fn close(&self);
}

/// Admin handle shared between the builder, its producers and their actions.
pub type SharedAdmin = Rc<dyn ClusterAdmin>;
