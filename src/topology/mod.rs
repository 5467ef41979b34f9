//! Desired-state model read from topology descriptors.

pub mod parser;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Everything one descriptor (or descriptor directory) declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Top-level namespace, first segment of every topic name
    pub context: String,

    /// Optional data source, second segment when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Topology {
    /// Prefix shared by every topic of this topology, with trailing dot.
    pub fn prefix(&self) -> String {
        match &self.source {
            Some(source) => format!("{}.{}.", self.context, source),
            None => format!("{}.", self.context),
        }
    }

    /// Prefix shared by every topic of one project, with trailing dot.
    pub fn project_prefix(&self, project: &Project) -> String {
        format!("{}{}.", self.prefix(), project.name)
    }

    /// Fully-qualified name of a project topic.
    pub fn topic_name(&self, project: &Project, topic: &Topic) -> String {
        format!("{}{}", self.project_prefix(project), topic.name)
    }

    /// Every described topic with its fully-qualified name.
    pub fn topics(&self) -> impl Iterator<Item = (String, &Topic)> {
        self.projects.iter().flat_map(move |project| {
            project
                .topics
                .iter()
                .map(move |topic| (self.topic_name(project, topic), topic))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub consumers: Vec<Consumer>,

    #[serde(default)]
    pub producers: Vec<Producer>,

    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// Principal reading from a project's topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub principal: String,

    /// Consumer group; any group (`*`) when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Consumer {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or("*")
    }
}

/// Principal writing to a project's topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub principal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Short name, unique within its project
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u16>,

    /// Topic-level configuration overrides
    #[serde(default, deserialize_with = "string_map")]
    pub config: BTreeMap<String, String>,
}

/// Accept scalar config values of any type (`retention.ms: 3600000`).
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}
