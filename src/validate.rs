//! Topology validation - collects every finding instead of stopping at the first.

use crate::topology::{Project, Topology};
use regex::Regex;
use reconcile::{Error, Result};
use std::collections::HashSet;
use std::sync::LazyLock;

const TOPIC_NAME_PATTERN: &str = r"^[a-zA-Z0-9._-]+$";
const PRINCIPAL_TYPES: [&str; 3] = ["User:", "Group:", "ServiceAccount:"];

static TOPIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TOPIC_NAME_PATTERN).expect("topic name regex is valid"));

#[derive(Debug, Default, Clone, Copy)]
pub struct TopologyValidator;

impl TopologyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Every problem found in the topology, in descriptor order.
    pub fn validate(&self, topology: &Topology) -> Vec<String> {
        let mut findings = Vec::new();

        if topology.context.trim().is_empty() {
            findings.push("topology context must not be empty".to_string());
        }
        if let Some(source) = &topology.source
            && !TOPIC_NAME.is_match(source)
        {
            findings.push(format!("source '{source}' contains invalid characters"));
        }

        let mut project_names = HashSet::new();
        for project in &topology.projects {
            if project.name.trim().is_empty() {
                findings.push("project name must not be empty".to_string());
            } else if !project_names.insert(project.name.as_str()) {
                findings.push(format!("project '{}' is declared twice", project.name));
            }
            self.validate_project(project, &mut findings);
        }

        findings
    }

    /// Validate and fold the findings into one error.
    pub fn validate_or_err(&self, topology: &Topology) -> Result<()> {
        let findings = self.validate(topology);
        if findings.is_empty() {
            log::debug!(
                "Topology '{}' passed validation ({} projects)",
                topology.context,
                topology.projects.len()
            );
            Ok(())
        } else {
            Err(Error::Validation { findings })
        }
    }

    fn validate_project(&self, project: &Project, findings: &mut Vec<String>) {
        let mut topic_names = HashSet::new();

        for topic in &project.topics {
            let label = format!("{}/{}", project.name, topic.name);

            if !TOPIC_NAME.is_match(&topic.name) {
                findings.push(format!(
                    "topic '{label}' does not match {TOPIC_NAME_PATTERN}"
                ));
            }
            if !topic_names.insert(topic.name.as_str()) {
                findings.push(format!("topic '{label}' is declared twice"));
            }
            if topic.partitions == Some(0) {
                findings.push(format!("topic '{label}' must have at least one partition"));
            }
            if topic.replication_factor == Some(0) {
                findings.push(format!(
                    "topic '{label}' must have a replication factor of at least one"
                ));
            }
        }

        let principals = project
            .consumers
            .iter()
            .map(|c| &c.principal)
            .chain(project.producers.iter().map(|p| &p.principal));
        for principal in principals {
            if !valid_principal(principal) {
                findings.push(format!(
                    "principal '{principal}' in project '{}' must be one of User:, Group:, ServiceAccount: followed by a name",
                    project.name
                ));
            }
        }
    }
}

fn valid_principal(principal: &str) -> bool {
    PRINCIPAL_TYPES.iter().any(|prefix| {
        principal
            .strip_prefix(prefix)
            .is_some_and(|name| !name.trim().is_empty())
    })
}
