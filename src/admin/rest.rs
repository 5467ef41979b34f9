//! Kafka REST Proxy (v3) admin client.
//!
//! All requests are blocking and go through one `ureq` agent. The cluster id
//! is discovered on first use and reused for the lifetime of the client.

use super::{ClusterAdmin, TopicSpec};
use reconcile::{AccessBinding, Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, OnceCell};
use std::collections::{BTreeMap, BTreeSet};

const JSON: &str = "application/json";

pub struct RestProxyAdmin {
    agent: ureq::Agent,
    base_url: String,
    cluster_id: OnceCell<String>,
    closed: Cell<bool>,
}

impl RestProxyAdmin {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            agent: ureq::Agent::new_with_defaults(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cluster_id: OnceCell::new(),
            closed: Cell::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::cluster("admin client is closed"));
        }
        Ok(())
    }

    fn cluster_id(&self) -> Result<String> {
        self.ensure_open()?;
        if let Some(id) = self.cluster_id.get() {
            return Ok(id.clone());
        }

        let url = format!("{}/v3/clusters", self.base_url);
        let clusters: DataList<ClusterData> = self
            .agent
            .get(&url)
            .header("Accept", JSON)
            .call()
            .map_err(|e| request_error("GET", &url, e))?
            .body_mut()
            .read_json()
            .map_err(|e| request_error("GET", &url, e))?;

        let id = clusters
            .data
            .into_iter()
            .next()
            .map(|c| c.cluster_id)
            .ok_or_else(|| Error::cluster(format!("{url} returned no clusters")))?;

        log::debug!("Discovered cluster id {id} at {}", self.base_url);
        let _ = self.cluster_id.set(id.clone());
        Ok(id)
    }

    fn cluster_url(&self) -> Result<String> {
        Ok(format!("{}/v3/clusters/{}", self.base_url, self.cluster_id()?))
    }
}

impl ClusterAdmin for RestProxyAdmin {
    fn list_topics(&self) -> Result<BTreeSet<String>> {
        let url = format!("{}/topics", self.cluster_url()?);
        let topics: DataList<TopicData> = self
            .agent
            .get(&url)
            .header("Accept", JSON)
            .call()
            .map_err(|e| request_error("GET", &url, e))?
            .body_mut()
            .read_json()
            .map_err(|e| request_error("GET", &url, e))?;

        Ok(visible_topics(topics.data))
    }

    fn topic_config(&self, topic: &str) -> Result<BTreeMap<String, String>> {
        let url = format!("{}/topics/{topic}/configs", self.cluster_url()?);
        let configs: DataList<ConfigData> = self
            .agent
            .get(&url)
            .header("Accept", JSON)
            .call()
            .map_err(|e| request_error("GET", &url, e))?
            .body_mut()
            .read_json()
            .map_err(|e| request_error("GET", &url, e))?;

        Ok(explicit_configs(configs.data))
    }

    fn create_topic(&self, spec: &TopicSpec) -> Result<()> {
        let url = format!("{}/topics", self.cluster_url()?);
        self.agent
            .post(&url)
            .header("Accept", JSON)
            .send_json(CreateTopicRequest::from(spec))
            .map_err(|e| request_error("POST", &url, e))?;
        Ok(())
    }

    fn update_topic_config(&self, topic: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        let url = format!("{}/topics/{topic}/configs:alter", self.cluster_url()?);
        let body = AlterConfigsRequest {
            data: config_entries(entries),
        };
        self.agent
            .post(&url)
            .header("Accept", JSON)
            .send_json(&body)
            .map_err(|e| request_error("POST", &url, e))?;
        Ok(())
    }

    fn delete_topic(&self, topic: &str) -> Result<()> {
        let url = format!("{}/topics/{topic}", self.cluster_url()?);
        self.agent
            .delete(&url)
            .call()
            .map_err(|e| request_error("DELETE", &url, e))?;
        Ok(())
    }

    fn create_bindings(&self, bindings: &[AccessBinding]) -> Result<()> {
        let url = format!("{}/acls", self.cluster_url()?);
        for binding in bindings {
            log::debug!("Creating ACL {binding}");
            self.agent
                .post(&url)
                .header("Accept", JSON)
                .send_json(AclRequest::from(binding))
                .map_err(|e| request_error("POST", &url, e))?;
        }
        Ok(())
    }

    fn delete_bindings(&self, bindings: &[AccessBinding]) -> Result<()> {
        let url = format!("{}/acls", self.cluster_url()?);
        for binding in bindings {
            log::debug!("Deleting ACL {binding}");
            let mut request = self.agent.delete(&url);
            for (key, value) in acl_query(binding) {
                request = request.query(key, value);
            }
            request
                .call()
                .map_err(|e| request_error("DELETE", &url, e))?;
        }
        Ok(())
    }

    fn close(&self) {
        if !self.closed.replace(true) {
            log::debug!("Closed admin client for {}", self.base_url);
        }
    }
}

fn request_error(method: &str, url: &str, e: ureq::Error) -> Error {
    Error::cluster(format!("{method} {url}: {e}"))
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ClusterData {
    cluster_id: String,
}

#[derive(Debug, Deserialize)]
struct TopicData {
    topic_name: String,
    #[serde(default)]
    is_internal: bool,
}

#[derive(Debug, Deserialize)]
struct ConfigData {
    name: String,
    value: Option<String>,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ConfigEntry {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct CreateTopicRequest {
    topic_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    partitions_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replication_factor: Option<u16>,
    configs: Vec<ConfigEntry>,
}

impl From<&TopicSpec> for CreateTopicRequest {
    fn from(spec: &TopicSpec) -> Self {
        Self {
            topic_name: spec.name.clone(),
            partitions_count: spec.partitions,
            replication_factor: spec.replication_factor,
            configs: config_entries(&spec.config),
        }
    }
}

#[derive(Debug, Serialize)]
struct AlterConfigsRequest {
    data: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
struct AclRequest<'a> {
    resource_type: &'static str,
    resource_name: &'a str,
    pattern_type: &'static str,
    principal: &'a str,
    host: &'a str,
    operation: &'static str,
    permission: &'static str,
}

impl<'a> From<&'a AccessBinding> for AclRequest<'a> {
    fn from(binding: &'a AccessBinding) -> Self {
        Self {
            resource_type: binding.resource_type.as_str(),
            resource_name: &binding.resource_name,
            pattern_type: binding.pattern.as_str(),
            principal: &binding.principal,
            host: &binding.host,
            operation: binding.operation.as_str(),
            permission: binding.permission.as_str(),
        }
    }
}

fn acl_query(binding: &AccessBinding) -> [(&'static str, &str); 7] {
    [
        ("resource_type", binding.resource_type.as_str()),
        ("resource_name", &binding.resource_name),
        ("pattern_type", binding.pattern.as_str()),
        ("principal", &binding.principal),
        ("host", &binding.host),
        ("operation", binding.operation.as_str()),
        ("permission", binding.permission.as_str()),
    ]
}

fn config_entries(config: &BTreeMap<String, String>) -> Vec<ConfigEntry> {
    config
        .iter()
        .map(|(name, value)| ConfigEntry {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn visible_topics(topics: Vec<TopicData>) -> BTreeSet<String> {
    topics
        .into_iter()
        .filter(|t| !t.is_internal && !t.topic_name.starts_with('_'))
        .map(|t| t.topic_name)
        .collect()
}

fn explicit_configs(configs: Vec<ConfigData>) -> BTreeMap<String, String> {
    configs
        .into_iter()
        .filter(|c| !c.is_default)
        .filter_map(|c| c.value.map(|value| (c.name, value)))
        .collect()
}
