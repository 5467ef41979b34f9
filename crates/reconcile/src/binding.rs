//! Access-control bindings tracked by the state backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cluster resource a binding grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// A topic, or topics sharing a prefix
    Topic,
    /// A consumer group
    Group,
    /// The cluster itself
    Cluster,
    /// A transactional producer id
    TransactionalId,
}

/// How the resource name is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    /// Exact resource name (or `*`)
    Literal,
    /// Resource names starting with the given prefix
    Prefixed,
}

/// Operation granted by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Every operation
    All,
    /// Consume, or join a consumer group
    Read,
    /// Produce
    Write,
    /// Create the resource
    Create,
    /// Delete the resource
    Delete,
    /// Change the resource
    Alter,
    /// Read metadata
    Describe,
    /// Read configuration
    DescribeConfigs,
    /// Change configuration
    AlterConfigs,
    /// Produce with idempotence enabled
    IdempotentWrite,
}

/// Whether the binding allows or denies the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Grant the operation
    Allow,
    /// Refuse the operation, overriding any allow
    Deny,
}

macro_rules! wire_name {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Name used on the wire and in reports.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_name!(ResourceType {
    Topic => "TOPIC",
    Group => "GROUP",
    Cluster => "CLUSTER",
    TransactionalId => "TRANSACTIONAL_ID",
});

wire_name!(PatternType {
    Literal => "LITERAL",
    Prefixed => "PREFIXED",
});

wire_name!(Operation {
    All => "ALL",
    Read => "READ",
    Write => "WRITE",
    Create => "CREATE",
    Delete => "DELETE",
    Alter => "ALTER",
    Describe => "DESCRIBE",
    DescribeConfigs => "DESCRIBE_CONFIGS",
    AlterConfigs => "ALTER_CONFIGS",
    IdempotentWrite => "IDEMPOTENT_WRITE",
});

wire_name!(Permission {
    Allow => "ALLOW",
    Deny => "DENY",
});

/// A single access-control grant.
///
/// Bindings are plain values: two bindings with identical fields are the
/// same binding, whichever order they were produced in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessBinding {
    /// What kind of resource is covered
    pub resource_type: ResourceType,
    /// Resource name, or prefix for [`PatternType::Prefixed`]
    pub resource_name: String,
    /// How `resource_name` is matched
    pub pattern: PatternType,
    /// Principal, e.g. `User:billing`
    pub principal: String,
    /// Granted operation
    pub operation: Operation,
    /// Allow or deny
    pub permission: Permission,
    /// Client host the binding applies to, `*` for any
    pub host: String,
}

impl AccessBinding {
    /// Create an ALLOW binding from any host.
    pub fn allow(
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        pattern: PatternType,
        principal: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            resource_type,
            resource_name: resource_name.into(),
            pattern,
            principal: principal.into(),
            operation,
            permission: Permission::Allow,
            host: "*".to_string(),
        }
    }

    /// Grant an operation on every topic starting with `prefix`.
    pub fn prefixed_topic(
        prefix: impl Into<String>,
        principal: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self::allow(
            ResourceType::Topic,
            prefix,
            PatternType::Prefixed,
            principal,
            operation,
        )
    }

    /// Grant an operation on a single topic.
    pub fn literal_topic(
        topic: impl Into<String>,
        principal: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self::allow(
            ResourceType::Topic,
            topic,
            PatternType::Literal,
            principal,
            operation,
        )
    }

    /// Grant an operation on a consumer group (`*` for any group).
    pub fn group(
        group: impl Into<String>,
        principal: impl Into<String>,
        operation: Operation,
    ) -> Self {
        let group = group.into();
        let pattern = if group == "*" {
            PatternType::Literal
        } else {
            PatternType::Prefixed
        };
        Self::allow(ResourceType::Group, group, pattern, principal, operation)
    }

    /// Override the host the binding applies to.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

impl fmt::Display for AccessBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}:{} {} from {}",
            self.principal,
            self.permission,
            self.operation,
            self.resource_type,
            self.pattern,
            self.resource_name,
            self.host
        )
    }
}
