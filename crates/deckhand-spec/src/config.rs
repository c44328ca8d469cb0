//! Canonical configuration types.
//!
//! The output of the transform pipeline: every shorthand expanded, every
//! default applied, commands split into argument lists, and identity
//! fields stamped. Field names and nesting are consumed by external
//! tooling and must stay stable.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::spec::{Scalar, deserialize_present};

/// A compiled component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// `account/component`.
    pub name: String,
    /// Version tag.
    pub tag: String,
    /// `account/component:tag`, plus `@instance_name` for named instances.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Identifier of a deployed instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Name of a deployed instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    /// When the instance was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_date: Option<DateTime<Utc>>,
    /// Parent component reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Local parent directory, from a `file:` extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Author contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterConfig>,
    /// Long-running workloads.
    #[serde(default)]
    pub services: IndexMap<String, ServiceConfig>,
    /// Scheduled or one-shot workloads.
    #[serde(default)]
    pub tasks: IndexMap<String, TaskConfig>,
    /// Component slug to version tag.
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    /// Interfaces exposed to consumers.
    #[serde(default)]
    pub interfaces: IndexMap<String, ComponentInterfaceConfig>,
}

/// A parameter with its default resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Whether a value must be supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` when absent, `Some(None)` when explicitly unset.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Option<Scalar>>,
}

/// Image build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build context directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Dockerfile path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Build arguments.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,
}

impl BuildConfig {
    /// The build synthesized when a resource names neither image nor build.
    #[must_use]
    pub fn implicit() -> Self {
        Self {
            context: Some(".".into()),
            ..Self::default()
        }
    }

    /// Returns `true` if this is exactly the synthesized default.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        *self == Self::implicit()
    }
}

/// A volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Path inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    /// Path on the local machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
    /// Identifier of a platform-provided volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Mount read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<String>,
}

/// A service or component interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Credentials user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Credentials password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Full URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Session affinity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<String>,
}

/// A component-level interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInterfaceConfig {
    /// The interface fields.
    #[serde(flatten)]
    pub interface: InterfaceConfig,
    /// Public exposure settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressConfig>,
}

/// Public exposure of a component interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Whether the ingress is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Subdomain under the environment's DNS zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// A health check with its defaults backfilled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessProbeConfig {
    /// Consecutive successes required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<String>,
    /// Consecutive failures tolerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<String>,
    /// Per-probe timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Time between probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Delay before the first probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<String>,
    /// HTTP path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// HTTP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Command arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Autoscaling bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<String>,
    /// Upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<String>,
    /// Utilization targets.
    #[serde(default)]
    pub metrics: ScalingMetricsConfig,
}

/// Autoscaling utilization targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingMetricsConfig {
    /// CPU percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Fields common to services and tasks, plus a variant extension `X`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig<X> {
    /// The resource's key in its component.
    pub name: String,
    /// `account/component/resource:tag`.
    #[serde(rename = "ref")]
    pub reference: String,
    /// The component's tag.
    pub tag: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    /// Command arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Entrypoint arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Environment variables.
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    /// Named volumes.
    #[serde(default)]
    pub volumes: IndexMap<String, VolumeConfig>,
    /// CPU allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// Sibling services that must start first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    /// Local debug override. Never itself carries a debug block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Box<Self>>,
    /// Variant-specific fields.
    #[serde(flatten)]
    pub extension: X,
}

/// Fields only services carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceExtension {
    /// Exposed interfaces.
    #[serde(default)]
    pub interfaces: IndexMap<String, InterfaceConfig>,
    /// Health check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<LivenessProbeConfig>,
    /// Fixed replica count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<String>,
    /// Autoscaling bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingConfig>,
}

/// Fields only tasks carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExtension {
    /// Cron schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// A compiled service.
pub type ServiceConfig = ResourceConfig<ServiceExtension>;
/// A compiled task.
pub type TaskConfig = ResourceConfig<TaskExtension>;

/// Which dictionary of a component a resource lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// `services.<name>`
    Services,
    /// `tasks.<name>`
    Tasks,
}

impl ResourceType {
    /// The dictionary key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Services => "services",
            Self::Tasks => "tasks",
        }
    }
}

impl ComponentConfig {
    /// The account half of `name`, if any.
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.name.split_once('/').map(|(account, _)| account)
    }

    /// The component half of `name`.
    #[must_use]
    pub fn component_name(&self) -> &str {
        self.name
            .split_once('/')
            .map_or(self.name.as_str(), |(_, component)| component)
    }

    /// `name:tag`, qualified with `@instance_name` for named instances.
    #[must_use]
    pub fn component_ref(&self) -> String {
        match &self.instance_name {
            Some(instance) => format!("{}:{}@{instance}", self.name, self.tag),
            None => format!("{}:{}", self.name, self.tag),
        }
    }

    /// `name/resource:tag` for one of this component's services or tasks.
    #[must_use]
    pub fn resource_ref(&self, resource: &str) -> String {
        resource_ref(&self.name, resource, &self.tag)
    }
}

/// `component/resource:tag`, the ref of a service or task.
#[must_use]
pub fn resource_ref(component: &str, resource: &str, tag: &str) -> String {
    format!("{component}/{resource}:{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_field_serializes_as_ref() {
        let config = ComponentConfig {
            name: "acct/comp".into(),
            tag: "latest".into(),
            reference: "acct/comp:latest".into(),
            ..ComponentConfig::default()
        };
        let json = serde_json::to_value(&config).expect("should serialize");
        assert_eq!(json["ref"], "acct/comp:latest");
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn service_extension_flattens_into_resource() {
        let mut service = ServiceConfig::default();
        let _ = service
            .extension
            .interfaces
            .insert("main".into(), InterfaceConfig::default());
        let json = serde_json::to_value(&service).expect("should serialize");
        assert!(json["interfaces"].get("main").is_some());
        let back: ServiceConfig = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(back, service);
    }

    #[test]
    fn explicit_null_default_survives_json() {
        let parameter = ParameterConfig {
            default: Some(None),
            ..ParameterConfig::default()
        };
        let json = serde_json::to_value(&parameter).expect("should serialize");
        assert!(json["default"].is_null());
        let back: ParameterConfig = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(back.default, Some(None));
    }

    #[test]
    fn implicit_build_is_recognized() {
        assert!(BuildConfig::implicit().is_implicit());
        let explicit = BuildConfig {
            context: Some("./api".into()),
            ..BuildConfig::default()
        };
        assert!(!explicit.is_implicit());
    }

    #[test]
    fn name_halves() {
        let config = ComponentConfig {
            name: "acct/comp".into(),
            ..ComponentConfig::default()
        };
        assert_eq!(config.account(), Some("acct"));
        assert_eq!(config.component_name(), "comp");
    }
}
