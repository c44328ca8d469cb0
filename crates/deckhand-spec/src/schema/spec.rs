//! Author-facing document types.
//!
//! These mirror a component document as written, shorthand forms and all.
//! They are deserialized from a YAML value that already passed the
//! structure check in [`super::structure`], and the transform pipeline turns
//! them into [`crate::config`] types.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// A scalar as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// `true` or `false`.
    Bool(bool),
    /// An integer literal.
    Integer(i64),
    /// A floating-point literal.
    Float(f64),
    /// Any string.
    String(String),
}

impl Scalar {
    /// Interprets booleans and boolean-strings.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) if s == "true" => Some(true),
            Self::String(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    /// Returns the string payload if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

/// Deserializes a present field as `Some`, keeping an explicit null as
/// `Some(None)` so it stays distinct from an absent field.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A component document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// `account/component`, or just `component` outside developer context.
    pub name: String,
    /// Version tag.
    #[serde(default)]
    pub tag: Option<String>,
    /// A parent component, or `file:<path>` for a local parent.
    #[serde(default)]
    pub extends: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Author contact.
    #[serde(default)]
    pub author: Option<String>,
    /// Project homepage.
    #[serde(default)]
    pub homepage: Option<String>,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSpec>,
    /// Long-running workloads.
    #[serde(default)]
    pub services: IndexMap<String, ServiceSpec>,
    /// Scheduled or one-shot workloads.
    #[serde(default)]
    pub tasks: IndexMap<String, TaskSpec>,
    /// Component slug to version tag.
    #[serde(default)]
    pub dependencies: IndexMap<String, Scalar>,
    /// Interfaces exposed to consumers of this component.
    #[serde(default)]
    pub interfaces: IndexMap<String, ComponentInterfaceSpec>,
}

/// A parameter declaration: a full definition or a bare default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSpec {
    /// `{ required, description, default }`
    Definition(ParameterDefinitionSpec),
    /// A bare scalar default, or null for "required, no default".
    Value(Option<Scalar>),
}

/// A full parameter definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinitionSpec {
    /// A boolean or a boolean-string.
    #[serde(default)]
    pub required: Option<Scalar>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// `None` when absent, `Some(None)` when explicitly null.
    #[serde(default, deserialize_with = "deserialize_present")]
    pub default: Option<Option<Scalar>>,
}

/// A command written as a shell string or a list of arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Already-split arguments.
    List(Vec<Scalar>),
    /// A shell-style string to be tokenized.
    Shell(String),
}

/// Image build settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Build context directory.
    #[serde(default)]
    pub context: Option<String>,
    /// Dockerfile path relative to the context.
    #[serde(default)]
    pub dockerfile: Option<String>,
    /// Stage of a multi-stage Dockerfile to build.
    #[serde(default)]
    pub target: Option<String>,
    /// Build arguments. Null values are dropped.
    #[serde(default)]
    pub args: IndexMap<String, Option<Scalar>>,
}

/// A volume: a full definition or a bare host path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeSpec {
    /// The full form.
    Definition(VolumeDefinitionSpec),
    /// Shorthand for `{ host_path }`.
    HostPath(String),
}

/// A full volume definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeDefinitionSpec {
    /// Path inside the container.
    #[serde(default)]
    pub mount_path: Option<String>,
    /// Path on the local machine.
    #[serde(default)]
    pub host_path: Option<String>,
    /// Identifier of a platform-provided volume.
    #[serde(default)]
    pub key: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Mount read-only.
    #[serde(default)]
    pub readonly: Option<Scalar>,
}

/// Fields common to services and tasks, plus a variant extension `X`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec<X> {
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Image reference. Mutually exclusive with `build`.
    #[serde(default)]
    pub image: Option<String>,
    /// Build settings. Mutually exclusive with `image`.
    #[serde(default)]
    pub build: Option<BuildSpec>,
    /// Overrides the image command.
    #[serde(default)]
    pub command: Option<CommandSpec>,
    /// Overrides the image entrypoint.
    #[serde(default)]
    pub entrypoint: Option<CommandSpec>,
    /// Environment variables. Null values mean "not set".
    #[serde(default)]
    pub environment: IndexMap<String, Option<Scalar>>,
    /// Named volumes.
    #[serde(default)]
    pub volumes: IndexMap<String, VolumeSpec>,
    /// CPU allocation.
    #[serde(default)]
    pub cpu: Option<Scalar>,
    /// Memory allocation.
    #[serde(default)]
    pub memory: Option<Scalar>,
    /// Sibling services that must start first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// Local debug override of the same shape, one level deep.
    #[serde(default)]
    pub debug: Option<Box<Self>>,
    /// Variant-specific fields.
    #[serde(flatten)]
    pub extension: X,
}

/// Fields only services carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceExtensionSpec {
    /// Exposed interfaces.
    #[serde(default)]
    pub interfaces: IndexMap<String, InterfaceSpec>,
    /// Health check.
    #[serde(default)]
    pub liveness_probe: Option<LivenessProbeSpec>,
    /// Fixed replica count.
    #[serde(default)]
    pub replicas: Option<Scalar>,
    /// Autoscaling bounds.
    #[serde(default)]
    pub scaling: Option<ScalingSpec>,
}

/// Fields only tasks carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskExtensionSpec {
    /// Cron schedule.
    #[serde(default)]
    pub schedule: Option<String>,
}

/// A service as authored.
pub type ServiceSpec = ResourceSpec<ServiceExtensionSpec>;
/// A task as authored.
pub type TaskSpec = ResourceSpec<TaskExtensionSpec>;

/// A service interface: a full definition or a bare port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterfaceSpec {
    /// The full form.
    Definition(InterfaceDefinitionSpec),
    /// Shorthand for `{ port }`.
    Port(Scalar),
}

/// A full interface definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinitionSpec {
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Host name.
    #[serde(default)]
    pub host: Option<String>,
    /// Port number or expression.
    #[serde(default)]
    pub port: Option<Scalar>,
    /// Protocol, such as `http`.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Credentials user.
    #[serde(default)]
    pub username: Option<String>,
    /// Credentials password.
    #[serde(default)]
    pub password: Option<String>,
    /// Full URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Session affinity.
    #[serde(default)]
    pub sticky: Option<Scalar>,
}

/// A component interface: a full definition, a bare port, or a
/// `${{ <ref>.url }}` shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentInterfaceSpec {
    /// The full form.
    Definition(ComponentInterfaceDefinitionSpec),
    /// A bare port or URL expression.
    Value(Scalar),
}

/// A full component interface definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInterfaceDefinitionSpec {
    /// The interface fields shared with service interfaces.
    #[serde(flatten)]
    pub interface: InterfaceDefinitionSpec,
    /// Public exposure settings.
    #[serde(default)]
    pub ingress: Option<IngressSpec>,
}

/// Public exposure of a component interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressSpec {
    /// Whether the ingress is active.
    #[serde(default)]
    pub enabled: Option<Scalar>,
    /// Subdomain under the environment's DNS zone.
    #[serde(default)]
    pub subdomain: Option<String>,
}

/// A health check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivenessProbeSpec {
    /// Consecutive successes required.
    #[serde(default)]
    pub success_threshold: Option<Scalar>,
    /// Consecutive failures tolerated.
    #[serde(default)]
    pub failure_threshold: Option<Scalar>,
    /// Per-probe timeout, e.g. `5s`.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Time between probes.
    #[serde(default)]
    pub interval: Option<String>,
    /// Delay before the first probe.
    #[serde(default)]
    pub initial_delay: Option<String>,
    /// HTTP path. Requires `port`, excludes `command`.
    #[serde(default)]
    pub path: Option<String>,
    /// HTTP port.
    #[serde(default)]
    pub port: Option<Scalar>,
    /// Command to run. Excludes `path` and `port`.
    #[serde(default)]
    pub command: Option<CommandSpec>,
}

impl LivenessProbeSpec {
    /// Returns `true` if the block sets any field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.success_threshold.is_none()
            && self.failure_threshold.is_none()
            && self.timeout.is_none()
            && self.interval.is_none()
            && self.initial_delay.is_none()
            && self.path.is_none()
            && self.port.is_none()
            && self.command.is_none()
    }
}

/// Autoscaling bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingSpec {
    /// Lower bound.
    #[serde(default)]
    pub min_replicas: Option<Scalar>,
    /// Upper bound.
    #[serde(default)]
    pub max_replicas: Option<Scalar>,
    /// Target utilization.
    #[serde(default)]
    pub metrics: Option<ScalingMetricsSpec>,
}

/// Autoscaling utilization targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingMetricsSpec {
    /// CPU percentage.
    #[serde(default)]
    pub cpu: Option<Scalar>,
    /// Memory percentage.
    #[serde(default)]
    pub memory: Option<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml<T: for<'de> Deserialize<'de>>(text: &str) -> T {
        serde_yaml::from_str(text).expect("should deserialize")
    }

    #[test]
    fn parameter_null_default_differs_from_absent() {
        let explicit: ParameterDefinitionSpec = from_yaml("default: ~");
        let absent: ParameterDefinitionSpec = from_yaml("description: x");
        assert_eq!(explicit.default, Some(None));
        assert_eq!(absent.default, None);
    }

    #[test]
    fn parameter_shorthand_forms() {
        let params: IndexMap<String, ParameterSpec> =
            from_yaml("a: hello\nb: 3\nc: ~\nd:\n  required: 'false'\n");
        assert_eq!(params["a"], ParameterSpec::Value(Some("hello".into())));
        assert_eq!(params["b"], ParameterSpec::Value(Some(Scalar::Integer(3))));
        assert_eq!(params["c"], ParameterSpec::Value(None));
        assert!(matches!(params["d"], ParameterSpec::Definition(_)));
    }

    #[test]
    fn service_extension_fields_flatten() {
        let service: ServiceSpec = from_yaml(
            "image: nginx\ninterfaces:\n  main: 8080\nreplicas: 2\nenvironment:\n  A: ~\n",
        );
        assert_eq!(service.image.as_deref(), Some("nginx"));
        assert_eq!(
            service.extension.interfaces["main"],
            InterfaceSpec::Port(Scalar::Integer(8080))
        );
        assert_eq!(service.extension.replicas, Some(Scalar::Integer(2)));
        assert_eq!(service.environment["A"], None);
    }

    #[test]
    fn debug_block_has_resource_shape() {
        let service: ServiceSpec =
            from_yaml("image: app\ndebug:\n  build:\n    context: .\n  interfaces:\n    main: 3000\n");
        let debug = service.debug.expect("should have debug");
        assert!(debug.build.is_some());
        assert!(debug.extension.interfaces.contains_key("main"));
    }

    #[test]
    fn command_accepts_string_or_list() {
        let shell: CommandSpec = from_yaml("npm run start");
        let list: CommandSpec = from_yaml("[sleep, 10]");
        assert_eq!(shell, CommandSpec::Shell("npm run start".into()));
        assert_eq!(
            list,
            CommandSpec::List(vec!["sleep".into(), Scalar::Integer(10)])
        );
    }

    #[test]
    fn scalar_boolean_strings() {
        assert_eq!(Scalar::from("true").as_bool(), Some(true));
        assert_eq!(Scalar::Bool(false).as_bool(), Some(false));
        assert_eq!(Scalar::from("yes").as_bool(), None);
    }
}
