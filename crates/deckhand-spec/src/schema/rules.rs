//! Declarative, context-gated field rules.
//!
//! A [`Rule`] names the field it guards, the contexts it applies in, and a
//! predicate returning a message on violation. A rule with no contexts
//! always applies; otherwise it applies when its contexts intersect the
//! requested ones.

use deckhand_common::constants::FILE_REF_PREFIX;
use deckhand_common::error::{ErrorKind, ValidationError, ValidationErrors};
use deckhand_common::types::{ValidationContext, ValidationContexts};

use crate::slugs;

use super::join_path;
use super::spec::{
    ComponentSpec, LivenessProbeSpec, ParameterDefinitionSpec, ResourceSpec, Scalar, ScalingSpec,
    ServiceSpec, VolumeSpec,
};

/// A single field constraint.
pub struct Rule<T> {
    /// Field path relative to the target, empty for the target itself.
    pub field: &'static str,
    /// Machine-readable constraint identifier.
    pub constraint: &'static str,
    /// Error category on violation.
    pub kind: ErrorKind,
    /// Contexts the rule applies in. Empty means every context.
    pub contexts: &'static [ValidationContext],
    /// Returns a message when the target violates the rule.
    pub check: fn(&T) -> Option<String>,
}

impl<T> Rule<T> {
    /// Returns `true` if the rule is active under `contexts`.
    pub fn applies(&self, contexts: &ValidationContexts) -> bool {
        self.contexts.is_empty() || contexts.intersects(self.contexts)
    }
}

/// Evaluates every active rule against `target`, located at `path`.
pub fn apply<T>(
    rules: &[Rule<T>],
    target: &T,
    path: &str,
    contexts: &ValidationContexts,
    errors: &mut ValidationErrors,
) {
    for rule in rules.iter().filter(|r| r.applies(contexts)) {
        if let Some(message) = (rule.check)(target) {
            errors.push(ValidationError::new(
                rule.kind,
                join_path(path, rule.field),
                rule.constraint,
                message,
            ));
        }
    }
}

const DEVELOPER: &[ValidationContext] = &[ValidationContext::Developer];
const NON_DEBUG: &[ValidationContext] = &[ValidationContext::Developer, ValidationContext::Operator];
const DEBUG: &[ValidationContext] = &[ValidationContext::Debug];

/// Rules on the component root.
pub static COMPONENT_RULES: [Rule<ComponentSpec>; 4] = [
    Rule {
        field: "name",
        constraint: "matches",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |spec| {
            slugs::split_component_name(&spec.name).is_none().then(|| {
                format!(
                    "\"{}\" must contain only lower alphanumeric segments with single hyphens, optionally prefixed by <account-name>/",
                    spec.name
                )
            })
        },
    },
    Rule {
        field: "name",
        constraint: "matches",
        kind: ErrorKind::SchemaValidation,
        contexts: DEVELOPER,
        check: |spec| match slugs::split_component_name(&spec.name) {
            Some((None, _)) => Some(format!(
                "\"{}\" {}",
                spec.name,
                slugs::SlugKind::Component.description()
            )),
            _ => None,
        },
    },
    Rule {
        field: "tag",
        constraint: "matches",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |spec| {
            spec.tag
                .as_deref()
                .filter(|tag| !slugs::is_valid_tag(tag))
                .map(|tag| format!("\"{tag}\" is not a valid tag"))
        },
    },
    Rule {
        field: "extends",
        constraint: "no-local-extends",
        kind: ErrorKind::SchemaValidation,
        contexts: DEVELOPER,
        check: |spec| {
            spec.extends
                .as_deref()
                .filter(|e| e.starts_with(FILE_REF_PREFIX))
                .map(|_| "extends may not reference a local path when registering".to_owned())
        },
    },
];

/// Rules on each dependency version, located at `dependencies.<name>`.
pub static DEPENDENCY_RULES: [Rule<Scalar>; 1] = [Rule {
    field: "",
    constraint: "matches",
    kind: ErrorKind::SchemaValidation,
    contexts: &[],
    check: |version| {
        let text = version.to_string();
        (!slugs::is_valid_tag(&text)).then(|| format!("\"{text}\" is not a valid dependency tag"))
    },
}];

/// Rules on each full parameter definition.
pub static PARAMETER_RULES: [Rule<ParameterDefinitionSpec>; 1] = [Rule {
    field: "required",
    constraint: "boolean",
    kind: ErrorKind::SchemaValidation,
    contexts: &[],
    check: |parameter| {
        parameter
            .required
            .as_ref()
            .filter(|r| r.as_bool().is_none())
            .map(|r| format!("\"{r}\" must be a boolean or a boolean string"))
    },
}];

fn parsed_number(value: &Scalar) -> Option<f64> {
    match value {
        #[allow(clippy::cast_precision_loss)]
        Scalar::Integer(i) => Some(*i as f64),
        Scalar::Float(f) => Some(*f),
        Scalar::String(s) => s.trim().parse().ok(),
        Scalar::Bool(_) => None,
    }
}

/// Rules shared by services and tasks.
pub fn resource_rules<X>() -> [Rule<ResourceSpec<X>>; 4] {
    [
        Rule {
            field: "debug.debug",
            constraint: "nested-debug",
            kind: ErrorKind::StructuralConflict,
            contexts: &[],
            check: |resource| {
                resource
                    .debug
                    .as_ref()
                    .is_some_and(|debug| debug.debug.is_some())
                    .then(|| "a debug block may not contain another debug block".to_owned())
            },
        },
        Rule {
            field: "image",
            constraint: "image-xor-build",
            kind: ErrorKind::StructuralConflict,
            contexts: &[],
            check: |resource| {
                (resource.image.is_some() && resource.build.is_some())
                    .then(|| "image and build are mutually exclusive".to_owned())
            },
        },
        Rule {
            field: "cpu",
            constraint: "positive-number",
            kind: ErrorKind::SchemaValidation,
            contexts: &[],
            check: |resource| match &resource.cpu {
                Some(Scalar::Bool(b)) => Some(format!("\"{b}\" must be a positive number")),
                Some(cpu) => parsed_number(cpu)
                    .filter(|n| *n <= 0.0)
                    .map(|_| format!("\"{cpu}\" must be a positive number")),
                None => None,
            },
        },
        Rule {
            field: "memory",
            constraint: "type",
            kind: ErrorKind::SchemaValidation,
            contexts: &[],
            check: |resource| {
                matches!(resource.memory, Some(Scalar::Bool(_)))
                    .then(|| "memory must be a string such as 512Mi".to_owned())
            },
        },
    ]
}

/// Rules only services carry.
pub static SERVICE_RULES: [Rule<ServiceSpec>; 2] = [
    Rule {
        field: "replicas",
        constraint: "forbidden",
        kind: ErrorKind::SchemaValidation,
        contexts: DEVELOPER,
        check: |service| {
            service
                .extension
                .replicas
                .as_ref()
                .map(|_| "replicas may only be set by an operator at deploy time".to_owned())
        },
    },
    Rule {
        field: "replicas",
        constraint: "non-negative-integer",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |service| match &service.extension.replicas {
            Some(Scalar::Integer(n)) if *n < 0 => {
                Some(format!("\"{n}\" must be a non-negative integer"))
            }
            Some(value @ (Scalar::Float(_) | Scalar::Bool(_))) => {
                Some(format!("\"{value}\" must be a non-negative integer"))
            }
            _ => None,
        },
    },
];

/// Rules on a liveness probe.
pub static LIVENESS_PROBE_RULES: [Rule<LivenessProbeSpec>; 3] = [
    Rule {
        field: "command",
        constraint: "exclusive",
        kind: ErrorKind::StructuralConflict,
        contexts: &[],
        check: |probe| {
            (probe.command.is_some() && (probe.path.is_some() || probe.port.is_some()))
                .then(|| "command is mutually exclusive with path and port".to_owned())
        },
    },
    Rule {
        field: "port",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |probe| {
            (probe.command.is_none() && probe.port.is_none())
                .then(|| "port is required when command is not set".to_owned())
        },
    },
    Rule {
        field: "path",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |probe| {
            (probe.command.is_none() && probe.path.is_none())
                .then(|| "path is required when command is not set".to_owned())
        },
    },
];

/// Rules on an autoscaling block.
pub static SCALING_RULES: [Rule<ScalingSpec>; 3] = [
    Rule {
        field: "metrics",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |scaling| {
            let has_metric = scaling
                .metrics
                .as_ref()
                .is_some_and(|m| m.cpu.is_some() || m.memory.is_some());
            (!has_metric).then(|| "scaling requires at least one of metrics.cpu or metrics.memory".to_owned())
        },
    },
    Rule {
        field: "min_replicas",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |scaling| {
            scaling
                .min_replicas
                .is_none()
                .then(|| "min_replicas is required".to_owned())
        },
    },
    Rule {
        field: "max_replicas",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: &[],
        check: |scaling| {
            scaling
                .max_replicas
                .is_none()
                .then(|| "max_replicas is required".to_owned())
        },
    },
];

fn host_path(volume: &VolumeSpec) -> Option<&str> {
    match volume {
        VolumeSpec::HostPath(path) => Some(path),
        VolumeSpec::Definition(definition) => definition.host_path.as_deref(),
    }
}

fn volume_key(volume: &VolumeSpec) -> Option<&str> {
    match volume {
        VolumeSpec::HostPath(_) => None,
        VolumeSpec::Definition(definition) => definition.key.as_deref(),
    }
}

/// Rules on a volume, located at `volumes.<name>`.
pub static VOLUME_RULES: [Rule<VolumeSpec>; 3] = [
    Rule {
        field: "host_path",
        constraint: "forbidden",
        kind: ErrorKind::SchemaValidation,
        contexts: NON_DEBUG,
        check: |volume| {
            host_path(volume).map(|path| {
                format!("host_path \"{path}\" may only be set in a debug block")
            })
        },
    },
    Rule {
        field: "host_path",
        constraint: "required",
        kind: ErrorKind::SchemaValidation,
        contexts: DEBUG,
        check: |volume| {
            (host_path(volume).is_none() && volume_key(volume).is_none())
                .then(|| "host_path is required for debug volumes".to_owned())
        },
    },
    Rule {
        field: "key",
        constraint: "exclusive",
        kind: ErrorKind::StructuralConflict,
        contexts: &[],
        check: |volume| {
            (host_path(volume).is_some() && volume_key(volume).is_some())
                .then(|| "host_path and key are mutually exclusive".to_owned())
        },
    },
];
