//! Semantic validation of a typed component spec.
//!
//! Runs the field rule tables for every object in the document, then the
//! cross-structure checks that need the whole component in view.

use deckhand_common::error::{ErrorKind, ValidationError, ValidationErrors};
use deckhand_common::types::{ValidationContext, ValidationContexts};
use indexmap::IndexMap;

use crate::graph::DependsOnGraph;

use super::join_path;
use super::rules::{self, Rule};
use super::spec::{
    ComponentSpec, ParameterSpec, ResourceSpec, ServiceExtensionSpec, TaskExtensionSpec,
};

/// Variant-specific validation of a resource.
pub trait ExtensionRules: Sized {
    /// Checks the fields only this variant carries.
    fn validate_extension(
        resource: &ResourceSpec<Self>,
        path: &str,
        contexts: &ValidationContexts,
        errors: &mut ValidationErrors,
    );
}

impl ExtensionRules for ServiceExtensionSpec {
    fn validate_extension(
        resource: &ResourceSpec<Self>,
        path: &str,
        contexts: &ValidationContexts,
        errors: &mut ValidationErrors,
    ) {
        rules::apply(&rules::SERVICE_RULES, resource, path, contexts, errors);
        if let Some(probe) = &resource.extension.liveness_probe {
            let probe_path = join_path(path, "liveness_probe");
            rules::apply(&rules::LIVENESS_PROBE_RULES, probe, &probe_path, contexts, errors);
        }
        if let Some(scaling) = &resource.extension.scaling {
            let scaling_path = join_path(path, "scaling");
            rules::apply(&rules::SCALING_RULES, scaling, &scaling_path, contexts, errors);
        }
    }
}

impl ExtensionRules for TaskExtensionSpec {
    fn validate_extension(
        _resource: &ResourceSpec<Self>,
        _path: &str,
        _contexts: &ValidationContexts,
        _errors: &mut ValidationErrors,
    ) {
    }
}

/// Validates `spec` under the requested contexts.
///
/// Every violation is collected; nothing short-circuits.
pub fn validate(spec: &ComponentSpec, contexts: &ValidationContexts) -> ValidationErrors {
    tracing::info!(component = %spec.name, ?contexts, "validating component spec");
    let mut errors = ValidationErrors::new();

    rules::apply(&rules::COMPONENT_RULES, spec, "", contexts, &mut errors);

    for (key, parameter) in &spec.parameters {
        if let ParameterSpec::Definition(definition) = parameter {
            let path = join_path("parameters", key);
            rules::apply(&rules::PARAMETER_RULES, definition, &path, contexts, &mut errors);
        }
    }
    for (key, version) in &spec.dependencies {
        let path = join_path("dependencies", key);
        rules::apply(&rules::DEPENDENCY_RULES, version, &path, contexts, &mut errors);
    }

    for (key, service) in &spec.services {
        validate_resource(service, &join_path("services", key), contexts, false, &mut errors);
    }
    for (key, task) in &spec.tasks {
        validate_resource(task, &join_path("tasks", key), contexts, false, &mut errors);
    }

    check_key_collisions(spec, &mut errors);
    check_depends_on(spec, &mut errors);

    tracing::debug!(count = errors.len(), "validation finished");
    errors
}

fn validate_resource<X: ExtensionRules>(
    resource: &ResourceSpec<X>,
    path: &str,
    contexts: &ValidationContexts,
    in_debug: bool,
    errors: &mut ValidationErrors,
) {
    let shared: [Rule<ResourceSpec<X>>; 4] = rules::resource_rules();
    rules::apply(&shared, resource, path, contexts, errors);
    X::validate_extension(resource, path, contexts, errors);

    // Debug volumes mount real local paths, so only the debug rules apply.
    let volume_contexts = if contexts.contains(ValidationContext::Debug) {
        ValidationContexts::only(ValidationContext::Debug)
    } else {
        contexts.clone()
    };
    for (key, volume) in &resource.volumes {
        let volume_path = join_path(&join_path(path, "volumes"), key);
        rules::apply(&rules::VOLUME_RULES, volume, &volume_path, &volume_contexts, errors);
    }

    if !in_debug {
        if let Some(debug) = &resource.debug {
            let debug_contexts = contexts.with(ValidationContext::Debug);
            validate_resource(debug, &join_path(path, "debug"), &debug_contexts, true, errors);
        }
    }
}

fn check_key_collisions(spec: &ComponentSpec, errors: &mut ValidationErrors) {
    for key in spec.tasks.keys().filter(|k| spec.services.contains_key(*k)) {
        errors.push(
            ValidationError::new(
                ErrorKind::StructuralConflict,
                join_path("tasks", key),
                "Collision",
                "services and tasks must not share the same keys",
            )
            .with_value(key.clone()),
        );
    }
}

/// One resource's `depends_on` list as seen by a check.
struct DependsOnEntry<'a> {
    name: &'a str,
    field: String,
    depends_on: &'a [String],
    report: bool,
}

fn depends_on_entries<'a, X>(
    section: &'static str,
    resources: &'a IndexMap<String, ResourceSpec<X>>,
    debug: bool,
) -> impl Iterator<Item = DependsOnEntry<'a>> {
    resources.iter().map(move |(name, resource)| {
        let overridden = resource
            .debug
            .as_deref()
            .filter(|d| debug && !d.depends_on.is_empty());
        match overridden {
            Some(debug) => DependsOnEntry {
                name,
                field: format!("{section}.{name}.debug.depends_on"),
                depends_on: &debug.depends_on,
                report: true,
            },
            None => DependsOnEntry {
                name,
                field: format!("{section}.{name}.depends_on"),
                depends_on: &resource.depends_on,
                report: !debug,
            },
        }
    })
}

fn check_depends_on(spec: &ComponentSpec, errors: &mut ValidationErrors) {
    let declared: Vec<_> = depends_on_entries("services", &spec.services, false)
        .chain(depends_on_entries("tasks", &spec.tasks, false))
        .collect();
    let circular = check_depends_on_view(spec, &declared, &[], errors);

    // A debug block's depends_on replaces the resource's own when set.
    let debug: Vec<_> = depends_on_entries("services", &spec.services, true)
        .chain(depends_on_entries("tasks", &spec.tasks, true))
        .collect();
    if debug.iter().any(|entry| entry.report) {
        let _ = check_depends_on_view(spec, &debug, &circular, errors);
    }
}

/// Checks one view of the graph and returns the resources on a cycle.
/// Cycles already listed in `known` are not reported again.
fn check_depends_on_view(
    spec: &ComponentSpec,
    entries: &[DependsOnEntry<'_>],
    known: &[String],
    errors: &mut ValidationErrors,
) -> Vec<String> {
    let mut graph = DependsOnGraph::new();
    for entry in entries {
        let _ = graph.add_resource(entry.name);
        for (idx, dependency) in entry.depends_on.iter().enumerate() {
            let path = format!("{}.{idx}", entry.field);
            if spec.tasks.contains_key(dependency) {
                if entry.report {
                    errors.push(
                        ValidationError::new(
                            ErrorKind::DependencyReference,
                            path,
                            "no-task-dependency",
                            format!("depends_on may not reference task \"{dependency}\""),
                        )
                        .with_value(dependency.clone()),
                    );
                }
            } else if spec.services.contains_key(dependency) {
                graph.add_dependency(entry.name, dependency);
            } else if entry.report {
                errors.push(
                    ValidationError::new(
                        ErrorKind::DependencyReference,
                        path,
                        "invalid-reference",
                        format!("\"{dependency}\" is not a service of this component"),
                    )
                    .with_value(dependency.clone()),
                );
            }
        }
    }

    let circular = graph.circular_resources();
    for name in circular.iter().filter(|name| !known.contains(name)) {
        let field = entries
            .iter()
            .find(|entry| entry.name == name.as_str())
            .map_or_else(|| format!("services.{name}.depends_on"), |entry| entry.field.clone());
        errors.push(
            ValidationError::new(
                ErrorKind::CircularReference,
                field,
                "circular-reference",
                format!("\"{name}\" is part of a circular depends_on chain"),
            )
            .with_value(name.clone()),
        );
    }
    circular
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str) -> ComponentSpec {
        serde_yaml::from_str(text).expect("should deserialize spec")
    }

    fn developer() -> ValidationContexts {
        ValidationContexts::only(ValidationContext::Developer)
    }

    #[test]
    fn valid_component_has_no_errors() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    image: app\n    depends_on: [db]\n  db:\n    image: postgres\n",
        );
        let errors = validate(&spec, &developer());
        assert!(errors.is_empty(), "got: {errors}");
    }

    #[test]
    fn services_and_tasks_must_not_collide() {
        let spec = spec("name: acct/comp\nservices:\n  job:\n    image: a\ntasks:\n  job:\n    image: b\n");
        let errors = validate(&spec, &developer());
        let error = errors.iter().next().expect("should have error");
        assert_eq!(error.kind, ErrorKind::StructuralConflict);
        assert_eq!(error.constraint, "Collision");
        assert_eq!(error.path, "tasks.job");
    }

    #[test]
    fn depends_on_task_is_rejected() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    image: a\n    depends_on: [migrate]\ntasks:\n  migrate:\n    image: b\n",
        );
        let errors = validate(&spec, &developer());
        let error = errors.iter().next().expect("should have error");
        assert_eq!(error.kind, ErrorKind::DependencyReference);
        assert_eq!(error.constraint, "no-task-dependency");
        assert_eq!(error.path, "services.api.depends_on.0");
    }

    #[test]
    fn depends_on_missing_service_is_rejected() {
        let spec = spec("name: acct/comp\nservices:\n  api:\n    image: a\n    depends_on: [ghost]\n");
        let errors = validate(&spec, &developer());
        let error = errors.iter().next().expect("should have error");
        assert_eq!(error.constraint, "invalid-reference");
    }

    #[test]
    fn depends_on_cycle_is_circular_reference() {
        let spec = spec(
            "name: acct/comp\nservices:\n  a:\n    depends_on: [b]\n  b:\n    depends_on: [c]\n  c:\n    depends_on: [a]\n",
        );
        let errors = validate(&spec, &developer());
        assert!(errors.has_kind(ErrorKind::CircularReference));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn depends_on_diamond_is_accepted() {
        let spec = spec(
            "name: acct/comp\nservices:\n  a:\n    depends_on: [b, c]\n  b:\n    depends_on: [d]\n  c:\n    depends_on: [d]\n  d:\n    image: x\n",
        );
        assert!(validate(&spec, &developer()).is_empty());
    }

    #[test]
    fn debug_context_requires_host_paths_in_debug_volumes() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    volumes:\n      data:\n        mount_path: /data\n    debug:\n      volumes:\n        data:\n          mount_path: /data\n",
        );
        let errors = validate(&spec, &developer());
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["services.api.debug.volumes.data.host_path"]);
    }

    #[test]
    fn host_path_is_allowed_inside_debug_only() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    volumes:\n      data: ./top\n    debug:\n      volumes:\n        data: ./data\n",
        );
        let errors = validate(&spec, &developer());
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["services.api.volumes.data.host_path"]);
    }

    #[test]
    fn nested_debug_is_reported_once() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    debug:\n      debug:\n        image: x\n",
        );
        let errors = validate(&spec, &developer());
        assert_eq!(errors.len(), 1, "got: {errors}");
        assert!(errors.has_kind(ErrorKind::StructuralConflict));
    }

    #[test]
    fn liveness_and_scaling_rules_run_with_paths() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    liveness_probe:\n      path: /h\n      port: 80\n      command: ok\n    scaling:\n      min_replicas: 1\n      max_replicas: 2\n",
        );
        let errors = validate(&spec, &developer());
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["services.api.liveness_probe.command", "services.api.scaling.metrics"]
        );
    }

    #[test]
    fn invalid_dependency_tag_is_reported() {
        let spec = spec("name: acct/comp\ndependencies:\n  acct/db: '-bad'\n");
        let errors = validate(&spec, &developer());
        let error = errors.iter().next().expect("should have error");
        assert_eq!(error.path, "dependencies.acct/db");
    }

    #[test]
    fn debug_depends_on_is_checked() {
        let spec = spec(
            "name: acct/comp\nservices:\n  api:\n    image: a\n    debug:\n      depends_on: [ghost]\n",
        );
        let errors = validate(&spec, &developer());
        let error = errors.iter().next().expect("should have error");
        assert_eq!(error.constraint, "invalid-reference");
        assert_eq!(error.path, "services.api.debug.depends_on.0");
        assert_eq!(errors.len(), 1, "got: {errors}");
    }

    #[test]
    fn debug_depends_on_cycle_is_reported_once() {
        let spec = spec(
            "name: acct/comp\nservices:\n  a:\n    image: x\n    depends_on: [b]\n  b:\n    image: x\n    debug:\n      depends_on: [a]\n",
        );
        let errors = validate(&spec, &developer());
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["services.a.depends_on", "services.b.debug.depends_on"]);
        assert!(errors.has_kind(ErrorKind::CircularReference));
    }
}
