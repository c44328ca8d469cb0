//! Expand and merge of canonical configs.
//!
//! [`expand`] materializes every default a canonical config can carry and
//! restamps identity fields, so two configs describing the same thing
//! compare equal. [`merge`] overlays one expanded config onto another:
//! dictionaries merge key by key, scalars are replaced when the override
//! sets them, and a resource's `image`/`build` pair is replaced as a unit.
//!
//! Both return new values and never touch their inputs.

use deckhand_common::constants::liveness;
use indexmap::IndexMap;

use crate::config::{
    self, BuildConfig, ComponentConfig, ComponentInterfaceConfig, IngressConfig, InterfaceConfig,
    LivenessProbeConfig, ParameterConfig, ResourceConfig, ScalingConfig, ScalingMetricsConfig,
    ServiceExtension, TaskExtension, VolumeConfig,
};

/// Fills in defaults that are implied but not yet written down.
pub trait Expand {
    /// Materializes defaults in place. Must be idempotent.
    fn expand_defaults(&mut self);
}

/// Layers another value of the same type on top of this one.
pub trait Overlay {
    /// Applies every field `other` sets.
    fn overlay(&mut self, other: &Self);
}

/// Returns `config` with every default materialized.
#[must_use]
pub fn expand(config: &ComponentConfig) -> ComponentConfig {
    let mut expanded = config.clone();
    expanded.expand_defaults();
    expanded
}

/// Overlays `overlay` onto `base`, both expanded first.
#[must_use]
pub fn merge(base: &ComponentConfig, overlay: &ComponentConfig) -> ComponentConfig {
    tracing::info!(base = %base.reference, overlay = %overlay.reference, "merging component configs");
    let mut merged = expand(base);
    merged.overlay(&expand(overlay));
    merged.expand_defaults();
    merged
}

fn replace<T: Clone>(base: &mut Option<T>, other: Option<&T>) {
    if let Some(value) = other {
        *base = Some(value.clone());
    }
}

fn replace_text(base: &mut String, other: &str) {
    if !other.is_empty() {
        other.clone_into(base);
    }
}

fn overlay_nested<T: Overlay + Clone>(base: &mut Option<T>, other: Option<&T>) {
    match (base.as_mut(), other) {
        (Some(base), Some(other)) => base.overlay(other),
        (None, Some(other)) => *base = Some(other.clone()),
        (_, None) => {}
    }
}

fn overlay_map<V: Overlay + Clone>(base: &mut IndexMap<String, V>, other: &IndexMap<String, V>) {
    for (key, value) in other {
        match base.get_mut(key) {
            Some(existing) => existing.overlay(value),
            None => {
                let _ = base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn overlay_strings(base: &mut IndexMap<String, String>, other: &IndexMap<String, String>) {
    base.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
}

impl<T: Overlay> Overlay for Box<T> {
    fn overlay(&mut self, other: &Self) {
        self.as_mut().overlay(other.as_ref());
    }
}

impl Expand for ComponentConfig {
    fn expand_defaults(&mut self) {
        if !self.name.is_empty() {
            self.reference = self.component_ref();
        }
        for parameter in self.parameters.values_mut() {
            parameter.expand_defaults();
        }
        let name = self.name.clone();
        let tag = self.tag.clone();
        let reference =
            |key: &str| (!name.is_empty()).then(|| config::resource_ref(&name, key, &tag));
        for (key, service) in &mut self.services {
            service.stamp(key, reference(key), &tag);
            service.expand_defaults();
        }
        for (key, task) in &mut self.tasks {
            task.stamp(key, reference(key), &tag);
            task.expand_defaults();
        }
        for interface in self.interfaces.values_mut() {
            interface.expand_defaults();
        }
    }
}

impl Overlay for ComponentConfig {
    fn overlay(&mut self, other: &Self) {
        replace_text(&mut self.name, &other.name);
        replace_text(&mut self.tag, &other.tag);
        replace_text(&mut self.reference, &other.reference);
        replace(&mut self.instance_id, other.instance_id.as_ref());
        replace(&mut self.instance_name, other.instance_name.as_ref());
        replace(&mut self.instance_date, other.instance_date.as_ref());
        replace(&mut self.extends, other.extends.as_ref());
        replace(&mut self.local_path, other.local_path.as_ref());
        replace(&mut self.description, other.description.as_ref());
        if !other.keywords.is_empty() {
            self.keywords.clone_from(&other.keywords);
        }
        replace(&mut self.author, other.author.as_ref());
        replace(&mut self.homepage, other.homepage.as_ref());
        overlay_map(&mut self.parameters, &other.parameters);
        overlay_map(&mut self.services, &other.services);
        overlay_map(&mut self.tasks, &other.tasks);
        overlay_strings(&mut self.dependencies, &other.dependencies);
        overlay_map(&mut self.interfaces, &other.interfaces);
    }
}

impl Expand for ParameterConfig {
    fn expand_defaults(&mut self) {
        if self.required == Some(false) && self.default.is_none() {
            self.default = Some(None);
        }
    }
}

impl Overlay for ParameterConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.required, other.required.as_ref());
        replace(&mut self.description, other.description.as_ref());
        replace(&mut self.default, other.default.as_ref());
    }
}

impl<X> ResourceConfig<X> {
    fn stamp(&mut self, key: &str, reference: Option<String>, tag: &str) {
        key.clone_into(&mut self.name);
        if let Some(reference) = reference {
            self.reference = reference;
        }
        if !tag.is_empty() {
            tag.clone_into(&mut self.tag);
        }
        if let Some(debug) = self.debug.as_deref_mut() {
            self.name.clone_into(&mut debug.name);
            self.reference.clone_into(&mut debug.reference);
            self.tag.clone_into(&mut debug.tag);
        }
    }

    fn overlay_source(&mut self, other: &Self) {
        match (&other.image, &other.build) {
            (Some(image), build) => {
                self.image = Some(image.clone());
                self.build.clone_from(build);
            }
            (None, Some(build)) if build.is_implicit() => {}
            (None, Some(build)) => {
                self.image = None;
                self.build = Some(build.clone());
            }
            (None, None) => {}
        }
    }
}

impl<X: Expand> Expand for ResourceConfig<X> {
    fn expand_defaults(&mut self) {
        if self.image.is_none() && self.build.is_none() {
            self.build = Some(BuildConfig::implicit());
        }
        self.extension.expand_defaults();
        if let Some(debug) = self.debug.as_deref_mut() {
            debug.debug = None;
            if debug.image.is_none() && debug.build.is_none() {
                debug.build = Some(BuildConfig::implicit());
            }
            debug.extension.expand_defaults();
        }
    }
}

impl<X: Overlay + Clone> Overlay for ResourceConfig<X> {
    fn overlay(&mut self, other: &Self) {
        replace_text(&mut self.name, &other.name);
        replace_text(&mut self.reference, &other.reference);
        replace_text(&mut self.tag, &other.tag);
        replace(&mut self.description, other.description.as_ref());
        self.overlay_source(other);
        replace(&mut self.command, other.command.as_ref());
        replace(&mut self.entrypoint, other.entrypoint.as_ref());
        overlay_strings(&mut self.environment, &other.environment);
        overlay_map(&mut self.volumes, &other.volumes);
        replace(&mut self.cpu, other.cpu.as_ref());
        replace(&mut self.memory, other.memory.as_ref());
        if !other.depends_on.is_empty() {
            self.depends_on.clone_from(&other.depends_on);
        }
        overlay_strings(&mut self.labels, &other.labels);
        overlay_nested(&mut self.debug, other.debug.as_ref());
        self.extension.overlay(&other.extension);
    }
}

impl Expand for ServiceExtension {
    fn expand_defaults(&mut self) {
        if let Some(probe) = self.liveness_probe.as_mut() {
            probe.expand_defaults();
        }
    }
}

impl Overlay for ServiceExtension {
    fn overlay(&mut self, other: &Self) {
        overlay_map(&mut self.interfaces, &other.interfaces);
        overlay_nested(&mut self.liveness_probe, other.liveness_probe.as_ref());
        replace(&mut self.replicas, other.replicas.as_ref());
        overlay_nested(&mut self.scaling, other.scaling.as_ref());
    }
}

impl Expand for TaskExtension {
    fn expand_defaults(&mut self) {}
}

impl Overlay for TaskExtension {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.schedule, other.schedule.as_ref());
    }
}

impl Overlay for VolumeConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.mount_path, other.mount_path.as_ref());
        replace(&mut self.host_path, other.host_path.as_ref());
        replace(&mut self.key, other.key.as_ref());
        replace(&mut self.description, other.description.as_ref());
        replace(&mut self.readonly, other.readonly.as_ref());
    }
}

impl Overlay for InterfaceConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.description, other.description.as_ref());
        replace(&mut self.host, other.host.as_ref());
        replace(&mut self.port, other.port.as_ref());
        replace(&mut self.protocol, other.protocol.as_ref());
        replace(&mut self.username, other.username.as_ref());
        replace(&mut self.password, other.password.as_ref());
        replace(&mut self.url, other.url.as_ref());
        replace(&mut self.sticky, other.sticky.as_ref());
    }
}

impl Expand for ComponentInterfaceConfig {
    fn expand_defaults(&mut self) {
        if let Some(ingress) = self.ingress.as_mut() {
            if ingress.enabled.is_none() {
                ingress.enabled = Some(true);
            }
        }
    }
}

impl Overlay for ComponentInterfaceConfig {
    fn overlay(&mut self, other: &Self) {
        self.interface.overlay(&other.interface);
        overlay_nested(&mut self.ingress, other.ingress.as_ref());
    }
}

impl Overlay for IngressConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.enabled, other.enabled.as_ref());
        replace(&mut self.subdomain, other.subdomain.as_ref());
    }
}

impl Expand for LivenessProbeConfig {
    fn expand_defaults(&mut self) {
        let fill = |field: &mut Option<String>, default: &str| {
            if field.is_none() {
                *field = Some(default.to_owned());
            }
        };
        fill(&mut self.success_threshold, liveness::SUCCESS_THRESHOLD);
        fill(&mut self.failure_threshold, liveness::FAILURE_THRESHOLD);
        fill(&mut self.timeout, liveness::TIMEOUT);
        fill(&mut self.interval, liveness::INTERVAL);
        fill(&mut self.initial_delay, liveness::INITIAL_DELAY);
    }
}

impl Overlay for LivenessProbeConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.success_threshold, other.success_threshold.as_ref());
        replace(&mut self.failure_threshold, other.failure_threshold.as_ref());
        replace(&mut self.timeout, other.timeout.as_ref());
        replace(&mut self.interval, other.interval.as_ref());
        replace(&mut self.initial_delay, other.initial_delay.as_ref());
        // An HTTP check and a command check exclude each other.
        if other.command.is_some() {
            self.path = None;
            self.port = None;
        } else if other.path.is_some() || other.port.is_some() {
            self.command = None;
        }
        replace(&mut self.path, other.path.as_ref());
        replace(&mut self.port, other.port.as_ref());
        replace(&mut self.command, other.command.as_ref());
    }
}

impl Overlay for ScalingConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.min_replicas, other.min_replicas.as_ref());
        replace(&mut self.max_replicas, other.max_replicas.as_ref());
        self.metrics.overlay(&other.metrics);
    }
}

impl Overlay for ScalingMetricsConfig {
    fn overlay(&mut self, other: &Self) {
        replace(&mut self.cpu, other.cpu.as_ref());
        replace(&mut self.memory, other.memory.as_ref());
    }
}
