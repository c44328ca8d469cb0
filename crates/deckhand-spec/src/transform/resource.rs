//! Service and task transforms.
//!
//! Both share the resource payload; the variant-specific extension is
//! handled through [`ExtensionTransform`].

use deckhand_common::constants::liveness;

use crate::config::{
    BuildConfig, InterfaceConfig, LivenessProbeConfig, ResourceConfig, ScalingConfig,
    ScalingMetricsConfig, ServiceExtension, TaskExtension, VolumeConfig,
};
use crate::schema::join_path;
use crate::schema::spec::{
    BuildSpec, InterfaceSpec, LivenessProbeSpec, ResourceSpec, Scalar, ScalingSpec,
    ServiceExtensionSpec, TaskExtensionSpec, VolumeSpec,
};

use super::Transformer;

/// The identity every resource of a component is stamped with.
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    /// The resource key.
    pub name: &'a str,
    /// `account/component/resource:tag`.
    pub reference: &'a str,
    /// The component tag.
    pub tag: &'a str,
}

/// Transform of the fields a resource variant adds.
pub trait ExtensionTransform {
    /// The canonical extension.
    type Config;

    /// Transforms the extension of a resource declaring `declared`
    /// environment variables.
    fn transform_extension(
        &self,
        transformer: &mut Transformer<'_>,
        declared: &[&str],
        path: &str,
    ) -> Self::Config;
}

fn scalar_string(value: Option<&Scalar>) -> Option<String> {
    value.map(ToString::to_string)
}

impl Transformer<'_> {
    /// Transforms a service or task. A nested `debug` block is transformed
    /// once; a `debug` inside it is dropped.
    pub fn resource<X: ExtensionTransform>(
        &mut self,
        identity: Identity<'_>,
        spec: &ResourceSpec<X>,
        path: &str,
    ) -> ResourceConfig<X::Config> {
        let mut config = self.resource_fields(identity, spec, path);
        config.debug = spec
            .debug
            .as_deref()
            .map(|debug| Box::new(self.resource_fields(identity, debug, &join_path(path, "debug"))));
        config
    }

    fn resource_fields<X: ExtensionTransform>(
        &mut self,
        identity: Identity<'_>,
        spec: &ResourceSpec<X>,
        path: &str,
    ) -> ResourceConfig<X::Config> {
        let declared: Vec<&str> = spec.environment.keys().map(String::as_str).collect();

        let build = match (&spec.build, &spec.image) {
            (Some(build), _) => Some(transform_build(build)),
            (None, None) => Some(BuildConfig::implicit()),
            (None, Some(_)) => None,
        };
        let command = spec
            .command
            .as_ref()
            .and_then(|c| self.command(c, &declared, &join_path(path, "command")));
        let entrypoint = spec
            .entrypoint
            .as_ref()
            .and_then(|c| self.command(c, &declared, &join_path(path, "entrypoint")));

        ResourceConfig {
            name: identity.name.to_owned(),
            reference: identity.reference.to_owned(),
            tag: identity.tag.to_owned(),
            description: spec.description.clone(),
            image: spec.image.clone(),
            build,
            command,
            entrypoint,
            environment: spec
                .environment
                .iter()
                .filter_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.to_string())))
                .collect(),
            volumes: spec
                .volumes
                .iter()
                .map(|(key, volume)| (key.clone(), transform_volume(volume)))
                .collect(),
            cpu: scalar_string(spec.cpu.as_ref()),
            memory: scalar_string(spec.memory.as_ref()),
            depends_on: spec.depends_on.clone(),
            labels: spec.labels.clone(),
            debug: None,
            extension: spec.extension.transform_extension(self, &declared, path),
        }
    }
}

fn transform_build(spec: &BuildSpec) -> BuildConfig {
    BuildConfig {
        context: spec.context.clone(),
        dockerfile: spec.dockerfile.clone(),
        target: spec.target.clone(),
        args: spec
            .args
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.to_string())))
            .collect(),
    }
}

fn transform_volume(spec: &VolumeSpec) -> VolumeConfig {
    match spec {
        VolumeSpec::HostPath(host_path) => VolumeConfig {
            host_path: Some(host_path.clone()),
            ..VolumeConfig::default()
        },
        VolumeSpec::Definition(definition) => VolumeConfig {
            mount_path: definition.mount_path.clone(),
            host_path: definition.host_path.clone(),
            key: definition.key.clone(),
            description: definition.description.clone(),
            readonly: scalar_string(definition.readonly.as_ref()),
        },
    }
}

/// Expands the bare-port shorthand.
#[must_use]
pub fn transform_interface(spec: &InterfaceSpec) -> InterfaceConfig {
    match spec {
        InterfaceSpec::Port(port) => InterfaceConfig {
            port: Some(port.to_string()),
            ..InterfaceConfig::default()
        },
        InterfaceSpec::Definition(definition) => InterfaceConfig {
            description: definition.description.clone(),
            host: definition.host.clone(),
            port: scalar_string(definition.port.as_ref()),
            protocol: definition.protocol.clone(),
            username: definition.username.clone(),
            password: definition.password.clone(),
            url: definition.url.clone(),
            sticky: scalar_string(definition.sticky.as_ref()),
        },
    }
}

impl Transformer<'_> {
    fn liveness_probe(
        &mut self,
        spec: &LivenessProbeSpec,
        declared: &[&str],
        path: &str,
    ) -> LivenessProbeConfig {
        let or_default =
            |value: Option<String>, default: &str| Some(value.unwrap_or_else(|| default.to_owned()));
        LivenessProbeConfig {
            success_threshold: or_default(
                scalar_string(spec.success_threshold.as_ref()),
                liveness::SUCCESS_THRESHOLD,
            ),
            failure_threshold: or_default(
                scalar_string(spec.failure_threshold.as_ref()),
                liveness::FAILURE_THRESHOLD,
            ),
            timeout: or_default(spec.timeout.clone(), liveness::TIMEOUT),
            interval: or_default(spec.interval.clone(), liveness::INTERVAL),
            initial_delay: or_default(spec.initial_delay.clone(), liveness::INITIAL_DELAY),
            path: spec.path.clone(),
            port: scalar_string(spec.port.as_ref()),
            command: spec
                .command
                .as_ref()
                .and_then(|c| self.command(c, declared, &join_path(path, "command"))),
        }
    }
}

fn transform_scaling(spec: &ScalingSpec) -> ScalingConfig {
    let metrics = spec.metrics.as_ref();
    ScalingConfig {
        min_replicas: scalar_string(spec.min_replicas.as_ref()),
        max_replicas: scalar_string(spec.max_replicas.as_ref()),
        metrics: ScalingMetricsConfig {
            cpu: scalar_string(metrics.and_then(|m| m.cpu.as_ref())),
            memory: scalar_string(metrics.and_then(|m| m.memory.as_ref())),
        },
    }
}

impl ExtensionTransform for ServiceExtensionSpec {
    type Config = ServiceExtension;

    fn transform_extension(
        &self,
        transformer: &mut Transformer<'_>,
        declared: &[&str],
        path: &str,
    ) -> ServiceExtension {
        ServiceExtension {
            interfaces: self
                .interfaces
                .iter()
                .map(|(key, interface)| (key.clone(), transform_interface(interface)))
                .collect(),
            liveness_probe: self
                .liveness_probe
                .as_ref()
                .filter(|probe| !probe.is_empty())
                .map(|probe| {
                    transformer.liveness_probe(probe, declared, &join_path(path, "liveness_probe"))
                }),
            replicas: scalar_string(self.replicas.as_ref()),
            scaling: self.scaling.as_ref().map(transform_scaling),
        }
    }
}

impl ExtensionTransform for TaskExtensionSpec {
    type Config = TaskExtension;

    fn transform_extension(
        &self,
        _transformer: &mut Transformer<'_>,
        _declared: &[&str],
        _path: &str,
    ) -> TaskExtension {
        TaskExtension {
            schedule: self.schedule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use deckhand_common::config::InterpolationSettings;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::spec::{ServiceSpec, TaskSpec};

    const IDENTITY: Identity<'static> = Identity {
        name: "api",
        reference: "acct/comp/api:latest",
        tag: "latest",
    };

    fn service(text: &str) -> ServiceSpec {
        serde_yaml::from_str(text).expect("should deserialize service")
    }

    fn transform_service(text: &str) -> crate::config::ServiceConfig {
        let settings = InterpolationSettings::default();
        let mut transformer = Transformer::new(&settings);
        let config = transformer.resource(IDENTITY, &service(text), "services.api");
        let errors = transformer.finish();
        assert!(errors.is_empty(), "got: {errors}");
        config
    }

    #[test]
    fn identity_is_stamped() {
        let config = transform_service("image: nginx\n");
        assert_eq!(config.name, "api");
        assert_eq!(config.reference, "acct/comp/api:latest");
        assert_eq!(config.tag, "latest");
    }

    #[test]
    fn interface_port_shorthand_expands() {
        let config = transform_service("image: nginx\ninterfaces:\n  main: 8080\n");
        assert_eq!(
            config.extension.interfaces["main"],
            InterfaceConfig {
                port: Some("8080".into()),
                ..InterfaceConfig::default()
            }
        );
    }

    #[test]
    fn volume_string_shorthand_expands() {
        let config = transform_service("image: nginx\nvolumes:\n  data: ./data\n");
        assert_eq!(config.volumes["data"].host_path.as_deref(), Some("./data"));
        assert_eq!(config.volumes["data"].mount_path, None);
    }

    #[test]
    fn implicit_build_when_no_image() {
        let config = transform_service("command: npm start\n");
        assert_eq!(config.build, Some(BuildConfig::implicit()));
        assert_eq!(config.image, None);
    }

    #[test]
    fn build_target_is_kept() {
        let config = transform_service("build:\n  context: ./api\n  target: release\n");
        let build = config.build.expect("should have build");
        assert_eq!(build.target.as_deref(), Some("release"));
        assert_eq!(build.context.as_deref(), Some("./api"));
    }

    #[test]
    fn image_alone_has_no_build() {
        assert_eq!(transform_service("image: nginx\n").build, None);
    }

    #[test]
    fn environment_values_are_strings_and_nulls_dropped() {
        let config = transform_service("image: a\nenvironment:\n  A: 1\n  B: true\n  C: ~\n  D: text\n");
        let keys: Vec<&str> = config.environment.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["A", "B", "D"]);
        assert_eq!(config.environment["A"], "1");
        assert_eq!(config.environment["B"], "true");
    }

    #[test]
    fn command_string_is_tokenized_with_declared_env() {
        let config = transform_service(
            "image: a\nenvironment:\n  PORT: 80\ncommand: serve --port ${PORT} 'a b'\nentrypoint: [sh, -c]\n",
        );
        assert_eq!(
            config.command,
            Some(vec!["serve".into(), "--port".into(), "$PORT".into(), "a b".into()])
        );
        assert_eq!(config.entrypoint, Some(vec!["sh".into(), "-c".into()]));
    }

    #[test]
    fn bad_command_is_reported() {
        let settings = InterpolationSettings::default();
        let mut transformer = Transformer::new(&settings);
        let config = transformer.resource(IDENTITY, &service("image: a\ncommand: 'echo \"oops'\n"), "services.api");
        assert_eq!(config.command, None);
        let errors = transformer.finish();
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.constraint, "shell-syntax");
        assert_eq!(error.path, "services.api.command");
    }

    #[test]
    fn liveness_probe_defaults_are_backfilled() {
        let config = transform_service(
            "image: a\nliveness_probe:\n  command: curl -f localhost\n  interval: 10s\n",
        );
        let probe = config.extension.liveness_probe.expect("should have probe");
        assert_eq!(probe.success_threshold.as_deref(), Some("1"));
        assert_eq!(probe.failure_threshold.as_deref(), Some("3"));
        assert_eq!(probe.timeout.as_deref(), Some("5s"));
        assert_eq!(probe.interval.as_deref(), Some("10s"));
        assert_eq!(probe.initial_delay.as_deref(), Some("0s"));
        assert_eq!(
            probe.command,
            Some(vec!["curl".into(), "-f".into(), "localhost".into()])
        );
    }

    #[test]
    fn empty_liveness_probe_is_dropped() {
        let config = transform_service("image: a\nliveness_probe: {}\n");
        assert_eq!(config.extension.liveness_probe, None);
    }

    #[test]
    fn debug_block_is_transformed_once() {
        let config = transform_service(
            "image: a\ndebug:\n  command: npm run dev\n  debug:\n    image: ignored\n",
        );
        let debug = config.debug.expect("should have debug");
        assert_eq!(debug.name, "api");
        assert_eq!(debug.build, Some(BuildConfig::implicit()));
        assert_eq!(debug.command, Some(vec!["npm".into(), "run".into(), "dev".into()]));
        assert!(debug.debug.is_none());
    }

    #[test]
    fn task_schedule_passes_through() {
        let settings = InterpolationSettings::default();
        let mut transformer = Transformer::new(&settings);
        let spec: TaskSpec =
            serde_yaml::from_str("image: job\nschedule: '*/5 * * * *'\n").expect("should deserialize");
        let config = transformer.resource(IDENTITY, &spec, "tasks.api");
        assert_eq!(config.extension.schedule.as_deref(), Some("*/5 * * * *"));
    }
}
