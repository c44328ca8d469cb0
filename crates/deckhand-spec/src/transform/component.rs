//! Component-level transform.

use deckhand_common::config::InterpolationSettings;
use deckhand_common::constants::{DEFAULT_TAG, FILE_REF_PREFIX};
use deckhand_common::error::{DeckhandError, ErrorKind, Result, ValidationError};
use indexmap::IndexMap;
use regex::Regex;

use crate::config::{
    ComponentConfig, ComponentInterfaceConfig, IngressConfig, InterfaceConfig, ParameterConfig,
};
use crate::schema::join_path;
use crate::schema::spec::{
    ComponentInterfaceSpec, ComponentSpec, InterfaceSpec, ParameterSpec, Scalar,
};

use super::Transformer;
use super::resource::{Identity, transform_interface};

/// Transforms a validated component spec into its canonical form.
///
/// # Errors
///
/// Returns [`DeckhandError::Validation`] with every problem found, such as
/// an untokenizable command or a malformed interface shorthand.
pub fn transform(spec: &ComponentSpec, settings: &InterpolationSettings) -> Result<ComponentConfig> {
    tracing::info!(component = %spec.name, "transforming component spec");
    let url_shorthand = url_shorthand_pattern(settings)?;
    let mut transformer = Transformer::new(settings);

    let tag = spec.tag.clone().unwrap_or_else(|| DEFAULT_TAG.to_owned());
    let (extends, local_path) = match spec.extends.as_deref() {
        Some(value) => value.strip_prefix(FILE_REF_PREFIX).map_or_else(
            || (Some(value.to_owned()), None),
            |path| (None, Some(path.trim().to_owned())),
        ),
        None => (None, None),
    };

    let mut config = ComponentConfig {
        name: spec.name.clone(),
        tag,
        extends,
        local_path,
        description: spec.description.clone(),
        keywords: spec.keywords.clone(),
        author: spec.author.clone(),
        homepage: spec.homepage.clone(),
        parameters: spec
            .parameters
            .iter()
            .map(|(key, parameter)| (key.clone(), transform_parameter(parameter)))
            .collect(),
        dependencies: spec
            .dependencies
            .iter()
            .map(|(key, tag)| (key.clone(), tag.to_string()))
            .collect(),
        ..ComponentConfig::default()
    };
    config.reference = config.component_ref();

    for (key, service) in &spec.services {
        let reference = config.resource_ref(key);
        let identity = Identity {
            name: key,
            reference: &reference,
            tag: &config.tag,
        };
        let service = transformer.resource(identity, service, &join_path("services", key));
        let _ = config.services.insert(key.clone(), service);
    }
    for (key, task) in &spec.tasks {
        let reference = config.resource_ref(key);
        let identity = Identity {
            name: key,
            reference: &reference,
            tag: &config.tag,
        };
        let task = transformer.resource(identity, task, &join_path("tasks", key));
        let _ = config.tasks.insert(key.clone(), task);
    }

    let mut interfaces = IndexMap::new();
    for (key, interface) in &spec.interfaces {
        let path = join_path("interfaces", key);
        let interface = transform_component_interface(
            &mut transformer,
            &url_shorthand,
            &config,
            key,
            interface,
            &path,
        );
        if let Some(interface) = interface {
            let _ = interfaces.insert(key.clone(), interface);
        }
    }
    config.interfaces = interfaces;

    transformer.finish().into_result(config)
}

fn transform_parameter(spec: &ParameterSpec) -> ParameterConfig {
    match spec {
        ParameterSpec::Value(value) => ParameterConfig {
            default: Some(value.clone()),
            ..ParameterConfig::default()
        },
        ParameterSpec::Definition(definition) => {
            let required = definition
                .required
                .as_ref()
                .and_then(Scalar::as_bool)
                .unwrap_or(true);
            let default = match (&definition.default, required) {
                (None, false) => Some(None),
                (default, _) => default.clone(),
            };
            ParameterConfig {
                required: Some(required),
                description: definition.description.clone(),
                default,
            }
        }
    }
}

fn url_shorthand_pattern(settings: &InterpolationSettings) -> Result<Regex> {
    let pattern = format!(
        r"^\s*{}\s*([^\s]+)\.url\s*{}\s*$",
        regex::escape(&settings.open),
        regex::escape(&settings.close)
    );
    Regex::new(&pattern).map_err(|e| DeckhandError::Config {
        message: format!("invalid interpolation delimiters: {e}"),
    })
}

fn transform_component_interface(
    transformer: &mut Transformer<'_>,
    url_shorthand: &Regex,
    component: &ComponentConfig,
    key: &str,
    spec: &ComponentInterfaceSpec,
    path: &str,
) -> Option<ComponentInterfaceConfig> {
    match spec {
        ComponentInterfaceSpec::Value(Scalar::String(value)) => {
            let Some(target) = url_shorthand.captures(value).and_then(|c| c.get(1)) else {
                transformer.report(
                    ValidationError::new(
                        ErrorKind::SchemaValidation,
                        path,
                        "interface-url",
                        format!(
                            "Invalid interface url value for '{}.interfaces.{key}'. \
                             Expected format: ${{{{ services.<name>.interfaces.<name>.url }}}}.",
                            component.reference
                        ),
                    )
                    .with_value(value.clone()),
                );
                return None;
            };
            let settings = transformer.settings();
            let field = |name: &str| {
                Some(format!("{} {}.{name} {}", settings.open, target.as_str(), settings.close))
            };
            Some(ComponentInterfaceConfig {
                interface: InterfaceConfig {
                    host: field("host"),
                    port: field("port"),
                    protocol: field("protocol"),
                    username: field("username"),
                    password: field("password"),
                    url: field("url"),
                    ..InterfaceConfig::default()
                },
                ingress: None,
            })
        }
        ComponentInterfaceSpec::Value(port) => Some(ComponentInterfaceConfig {
            interface: transform_interface(&InterfaceSpec::Port(port.clone())),
            ingress: None,
        }),
        ComponentInterfaceSpec::Definition(definition) => Some(ComponentInterfaceConfig {
            interface: transform_interface(&InterfaceSpec::Definition(definition.interface.clone())),
            ingress: definition.ingress.as_ref().map(|ingress| IngressConfig {
                enabled: ingress.enabled.as_ref().and_then(Scalar::as_bool),
                subdomain: ingress.subdomain.clone(),
            }),
        }),
    }
}
