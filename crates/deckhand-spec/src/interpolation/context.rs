//! The value tree expressions are resolved against.
//!
//! ```text
//! parameters.<name>
//! services.<name>.interfaces.<iface>.{host,port,protocol,username,password,url}
//! services.<name>.environment.<KEY>
//! tasks.<name>.environment.<KEY>
//! interfaces.<name>.{host,port,protocol,username,password,url}
//! ingresses.<name>.{subdomain,host,url}
//! dependencies.<name>.…        one level: a dependency's own context, minus its dependencies
//! architect.…, environment.…   supplied by the platform
//! ```
//!
//! Leaves may themselves hold expressions; the engine resolves them on demand.

use deckhand_common::constants::NULL_SENTINEL;
use deckhand_common::error::Result;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::{ComponentConfig, InterfaceConfig};
use crate::refs;

/// How unset parameters are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Unset parameters are JSON null; referencing one is an error.
    #[default]
    Runtime,
    /// Unset parameters hold the null sentinel so references still resolve.
    Validation,
}

/// A resolution context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    root: Map<String, Value>,
}

fn text(value: Option<&String>) -> Value {
    Value::String(value.cloned().unwrap_or_default())
}

fn interface_value(interface: &InterfaceConfig, default_host: Option<&str>) -> Value {
    let host = interface
        .host
        .clone()
        .or_else(|| default_host.map(str::to_owned))
        .unwrap_or_default();
    let protocol = interface.protocol.clone().unwrap_or_else(|| "http".to_owned());
    let port = interface.port.clone().unwrap_or_default();
    let url = interface
        .url
        .clone()
        .unwrap_or_else(|| format!("{protocol}://{host}:{port}"));

    let mut fields = Map::new();
    let _ = fields.insert("host".into(), Value::String(host));
    let _ = fields.insert("port".into(), Value::String(port));
    let _ = fields.insert("protocol".into(), Value::String(protocol));
    let _ = fields.insert("username".into(), text(interface.username.as_ref()));
    let _ = fields.insert("password".into(), text(interface.password.as_ref()));
    let _ = fields.insert("url".into(), Value::String(url));
    Value::Object(fields)
}

fn resource_entry(environment: &IndexMap<String, String>) -> Map<String, Value> {
    let mut resource = Map::new();
    let _ = resource.insert(
        "environment".into(),
        Value::Object(
            environment
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        ),
    );
    resource
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the context of `config`.
    ///
    /// `dependencies` maps dependency names to their already-resolved
    /// contexts. Only dependencies the component declares are visible, in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a service ref cannot be derived, for instance
    /// when `max_ref_length` is too small.
    pub fn for_component(
        config: &ComponentConfig,
        dependencies: &IndexMap<String, Self>,
        max_ref_length: usize,
        mode: Mode,
    ) -> Result<Self> {
        tracing::debug!(component = %config.reference, ?mode, "building interpolation context");
        let mut context = Self::new();

        let parameters: Map<String, Value> = config
            .parameters
            .iter()
            .map(|(key, parameter)| {
                let value = match (&parameter.default, parameter.required) {
                    (Some(Some(scalar)), _) => Value::String(scalar.to_string()),
                    (None, Some(false)) => Value::String(String::new()),
                    // Explicitly unset, or required with nothing to fall back on.
                    (Some(None) | None, _) => match mode {
                        Mode::Runtime => Value::Null,
                        Mode::Validation => Value::String(NULL_SENTINEL.to_owned()),
                    },
                };
                (key.clone(), value)
            })
            .collect();
        context.insert("parameters", Value::Object(parameters));

        let mut services = Map::new();
        for (key, service) in &config.services {
            let host = match &config.instance_id {
                Some(instance) => {
                    refs::safe_ref_with_instance(&service.reference, instance, max_ref_length)
                }
                None => refs::safe_ref(&service.reference, max_ref_length),
            }?;
            let mut entry = resource_entry(&service.environment);
            let interfaces: Map<String, Value> = service
                .extension
                .interfaces
                .iter()
                .map(|(name, interface)| (name.clone(), interface_value(interface, Some(&host))))
                .collect();
            let _ = entry.insert("interfaces".into(), Value::Object(interfaces));
            let _ = services.insert(key.clone(), Value::Object(entry));
        }
        context.insert("services", Value::Object(services));

        let tasks: Map<String, Value> = config
            .tasks
            .iter()
            .map(|(key, task)| (key.clone(), Value::Object(resource_entry(&task.environment))))
            .collect();
        context.insert("tasks", Value::Object(tasks));

        let mut interfaces = Map::new();
        let mut ingresses = Map::new();
        for (key, interface) in &config.interfaces {
            let _ = interfaces.insert(key.clone(), interface_value(&interface.interface, None));
            let mut ingress = Map::new();
            let subdomain = interface.ingress.as_ref().and_then(|i| i.subdomain.as_ref());
            let _ = ingress.insert("subdomain".into(), text(subdomain));
            let _ = ingress.insert("host".into(), Value::String(String::new()));
            let _ = ingress.insert("url".into(), Value::String(String::new()));
            let _ = ingresses.insert(key.clone(), Value::Object(ingress));
        }
        context.insert("interfaces", Value::Object(interfaces));
        context.insert("ingresses", Value::Object(ingresses));

        let mut visible = Map::new();
        for name in config.dependencies.keys() {
            if let Some(dependency) = dependencies.get(name) {
                tracing::debug!(dependency = %name, "exposing dependency context");
                let _ = visible.insert(name.clone(), dependency.exposed().into_value());
            }
        }
        context.insert("dependencies", Value::Object(visible));

        Ok(context)
    }

    /// Inserts or replaces a top-level namespace.
    pub fn insert(&mut self, namespace: &str, value: Value) {
        let _ = self.root.insert(namespace.to_owned(), value);
    }

    /// Overlays a caller-supplied parameter value.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        let parameters = self
            .root
            .entry("parameters")
            .or_insert_with(|| Value::Object(Map::new()));
        if !parameters.is_object() {
            *parameters = Value::Object(Map::new());
        }
        if let Value::Object(parameters) = parameters {
            let _ = parameters.insert(name.to_owned(), value.into());
        }
    }

    /// What a consumer of this component sees: everything but its own
    /// dependencies.
    #[must_use]
    pub fn exposed(&self) -> Self {
        let mut root = self.root.clone();
        let _ = root.remove("dependencies");
        Self { root }
    }

    /// Looks up a path.
    #[must_use]
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.root.get(first)?, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Returns `true` if a top-level namespace exists.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.root.contains_key(namespace)
    }

    /// The context as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Iterates over every string leaf, with its dot path.
    pub(crate) fn string_leaves(&self) -> Vec<(Vec<String>, String)> {
        fn walk(value: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
            match value {
                Value::String(s) => out.push((path.clone(), s.clone())),
                Value::Object(map) => {
                    for (key, child) in map {
                        path.push(key.clone());
                        walk(child, path, out);
                        let _ = path.pop();
                    }
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        let mut path = Vec::new();
        for (key, value) in &self.root {
            path.push(key.clone());
            walk(value, &mut path, &mut out);
            let _ = path.pop();
        }
        out
    }

    /// Replaces the leaf at `path`, if it exists.
    pub(crate) fn replace(&mut self, path: &[String], value: Value) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        let Some(mut current) = self.root.get_mut(first) else {
            return;
        };
        for segment in rest {
            let Some(next) = current.as_object_mut().and_then(|m| m.get_mut(segment)) else {
                return;
            };
            current = next;
        }
        *current = value;
    }
}

impl From<Map<String, Value>> for Context {
    fn from(root: Map<String, Value>) -> Self {
        Self { root }
    }
}
