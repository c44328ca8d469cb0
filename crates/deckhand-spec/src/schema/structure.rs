//! Shape checking of the raw document before typed deserialization.
//!
//! Every object kind has a static table of allowed keys and value shapes.
//! Walking the YAML value against it yields path-addressed diagnostics for
//! unknown keys, wrong value types, and malformed dictionary keys. A
//! document that passes this check always deserializes into
//! [`super::spec::ComponentSpec`].

use deckhand_common::error::{ErrorKind, ValidationError, ValidationErrors};
use serde_yaml::Value;

use crate::slugs;

use super::join_path;

/// Grammar a dictionary's keys must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGrammar {
    /// No constraint.
    Any,
    /// A slug segment: lower-case alphanumeric with single interior hyphens.
    Segment,
    /// `[A-Za-z0-9_]+`
    EnvironmentKey,
    /// `[A-Za-z0-9_-]+`
    ParameterKey,
    /// `account/component` or `component`.
    ComponentName,
}

impl KeyGrammar {
    fn accepts(self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Segment => slugs::is_valid_segment(key),
            Self::EnvironmentKey => {
                !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
            }
            Self::ParameterKey => {
                !key.is_empty()
                    && key
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            }
            Self::ComponentName => slugs::split_component_name(key).is_some(),
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Any => "any key",
            Self::Segment => {
                "must contain only lower alphanumeric characters and single hyphens, at most 32 characters"
            }
            Self::EnvironmentKey => "must contain only alphanumeric characters and underscores",
            Self::ParameterKey => {
                "must contain only alphanumeric characters, underscores, and hyphens"
            }
            Self::ComponentName => "must be of the form <account-name>/<component-name>",
        }
    }
}

/// The shape a value must have.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// A string.
    String,
    /// A string, number, or boolean.
    Scalar,
    /// A list of strings.
    StringList,
    /// A string or a list of scalars.
    Command,
    /// A mapping described by an object schema.
    Object(&'static ObjectSchema),
    /// A string shorthand or the full object.
    StringOr(&'static ObjectSchema),
    /// A scalar shorthand or the full object.
    ScalarOr(&'static ObjectSchema),
    /// A dictionary with constrained keys and uniform values.
    Map {
        /// Grammar of the keys.
        keys: KeyGrammar,
        /// Shape of every value.
        values: &'static Self,
        /// Whether a value may be null.
        nullable_values: bool,
    },
}

impl Shape {
    /// Maps and lists become empty collections when absent, so an explicit
    /// null is rejected instead.
    const fn accepts_null(self) -> bool {
        !matches!(self, Self::Map { .. } | Self::StringList)
    }

    const fn expected(self) -> &'static str {
        match self {
            Self::String => "must be a string",
            Self::Scalar => "must be a string, number, or boolean",
            Self::StringList => "must be a list of strings",
            Self::Command => "must be a string or a list of strings",
            Self::Object(_) | Self::Map { .. } => "must be a mapping",
            Self::StringOr(_) => "must be a string or a mapping",
            Self::ScalarOr(_) => "must be a scalar or a mapping",
        }
    }
}

/// One allowed key of an object.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Key name.
    pub name: &'static str,
    /// Shape of its value.
    pub shape: Shape,
    /// Whether the key must be present.
    pub required: bool,
}

const fn field(name: &'static str, shape: Shape) -> Field {
    Field {
        name,
        shape,
        required: false,
    }
}

const fn map(keys: KeyGrammar, values: &'static Shape) -> Shape {
    Shape::Map {
        keys,
        values,
        nullable_values: false,
    }
}

const fn nullable_map(keys: KeyGrammar, values: &'static Shape) -> Shape {
    Shape::Map {
        keys,
        values,
        nullable_values: true,
    }
}

/// The allowed keys of one object kind.
#[derive(Debug)]
pub struct ObjectSchema {
    /// Name used in messages.
    pub name: &'static str,
    /// Groups of allowed fields.
    pub fields: &'static [&'static [Field]],
}

impl ObjectSchema {
    fn find(&self, key: &str) -> Option<&Field> {
        self.fields.iter().flat_map(|group| group.iter()).find(|f| f.name == key)
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().flat_map(|group| group.iter()).map(|f| f.name)
    }
}

static BUILD: ObjectSchema = ObjectSchema {
    name: "build",
    fields: &[&[
        field("context", Shape::String),
        field("dockerfile", Shape::String),
        field("target", Shape::String),
        field("args", nullable_map(KeyGrammar::EnvironmentKey, &Shape::Scalar)),
    ]],
};

static VOLUME: ObjectSchema = ObjectSchema {
    name: "volume",
    fields: &[&[
        field("mount_path", Shape::String),
        field("host_path", Shape::String),
        field("key", Shape::String),
        field("description", Shape::String),
        field("readonly", Shape::Scalar),
    ]],
};

static INTERFACE_FIELDS: [Field; 8] = [
    field("description", Shape::String),
    field("host", Shape::String),
    field("port", Shape::Scalar),
    field("protocol", Shape::String),
    field("username", Shape::String),
    field("password", Shape::String),
    field("url", Shape::String),
    field("sticky", Shape::Scalar),
];

static INTERFACE: ObjectSchema = ObjectSchema {
    name: "interface",
    fields: &[&INTERFACE_FIELDS],
};

static INGRESS: ObjectSchema = ObjectSchema {
    name: "ingress",
    fields: &[&[
        field("enabled", Shape::Scalar),
        field("subdomain", Shape::String),
    ]],
};

static COMPONENT_INTERFACE: ObjectSchema = ObjectSchema {
    name: "component interface",
    fields: &[&INTERFACE_FIELDS, &[field("ingress", Shape::Object(&INGRESS))]],
};

static LIVENESS_PROBE: ObjectSchema = ObjectSchema {
    name: "liveness_probe",
    fields: &[&[
        field("success_threshold", Shape::Scalar),
        field("failure_threshold", Shape::Scalar),
        field("timeout", Shape::String),
        field("interval", Shape::String),
        field("initial_delay", Shape::String),
        field("path", Shape::String),
        field("port", Shape::Scalar),
        field("command", Shape::Command),
    ]],
};

static SCALING_METRICS: ObjectSchema = ObjectSchema {
    name: "metrics",
    fields: &[&[field("cpu", Shape::Scalar), field("memory", Shape::Scalar)]],
};

static SCALING: ObjectSchema = ObjectSchema {
    name: "scaling",
    fields: &[&[
        field("min_replicas", Shape::Scalar),
        field("max_replicas", Shape::Scalar),
        field("metrics", Shape::Object(&SCALING_METRICS)),
    ]],
};

static RESOURCE_FIELDS: [Field; 11] = [
    field("description", Shape::String),
    field("image", Shape::String),
    field("build", Shape::Object(&BUILD)),
    field("command", Shape::Command),
    field("entrypoint", Shape::Command),
    field("environment", nullable_map(KeyGrammar::EnvironmentKey, &Shape::Scalar)),
    field("volumes", map(KeyGrammar::Segment, &VOLUME_SHAPE)),
    field("cpu", Shape::Scalar),
    field("memory", Shape::Scalar),
    field("depends_on", Shape::StringList),
    field("labels", map(KeyGrammar::Any, &Shape::String)),
];

static SERVICE: ObjectSchema = ObjectSchema {
    name: "service",
    fields: &[
        &RESOURCE_FIELDS,
        &[
            field("debug", Shape::Object(&SERVICE)),
            field("interfaces", map(KeyGrammar::Segment, &INTERFACE_SHAPE)),
            field("liveness_probe", Shape::Object(&LIVENESS_PROBE)),
            field("replicas", Shape::Scalar),
            field("scaling", Shape::Object(&SCALING)),
        ],
    ],
};

static TASK: ObjectSchema = ObjectSchema {
    name: "task",
    fields: &[
        &RESOURCE_FIELDS,
        &[
            field("debug", Shape::Object(&TASK)),
            field("schedule", Shape::String),
        ],
    ],
};

static PARAMETER: ObjectSchema = ObjectSchema {
    name: "parameter",
    fields: &[&[
        field("required", Shape::Scalar),
        field("description", Shape::String),
        field("default", Shape::Scalar),
    ]],
};

static VOLUME_SHAPE: Shape = Shape::StringOr(&VOLUME);
static INTERFACE_SHAPE: Shape = Shape::ScalarOr(&INTERFACE);
static PARAMETER_SHAPE: Shape = Shape::ScalarOr(&PARAMETER);
static SERVICE_SHAPE: Shape = Shape::Object(&SERVICE);
static TASK_SHAPE: Shape = Shape::Object(&TASK);
static COMPONENT_INTERFACE_SHAPE: Shape = Shape::ScalarOr(&COMPONENT_INTERFACE);

/// Schema of a whole component document.
pub static COMPONENT: ObjectSchema = ObjectSchema {
    name: "component",
    fields: &[&[
        Field {
            name: "name",
            shape: Shape::String,
            required: true,
        },
        field("tag", Shape::String),
        field("extends", Shape::String),
        field("description", Shape::String),
        field("keywords", Shape::StringList),
        field("author", Shape::String),
        field("homepage", Shape::String),
        field(
            "parameters",
            nullable_map(KeyGrammar::ParameterKey, &PARAMETER_SHAPE),
        ),
        field("services", map(KeyGrammar::Segment, &SERVICE_SHAPE)),
        field("tasks", map(KeyGrammar::Segment, &TASK_SHAPE)),
        field("dependencies", map(KeyGrammar::ComponentName, &Shape::Scalar)),
        field(
            "interfaces",
            map(KeyGrammar::Segment, &COMPONENT_INTERFACE_SHAPE),
        ),
    ]],
};

/// Checks a raw document against the component schema.
pub fn check_document(value: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_object(value, &COMPONENT, "", &mut errors);
    errors
}

fn key_text(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn schema_error(path: &str, constraint: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::new(ErrorKind::SchemaValidation, path, constraint, message)
}

fn check_object(value: &Value, schema: &ObjectSchema, path: &str, errors: &mut ValidationErrors) {
    let Value::Mapping(mapping) = value else {
        errors.push(schema_error(
            path,
            "type",
            format!("{} must be a mapping", schema.name),
        ));
        return;
    };

    for (raw_key, child) in mapping {
        let Some(key) = key_text(raw_key) else {
            errors.push(schema_error(path, "type", "keys must be strings"));
            continue;
        };
        let child_path = join_path(path, &key);
        match schema.find(&key) {
            Some(field) => check_field(child, field, &child_path, errors),
            None => {
                let mut message = format!("\"{key}\" is not a valid {} key", schema.name);
                if let Some(suggestion) = find_potential_match(&key, schema.names()) {
                    message.push_str(&format!(". Did you mean \"{suggestion}\"?"));
                }
                errors.push(schema_error(&child_path, "unknown-key", message).with_value(key));
            }
        }
    }

    for field in schema.fields.iter().flat_map(|group| group.iter()) {
        let present = mapping
            .get(field.name)
            .is_some_and(|v| !v.is_null());
        if field.required && !present {
            errors.push(schema_error(
                &join_path(path, field.name),
                "required",
                format!("{} is required", field.name),
            ));
        }
    }
}

fn check_field(value: &Value, field: &Field, path: &str, errors: &mut ValidationErrors) {
    if value.is_null() {
        if !field.required && !field.shape.accepts_null() {
            errors.push(schema_error(path, "type", field.shape.expected()));
        }
        return;
    }
    check_shape(value, field.shape, path, errors);
}

fn check_shape(value: &Value, shape: Shape, path: &str, errors: &mut ValidationErrors) {
    let ok = match shape {
        Shape::String => value.is_string(),
        Shape::Scalar => is_scalar(value),
        Shape::StringList => seq_all(value, path, errors, Value::is_string),
        Shape::Command => value.is_string() || seq_all(value, path, errors, is_scalar),
        Shape::Object(schema) => {
            check_object(value, schema, path, errors);
            true
        }
        Shape::StringOr(schema) => {
            if !value.is_string() {
                check_object(value, schema, path, errors);
            }
            true
        }
        Shape::ScalarOr(schema) => {
            if !is_scalar(value) {
                check_object(value, schema, path, errors);
            }
            true
        }
        Shape::Map {
            keys,
            values,
            nullable_values,
        } => {
            check_map(value, keys, *values, nullable_values, path, errors);
            true
        }
    };
    if !ok {
        errors.push(schema_error(path, "type", shape.expected()));
    }
}

/// Returns `false` if `value` is not a sequence; reports bad items itself.
fn seq_all(
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
    item_ok: fn(&Value) -> bool,
) -> bool {
    let Value::Sequence(items) = value else {
        return false;
    };
    for (idx, item) in items.iter().enumerate() {
        if !item_ok(item) {
            errors.push(schema_error(
                &join_path(path, &idx.to_string()),
                "type",
                "list items must be strings",
            ));
        }
    }
    true
}

fn check_map(
    value: &Value,
    keys: KeyGrammar,
    values: Shape,
    nullable_values: bool,
    path: &str,
    errors: &mut ValidationErrors,
) {
    let Value::Mapping(mapping) = value else {
        errors.push(schema_error(path, "type", "must be a mapping"));
        return;
    };
    for (raw_key, child) in mapping {
        let Some(key) = key_text(raw_key) else {
            errors.push(schema_error(path, "type", "keys must be strings"));
            continue;
        };
        let child_path = join_path(path, &key);
        if !keys.accepts(&key) {
            errors.push(
                schema_error(
                    &child_path,
                    "matches",
                    format!("\"{key}\" {}", keys.description()),
                )
                .with_value(key.clone()),
            );
        }
        if child.is_null() {
            if !nullable_values {
                errors.push(schema_error(&child_path, "type", values.expected()));
            }
            continue;
        }
        check_shape(child, values, &child_path, errors);
    }
}

/// Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

/// Returns the closest candidate within an edit distance of two.
pub fn find_potential_match<'a>(
    value: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|candidate| (edit_distance(value, candidate), candidate))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
