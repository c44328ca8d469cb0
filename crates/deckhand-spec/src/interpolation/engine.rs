//! Expression resolution over canonical configs.
//!
//! The config is walked as an in-memory tree; every string leaf is parsed
//! into literal and expression segments and each expression is looked up in
//! the [`Context`]. Context leaves that hold expressions themselves are
//! resolved against the same context on first use and memoized. A path
//! already being resolved further up the stack is a cycle.

use std::collections::{HashMap, HashSet};

use deckhand_common::config::InterpolationSettings;
use deckhand_common::error::{ErrorKind, ValidationError, ValidationErrors};
use serde_json::Value;

use crate::schema::join_path;

use super::context::{Context, Mode};
use super::syntax::{self, Expression, Segment};

/// Why an expression could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure {
    kind: ErrorKind,
    constraint: &'static str,
    message: String,
}

impl Failure {
    fn unresolved(expression: &str) -> Self {
        Self {
            kind: ErrorKind::UnresolvedInterpolation,
            constraint: "interpolation",
            message: format!("could not resolve \"{expression}\""),
        }
    }
}

/// Resolves expressions against one context.
#[derive(Debug)]
pub struct Interpolator<'a> {
    context: &'a Context,
    settings: &'a InterpolationSettings,
    ignored: &'a [String],
    mode: Mode,
    resolved: HashMap<String, Result<String, Failure>>,
    in_progress: HashSet<String>,
}

impl<'a> Interpolator<'a> {
    /// Creates an interpolator. Missing paths under `ignored` namespaces
    /// are left verbatim.
    #[must_use]
    pub fn new(
        context: &'a Context,
        settings: &'a InterpolationSettings,
        ignored: &'a [String],
        mode: Mode,
    ) -> Self {
        Self {
            context,
            settings,
            ignored,
            mode,
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Resolves every expression in `text`, reporting failures at `path`.
    ///
    /// An expression that fails is left as written.
    pub fn render(&mut self, text: &str, path: &str, errors: &mut ValidationErrors) -> String {
        match self.render_all(text) {
            Ok(rendered) => rendered,
            Err((rendered, failures)) => {
                for (raw, failure) in failures {
                    errors.push(
                        ValidationError::new(failure.kind, path, failure.constraint, failure.message)
                            .with_value(raw),
                    );
                }
                rendered
            }
        }
    }

    /// Resolves every string leaf of `value` in place.
    pub fn render_value(&mut self, value: &mut Value, path: &str, errors: &mut ValidationErrors) {
        match value {
            Value::String(text) => {
                if syntax::has_expression(text, self.settings) {
                    *text = self.render(text, path, errors);
                }
            }
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.render_value(item, &join_path(path, &idx.to_string()), errors);
                }
            }
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    self.render_value(child, &join_path(path, key), errors);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    /// Renders `text`, collecting the raw text and failure of every
    /// expression that could not be resolved.
    #[allow(clippy::type_complexity)]
    fn render_all(&mut self, text: &str) -> Result<String, (String, Vec<(String, Failure)>)> {
        let segments = match syntax::parse_template(text, self.settings) {
            Ok(segments) => segments,
            Err(e) => {
                let failure = Failure {
                    kind: ErrorKind::SchemaValidation,
                    constraint: "interpolation-syntax",
                    message: e.message,
                };
                return Err((text.to_owned(), vec![(text.to_owned(), failure)]));
            }
        };

        let mut rendered = String::with_capacity(text.len());
        let mut failures = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(literal) => rendered.push_str(literal),
                Segment::Expression(expression) => match self.evaluate(&expression) {
                    Ok(value) => rendered.push_str(&value),
                    Err(failure) => {
                        rendered.push_str(expression.raw);
                        failures.push((expression.raw.to_owned(), failure));
                    }
                },
            }
        }
        if failures.is_empty() {
            Ok(rendered)
        } else {
            Err((rendered, failures))
        }
    }

    fn is_pass_through(&self, expression: &Expression<'_>) -> bool {
        let namespace = expression.namespace();
        if self.ignored.iter().any(|n| n == namespace) {
            return true;
        }
        // Dependency contexts are not fetched when only validating.
        self.mode == Mode::Validation
            && namespace == "dependencies"
            && self.context.lookup(&expression.path[..expression.path.len().min(2)]).is_none()
    }

    fn evaluate(&mut self, expression: &Expression<'_>) -> Result<String, Failure> {
        let key = expression.dotted();
        if let Some(cached) = self.resolved.get(&key) {
            return cached.clone();
        }
        if self.in_progress.contains(&key) {
            return Err(Failure {
                kind: ErrorKind::CircularReference,
                constraint: "circular-interpolation",
                message: format!("\"{key}\" refers back to itself"),
            });
        }

        let context = self.context;
        let Some(value) = context.lookup(&expression.path) else {
            if self.is_pass_through(expression) {
                return Ok(expression.raw.to_owned());
            }
            return Err(Failure::unresolved(&key));
        };

        let result = match value {
            Value::String(text) if syntax::has_expression(text, self.settings) => {
                let _ = self.in_progress.insert(key.clone());
                let text = text.clone();
                let result = self
                    .render_all(&text)
                    .map_err(|(_, failures)| match failures.into_iter().next() {
                        Some((_, failure)) if failure.kind == ErrorKind::CircularReference => failure,
                        Some((raw, failure)) => Failure {
                            message: format!("\"{key}\" depends on {raw}: {}", failure.message),
                            ..failure
                        },
                        None => Failure::unresolved(&key),
                    });
                let _ = self.in_progress.remove(&key);
                result
            }
            Value::String(text) => Ok(text.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Err(Failure {
                kind: ErrorKind::UnresolvedInterpolation,
                constraint: "required-parameter",
                message: format!("\"{key}\" is required but has no value"),
            }),
            Value::Array(_) | Value::Object(_) => Err(Failure {
                kind: ErrorKind::SchemaValidation,
                constraint: "non-scalar-reference",
                message: format!("\"{key}\" refers to an object, not a value"),
            }),
        };
        let _ = self.resolved.insert(key, result.clone());
        result
    }
}

/// Resolves the expressions inside a context's own leaves, producing a
/// context whose values are final. Used for dependency contexts before
/// they are exposed to a consumer.
pub fn resolve_context(
    context: &Context,
    settings: &InterpolationSettings,
    ignored: &[String],
    mode: Mode,
) -> (Context, ValidationErrors) {
    let mut errors = ValidationErrors::new();
    let mut resolved = context.clone();
    let mut interpolator = Interpolator::new(context, settings, ignored, mode);
    for (path, text) in context.string_leaves() {
        if syntax::has_expression(&text, settings) {
            let rendered = interpolator.render(&text, &path.join("."), &mut errors);
            resolved.replace(&path, Value::String(rendered));
        }
    }
    (resolved, errors)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(value: Value) -> Context {
        match value {
            Value::Object(map) => Context::from(map),
            other => unreachable!("context must be an object, got {other}"),
        }
    }

    fn ignored() -> Vec<String> {
        vec!["architect".into(), "environment".into()]
    }

    fn render(ctx: &Context, text: &str) -> (String, ValidationErrors) {
        let settings = InterpolationSettings::default();
        let ignored = ignored();
        let mut errors = ValidationErrors::new();
        let mut interpolator = Interpolator::new(ctx, &settings, &ignored, Mode::Runtime);
        let out = interpolator.render(text, "services.api.environment.X", &mut errors);
        (out, errors)
    }

    #[test]
    fn resolves_simple_references() {
        let ctx = context(json!({ "parameters": { "host": "db", "port": 5432 } }));
        let (out, errors) = render(&ctx, "postgres://${{ parameters.host }}:${{ parameters.port }}");
        assert!(errors.is_empty(), "got: {errors}");
        assert_eq!(out, "postgres://db:5432");
    }

    #[test]
    fn resolves_nested_expressions_in_context() {
        let ctx = context(json!({
            "parameters": {
                "a": "${{ parameters.b }}-x",
                "b": "${{ parameters.c }}",
                "c": "deep"
            }
        }));
        let (out, errors) = render(&ctx, "${{ parameters.a }}");
        assert!(errors.is_empty(), "got: {errors}");
        assert_eq!(out, "deep-x");
    }

    #[test]
    fn missing_path_is_unresolved() {
        let ctx = context(json!({ "parameters": {} }));
        let (out, errors) = render(&ctx, "${{ parameters.nope }}");
        assert_eq!(out, "${{ parameters.nope }}");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.kind, ErrorKind::UnresolvedInterpolation);
        assert_eq!(error.path, "services.api.environment.X");
        assert_eq!(error.value.as_deref(), Some("${{ parameters.nope }}"));
    }

    #[test]
    fn cycles_are_circular_references() {
        let ctx = context(json!({
            "parameters": { "a": "${{ parameters.b }}", "b": "${{ parameters.a }}" }
        }));
        let (_, errors) = render(&ctx, "${{ parameters.a }}");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.kind, ErrorKind::CircularReference);
        assert_eq!(error.constraint, "circular-interpolation");
    }

    #[test]
    fn null_parameter_is_required() {
        let ctx = context(json!({ "parameters": { "secret": null } }));
        let (_, errors) = render(&ctx, "${{ parameters.secret }}");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.constraint, "required-parameter");
    }

    #[test]
    fn objects_are_not_values() {
        let ctx = context(json!({ "services": { "api": { "interfaces": {} } } }));
        let (_, errors) = render(&ctx, "${{ services.api }}");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.constraint, "non-scalar-reference");
    }

    #[test]
    fn ignored_namespaces_pass_through() {
        let ctx = context(json!({ "environment": { "name": "prod" } }));
        let (out, errors) =
            render(&ctx, "${{ environment.name }} ${{ architect.x }} ${{ environment.missing }}");
        assert!(errors.is_empty(), "got: {errors}");
        assert_eq!(out, "prod ${{ architect.x }} ${{ environment.missing }}");
    }

    #[test]
    fn every_failure_in_a_string_is_reported() {
        let ctx = context(json!({ "parameters": {} }));
        let (_, errors) = render(&ctx, "${{ parameters.a }} ${{ parameters.b }}");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn validation_mode_skips_unfetched_dependencies() {
        let settings = InterpolationSettings::default();
        let ignored = ignored();
        let ctx = context(json!({ "dependencies": { "acct/db": { "parameters": {} } } }));
        let mut errors = ValidationErrors::new();
        let mut interpolator = Interpolator::new(&ctx, &settings, &ignored, Mode::Validation);
        let unfetched = "${{ dependencies['acct/cache'].interfaces.x.url }}";
        let _ = interpolator.render(unfetched, "p", &mut errors);
        assert!(errors.is_empty(), "got: {errors}");
        let transitive = "${{ dependencies['acct/db'].dependencies.x }}";
        let _ = interpolator.render(transitive, "p", &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn resolve_context_finalizes_leaves() {
        let settings = InterpolationSettings::default();
        let ctx = context(json!({
            "parameters": { "port": "80" },
            "interfaces": { "web": { "port": "${{ parameters.port }}" } }
        }));
        let (resolved, errors) = resolve_context(&ctx, &settings, &ignored(), Mode::Runtime);
        assert!(errors.is_empty(), "got: {errors}");
        let path = vec!["interfaces".to_owned(), "web".to_owned(), "port".to_owned()];
        assert_eq!(resolved.lookup(&path), Some(&Value::from("80")));
    }
}
