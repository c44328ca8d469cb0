//! The interpolation engine.
//!
//! [`syntax`] parses `${{ ... }}` expressions out of strings, [`context`]
//! builds the tree they are resolved against, and [`engine`] resolves them.
//! The functions here apply the engine to a whole canonical config.

pub mod context;
pub mod engine;
pub mod syntax;

use deckhand_common::config::InterpolationSettings;
use deckhand_common::error::{Result, ValidationErrors};
use indexmap::IndexMap;

use crate::config::ComponentConfig;

pub use context::{Context, Mode};
pub use engine::{Interpolator, resolve_context};

/// Resolves every expression in `config` against `context`.
///
/// # Errors
///
/// Returns [`DeckhandError::Validation`](deckhand_common::error::DeckhandError::Validation)
/// listing every expression that could not be resolved, each at the
/// property path where it occurs.
pub fn interpolate(
    config: &ComponentConfig,
    context: &Context,
    settings: &InterpolationSettings,
    ignored: &[String],
) -> Result<ComponentConfig> {
    tracing::info!(component = %config.reference, "interpolating component config");
    let (rendered, errors) = render_config(config, context, settings, ignored, Mode::Runtime)?;
    errors.into_result(rendered)
}

/// Checks that every expression in `config` refers to something that
/// exists, without requiring parameter values or dependency contexts.
///
/// # Errors
///
/// Returns an error if the context cannot be built or the config cannot
/// be walked.
pub fn validate_interpolation(
    config: &ComponentConfig,
    settings: &InterpolationSettings,
    ignored: &[String],
    max_ref_length: usize,
) -> Result<ValidationErrors> {
    tracing::info!(component = %config.reference, "validating interpolation references");
    let context = Context::for_component(config, &IndexMap::new(), max_ref_length, Mode::Validation)?;
    let (_, errors) = render_config(config, &context, settings, ignored, Mode::Validation)?;
    Ok(errors)
}

fn render_config(
    config: &ComponentConfig,
    context: &Context,
    settings: &InterpolationSettings,
    ignored: &[String],
    mode: Mode,
) -> Result<(ComponentConfig, ValidationErrors)> {
    let mut value = serde_json::to_value(config)?;
    let mut errors = ValidationErrors::new();
    Interpolator::new(context, settings, ignored, mode).render_value(&mut value, "", &mut errors);
    tracing::debug!(count = errors.len(), "interpolation finished");
    Ok((serde_json::from_value(value)?, errors))
}

#[cfg(test)]
mod tests {
    use deckhand_common::error::ErrorKind;

    use super::*;

    fn config(text: &str) -> ComponentConfig {
        let spec = serde_yaml::from_str(text).expect("should deserialize spec");
        crate::transform::transform(&spec, &InterpolationSettings::default())
            .expect("should transform")
    }

    fn ignored() -> Vec<String> {
        vec!["architect".into(), "environment".into()]
    }

    #[test]
    fn interpolates_service_environment() {
        let config = config(
            "name: acct/hello\nservices:\n  api:\n    image: a\n    interfaces:\n      main: 3000\n    environment:\n      PORT: ${{ services.api.interfaces.main.port }}\n",
        );
        let context = Context::for_component(&config, &IndexMap::new(), 63, Mode::Runtime)
            .expect("should build context");
        let settings = InterpolationSettings::default();
        let rendered =
            interpolate(&config, &context, &settings, &ignored()).expect("should interpolate");
        assert_eq!(rendered.services["api"].environment["PORT"], "3000");
    }

    #[test]
    fn interpolation_errors_carry_config_paths() {
        let config = config(
            "name: acct/hello\nservices:\n  api:\n    image: a\n    command: run ${{ parameters.missing }}\n",
        );
        let settings = InterpolationSettings::default();
        let errors = validate_interpolation(&config, &settings, &ignored(), 63)
            .expect("should validate");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.kind, ErrorKind::UnresolvedInterpolation);
        assert_eq!(error.path, "services.api.command.1");
    }

    #[test]
    fn validation_tolerates_required_parameters() {
        let config = config(
            "name: acct/hello\nparameters:\n  secret: ~\nservices:\n  api:\n    image: a\n    environment:\n      S: ${{ parameters.secret }}\n",
        );
        let settings = InterpolationSettings::default();
        let errors = validate_interpolation(&config, &settings, &ignored(), 63)
            .expect("should validate");
        assert!(errors.is_empty(), "got: {errors}");

        let context = Context::for_component(&config, &IndexMap::new(), 63, Mode::Runtime)
            .expect("should build context");
        let err = interpolate(&config, &context, &settings, &ignored()).expect_err("should fail");
        let errors = err.validation_errors().expect("should be validation errors");
        assert_eq!(
            errors.iter().next().map(|e| e.constraint.as_str()),
            Some("required-parameter")
        );
    }

    #[test]
    fn dependency_of_dependency_is_not_visible() {
        let config = config(
            "name: acct/hello\ndependencies:\n  acct/a: latest\nservices:\n  api:\n    image: x\n    environment:\n      B: ${{ dependencies['acct/a'].dependencies['acct/b'].interfaces.main.url }}\n",
        );
        let mut b = Context::new();
        b.insert("interfaces", serde_json::json!({ "main": { "url": "http://b" } }));
        let mut a = Context::new();
        a.insert("dependencies", serde_json::json!({ "acct/b": b.into_value() }));
        let mut dependencies = IndexMap::new();
        let _ = dependencies.insert("acct/a".to_owned(), a);

        let context = Context::for_component(&config, &dependencies, 63, Mode::Runtime)
            .expect("should build context");
        let settings = InterpolationSettings::default();
        let err = interpolate(&config, &context, &settings, &ignored()).expect_err("should fail");
        let errors = err.validation_errors().expect("should be validation errors");
        assert!(errors.has_kind(ErrorKind::UnresolvedInterpolation));
    }
}
