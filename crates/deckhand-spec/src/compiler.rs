//! Pipeline orchestration.
//!
//! [`Compiler`] owns a [`CompilerConfig`] and runs documents through
//! structure checking, typed deserialization, rule validation, transform,
//! and interpolation. Diagnostics from every stage are annotated with
//! source positions whenever the original text is available.

use std::path::Path;

use deckhand_common::config::CompilerConfig;
use deckhand_common::error::{DeckhandError, Result, ValidationErrors};
use deckhand_common::types::ValidationContexts;
use indexmap::IndexMap;

use crate::config::ComponentConfig;
use crate::interpolation::{self, Context, Mode};
use crate::loader::{self, SourceDocument};
use crate::merge;
use crate::schema::spec::ComponentSpec;
use crate::schema::{self, source_map, structure};
use crate::transform;

/// Compiles component documents into canonical configs.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Creates a compiler with the given settings.
    #[must_use]
    pub const fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// The settings this compiler was built with.
    #[must_use]
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The contexts configured for callers that do not choose their own.
    #[must_use]
    pub fn default_contexts(&self) -> ValidationContexts {
        self.config.default_contexts.iter().copied().collect()
    }

    /// Checks a parsed document under `contexts` and returns its typed spec.
    ///
    /// Structural problems stop the pipeline only when the document cannot
    /// be read into typed form at all. Otherwise they are reported together
    /// with every rule, collision, and `depends_on` violation.
    ///
    /// # Errors
    ///
    /// Returns [`DeckhandError::Validation`] with every diagnostic found.
    pub fn parse_spec(
        &self,
        document: &SourceDocument,
        contexts: &ValidationContexts,
    ) -> Result<ComponentSpec> {
        let mut errors = structure::check_document(&document.value);
        let spec: ComponentSpec = match serde_yaml::from_value(document.value.clone()) {
            Ok(spec) => spec,
            Err(_) if !errors.is_empty() => {
                source_map::annotate(&document.source, &mut errors);
                return Err(errors.into());
            }
            Err(e) => {
                return Err(DeckhandError::Parse {
                    message: e.to_string(),
                    line: None,
                    column: None,
                });
            }
        };

        errors.extend(schema::validate(&spec, contexts));
        source_map::annotate(&document.source, &mut errors);
        errors.into_result(spec)
    }

    /// Validates and transforms a parsed document.
    ///
    /// # Errors
    ///
    /// Returns validation or transform diagnostics.
    pub fn compile_document(
        &self,
        document: &SourceDocument,
        contexts: &ValidationContexts,
    ) -> Result<ComponentConfig> {
        let spec = self.parse_spec(document, contexts)?;
        transform::transform(&spec, &self.config.interpolation)
            .map_err(|err| annotated(err, &document.source))
    }

    /// Compiles in-memory YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns parse, validation, or transform errors.
    pub fn compile_str(&self, text: &str, contexts: &ValidationContexts) -> Result<ComponentConfig> {
        self.compile_document(&SourceDocument::parse(text)?, contexts)
    }

    /// Loads and compiles the document at `path`, a file or a directory.
    ///
    /// # Errors
    ///
    /// Returns load, parse, validation, or transform errors.
    pub fn compile_path(&self, path: &Path, contexts: &ValidationContexts) -> Result<ComponentConfig> {
        self.compile_document(&loader::load_document(path)?, contexts)
    }

    /// Builds the interpolation context for `config`.
    ///
    /// `dependencies` maps component names to their own contexts. They are
    /// resolved first, and only those `config` declares are attached.
    ///
    /// # Errors
    ///
    /// Returns an error if a safe ref cannot be derived, or a dependency
    /// context contains an expression that does not resolve.
    pub fn context_for(
        &self,
        config: &ComponentConfig,
        dependencies: &IndexMap<String, Context>,
    ) -> Result<Context> {
        let mut errors = ValidationErrors::new();
        let mut resolved = IndexMap::with_capacity(dependencies.len());
        for (name, context) in dependencies {
            tracing::debug!(dependency = %name, "resolving dependency context");
            let (context, dependency_errors) = interpolation::resolve_context(
                context,
                &self.config.interpolation,
                &self.config.ignored_namespaces,
                Mode::Runtime,
            );
            errors.extend(dependency_errors.into_iter().map(|mut error| {
                error.path = format!("dependencies.{name}.{}", error.path);
                error
            }));
            let _ = resolved.insert(name.clone(), context);
        }
        let context = errors.into_result(resolved)?;
        Context::for_component(config, &context, self.config.max_ref_length, Mode::Runtime)
    }

    /// The fully resolved context `config` exposes to its consumers.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::context_for`], plus any expression in
    /// the component's own context that does not resolve.
    pub fn resolved_context(
        &self,
        config: &ComponentConfig,
        dependencies: &IndexMap<String, Context>,
    ) -> Result<Context> {
        let context = self.context_for(config, dependencies)?;
        let (resolved, errors) = interpolation::resolve_context(
            &context,
            &self.config.interpolation,
            &self.config.ignored_namespaces,
            Mode::Runtime,
        );
        errors.into_result(resolved)
    }

    /// Resolves every expression in `config` against `context`.
    ///
    /// # Errors
    ///
    /// Returns every expression that could not be resolved.
    pub fn interpolate(&self, config: &ComponentConfig, context: &Context) -> Result<ComponentConfig> {
        interpolation::interpolate(
            config,
            context,
            &self.config.interpolation,
            &self.config.ignored_namespaces,
        )
    }

    /// Checks that every expression in `config` names something that exists.
    ///
    /// Parameter values and dependency contexts are not required.
    ///
    /// # Errors
    ///
    /// Returns an error only if the validation context cannot be built.
    pub fn validate_interpolation(&self, config: &ComponentConfig) -> Result<ValidationErrors> {
        interpolation::validate_interpolation(
            config,
            &self.config.interpolation,
            &self.config.ignored_namespaces,
            self.config.max_ref_length,
        )
    }

    /// Like [`Self::validate_interpolation`], with positions from `document`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the validation context cannot be built.
    pub fn validate_document_interpolation(
        &self,
        config: &ComponentConfig,
        document: &SourceDocument,
    ) -> Result<ValidationErrors> {
        let mut errors = self.validate_interpolation(config)?;
        source_map::annotate(&document.source, &mut errors);
        Ok(errors)
    }

    /// See [`merge::expand`].
    #[must_use]
    pub fn expand(&self, config: &ComponentConfig) -> ComponentConfig {
        merge::expand(config)
    }

    /// See [`merge::merge`].
    #[must_use]
    pub fn merge(&self, base: &ComponentConfig, overlay: &ComponentConfig) -> ComponentConfig {
        merge::merge(base, overlay)
    }
}

fn annotated(err: DeckhandError, source: &str) -> DeckhandError {
    match err {
        DeckhandError::Validation(mut errors) => {
            source_map::annotate(source, &mut errors);
            DeckhandError::Validation(errors)
        }
        other => other,
    }
}
