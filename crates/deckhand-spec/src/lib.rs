//! # deckhand-spec
//!
//! The component configuration compiler.
//!
//! A component document flows through the pipeline
//! `loader → schema → transform → interpolation → merge`:
//!
//! - [`loader`] reads YAML or JSON and substitutes `file:` references.
//! - [`schema`] checks structure and applies context-gated field rules.
//! - [`transform`] produces a canonical [`config::ComponentConfig`].
//! - [`interpolation`] resolves `${{ ... }}` expressions against a context tree.
//! - [`merge`] expands and layers canonical configs.
//!
//! [`slugs`] and [`refs`] provide the identifier grammar and the DNS-safe
//! runtime names. [`compiler::Compiler`] ties the stages together.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod compiler;
pub mod config;
pub mod graph;
pub mod interpolation;
pub mod loader;
pub mod merge;
pub mod refs;
pub mod schema;
pub mod slugs;
pub mod transform;

pub use compiler::Compiler;
pub use config::ComponentConfig;
pub use schema::spec::ComponentSpec;
