//! Structured identifiers ("slugs").
//!
//! Every slug kind is a fixed arrangement of lower-case segments joined by
//! `/`, optionally followed by `:tag` and `@environment`. Parsing checks
//! the grammar of each segment; building is the exact inverse.

use std::fmt;

use deckhand_common::constants::{
    DEFAULT_TAG, ENV_DELIMITER, GATEWAY_SLUG, INTERFACES_SLUG_SUFFIX, NAMESPACE_DELIMITER,
    SLUG_CHAR_LIMIT, TAG_CHAR_LIMIT, TAG_DELIMITER,
};
use deckhand_common::error::{DeckhandError, Result};
use nom::{
    IResult, Parser,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, satisfy},
    combinator::{all_consuming, map_opt, opt, recognize, verify},
    multi::separated_list1,
    sequence::{pair, preceded, separated_pair},
};
use serde::{Deserialize, Serialize};

/// The family of slug grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlugKind {
    /// `account/component`
    Component,
    /// `account/component:tag`
    ComponentVersion,
    /// `account/component/service`
    Service,
    /// `account/component/service:tag`
    ServiceVersion,
    /// `account/environment`
    Environment,
    /// `account/component/service:tag@account/environment`
    ServiceInstance,
    /// `account/component:tag-interfaces`
    Interfaces,
    /// The literal `gateway`.
    Gateway,
}

impl SlugKind {
    /// Order used by [`parse_unknown_slug`]. Untagged kinds come before
    /// their tagged counterparts so that a bare `a/b` stays a component.
    /// Environment slugs share the component grammar and are never detected.
    pub const DETECTION_ORDER: [Self; 7] = [
        Self::Gateway,
        Self::Interfaces,
        Self::ServiceInstance,
        Self::Service,
        Self::ServiceVersion,
        Self::Component,
        Self::ComponentVersion,
    ];

    /// Description of the grammar, used in error messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Component => "must be of the form <account-name>/<component-name>",
            Self::ComponentVersion => {
                "must be of the form <account-name>/<component-name>:<tag>"
            }
            Self::Service => {
                "must be of the form <account-name>/<component-name>/<service-name>"
            }
            Self::ServiceVersion => {
                "must be of the form <account-name>/<component-name>/<service-name>:<tag>"
            }
            Self::Environment => "must be of the form <account-name>/<environment-name>",
            Self::ServiceInstance => {
                "must be of the form <account-name>/<component-name>/<service-name>:<tag>@<account-name>/<environment-name>"
            }
            Self::Interfaces => {
                "must be of the form <account-name>/<component-name>:<tag>-interfaces"
            }
            Self::Gateway => "must be the literal gateway",
        }
    }

    /// The snake-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::ComponentVersion => "component_version",
            Self::Service => "service",
            Self::ServiceVersion => "service_version",
            Self::Environment => "environment",
            Self::ServiceInstance => "service_instance",
            Self::Interfaces => "interfaces",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for SlugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a parsed slug. Fields not used by `kind` are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedSlug {
    /// Grammar this slug was parsed with.
    pub kind: SlugKind,
    /// Account owning the component.
    pub component_account_name: Option<String>,
    /// Component name.
    pub component_name: Option<String>,
    /// Service name.
    pub service_name: Option<String>,
    /// Version tag.
    pub tag: Option<String>,
    /// Account owning the environment.
    pub environment_account_name: Option<String>,
    /// Environment name.
    pub environment_name: Option<String>,
}

impl ParsedSlug {
    const fn empty(kind: SlugKind) -> Self {
        Self {
            kind,
            component_account_name: None,
            component_name: None,
            service_name: None,
            tag: None,
            environment_account_name: None,
            environment_name: None,
        }
    }

    /// An `account/component` slug.
    pub fn component(account: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            component_account_name: Some(account.into()),
            component_name: Some(component.into()),
            ..Self::empty(SlugKind::Component)
        }
    }

    /// An `account/component:tag` slug.
    pub fn component_version(
        account: impl Into<String>,
        component: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: SlugKind::ComponentVersion,
            tag: Some(tag.into()),
            ..Self::component(account, component)
        }
    }

    /// An `account/component/service` slug.
    pub fn service(
        account: impl Into<String>,
        component: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            kind: SlugKind::Service,
            service_name: Some(service.into()),
            ..Self::component(account, component)
        }
    }

    /// An `account/component/service:tag` slug.
    pub fn service_version(
        account: impl Into<String>,
        component: impl Into<String>,
        service: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: SlugKind::ServiceVersion,
            tag: Some(tag.into()),
            ..Self::service(account, component, service)
        }
    }

    /// An `account/environment` slug.
    pub fn environment(account: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            environment_account_name: Some(account.into()),
            environment_name: Some(environment.into()),
            ..Self::empty(SlugKind::Environment)
        }
    }

    /// A service version deployed into an environment.
    pub fn service_instance(service_version: Self, environment: Self) -> Self {
        Self {
            kind: SlugKind::ServiceInstance,
            environment_account_name: environment.environment_account_name,
            environment_name: environment.environment_name,
            ..service_version
        }
    }

    /// The interfaces slug of a component version.
    pub fn interfaces(
        account: impl Into<String>,
        component: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: SlugKind::Interfaces,
            ..Self::component_version(account, component, tag)
        }
    }

    /// The gateway slug.
    #[must_use]
    pub const fn gateway() -> Self {
        Self::empty(SlugKind::Gateway)
    }

    /// Re-expresses this slug as another kind, keeping the shared parts.
    ///
    /// # Errors
    ///
    /// Returns [`DeckhandError::InvalidSlug`] if this slug lacks a part the
    /// target kind requires.
    pub fn to_kind(&self, kind: SlugKind) -> Result<Self> {
        let fail = || DeckhandError::InvalidSlug {
            slug: self.to_string(),
            description: format!("cannot be converted to a {kind} slug"),
        };
        let component = || {
            Some((
                self.component_account_name.clone()?,
                self.component_name.clone()?,
            ))
        };
        let converted = match kind {
            SlugKind::Gateway => Self::gateway(),
            SlugKind::Component => {
                let (account, name) = component().ok_or_else(fail)?;
                Self::component(account, name)
            }
            SlugKind::ComponentVersion | SlugKind::Interfaces => {
                let (account, name) = component().ok_or_else(fail)?;
                let tag = self.tag.clone().unwrap_or_else(|| DEFAULT_TAG.into());
                Self {
                    kind,
                    ..Self::component_version(account, name, tag)
                }
            }
            SlugKind::Service | SlugKind::ServiceVersion => {
                let (account, name) = component().ok_or_else(fail)?;
                let service = self.service_name.clone().ok_or_else(fail)?;
                let mut slug = Self::service(account, name, service);
                if kind == SlugKind::ServiceVersion {
                    slug.kind = kind;
                    slug.tag = Some(self.tag.clone().unwrap_or_else(|| DEFAULT_TAG.into()));
                }
                slug
            }
            SlugKind::Environment => Self::environment(
                self.environment_account_name.clone().ok_or_else(fail)?,
                self.environment_name.clone().ok_or_else(fail)?,
            ),
            SlugKind::ServiceInstance => {
                if self.environment_name.is_none() {
                    return Err(fail());
                }
                let version = self.to_kind(SlugKind::ServiceVersion)?;
                let environment = self.to_kind(SlugKind::Environment)?;
                Self::service_instance(version, environment)
            }
        };
        Ok(converted)
    }
}

impl fmt::Display for ParsedSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_slug(self))
    }
}

fn lower_alphanumeric(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()).parse(input)
}

/// `word(-word)*`, bounded by [`SLUG_CHAR_LIMIT`].
fn segment(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(separated_list1(char('-'), lower_alphanumeric)),
        |s: &str| s.len() <= SLUG_CHAR_LIMIT,
    )
    .parse(input)
}

/// Exactly `N` segments joined by `/`.
fn segments<const N: usize>(input: &str) -> IResult<&str, [&str; N]> {
    map_opt(separated_list1(char(NAMESPACE_DELIMITER), segment), exactly::<N>).parse(input)
}

fn exactly<const N: usize>(parts: Vec<&str>) -> Option<[&str; N]> {
    parts.try_into().ok()
}

const fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tag_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(is_word),
        take_while(|c: char| is_word(c) || c == '.' || c == '-'),
    ))
    .parse(input)
}

fn tag(input: &str) -> IResult<&str, &str> {
    verify(tag_text, |t: &str| t.len() <= TAG_CHAR_LIMIT).parse(input)
}

/// An optional `:tag` suffix.
fn tag_suffix(input: &str) -> IResult<&str, Option<&str>> {
    opt(preceded(char(TAG_DELIMITER), tag)).parse(input)
}

/// Runs `parser` over the whole of `text`.
fn complete<'a, O, P>(parser: P, text: &'a str) -> Option<O>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    all_consuming(parser).parse(text).ok().map(|(_, out)| out)
}

/// Returns `true` if `text` is lower-case alphanumeric with single
/// interior hyphens, at most [`SLUG_CHAR_LIMIT`] characters.
#[must_use]
pub fn is_valid_segment(text: &str) -> bool {
    complete(segment, text).is_some()
}

/// Returns `true` if `text` starts with a word character and continues with
/// word characters, periods, or hyphens, at most [`TAG_CHAR_LIMIT`] long.
#[must_use]
pub fn is_valid_tag(text: &str) -> bool {
    complete(tag, text).is_some()
}

fn invalid(kind: SlugKind, text: &str) -> DeckhandError {
    DeckhandError::InvalidSlug {
        slug: text.to_owned(),
        description: kind.description().to_owned(),
    }
}

fn or_default_tag(tag: Option<&str>) -> &str {
    tag.unwrap_or(DEFAULT_TAG)
}

fn parse_component(text: &str) -> Option<ParsedSlug> {
    let [account, name] = complete(segments::<2>, text)?;
    Some(ParsedSlug::component(account, name))
}

fn parse_component_version(text: &str) -> Option<ParsedSlug> {
    let ([account, name], tag) = complete(pair(segments::<2>, tag_suffix), text)?;
    Some(ParsedSlug::component_version(account, name, or_default_tag(tag)))
}

fn parse_service(text: &str) -> Option<ParsedSlug> {
    let [account, component, service] = complete(segments::<3>, text)?;
    Some(ParsedSlug::service(account, component, service))
}

fn parse_service_version(text: &str) -> Option<ParsedSlug> {
    let ([account, component, service], tag) = complete(pair(segments::<3>, tag_suffix), text)?;
    Some(ParsedSlug::service_version(account, component, service, or_default_tag(tag)))
}

fn parse_environment(text: &str) -> Option<ParsedSlug> {
    let [account, name] = complete(segments::<2>, text)?;
    Some(ParsedSlug::environment(account, name))
}

fn parse_service_instance(text: &str) -> Option<ParsedSlug> {
    let (([account, component, service], tag), [env_account, env_name]) = complete(
        separated_pair(pair(segments::<3>, tag_suffix), char(ENV_DELIMITER), segments::<2>),
        text,
    )?;
    Some(ParsedSlug::service_instance(
        ParsedSlug::service_version(account, component, service, or_default_tag(tag)),
        ParsedSlug::environment(env_account, env_name),
    ))
}

/// A tag followed by the interfaces suffix. The suffix is itself valid tag
/// text, so it is split off after the tag is read.
fn interfaces_tag(input: &str) -> IResult<&str, &str> {
    map_opt(tag_text, strip_interfaces_suffix).parse(input)
}

fn strip_interfaces_suffix(text: &str) -> Option<&str> {
    text.strip_suffix(INTERFACES_SLUG_SUFFIX)
        .filter(|tag| is_valid_tag(tag))
}

fn parse_interfaces(text: &str) -> Option<ParsedSlug> {
    let ([account, name], tag) = complete(
        separated_pair(segments::<2>, char(TAG_DELIMITER), interfaces_tag),
        text,
    )?;
    Some(ParsedSlug {
        kind: SlugKind::Interfaces,
        ..ParsedSlug::component_version(account, name, tag)
    })
}

/// Parses `text` with the grammar of `kind`.
///
/// Version kinds accept a missing tag and default it to `latest`.
///
/// # Errors
///
/// Returns [`DeckhandError::InvalidSlug`] naming the expected grammar.
pub fn parse_slug(kind: SlugKind, text: &str) -> Result<ParsedSlug> {
    let parsed = match kind {
        SlugKind::Component => parse_component(text),
        SlugKind::ComponentVersion => parse_component_version(text),
        SlugKind::Service => parse_service(text),
        SlugKind::ServiceVersion => parse_service_version(text),
        SlugKind::Environment => parse_environment(text),
        SlugKind::ServiceInstance => parse_service_instance(text),
        SlugKind::Interfaces => parse_interfaces(text),
        SlugKind::Gateway => (text == GATEWAY_SLUG).then(ParsedSlug::gateway),
    };
    parsed.ok_or_else(|| invalid(kind, text))
}

/// Parses `text` with the first grammar in [`SlugKind::DETECTION_ORDER`]
/// that accepts it.
///
/// # Errors
///
/// Returns [`DeckhandError::InvalidSlug`] if no grammar matches.
pub fn parse_unknown_slug(text: &str) -> Result<ParsedSlug> {
    SlugKind::DETECTION_ORDER
        .iter()
        .find_map(|&kind| parse_slug(kind, text).ok())
        .ok_or_else(|| DeckhandError::InvalidSlug {
            slug: text.to_owned(),
            description: "does not match any known slug format".into(),
        })
}

/// Builds the textual form of a slug. The inverse of [`parse_slug`].
#[must_use]
pub fn build_slug(slug: &ParsedSlug) -> String {
    let part = |p: &Option<String>| p.clone().unwrap_or_default();
    let component = format!(
        "{}{NAMESPACE_DELIMITER}{}",
        part(&slug.component_account_name),
        part(&slug.component_name)
    );
    let tag = || slug.tag.clone().unwrap_or_else(|| DEFAULT_TAG.into());
    let service = || format!("{component}{NAMESPACE_DELIMITER}{}", part(&slug.service_name));
    let environment = || {
        format!(
            "{}{NAMESPACE_DELIMITER}{}",
            part(&slug.environment_account_name),
            part(&slug.environment_name)
        )
    };
    match slug.kind {
        SlugKind::Component => component,
        SlugKind::ComponentVersion => format!("{component}{TAG_DELIMITER}{}", tag()),
        SlugKind::Service => service(),
        SlugKind::ServiceVersion => format!("{}{TAG_DELIMITER}{}", service(), tag()),
        SlugKind::Environment => environment(),
        SlugKind::ServiceInstance => format!(
            "{}{TAG_DELIMITER}{}{ENV_DELIMITER}{}",
            service(),
            tag(),
            environment()
        ),
        SlugKind::Interfaces => {
            format!("{component}{TAG_DELIMITER}{}{INTERFACES_SLUG_SUFFIX}", tag())
        }
        SlugKind::Gateway => GATEWAY_SLUG.to_owned(),
    }
}

/// Builds `account/component:tag`, the canonical component ref.
#[must_use]
pub fn component_version_slug(account: &str, component: &str, tag: &str) -> String {
    build_slug(&ParsedSlug::component_version(account, component, tag))
}

/// Builds `account/component/service:tag`, the canonical resource ref.
#[must_use]
pub fn service_version_slug(account: &str, component: &str, service: &str, tag: &str) -> String {
    build_slug(&ParsedSlug::service_version(account, component, service, tag))
}

/// Splits a component name into `(account, component)`.
///
/// The account is optional, so both `acct/comp` and `comp` are accepted.
/// Returns `None` if any segment violates the grammar.
#[must_use]
pub fn split_component_name(name: &str) -> Option<(Option<&str>, &str)> {
    if let Some([account, component]) = complete(segments::<2>, name) {
        return Some((Some(account), component));
    }
    complete(segment, name).map(|component| (None, component))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds_sample() -> Vec<ParsedSlug> {
        let version = ParsedSlug::service_version("acct", "comp", "api", "v1.2");
        vec![
            ParsedSlug::component("acct", "comp"),
            ParsedSlug::component_version("acct", "comp", "v1.2.3-rc_1"),
            ParsedSlug::service("acct", "my-comp", "api"),
            version.clone(),
            ParsedSlug::environment("team-1", "staging"),
            ParsedSlug::service_instance(version, ParsedSlug::environment("ops", "prod")),
            ParsedSlug::interfaces("acct", "comp", "latest"),
            ParsedSlug::gateway(),
        ]
    }

    #[test]
    fn parse_build_round_trips_every_kind() {
        for slug in all_kinds_sample() {
            let text = build_slug(&slug);
            let parsed = parse_slug(slug.kind, &text).expect("should parse");
            assert_eq!(parsed, slug, "round trip of {text}");
        }
    }

    #[test]
    fn build_produces_expected_text() {
        let texts: Vec<String> = all_kinds_sample().iter().map(build_slug).collect();
        assert_eq!(
            texts,
            vec![
                "acct/comp",
                "acct/comp:v1.2.3-rc_1",
                "acct/my-comp/api",
                "acct/comp/api:v1.2",
                "team-1/staging",
                "acct/comp/api:v1.2@ops/prod",
                "acct/comp:latest-interfaces",
                "gateway",
            ]
        );
    }

    #[test]
    fn parse_component_version_defaults_tag() {
        let parsed = parse_slug(SlugKind::ComponentVersion, "acct/comp").expect("should parse");
        assert_eq!(parsed.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn parse_component_slug_rejects_uppercase() {
        let err = parse_slug(SlugKind::Component, "Acct/comp").expect_err("should fail");
        let msg = err.to_string();
        assert!(
            msg.contains("must be of the form <account-name>/<component-name>"),
            "got: {msg}"
        );
    }

    #[test]
    fn parse_rejects_double_and_edge_hyphens() {
        for text in ["acct/my--comp", "acct/-comp", "acct/comp-", "acct/", "/comp"] {
            assert!(parse_slug(SlugKind::Component, text).is_err(), "{text}");
        }
    }

    #[test]
    fn parse_rejects_overlong_segment() {
        let long = "a".repeat(33);
        assert!(parse_slug(SlugKind::Component, &format!("acct/{long}")).is_err());
        let max = "a".repeat(32);
        assert!(parse_slug(SlugKind::Component, &format!("acct/{max}")).is_ok());
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        assert!(parse_slug(SlugKind::Service, "acct/comp").is_err());
        assert!(parse_slug(SlugKind::Component, "acct/comp/api").is_err());
    }

    #[test]
    fn tag_grammar_allows_periods_and_underscores() {
        assert!(is_valid_tag("1.0.0"));
        assert!(is_valid_tag("_build-7"));
        assert!(is_valid_tag("V2"));
        assert!(!is_valid_tag(".hidden"));
        assert!(!is_valid_tag("-dash"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag(&"a".repeat(129)));
        assert!(is_valid_tag(&"a".repeat(128)));
    }

    #[test]
    fn interfaces_slug_requires_explicit_tag() {
        assert!(parse_slug(SlugKind::Interfaces, "acct/comp-interfaces").is_err());
        let parsed =
            parse_slug(SlugKind::Interfaces, "acct/comp:v1-interfaces").expect("should parse");
        assert_eq!(parsed.tag.as_deref(), Some("v1"));
    }

    #[test]
    fn interfaces_suffix_is_split_from_hyphenated_tag() {
        let parsed =
            parse_slug(SlugKind::Interfaces, "acct/comp:v1-rc-interfaces").expect("should parse");
        assert_eq!(parsed.tag.as_deref(), Some("v1-rc"));
        assert!(parse_slug(SlugKind::Interfaces, "acct/comp:-interfaces").is_err());
        assert!(parse_slug(SlugKind::ServiceVersion, "acct/comp/api:v1:v2").is_err());
        assert!(parse_slug(SlugKind::ComponentVersion, "acct/comp:").is_err());
    }

    #[test]
    fn gateway_is_literal() {
        assert_eq!(
            parse_slug(SlugKind::Gateway, "gateway").expect("should parse"),
            ParsedSlug::gateway()
        );
        assert!(parse_slug(SlugKind::Gateway, "gateways").is_err());
    }

    #[test]
    fn parse_unknown_prefers_untagged_kinds() {
        assert_eq!(
            parse_unknown_slug("acct/comp").expect("should parse").kind,
            SlugKind::Component
        );
        assert_eq!(
            parse_unknown_slug("acct/comp:v1").expect("should parse").kind,
            SlugKind::ComponentVersion
        );
        assert_eq!(
            parse_unknown_slug("acct/comp/api:v1@ops/prod")
                .expect("should parse")
                .kind,
            SlugKind::ServiceInstance
        );
        assert_eq!(
            parse_unknown_slug("acct/comp:v1-interfaces")
                .expect("should parse")
                .kind,
            SlugKind::Interfaces
        );
        assert!(parse_unknown_slug("NOT A SLUG").is_err());
    }

    #[test]
    fn to_kind_rebuilds_as_component_version() {
        let service = ParsedSlug::service_version("acct", "comp", "api", "v3");
        let component = service
            .to_kind(SlugKind::ComponentVersion)
            .expect("should convert");
        assert_eq!(component.to_string(), "acct/comp:v3");
    }

    #[test]
    fn to_kind_fails_on_missing_parts() {
        let component = ParsedSlug::component("acct", "comp");
        let err = component.to_kind(SlugKind::Service).expect_err("should fail");
        assert!(err.to_string().contains("service"), "got: {err}");
    }

    #[test]
    fn split_component_name_allows_missing_account() {
        assert_eq!(split_component_name("acct/comp"), Some((Some("acct"), "comp")));
        assert_eq!(split_component_name("comp"), Some((None, "comp")));
        assert_eq!(split_component_name("Comp"), None);
    }
}
