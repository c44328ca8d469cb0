//! DNS-safe runtime names derived from slugs.
//!
//! A safe ref is a readable prefix built from the slug's parts, followed by
//! a short digest when the slug is versioned. The result is deterministic,
//! lower-case alphanumeric plus hyphens, and never longer than the
//! requested maximum.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use deckhand_common::constants::{GATEWAY_SLUG, REF_DELIMITER, REF_HASH_LENGTH};
use deckhand_common::error::{DeckhandError, Result};
use md5::{Digest, Md5};

use crate::slugs::{self, ParsedSlug, SlugKind};

/// Characters of digest appended to a versioned ref.
///
/// One more than [`REF_HASH_LENGTH`]; existing deployments depend on it.
const HASH_SUFFIX_LENGTH: usize = REF_HASH_LENGTH + 1;

/// Derives the safe ref of a textual slug of any kind.
///
/// # Errors
///
/// Returns an error if `slug` matches no slug grammar or `max_length`
/// cannot hold a ref.
pub fn safe_ref(slug: &str, max_length: usize) -> Result<String> {
    safe_ref_with_name(None, slug, max_length)
}

/// Like [`safe_ref`], but `friendly_name` replaces the readable prefix.
///
/// # Errors
///
/// Returns an error if `slug` matches no slug grammar or `max_length`
/// cannot hold a ref.
pub fn safe_ref_with_name(
    friendly_name: Option<&str>,
    slug: &str,
    max_length: usize,
) -> Result<String> {
    if slug == GATEWAY_SLUG {
        return Ok(slug.to_owned());
    }
    let parsed = slugs::parse_unknown_slug(slug)?;
    derive(&parsed, friendly_name, None, max_length)
}

/// Derives the ref of one instance of a slug.
///
/// The instance qualifier only changes the digest, so every instance
/// shares the readable prefix and carries a hash suffix.
///
/// # Errors
///
/// Returns an error if `slug` matches no slug grammar or `max_length`
/// cannot hold a ref.
pub fn safe_ref_with_instance(slug: &str, instance_id: &str, max_length: usize) -> Result<String> {
    if slug == GATEWAY_SLUG {
        return Ok(slug.to_owned());
    }
    let parsed = slugs::parse_unknown_slug(slug)?;
    let instance = (!instance_id.is_empty()).then_some(instance_id);
    derive(&parsed, None, instance, max_length)
}

/// Derives the safe ref of an already-parsed slug.
///
/// # Errors
///
/// Returns an error if `max_length` cannot hold a ref.
pub fn safe_ref_for(
    parsed: &ParsedSlug,
    friendly_name: Option<&str>,
    max_length: usize,
) -> Result<String> {
    derive(parsed, friendly_name, None, max_length)
}

fn derive(
    parsed: &ParsedSlug,
    friendly_name: Option<&str>,
    instance: Option<&str>,
    max_length: usize,
) -> Result<String> {
    if parsed.kind == SlugKind::Gateway {
        return Ok(GATEWAY_SLUG.to_owned());
    }

    let hashed = parsed.tag.is_some() || instance.is_some();
    let reserved = if hashed {
        REF_DELIMITER.len() + HASH_SUFFIX_LENGTH
    } else {
        0
    };
    if max_length <= reserved {
        return Err(DeckhandError::Config {
            message: format!("max ref length {max_length} cannot hold a {reserved}-character hash"),
        });
    }

    let prefix = friendly_name.map_or_else(|| readable_prefix(parsed), sanitize);
    let prefix = truncate(&prefix, max_length - reserved);

    let reference = if hashed {
        let mut uri = format!("{}://{}", parsed.kind, slugs::build_slug(parsed));
        if let Some(instance) = instance {
            uri.push('#');
            uri.push_str(instance);
        }
        let digest = to_digest(&uri);
        let suffix: String = digest.chars().take(HASH_SUFFIX_LENGTH).collect();
        if prefix.is_empty() {
            suffix
        } else {
            format!("{prefix}{REF_DELIMITER}{suffix}")
        }
    } else {
        prefix
    };

    tracing::debug!(%reference, kind = %parsed.kind, "derived safe ref");
    Ok(reference)
}

fn readable_prefix(parsed: &ParsedSlug) -> String {
    [
        &parsed.environment_account_name,
        &parsed.environment_name,
        &parsed.component_account_name,
        &parsed.component_name,
        &parsed.service_name,
    ]
    .into_iter()
    .filter_map(Option::as_deref)
    .collect::<Vec<_>>()
    .join(REF_DELIMITER)
}

fn sanitize(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_owned()
}

/// Cuts `prefix` to at most `budget` characters and drops trailing hyphens.
fn truncate(prefix: &str, budget: usize) -> String {
    // Prefixes are ASCII after parsing or sanitizing.
    let cut = prefix.get(..budget.min(prefix.len())).unwrap_or(prefix);
    cut.trim_end_matches('-').to_owned()
}

/// Lower-cased base64 MD5 with URL-hostile punctuation removed.
///
/// Only used to add entropy to a safe ref.
fn to_digest(uri: &str) -> String {
    let hash = Md5::digest(uri.as_bytes());
    STANDARD
        .encode(hash)
        .to_lowercase()
        .replace(['/', '+', '='], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_slug_has_no_hash() {
        let reference = safe_ref("acct/comp", 63).expect("should derive");
        assert_eq!(reference, "acct--comp");
    }

    #[test]
    fn tagged_slug_appends_seven_digest_characters() {
        let reference = safe_ref("acct/comp/api:latest", 63).expect("should derive");
        let (prefix, hash) = reference.rsplit_once("--").expect("should have delimiter");
        assert_eq!(prefix, "acct--comp--api");
        assert_eq!(hash.len(), 7);
        assert!(
            hash.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            "got: {hash}"
        );
    }

    #[test]
    fn service_instance_prefix_leads_with_environment() {
        let reference = safe_ref("acct/comp/api:v1@ops/prod", 63).expect("should derive");
        assert!(reference.starts_with("ops--prod--acct--comp--api--"), "got: {reference}");
    }

    #[test]
    fn refs_are_deterministic() {
        let first = safe_ref("acct/comp/api:v2", 63).expect("should derive");
        let second = safe_ref("acct/comp/api:v2", 63).expect("should derive");
        assert_eq!(first, second);
    }

    #[test]
    fn different_tags_produce_different_hashes() {
        let v1 = safe_ref("acct/comp/api:v1", 63).expect("should derive");
        let v2 = safe_ref("acct/comp/api:v2", 63).expect("should derive");
        assert_ne!(v1, v2);
    }

    #[test]
    fn long_names_respect_max_length() {
        let long = "a".repeat(32);
        let slug = format!("{long}/{long}/{long}:latest");
        for max in [10, 20, 40, 63] {
            let reference = safe_ref(&slug, max).expect("should derive");
            assert!(reference.len() <= max, "{reference} exceeds {max}");
            assert!(!reference.starts_with('-'));
            assert!(!reference.contains("---"), "got: {reference}");
        }
    }

    #[test]
    fn truncation_strips_trailing_delimiters() {
        // Budget lands right after "acct--", whose hyphens must go.
        let reference = safe_ref("acct/comp/api:v1", 6 + 2 + 7).expect("should derive");
        assert!(reference.starts_with("acct--"), "got: {reference}");
        assert_eq!(reference.len(), 4 + 2 + 7);
    }

    #[test]
    fn gateway_is_returned_unchanged() {
        assert_eq!(safe_ref("gateway", 63).expect("should derive"), "gateway");
        assert_eq!(
            safe_ref_with_instance("gateway", "x", 3).expect("should derive"),
            "gateway"
        );
    }

    #[test]
    fn friendly_name_replaces_prefix() {
        let reference =
            safe_ref_with_name(Some("My API_Server"), "acct/comp/api:v1", 63).expect("should derive");
        assert!(reference.starts_with("my-api-server--"), "got: {reference}");
        let plain = safe_ref("acct/comp/api:v1", 63).expect("should derive");
        let (_, friendly_hash) = reference.rsplit_once("--").expect("should have hash");
        let (_, plain_hash) = plain.rsplit_once("--").expect("should have hash");
        assert_eq!(friendly_hash, plain_hash);
    }

    #[test]
    fn instance_changes_digest_only() {
        let a = safe_ref_with_instance("acct/comp/api", "blue", 63).expect("should derive");
        let b = safe_ref_with_instance("acct/comp/api", "green", 63).expect("should derive");
        assert_ne!(a, b);
        assert!(a.starts_with("acct--comp--api--"));
        assert!(b.starts_with("acct--comp--api--"));
    }

    #[test]
    fn too_small_max_length_is_rejected() {
        let err = safe_ref("acct/comp:v1", 9).expect_err("should fail");
        assert!(matches!(err, DeckhandError::Config { .. }));
    }

    #[test]
    fn invalid_slug_is_rejected() {
        let err = safe_ref("Not/Valid", 63).expect_err("should fail");
        assert!(matches!(err, DeckhandError::InvalidSlug { .. }));
    }

    #[test]
    fn digest_strips_url_hostile_characters() {
        for uri in ["a", "b", "service_version://x/y/z:1", "kind://acct/comp"] {
            let digest = to_digest(uri);
            assert!(!digest.contains(['/', '+', '=']), "got: {digest}");
            assert_eq!(digest, digest.to_lowercase());
        }
    }
}
