//! Grammar limits, delimiters, and default values.

/// Tag applied when a component or service omits one.
pub const DEFAULT_TAG: &str = "latest";

/// Separates account, component, and service segments in a slug.
pub const NAMESPACE_DELIMITER: char = '/';
/// Separates a slug from its tag.
pub const TAG_DELIMITER: char = ':';
/// Separates a service version from an environment in an instance slug.
pub const ENV_DELIMITER: char = '@';

/// Maximum length of a single slug segment.
pub const SLUG_CHAR_LIMIT: usize = 32;
/// Maximum length of a tag.
pub const TAG_CHAR_LIMIT: usize = 128;

/// Suffix appended to a component version to form an interfaces slug.
pub const INTERFACES_SLUG_SUFFIX: &str = "-interfaces";
/// The literal gateway slug.
pub const GATEWAY_SLUG: &str = "gateway";

/// Joins the human-readable parts of a safe ref.
pub const REF_DELIMITER: &str = "--";
/// Nominal digest length of a safe ref suffix.
///
/// The suffix actually carries `REF_HASH_LENGTH + 1` characters.
pub const REF_HASH_LENGTH: usize = 6;
/// DNS label limit, the default bound for safe refs.
pub const DEFAULT_MAX_REF_LENGTH: usize = 63;

/// Default opening interpolation delimiter.
pub const DEFAULT_INTERPOLATION_OPEN: &str = "${{";
/// Default closing interpolation delimiter.
pub const DEFAULT_INTERPOLATION_CLOSE: &str = "}}";

/// Value substituted for null parameters during validation passes.
pub const NULL_SENTINEL: &str = "__deckhand_null__";

/// Prefix marking a string value as a reference to a local file.
pub const FILE_REF_PREFIX: &str = "file:";

/// File names searched, in order, when a directory is given as a source.
pub const CONFIG_FILENAMES: [&str; 3] = ["component.yml", "component.yaml", "component.json"];

/// Probe defaults backfilled when any liveness field is present.
pub mod liveness {
    /// Consecutive successes required.
    pub const SUCCESS_THRESHOLD: &str = "1";
    /// Consecutive failures tolerated.
    pub const FAILURE_THRESHOLD: &str = "3";
    /// Per-probe timeout.
    pub const TIMEOUT: &str = "5s";
    /// Time between probes.
    pub const INTERVAL: &str = "30s";
    /// Delay before the first probe.
    pub const INITIAL_DELAY: &str = "0s";
}

/// Environment variable holding the compiler config path for the CLI.
pub const CONFIG_ENV_VAR: &str = "DECKHAND_CONFIG";
