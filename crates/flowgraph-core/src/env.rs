//! `.env` file parsing and layering.
//!
//! Environment-definition files are plain `KEY=VALUE` lines. Blank lines and
//! lines starting with `#` are skipped, the first `=` splits key from value,
//! and lines without `=` are ignored. When several files declare the same
//! key, the file applied last wins.

use indexmap::IndexMap;

/// Suffix that marks an uploaded file as an environment definition.
pub const ENV_FILE_SUFFIX: &str = ".env";

/// Ordered environment variables (first-declaration order, last value).
pub type EnvVars = IndexMap<String, String>;

/// Returns `true` if `filename` is an environment-definition file.
pub fn is_env_file(filename: &str) -> bool {
    filename.ends_with(ENV_FILE_SUFFIX)
}

/// Parses the contents of a single `.env` file.
pub fn parse_env_file(content: &str) -> EnvVars {
    let mut vars = EnvVars::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

/// Layers `overlay` on top of `base`; keys in `overlay` overwrite.
pub fn merge_env(base: &mut EnvVars, overlay: EnvVars) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}
