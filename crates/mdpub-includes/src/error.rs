//! Error types for directive expansion.

use std::path::PathBuf;

/// Error while expanding a single directive or the whole document.
///
/// Everything except [`IncludeError::NoFixedPoint`] is recovered from by
/// leaving the directive text in place and recording a warning.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    /// Template name not found in the standard library or on disk.
    #[error("template \"{name}\" not found (searched {})", display_paths(searched))]
    NotFound { name: String, searched: Vec<PathBuf> },

    /// Template file exists but could not be read.
    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directive YAML configuration is malformed.
    #[error("invalid YAML configuration for \"{name}\": {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Template failed to compile or execute.
    #[error("failed to render template \"{name}\": {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// Macro match expression is not a valid regex.
    #[error("invalid macro expression \"{expr}\": {source}")]
    Regex {
        expr: String,
        #[source]
        source: regex::Error,
    },

    /// Template includes itself through the chain shown.
    #[error("include cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// Include nesting went deeper than the configured maximum.
    #[error("maximum include depth ({max}) exceeded at \"{name}\"")]
    DepthExceeded { name: String, max: usize },

    /// Expansion kept producing new directives.
    #[error("directive expansion did not settle after {passes} passes")]
    NoFixedPoint { passes: usize },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "standard library".to_owned();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
