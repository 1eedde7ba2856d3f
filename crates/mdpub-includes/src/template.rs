//! Template loading and rendering.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use minijinja::Environment;
use minijinja::syntax::SyntaxConfig;
use serde::Serialize;

use crate::error::IncludeError;
use crate::stdlib;

/// Delimiter mode for a single `Include` directive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Delims {
    /// Standard `{{ }}` variables.
    #[default]
    Standard,
    /// `Delims: none`: template text is copied through without evaluation.
    None,
    /// `Delims: "L","R"`: custom variable delimiters.
    Custom(String, String),
}

/// Registry of template sources, keyed by the name used in directives.
///
/// Starts out with the built-in templates. Files are loaded on first use,
/// searched in the document directory and then in each include directory,
/// and cached for the rest of the run.
#[derive(Debug)]
pub struct TemplateStore {
    search_path: Vec<PathBuf>,
    cache: HashMap<String, String>,
}

impl TemplateStore {
    /// Create a store resolving relative names against `base_dir` first.
    pub fn new(base_dir: impl Into<PathBuf>, include_dirs: &[PathBuf]) -> Self {
        let mut search_path = vec![base_dir.into()];
        search_path.extend(include_dirs.iter().cloned());

        let cache = stdlib::TEMPLATES
            .iter()
            .map(|(name, source)| ((*name).to_owned(), (*source).to_owned()))
            .collect();

        Self { search_path, cache }
    }

    /// Number of templates currently known (built-ins included).
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Return the source of the named template, loading it if needed.
    pub fn load(&mut self, name: &str) -> Result<&str, IncludeError> {
        if !self.cache.contains_key(name) {
            let source = self.read(name)?;
            self.cache.insert(name.to_owned(), source);
        }
        Ok(self.cache.get(name).map_or("", String::as_str))
    }

    fn read(&self, name: &str) -> Result<String, IncludeError> {
        let relative = Path::new(name);
        let candidates: Vec<PathBuf> = if relative.is_absolute() {
            vec![relative.to_path_buf()]
        } else {
            self.search_path.iter().map(|dir| dir.join(relative)).collect()
        };

        for path in &candidates {
            if path.is_file() {
                tracing::debug!(template = name, path = %path.display(), "Loading template");
                return std::fs::read_to_string(path).map_err(|source| IncludeError::Io {
                    path: path.clone(),
                    source,
                });
            }
        }

        Err(IncludeError::NotFound {
            name: name.to_owned(),
            searched: candidates,
        })
    }

    /// Load and execute the named template with `context`.
    pub fn render<S: Serialize>(
        &mut self,
        name: &str,
        delims: &Delims,
        context: S,
    ) -> Result<String, IncludeError> {
        let source = self.load(name)?;
        if *delims == Delims::None {
            return Ok(source.to_owned());
        }
        render_source(name, source, delims, context)
    }
}

/// Render one of the built-in templates.
pub fn render_builtin<S: Serialize>(name: &str, context: S) -> Result<String, IncludeError> {
    let source = stdlib::get(name).ok_or_else(|| IncludeError::NotFound {
        name: name.to_owned(),
        searched: Vec::new(),
    })?;
    render_source(name, source, &Delims::Standard, context)
}

fn render_source<S: Serialize>(
    name: &str,
    source: &str,
    delims: &Delims,
    context: S,
) -> Result<String, IncludeError> {
    let render_error = |source| IncludeError::Render {
        name: name.to_owned(),
        source,
    };

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    if let Delims::Custom(left, right) = delims {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters(left.clone(), right.clone())
            .build()
            .map_err(render_error)?;
        env.set_syntax(syntax);
    }

    env.render_str(source, context).map_err(render_error)
}

/// Lowercase top-level mapping keys and replace `-` with `_`, so that
/// `Title:` and `title:` address the same template variable.
pub(crate) fn normalize_context(value: serde_yaml::Value) -> serde_yaml::Value {
    match value {
        serde_yaml::Value::Mapping(mapping) => serde_yaml::Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| match key {
                    serde_yaml::Value::String(key) => (
                        serde_yaml::Value::String(key.to_lowercase().replace('-', "_")),
                        value,
                    ),
                    other => (other, value),
                })
                .collect(),
        ),
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    }
}

/// Parse directive YAML into a template context.
pub(crate) fn parse_context(name: &str, yaml: &str) -> Result<serde_yaml::Value, IncludeError> {
    if yaml.trim().is_empty() {
        return Ok(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    }
    let value = serde_yaml::from_str(yaml).map_err(|source| IncludeError::Yaml {
        name: name.to_owned(),
        source,
    })?;
    Ok(normalize_context(value))
}
