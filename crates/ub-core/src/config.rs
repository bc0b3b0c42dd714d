//! Configuration types and loading
//!
//! Path roots replace framework-wide path aliases: every behavior receives
//! them explicitly instead of looking them up globally.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Environment prefix for layered configuration (`UPLOAD__ROOTS__WEB_ROOT`)
pub const ENV_PREFIX: &str = "UPLOAD";

/// Application path roots backing the `@app`, `@webroot` and `@web` aliases
/// and the `[[app_root]]`, `[[web_root]]` and `[[base_url]]` placeholders.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathRoots {
    /// Application root directory
    pub app_root: String,
    /// Publicly served directory
    pub web_root: String,
    /// Base URL the web root is served under
    pub base_url: String,
    /// Additional aliases, keyed without the leading `@`
    pub aliases: HashMap<String, String>,
}

impl Default for PathRoots {
    fn default() -> Self {
        Self {
            app_root: ".".to_string(),
            web_root: "./web".to_string(),
            base_url: String::new(),
            aliases: HashMap::new(),
        }
    }
}

impl PathRoots {
    pub fn new(
        app_root: impl Into<String>,
        web_root: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            app_root: app_root.into(),
            web_root: web_root.into(),
            base_url: base_url.into(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.aliases
            .insert(name.trim_start_matches('@').to_string(), value.into());
        self
    }

    /// Value of an alias given with or without its leading `@`
    pub fn alias(&self, name: &str) -> Option<&str> {
        match name.trim_start_matches('@') {
            "app" => Some(&self.app_root),
            "webroot" => Some(&self.web_root),
            "web" => Some(&self.base_url),
            other => self.aliases.get(other).map(String::as_str),
        }
    }

    /// Expand a leading `@alias` in `path`.
    ///
    /// The alias runs up to the first `/`. Unknown aliases and paths without a
    /// leading `@` are returned unchanged.
    pub fn expand<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if !path.starts_with('@') {
            return Cow::Borrowed(path);
        }

        let (name, rest) = match path.find('/') {
            Some(pos) => path.split_at(pos),
            None => (path, ""),
        };

        match self.alias(name) {
            Some(root) => Cow::Owned(format!("{}{}", root.trim_end_matches('/'), rest)),
            None => Cow::Borrowed(path),
        }
    }

    /// Load roots from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut roots = Self::default();
        if let Ok(root) = std::env::var("UPLOAD_APP_ROOT") {
            roots.app_root = root;
        }
        if let Ok(root) = std::env::var("UPLOAD_WEB_ROOT") {
            roots.web_root = root;
        }
        if let Ok(url) = std::env::var("UPLOAD_BASE_URL") {
            roots.base_url = url;
        }
        roots
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    MissingFile(String),
    #[error("Config file error: {0}")]
    FileError(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::FileError(err.to_string())
    }
}

/// Load a configuration document from an optional file, overlaid with
/// `UPLOAD__*` environment variables (`__` separates nested keys).
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__"),
    );

    let settings = builder.build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> PathRoots {
        PathRoots::new("/srv/app", "/srv/app/web/", "https://cdn.example.com")
    }

    #[test]
    fn test_expand_builtin_aliases() {
        let roots = roots();
        assert_eq!(roots.expand("@app/runtime"), "/srv/app/runtime");
        assert_eq!(roots.expand("@webroot/uploads/a.png"), "/srv/app/web/uploads/a.png");
        assert_eq!(roots.expand("@web/uploads"), "https://cdn.example.com/uploads");
        assert_eq!(roots.expand("@webroot"), "/srv/app/web");
    }

    #[test]
    fn test_expand_leaves_plain_and_unknown() {
        let roots = roots();
        assert_eq!(roots.expand("/uploads/[[pk]].png"), "/uploads/[[pk]].png");
        assert_eq!(roots.expand("@storage/a.png"), "@storage/a.png");
        assert!(matches!(roots.expand("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_custom_alias() {
        let roots = roots().with_alias("@storage", "/mnt/storage");
        assert_eq!(roots.expand("@storage/a.png"), "/mnt/storage/a.png");
        assert_eq!(roots.alias("storage"), Some("/mnt/storage"));
    }

    #[test]
    fn test_load_layered_from_file() {
        #[derive(Deserialize)]
        struct Doc {
            roots: PathRoots,
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.yaml");
        std::fs::write(
            &path,
            "roots:\n  web_root: /var/www\n  base_url: /static\n",
        )
        .unwrap();

        let doc: Doc = load_layered(Some(&path)).unwrap();
        assert_eq!(doc.roots.web_root, "/var/www");
        assert_eq!(doc.roots.base_url, "/static");
        assert_eq!(doc.roots.app_root, ".");
    }

    #[test]
    fn test_load_layered_missing_file() {
        let result: Result<PathRoots, _> = load_layered(Some(Path::new("/nonexistent/upload.yaml")));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_load_layered_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.yaml");
        std::fs::write(&path, "roots: [unterminated\n").unwrap();

        let result: Result<PathRoots, _> = load_layered(Some(&path));
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }
}
