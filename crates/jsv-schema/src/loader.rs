//! # Document Loaders
//!
//! The resolver never performs I/O itself. When a `$ref` names a document
//! that is not registered yet, it asks a [`DocumentLoader`] for the decoded
//! value tree. Three loaders are provided:
//!
//! - [`MapLoader`]: documents held in memory, keyed by URL.
//! - [`FileLoader`]: `file://` URLs; `.yaml`/`.yml` files are parsed as
//!   YAML and converted to JSON values, everything else as JSON.
//! - [`SchemeLoader`]: dispatches to other loaders by URL scheme. The
//!   compiler's default is a `SchemeLoader` with only `file` registered, so
//!   no network request can ever be made unless a caller adds one.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use url::Url;

use crate::error::LoadError;

/// Produces the decoded document for a URL (fragment already removed).
pub trait DocumentLoader: Send + Sync {
    /// Load the document at `url`.
    fn load(&self, url: &Url) -> Result<Value, LoadError>;
}

/// Loader backed by an in-memory URL → document map.
#[derive(Debug, Default, Clone)]
pub struct MapLoader {
    documents: HashMap<String, Value>,
}

impl MapLoader {
    /// An empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `url`, replacing any previous document.
    pub fn insert(&mut self, url: impl Into<String>, document: Value) -> &mut Self {
        self.documents.insert(url.into(), document);
        self
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentLoader for MapLoader {
    fn load(&self, url: &Url) -> Result<Value, LoadError> {
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| LoadError::NotFound(url.to_string()))
    }
}

/// Loader for `file://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn load(&self, url: &Url) -> Result<Value, LoadError> {
        if url.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| LoadError::NotFound(url.to_string()))?;
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(url.to_string()),
            _ => LoadError::Io(e),
        })?;
        parse_document(url, &path, &content)
    }
}

fn parse_document(url: &Url, path: &Path, content: &str) -> Result<Value, LoadError> {
    let parse_error = |reason: String| LoadError::Parse {
        url: url.to_string(),
        reason,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(content)
                .map_err(|e| parse_error(format!("invalid YAML: {e}")))?;
            yaml_to_json(yaml)
                .map_err(|e| parse_error(format!("YAML-to-JSON conversion failed: {e}")))
        }
        _ => serde_json::from_str(content).map_err(|e| parse_error(format!("invalid JSON: {e}"))),
    }
}

/// Loader that dispatches on the URL scheme.
#[derive(Default)]
pub struct SchemeLoader {
    loaders: HashMap<String, Box<dyn DocumentLoader>>,
}

impl SchemeLoader {
    /// A loader with no schemes registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader with `file` registered.
    pub fn with_file() -> Self {
        let mut loader = Self::new();
        loader.register("file", FileLoader);
        loader
    }

    /// Route URLs with `scheme` to `loader`, replacing any previous one.
    pub fn register(&mut self, scheme: impl Into<String>, loader: impl DocumentLoader + 'static) {
        self.loaders.insert(scheme.into(), Box::new(loader));
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl DocumentLoader for SchemeLoader {
    fn load(&self, url: &Url) -> Result<Value, LoadError> {
        match self.loaders.get(url.scheme()) {
            Some(loader) => loader.load(url),
            None => Err(LoadError::UnsupportedScheme(url.scheme().to_string())),
        }
    }
}

impl std::fmt::Debug for SchemeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeLoader")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// Convert a decoded YAML document to a JSON value tree.
///
/// Schemas written in YAML use only the JSON-compatible subset: tags are
/// dropped, scalar keys are stringified, and anything else is an error.
pub fn yaml_to_json(yaml: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => Value::Number(yaml_number(&n)?),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<serde_json::Number, String> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| format!("number {n} has no JSON representation"))
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("mapping key {other:?} is not a scalar")),
    }
}
