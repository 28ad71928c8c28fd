//! # Resource Resolver
//!
//! Registry of loaded documents keyed by URL, populated lazily through the
//! [`DocumentLoader`] the first time a URL is referenced.
//!
//! Every identifier declared inside a document (root `$id` different from
//! the retrieval URL, or an embedded `$id`) is registered as an alias
//! pointing back into the enclosing document. A reference through an alias
//! therefore lands on the same `(document, pointer)` pair as a reference by
//! pointer, which is what keeps compiled locations unique.

use std::collections::HashMap;
use std::sync::Arc;

use jsv_core::uri::{percent_decode, resolve, without_fragment};
use jsv_core::Draft;
use serde_json::Value;
use url::Url;

use crate::error::ResolutionError;
use crate::loader::DocumentLoader;
use crate::resource::Resource;

/// A document plus the pointer of the resource a URL names inside it.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The enclosing document.
    pub resource: Arc<Resource>,
    /// JSON pointer inside `resource`.
    pub pointer: String,
}

/// URL → [`Resource`] registry with lazy loading.
pub struct Resolver {
    loader: Box<dyn DocumentLoader>,
    default_draft: Draft,
    documents: HashMap<String, Arc<Resource>>,
    aliases: HashMap<String, (String, String)>,
}

impl Resolver {
    /// A resolver that loads unknown documents through `loader`.
    pub fn new(loader: Box<dyn DocumentLoader>, default_draft: Draft) -> Self {
        Self {
            loader,
            default_draft,
            documents: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Draft applied to documents without `$schema`.
    pub fn default_draft(&self) -> Draft {
        self.default_draft
    }

    pub(crate) fn set_default_draft(&mut self, draft: Draft) {
        self.default_draft = draft;
    }

    /// Number of registered documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Register `document` under `url` without going through the loader.
    ///
    /// Registering a URL that is already known replaces nothing and returns
    /// the existing resource.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be indexed, declares an identifier
    /// that another registered document already owns or is retrieved from,
    /// or when `url` itself is an identifier declared elsewhere.
    pub fn add(&mut self, url: &Url, document: Value) -> Result<Arc<Resource>, ResolutionError> {
        let key = without_fragment(url);
        if let Some(existing) = self.documents.get(key.as_str()) {
            return Ok(Arc::clone(existing));
        }
        if let Some((doc, at)) = self.aliases.get(key.as_str()) {
            return Err(ResolutionError::DuplicateId {
                id: key.to_string(),
                first: format!("{doc}#{at}"),
                second: format!("{key}#"),
            });
        }
        let resource = Arc::new(Resource::new(&key, document, self.default_draft)?);

        let mut aliases = Vec::new();
        for (pointer, base) in resource.bases() {
            if base.url == key {
                continue;
            }
            let alias = base.url.to_string();
            let first = match self.aliases.get(&alias) {
                Some((doc, at)) => Some(format!("{doc}#{at}")),
                None if self.documents.contains_key(&alias) => Some(format!("{alias}#")),
                None => None,
            };
            if let Some(first) = first {
                return Err(ResolutionError::DuplicateId {
                    id: alias,
                    first,
                    second: resource.location(pointer),
                });
            }
            aliases.push((alias, pointer.to_string()));
        }
        for (alias, pointer) in aliases {
            self.aliases.insert(alias, (key.to_string(), pointer));
        }

        tracing::debug!(url = %key, draft = %resource.draft(), "loaded schema document");
        self.documents.insert(key.to_string(), Arc::clone(&resource));
        Ok(resource)
    }

    /// Resolve a URL (its fragment is ignored) to the resource it names,
    /// loading the document on first use.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::Load` when the loader fails, or any
    /// indexing error of the loaded document.
    pub fn resolve(&mut self, url: &Url) -> Result<Resolved, ResolutionError> {
        let key = without_fragment(url);
        if let Some((doc, pointer)) = self.aliases.get(key.as_str()) {
            if let Some(resource) = self.documents.get(doc) {
                return Ok(Resolved {
                    resource: Arc::clone(resource),
                    pointer: pointer.clone(),
                });
            }
        }
        if let Some(resource) = self.documents.get(key.as_str()) {
            return Ok(Resolved {
                resource: Arc::clone(resource),
                pointer: String::new(),
            });
        }

        let document = self.loader.load(&key).map_err(|source| ResolutionError::Load {
            url: key.to_string(),
            source,
        })?;
        let resource = self.add(&key, document)?;
        Ok(Resolved {
            resource,
            pointer: String::new(),
        })
    }

    /// Resolve `reference` against `base` to a schema location.
    ///
    /// The fragment, percent-decoded, is a JSON pointer when empty or
    /// starting with `/` (relative to the resource the URL names) and an
    /// anchor name otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::AnchorNotFound`, `PointerNotFound` or
    /// `NotASchema` when the fragment does not address an object or boolean,
    /// in addition to the failures of [`Resolver::resolve`].
    pub fn resolve_ref(&mut self, base: &Url, reference: &str) -> Result<Resolved, ResolutionError> {
        let absolute = resolve(base, reference)?;
        let fragment = percent_decode(absolute.fragment().unwrap_or(""))?;
        let target = without_fragment(&absolute);
        let Resolved { resource, pointer } = self.resolve(&target)?;

        let pointer = if fragment.is_empty() || fragment.starts_with('/') {
            format!("{pointer}{fragment}")
        } else {
            let base = &resource.base_at(&pointer).url;
            resource
                .anchor(base, &fragment)
                .map(str::to_string)
                .ok_or_else(|| ResolutionError::AnchorNotFound {
                    url: target.to_string(),
                    anchor: fragment.clone(),
                })?
        };

        match resource.lookup(&pointer) {
            Some(Value::Object(_) | Value::Bool(_)) => Ok(Resolved { resource, pointer }),
            Some(_) => Err(ResolutionError::NotASchema {
                location: resource.location(&pointer),
            }),
            None => Err(ResolutionError::PointerNotFound {
                location: resource.location(&pointer),
            }),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut documents: Vec<&str> = self.documents.keys().map(String::as_str).collect();
        documents.sort_unstable();
        f.debug_struct("Resolver")
            .field("default_draft", &self.default_draft)
            .field("documents", &documents)
            .finish_non_exhaustive()
    }
}
