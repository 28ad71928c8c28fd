//! # Resource
//!
//! One loaded schema document: its retrieval URL, the decoded value tree,
//! and the location index built from it.
//!
//! ## Location Index
//!
//! - `bases`: every pointer that starts a (sub)resource, with the base URL
//!   and draft in effect below it. The document root is always present.
//!   Objects carrying a non-fragment `$id` (`id` in draft 4) start embedded
//!   resources.
//! - `anchors`: `"<base-url>#<name>"` → pointer, from `$anchor`,
//!   `$dynamicAnchor`, and fragment-only identifiers in drafts 4 to 7.
//!
//! Only subschema positions (per [`Draft::subschema_keywords`]) are walked.
//! A resource is immutable once built.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use jsv_core::draft::SubschemaShape;
use jsv_core::pointer;
use jsv_core::uri::{resolve, split_fragment, without_fragment};
use jsv_core::Draft;
use serde_json::{Map, Value};
use url::Url;

use crate::error::ResolutionError;

/// Base URL and draft in effect at and below a resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    /// Base URL for resolving relative references (no fragment).
    pub url: Url,
    /// Draft whose keyword semantics apply.
    pub draft: Draft,
}

/// A loaded schema document plus its location index.
#[derive(Debug)]
pub struct Resource {
    url: Url,
    document: Value,
    root: Base,
    bases: BTreeMap<String, Base>,
    anchors: HashMap<String, String>,
}

impl Resource {
    /// Index `document` retrieved from `url`.
    ///
    /// `default_draft` applies when the document root has no `$schema`.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::UnsupportedMetaschema` for an unknown
    /// `$schema`, `ResolutionError::DuplicateId` when two objects declare the
    /// same identifier or anchor, and `ResolutionError::Url` for identifiers
    /// that cannot be resolved against their base.
    pub fn new(url: &Url, document: Value, default_draft: Draft) -> Result<Self, ResolutionError> {
        let url = without_fragment(url);
        let mut index = Indexer {
            url: &url,
            bases: BTreeMap::new(),
            anchors: HashMap::new(),
        };
        index.walk(&document, String::new(), &url, default_draft)?;
        let Indexer { bases, anchors, .. } = index;
        // Boolean documents have no index entries; they still need a root.
        let root = bases.get("").cloned().unwrap_or(Base {
            url: url.clone(),
            draft: default_draft,
        });
        Ok(Self {
            url,
            document,
            root,
            bases,
            anchors,
        })
    }

    /// Retrieval URL of the document (no fragment).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The decoded document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Draft of the document root.
    pub fn draft(&self) -> Draft {
        self.root.draft
    }

    /// Value at `pointer`, if any.
    pub fn lookup(&self, pointer: &str) -> Option<&Value> {
        pointer::lookup(&self.document, pointer)
    }

    /// Absolute location string of `pointer` in this document.
    pub fn location(&self, pointer: &str) -> String {
        format!("{}#{}", self.url, pointer)
    }

    /// Base URL and draft of the innermost resource enclosing `pointer`.
    pub fn base_at(&self, pointer: &str) -> &Base {
        self.bases
            .range::<str, _>((Bound::Unbounded, Bound::Included(pointer)))
            .rev()
            .find(|(start, _)| pointer::is_prefix(start, pointer))
            .map(|(_, base)| base)
            .unwrap_or(&self.root)
    }

    /// Pointer of the anchor `name` declared under the resource `url`.
    pub fn anchor(&self, url: &Url, name: &str) -> Option<&str> {
        self.anchors
            .get(&anchor_key(url, name))
            .map(String::as_str)
    }

    /// Every resource root in the document with its base, root first.
    pub fn bases(&self) -> impl Iterator<Item = (&str, &Base)> {
        self.bases.iter().map(|(p, b)| (p.as_str(), b))
    }
}

fn anchor_key(url: &Url, name: &str) -> String {
    format!("{}#{}", without_fragment(url), name)
}

struct Indexer<'u> {
    url: &'u Url,
    bases: BTreeMap<String, Base>,
    anchors: HashMap<String, String>,
}

impl Indexer<'_> {
    fn walk(
        &mut self,
        value: &Value,
        ptr: String,
        base: &Url,
        draft: Draft,
    ) -> Result<(), ResolutionError> {
        let Value::Object(obj) = value else {
            return Ok(());
        };
        let mut base = base.clone();
        let mut draft = draft;

        // The root's `$schema` decides which keyword declares identifiers.
        if ptr.is_empty() {
            draft = self.metaschema_draft(obj)?.unwrap_or(draft);
        }
        let id = obj.get(draft.id_keyword()).and_then(Value::as_str);
        let (id_head, id_fragment) = match id {
            Some(id) => split_fragment(id),
            None => ("", None),
        };

        if !id_head.is_empty() {
            if !ptr.is_empty() {
                draft = self.metaschema_draft(obj)?.unwrap_or(draft);
            }
            base = without_fragment(&resolve(&base, id_head)?);
        }
        if ptr.is_empty() || !id_head.is_empty() {
            self.add_base(&ptr, Base { url: base.clone(), draft })?;
        }

        if let Some(fragment) = id_fragment.filter(|f| !f.is_empty()) {
            if !draft.has_anchor_keyword() {
                self.add_anchor(&base, fragment, &ptr)?;
            }
        }
        if draft.has_anchor_keyword() {
            for keyword in ["$anchor", "$dynamicAnchor"] {
                if let Some(name) = obj.get(keyword).and_then(Value::as_str) {
                    self.add_anchor(&base, name, &ptr)?;
                }
            }
        }

        self.walk_subschemas(obj, &ptr, &base, draft)
    }

    fn walk_subschemas(
        &mut self,
        obj: &Map<String, Value>,
        ptr: &str,
        base: &Url,
        draft: Draft,
    ) -> Result<(), ResolutionError> {
        for (keyword, shape) in draft.subschema_keywords() {
            let Some(value) = obj.get(*keyword) else {
                continue;
            };
            let at = pointer::push(ptr, keyword);
            match (shape, value) {
                (SubschemaShape::Single, _) => self.walk(value, at, base, draft)?,
                (SubschemaShape::SingleOrArray | SubschemaShape::Array, Value::Array(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        self.walk(item, format!("{at}/{i}"), base, draft)?;
                    }
                }
                (SubschemaShape::SingleOrArray, _) => self.walk(value, at, base, draft)?,
                (SubschemaShape::Map | SubschemaShape::MapOfSchemaOrArray, Value::Object(map)) => {
                    for (name, item) in map {
                        self.walk(item, pointer::push(&at, name), base, draft)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn metaschema_draft(&self, obj: &Map<String, Value>) -> Result<Option<Draft>, ResolutionError> {
        let Some(meta) = obj.get("$schema").and_then(Value::as_str) else {
            return Ok(None);
        };
        Draft::from_url(meta)
            .map(Some)
            .map_err(|_| ResolutionError::UnsupportedMetaschema {
                url: self.url.to_string(),
                metaschema: meta.to_string(),
            })
    }

    fn add_base(&mut self, ptr: &str, base: Base) -> Result<(), ResolutionError> {
        if let Some((first, _)) = self
            .bases
            .iter()
            .find(|(p, b)| b.url == base.url && p.as_str() != ptr)
        {
            return Err(ResolutionError::DuplicateId {
                id: base.url.to_string(),
                first: format!("{}#{}", self.url, first),
                second: format!("{}#{}", self.url, ptr),
            });
        }
        self.bases.insert(ptr.to_string(), base);
        Ok(())
    }

    fn add_anchor(&mut self, base: &Url, name: &str, ptr: &str) -> Result<(), ResolutionError> {
        let key = anchor_key(base, name);
        if let Some(first) = self.anchors.get(&key) {
            if first != ptr {
                return Err(ResolutionError::DuplicateId {
                    id: key,
                    first: format!("{}#{}", self.url, first),
                    second: format!("{}#{}", self.url, ptr),
                });
            }
            return Ok(());
        }
        self.anchors.insert(key, ptr.to_string());
        Ok(())
    }
}
