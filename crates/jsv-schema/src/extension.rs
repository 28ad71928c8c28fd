//! # Extension Protocol
//!
//! Custom keywords plug into the compiler and validator through two traits:
//!
//! - [`ExtCompiler`] is called once per compiled schema object, after the
//!   object has been checked against the extension's metaschema. It returns
//!   `Ok(None)` when the object has nothing for the extension.
//! - [`ExtSchema`] is the compiled payload stored on the node. It is called
//!   on every validation visit to that node.
//!
//! Extensions never build nodes themselves. Sub-schemas are compiled
//! through [`CompilerContext::compile`] and [`CompilerContext::compile_ref`],
//! which share the location cache and cycle handling of built-in keywords,
//! and validated through [`ValidationContext::validate`].
//!
//! ## Same-instance flag
//!
//! `same_instance` tells the compiler whether a sub-schema will be applied
//! to the very value the current schema sees (as `not` or `allOf` do) or to
//! a value derived from it (as `properties` does). The compiler uses it to
//! find reference cycles that cannot terminate at validation time. The flag
//! is trusted; a wrong `false` is still caught at validation time by the
//! same-instance depth bound.
//!
//! ## Example
//!
//! ```
//! use jsv_schema::{
//!     CompileError, CompilerContext, ExtCompiler, ExtSchema, ValidateError,
//!     ValidationContext,
//! };
//! use serde_json::{Map, Value};
//!
//! struct PowerOf;
//! struct PowerOfSchema(u64);
//!
//! impl ExtCompiler for PowerOf {
//!     fn compile(
//!         &self,
//!         _ctx: &mut CompilerContext<'_, '_>,
//!         schema: &Map<String, Value>,
//!     ) -> Result<Option<Box<dyn ExtSchema>>, CompileError> {
//!         Ok(schema
//!             .get("powerOf")
//!             .and_then(Value::as_u64)
//!             .filter(|base| *base > 1)
//!             .map(|base| Box::new(PowerOfSchema(base)) as Box<dyn ExtSchema>))
//!     }
//! }
//!
//! impl ExtSchema for PowerOfSchema {
//!     fn validate(
//!         &self,
//!         ctx: &mut ValidationContext<'_, '_>,
//!         value: &Value,
//!     ) -> Result<(), ValidateError> {
//!         let Some(mut n) = value.as_u64() else { return Ok(()) };
//!         while n > 1 && n % self.0 == 0 {
//!             n /= self.0;
//!         }
//!         if n == 1 {
//!             return Ok(());
//!         }
//!         Err(ctx.error("powerOf", format!("{value} is not a power of {}", self.0)).into())
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use jsv_core::pointer;
use jsv_core::Draft;
use serde_json::{Map, Value};

use crate::compiler::{Session, Site, StackEntry};
use crate::error::{CompileError, ValidateError, ValidationError};
use crate::node::NodeId;
use crate::resource::Resource;
use crate::schema::Schema;
use crate::validator::Engine;

/// Compiles the keywords an extension understands.
pub trait ExtCompiler: Send + Sync {
    /// Compile `schema`, the raw object at [`CompilerContext::location`].
    ///
    /// Return `Ok(None)` when `schema` has none of the extension's keywords.
    fn compile(
        &self,
        ctx: &mut CompilerContext<'_, '_>,
        schema: &Map<String, Value>,
    ) -> Result<Option<Box<dyn ExtSchema>>, CompileError>;
}

/// The compiled payload of an extension for one node.
pub trait ExtSchema: Send + Sync {
    /// Validate `value`, the instance at [`ValidationContext::instance_location`].
    fn validate(
        &self,
        ctx: &mut ValidationContext<'_, '_>,
        value: &Value,
    ) -> Result<(), ValidateError>;
}

/// A registered extension.
pub(crate) struct Extension {
    pub meta: Schema,
    pub compiler: Box<dyn ExtCompiler>,
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("meta", &self.meta.location())
            .finish_non_exhaustive()
    }
}

/// Compile-time view handed to [`ExtCompiler::compile`].
pub struct CompilerContext<'s, 'c> {
    session: &'s mut Session<'c>,
    resource: Arc<Resource>,
    pointer: String,
    path: String,
    stack: Vec<StackEntry>,
    draft: Draft,
    extension: &'c str,
}

impl<'s, 'c> CompilerContext<'s, 'c> {
    pub(crate) fn new(session: &'s mut Session<'c>, site: &Site<'_>, extension: &'c str) -> Self {
        Self {
            session,
            resource: Arc::clone(site.resource),
            pointer: site.pointer.to_string(),
            path: site.path.to_string(),
            stack: site.stack.to_vec(),
            draft: site.draft,
            extension,
        }
    }

    /// Compile the sub-schema at `schema_path`, a JSON pointer relative to
    /// the current schema object (`"items/0"`).
    ///
    /// # Errors
    ///
    /// Fails when nothing schema-shaped is at `schema_path` or when
    /// compiling the sub-schema fails.
    pub fn compile(&mut self, schema_path: &str, same_instance: bool) -> Result<NodeId, CompileError> {
        let site = Site {
            resource: &self.resource,
            pointer: &self.pointer,
            path: &self.path,
            stack: &self.stack,
            draft: self.draft,
        };
        self.session.compile_sub(&site, schema_path, same_instance)
    }

    /// Resolve `reference` against the current base URL and compile its
    /// target. `ref_path` is the keyword path of the reference, used for
    /// keyword locations and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Reference` when the reference cannot be
    /// resolved, or any failure compiling its target.
    pub fn compile_ref(
        &mut self,
        reference: &str,
        ref_path: &str,
        same_instance: bool,
    ) -> Result<NodeId, CompileError> {
        let site = Site {
            resource: &self.resource,
            pointer: &self.pointer,
            path: &self.path,
            stack: &self.stack,
            draft: self.draft,
        };
        self.session.compile_ref(&site, reference, ref_path, same_instance)
    }

    /// A compile error attributed to this extension and schema object.
    pub fn error(&self, reason: impl fmt::Display) -> CompileError {
        CompileError::Extension {
            extension: self.extension.to_string(),
            location: self.location(),
            reason: reason.to_string(),
        }
    }

    /// Absolute location of the schema object being compiled.
    pub fn location(&self) -> String {
        self.resource.location(&self.pointer)
    }

    /// Draft in effect for the schema object being compiled.
    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Name under which the extension was registered.
    pub fn extension(&self) -> &str {
        self.extension
    }
}

/// Validation-time view handed to [`ExtSchema::validate`].
pub struct ValidationContext<'e, 'g> {
    engine: &'e mut Engine<'g>,
}

impl<'e, 'g> ValidationContext<'e, 'g> {
    pub(crate) fn new(engine: &'e mut Engine<'g>) -> Self {
        Self { engine }
    }

    /// Validate `value` against `node`.
    ///
    /// `schema_path` extends the keyword location (`"powerOf/0"`);
    /// `instance_path` extends the instance location and is empty when
    /// `value` is the instance the extension was called with.
    ///
    /// `node` must come from the [`CompilerContext`] of the compiler that
    /// built the schema being validated.
    ///
    /// # Errors
    ///
    /// Returns the sub-schema's error tree, or an infinite-loop error that
    /// the extension must pass on unchanged. A `node` outside the schema's
    /// graph fails as an "unknown schema node" error.
    pub fn validate(
        &mut self,
        node: NodeId,
        schema_path: &str,
        instance_path: &str,
        value: &Value,
    ) -> Result<(), ValidateError> {
        if !self.engine.contains(node) {
            return Err(self
                .engine
                .error(schema_path, format!("unknown schema node {node}"))
                .into());
        }
        let keyword_location = self.engine.keyword_location_of(schema_path);
        let instance_location = pointer::append(self.engine.instance_location(), instance_path);
        self.engine.descend(
            node,
            keyword_location,
            instance_location,
            instance_path.is_empty(),
            value,
        )
    }

    /// A leaf error at `schema_path` below the current keyword location.
    pub fn error(&self, schema_path: &str, message: impl fmt::Display) -> ValidationError {
        self.engine.error(schema_path, message.to_string())
    }

    /// Attach `causes` to `parent`.
    pub fn group(&self, parent: ValidationError, causes: Vec<ValidationError>) -> ValidationError {
        ValidationError::group(parent, causes)
    }

    /// Location of the current instance value.
    pub fn instance_location(&self) -> &str {
        self.engine.instance_location()
    }

    /// Keyword location of the current schema object.
    pub fn keyword_location(&self) -> &str {
        self.engine.keyword_location()
    }
}
