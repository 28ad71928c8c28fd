//! # jsv-schema — JSON Schema Graph Compiler and Validator
//!
//! Compiles JSON Schema documents into a shared graph of nodes and
//! validates JSON values against it, producing a tree of errors with
//! keyword, absolute keyword and instance locations.
//!
//! ## Pipeline
//!
//! 1. [`Resolver`] maps URLs to loaded [`Resource`]s, asking a
//!    [`DocumentLoader`] for documents it has not seen.
//! 2. [`Compiler`] turns schema locations into [`Node`]s, caching by
//!    location so references (including cyclic ones) share nodes.
//! 3. [`Schema`] validates instances; errors are [`ValidationError`] trees.
//!
//! Custom keywords plug in through [`ExtCompiler`] and [`ExtSchema`] (see
//! [`extension`]).
//!
//! ## Concurrency
//!
//! Compiling needs `&mut Compiler`. A compiled [`Schema`] is immutable,
//! `Clone + Send + Sync`, and can validate from any number of threads.
//!
//! ## Crate Policy
//!
//! - Depends only on `jsv-core` internally.
//! - No network access: the default loader only reads `file://` URLs.
//! - Compilation is all-or-nothing; validation never panics and never
//!   recurses without bound.

pub mod compiler;
pub mod error;
pub mod extension;
pub mod format;
pub(crate) mod keywords;
pub mod loader;
pub mod node;
pub mod options;
pub mod output;
pub mod resolver;
pub mod resource;
pub mod schema;
pub(crate) mod validator;

pub use compiler::Compiler;
pub use error::{
    CompileError, InfiniteLoopError, LoadError, ResolutionError, SchemaValidationError,
    ValidateError, ValidationError,
};
pub use extension::{CompilerContext, ExtCompiler, ExtSchema, ValidationContext};
pub use jsv_core::Draft;
pub use loader::{DocumentLoader, FileLoader, MapLoader, SchemeLoader};
pub use node::{Graph, Node, NodeId};
pub use options::CompilerOptions;
pub use output::OutputUnit;
pub use resolver::{Resolved, Resolver};
pub use resource::{Base, Resource};
pub use schema::Schema;
