//! # jsv-core — Foundational Types for jsv
//!
//! This crate holds the primitives shared by the schema compiler and the
//! validator. It depends on nothing internal.
//!
//! ## Contents
//!
//! - [`pointer`]: RFC 6901 JSON Pointer escaping, joining and lookup.
//! - [`uri`]: fragment splitting and percent-decoding for `$ref` strings.
//! - [`draft`]: the [`Draft`] enum, `$schema` detection, and the per-draft
//!   tables of keywords whose values are subschemas.
//! - [`json`]: JSON type classification and numeric-aware equality.
//! - [`error`]: [`CoreError`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `jsv-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod draft;
pub mod error;
pub mod json;
pub mod pointer;
pub mod uri;

// Re-export primary types for ergonomic imports.
pub use draft::{Draft, SubschemaShape};
pub use error::CoreError;
pub use json::{is_integer, json_equal, JsonType};
pub use uri::{parse_absolute, percent_decode, resolve, split_fragment, without_fragment};
