//! # keytree
//!
//! A bidirectional mapping engine between typed Rust values and a
//! hierarchical document tree representing flat, line-oriented key/value
//! text whose keys encode nesting through a delimiter (`a.b.c=value`).
//!
//! ## Overview
//!
//! keytree reads flat `key=value` documents into a [`node`] tree, maps the
//! tree onto arbitrary typed values through an extensible converter
//! pipeline, and writes values back out while preserving comments, key
//! ordering and nested naming across round trips.
//!
//! ### Key Components
//!
//! - **[`node`]**: the document tree ([`node::ObjectNode`],
//!   [`node::PrimitiveNode`]) with ordered, uniquely-named children
//! - **[`composer`]**: converts between the flat token/property stream and
//!   the tree ([`composer::FlatComposer`], [`composer::DelimitedComposer`])
//! - **[`typeinfo`]**: runtime type descriptors ([`typeinfo::TypeInfo`],
//!   the [`typeinfo::Describe`] trait, [`typeinfo::StructBuilder`]) and the
//!   global descriptor registry
//! - **[`construct`]**: pluggable construction providers with a cached
//!   constructor-resolution strategy
//! - **[`convert`]**: the converter chain and the [`convert::Mapper`]
//!   dispatcher that walks trees recursively
//! - **[`text`]**: a minimal line-level tokenizer/renderer for the flat
//!   text form
//!
//! ## Quick Start
//!
//! ```rust
//! use keytree::composer::DelimitedComposer;
//! use keytree::convert::Mapper;
//! use keytree::typeinfo::{Describe, StructBuilder, TypeInfo};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Describe for Server {
//!     fn build_type_info() -> TypeInfo {
//!         StructBuilder::<Server>::new("Server")
//!             .field("host", |s: &Server| s.host.clone(), |s, v| s.host = v)
//!             .field("port", |s: &Server| s.port, |s, v| s.port = v)
//!             .with_default()
//!             .build()
//!     }
//! }
//!
//! # fn main() -> Result<(), keytree::KeytreeError> {
//! let mapper = Mapper::new();
//! let composer = DelimitedComposer::default();
//!
//! let server: Server = mapper.from_text("host=example.org\nport=8080\n", &composer)?;
//! assert_eq!(server.port, 8080);
//!
//! let text = mapper.to_text(&server, &composer)?;
//! assert_eq!(text, "host=example.org\nport=8080\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure surfaces as one [`KeytreeError`] identifying the offending
//! type and/or key; a failed node aborts the whole conversion. There is no
//! partial-result or best-effort mode.

pub mod composer;
pub mod construct;
pub mod convert;
pub mod error;
pub mod node;
pub mod text;
pub mod typeinfo;

pub use composer::{Composer, DelimitedComposer, FlatComposer, Property, PropertySink, Token};
pub use construct::{CachedProvider, ConstructionProvider, DirectProvider};
pub use convert::{Converter, Mapper};
pub use error::{KeytreeError, Result};
pub use node::{Node, ObjectNode, PrimitiveNode};
pub use typeinfo::{Describe, PrimitiveKind, StructBuilder, TypeInfo, TypeKind, TYPES};
