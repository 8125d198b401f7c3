//! # mapping-finder
//!
//! Resolves, persists and searches Minecraft obfuscation mapping tables, one
//! database per release version.
//!
//! ## Architecture
//!
//! - **model**: The mapping forest — classes owning fields, methods,
//!   constructors and parameters, three name spaces per symbol
//! - **version**: Dotted release version keys with numeric ordering
//! - **parse**: Export parsing for the flat (SRG) and hierarchical (TSRG)
//!   grammars plus the auxiliary static-method and constructor tables
//! - **overrides**: Human-name override tables (CSV) and the full and
//!   incremental merge passes
//! - **codec**: Tagged-envelope JSON (de)serialization of persisted forests
//! - **bundle**: Raw export bundle access (zip archives or directories)
//! - **store**: Per-version persistence, staleness checks, rebuilds and the
//!   atomically swapped in-memory forests
//! - **search**: Lazy name searches and forward-only pagination
//! - **config**: Data directory resolution

pub mod bundle;
pub mod cli;
pub mod codec;
pub mod config;
pub mod model;
pub mod overrides;
pub mod parse;
pub mod search;
pub mod store;
pub mod version;
