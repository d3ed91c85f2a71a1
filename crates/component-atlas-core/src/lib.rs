//! # Component Atlas Core
//!
//! Runtime-agnostic logic for Component Atlas: the component data model,
//! structural signatures, the store and embedding abstractions, similarity
//! ranking, canonical-location scoring, provenance grouping, and
//! consolidation planning.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network code.
//! The `component-atlas` application crate supplies scanners, persistent
//! stores, and networked providers that plug into the traits defined here.

pub mod centrality;
pub mod dependency;
pub mod embedding;
pub mod error;
pub mod models;
pub mod planner;
pub mod provenance;
pub mod signature;
pub mod similarity;
pub mod store;

pub use error::{AtlasError, Outcome};
