//! # Component Atlas
//!
//! Tracks reusable components across a set of repositories, finds
//! duplicated component families, and recommends where each family should
//! live.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Scanner   │──▶│    SQLite    │◀──│  Vector   │◀── embedding backend
//! │ tree-sitter │   │ components + │   │   Cache   │
//! └─────────────┘   │ vectors      │   └───────────┘
//!                   └──────┬───────┘
//!                          ▼
//!        provenance · centrality · consolidation planning
//!                 (component-atlas-core)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! atlas init                     # create database
//! atlas scan all                 # detect components in configured repositories
//! atlas embed pending            # generate vectors
//! atlas provenance               # group duplicated families
//! atlas score <component_id>     # rank canonical homes
//! atlas plan retry acme/web acme/platform
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`scanner`] | Repository walk, classification, tree-sitter extraction |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`embedding`] | Networked and local embedding providers |
//! | [`vector_cache`] | Single-flight, cache-aside vector access |
//! | [`dependencies`] | Static and HTTP dependency graphs |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod dependencies;
pub mod embed_cmd;
pub mod embedding;
pub mod migrate;
pub mod output;
pub mod plan_cmd;
pub mod progress;
pub mod provenance_cmd;
pub mod scan_cmd;
pub mod scanner;
pub mod score_cmd;
pub mod similar_cmd;
pub mod sqlite_store;
pub mod stats;
pub mod vector_cache;
