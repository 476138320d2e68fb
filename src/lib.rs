//! # parajoin
//!
//! An in-memory, column-oriented, parallel relational query engine for
//! fixed-shape analytic queries over preloaded u64 relations.
//!
//! Queries are scans with pushed-down predicates, hash equi-joins,
//! intra-relation equality self-joins, and a final per-column checksum.
//! Each physical operator parallelizes over contiguous partitions of its
//! input and materializes into pre-sized columnar buffers, so results are
//! deterministic for a given plan and input.
//!
//! ## Quick Start
//!
//! ```rust
//! use parajoin::{Engine, Relation};
//!
//! let mut engine = Engine::with_defaults().unwrap();
//!
//! // Two relations: (key, payload) each.
//! let orders = Relation::new(vec![vec![1, 2, 2], vec![100, 200, 300]]).unwrap();
//! let items = Relation::new(vec![vec![2, 3], vec![7, 9]]).unwrap();
//! engine.register_relation(orders);
//! engine.register_relation(items);
//!
//! // Join on the key columns and sum two projections.
//! let result = engine.execute("0 1|0.0=1.0|0.1 1.1").unwrap();
//! assert_eq!(result.checksums, vec![500, 14]);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod query;
pub mod storage;

pub use config::EngineConfig;
pub use engine::{Engine, QueryResult};
pub use error::{EngineError, EngineResult};
pub use storage::relation::{Relation, RelationId};
