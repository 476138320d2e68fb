pub mod relation;

pub use relation::{Relation, RelationId};
