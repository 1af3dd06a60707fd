//! Query building: flat where-clause predicates and the find-many plan.

pub mod find_many;
pub mod predicate;

pub use find_many::{FindManyArgs, OrderBy, PageLimits, Query, SortKey, SortOrder};
pub use predicate::{Condition, Predicate, PredicateBuilder, RelationLookup, WhereInput};
