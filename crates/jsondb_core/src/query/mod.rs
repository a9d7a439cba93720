//! Filter/sort compilation, views and query execution.
//!
//! A query starts as a filter tree and a sort specification. Both are
//! parsed into [`Filter`] and [`SortSpec`], compiled into a [`View`] with an
//! access [`Plan`], and cached in the [`ViewCache`] under a canonical
//! signature. A [`Query`] executes a view against the current state.

mod cache;
mod engine;
mod filter;
mod outcome;
mod plan;
mod sort;
mod view;

pub use cache::{ViewCache, ViewCacheStats};
pub use engine::Query;
pub use filter::{Constraint, FieldFilter, Filter, FilterBuilder, LikePattern};
pub use outcome::ModifyOutcome;
pub use plan::{Plan, Seek};
pub use sort::{Direction, SortKey, SortSpec};
pub use view::{PathSet, View};
