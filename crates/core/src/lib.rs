//! Aggregated call tree for CPU profiles.
//!
//! An [`AggregateTree`] is built from a [`ProfileNode`] forest handed over by a
//! profiling backend. Children are materialized lazily, nodes can be merged
//! into their parents (absorbing recursion or excluded functions), every
//! mutation can be undone through save/restore snapshots, and the tree can be
//! sorted and searched with the DevTools query grammar (`>5ms`, `<=2%`, `1.5s`,
//! or plain text).

pub mod comparator;
pub mod error;
pub mod model;
pub mod parsers;
pub mod query;
pub mod tree;

pub use calltree_protocol::{CallUid, ProfileNode};
pub use comparator::{ComparatorId, ComparatorRegistry, SortProperty};
pub use error::CallTreeError;
pub use model::{AggregateNode, Container, MatchFlags, NodeId};
pub use query::{Query, QueryUnit, SearchConfig};
pub use tree::AggregateTree;
