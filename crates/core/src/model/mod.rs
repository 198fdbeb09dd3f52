pub mod children;
pub mod node;
pub(crate) mod source;

pub use children::{ChildContainer, ChildList};
pub use node::{AggregateNode, Container, MatchFlags, NodeId, beautify_function_name};
