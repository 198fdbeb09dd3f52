use calltree_protocol::CallUid;
use thiserror::Error;

use crate::model::{Container, NodeId};

/// Misuse of the structural tree API.
///
/// None of these come up during normal interaction: population, search,
/// focus, exclude and restore keep the invariants by construction and
/// never return them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallTreeError {
    #[error("{0} does not exist in this tree")]
    UnknownNode(NodeId),
    #[error("{container} already has child {existing} with call uid {call_uid:?}")]
    DuplicateCallUid {
        container: Container,
        call_uid: CallUid,
        existing: NodeId,
    },
    #[error("{node} is not a child of {container}")]
    NotAChild { container: Container, node: NodeId },
    #[error("{node} is already a child of {container}")]
    AlreadyAChild { container: Container, node: NodeId },
    #[error("{node} is {container} or one of its ancestors")]
    WouldCycle { container: Container, node: NodeId },
}
