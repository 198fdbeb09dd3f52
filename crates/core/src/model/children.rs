use std::collections::HashMap;

use calltree_protocol::CallUid;

use crate::comparator::ComparatorId;
use crate::model::NodeId;

/// Ordered children plus the call-uid index over them.
///
/// Both views always hold the same members; every mutation goes through
/// this type so they cannot drift apart.
#[derive(Debug, Clone, Default)]
pub struct ChildList {
    order: Vec<NodeId>,
    by_call_uid: HashMap<CallUid, NodeId>,
}

impl ChildList {
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, call_uid: &str) -> Option<NodeId> {
        self.by_call_uid.get(call_uid).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.order.contains(&id)
    }

    /// Insert at `index` (clamped). Returns the child already registered
    /// under `call_uid` instead of inserting when there is one.
    pub(crate) fn insert(
        &mut self,
        index: usize,
        id: NodeId,
        call_uid: CallUid,
    ) -> Result<(), NodeId> {
        if let Some(&existing) = self.by_call_uid.get(&call_uid) {
            return Err(existing);
        }
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        self.by_call_uid.insert(call_uid, id);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: NodeId, call_uid: &str) -> bool {
        let Some(position) = self.order.iter().position(|&child| child == id) else {
            return false;
        };
        self.order.remove(position);
        self.by_call_uid.remove(call_uid);
        true
    }

    pub(crate) fn clear(&mut self) -> Vec<NodeId> {
        self.by_call_uid.clear();
        std::mem::take(&mut self.order)
    }

    /// Replace the order with a permutation of the current members.
    pub(crate) fn reorder(&mut self, order: Vec<NodeId>) {
        debug_assert_eq!(order.len(), self.order.len());
        self.order = order;
    }
}

/// Capabilities shared by the tree root and its nodes: owning children and
/// taking part in sorting.
pub trait ChildContainer {
    fn child_list(&self) -> &ChildList;

    fn child_list_mut(&mut self) -> &mut ChildList;

    fn last_comparator(&self) -> Option<ComparatorId>;

    fn set_last_comparator(&mut self, comparator: ComparatorId);

    fn is_expanded(&self) -> bool;

    fn mark_needs_refresh(&mut self);

    fn children(&self) -> &[NodeId] {
        self.child_list().ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_registers_both_views() {
        let mut list = ChildList::default();
        assert!(list.insert(0, NodeId(1), CallUid::from("a")).is_ok());
        assert!(list.insert(0, NodeId(2), CallUid::from("b")).is_ok());
        assert!(list.insert(99, NodeId(3), CallUid::from("c")).is_ok());
        assert_eq!(list.ids(), &[NodeId(2), NodeId(1), NodeId(3)]);
        assert_eq!(list.get("a"), Some(NodeId(1)));
        assert_eq!(list.get("c"), Some(NodeId(3)));
    }

    #[test]
    fn duplicate_call_uid_is_rejected() {
        let mut list = ChildList::default();
        assert!(list.insert(0, NodeId(1), CallUid::from("a")).is_ok());
        assert_eq!(list.insert(1, NodeId(2), CallUid::from("a")), Err(NodeId(1)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("a"), Some(NodeId(1)));
    }

    #[test]
    fn remove_and_clear_keep_views_in_sync() {
        let mut list = ChildList::default();
        let _ = list.insert(0, NodeId(1), CallUid::from("a"));
        let _ = list.insert(1, NodeId(2), CallUid::from("b"));
        assert!(list.remove(NodeId(1), "a"));
        assert!(!list.remove(NodeId(1), "a"));
        assert_eq!(list.get("a"), None);
        assert_eq!(list.clear(), vec![NodeId(2)]);
        assert!(list.is_empty());
        assert_eq!(list.get("b"), None);
    }
}
