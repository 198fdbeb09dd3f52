use std::collections::VecDeque;

use crate::comparator::{ComparatorId, SortProperty};
use crate::model::Container;
use crate::tree::AggregateTree;

impl AggregateTree {
    /// Sort `container`'s children with `comparator`, then their children,
    /// level by level.
    ///
    /// Unless `force` is set, a collapsed node or one already sorted with
    /// `comparator` is skipped together with its subtree; if it has
    /// materialized children it is flagged as needing a refresh instead.
    /// The walk keeps a queue of sibling groups rather than recursing, so
    /// deep profiles cannot exhaust the stack.
    ///
    /// Ties keep their previous relative order (`sort_by` is stable).
    pub fn sort(&mut self, container: Container, comparator: ComparatorId, force: bool) {
        let mut groups: VecDeque<Vec<Container>> = VecDeque::from([vec![container]]);

        while let Some(group) = groups.pop_front() {
            for current in group {
                let Some(slot) = self.container_mut(current) else {
                    continue;
                };

                if !force && (!slot.is_expanded() || slot.last_comparator() == Some(comparator)) {
                    if !slot.children().is_empty() {
                        slot.mark_needs_refresh();
                    }
                    continue;
                }

                slot.set_last_comparator(comparator);
                let mut order = slot.children().to_vec();
                if order.is_empty() {
                    continue;
                }

                let (nodes, comparators) = (&self.nodes, &self.comparators);
                order.sort_by(|a, b| comparators.compare(comparator, &nodes[a.0], &nodes[b.0]));
                if let Some(list) = self.child_list_mut(current) {
                    list.reorder(order.clone());
                }
                groups.push_back(order.into_iter().map(Container::Node).collect());
            }
        }
    }

    /// Sort the visible tree by a column, the way clicking its header does.
    pub fn sort_by_property(&mut self, property: SortProperty, ascending: bool) -> ComparatorId {
        let comparator = self.property_comparator(property, ascending);
        self.sort(Container::Root, comparator, false);
        comparator
    }
}
