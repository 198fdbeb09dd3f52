use std::collections::HashMap;

use tracing::debug;

use crate::model::{Container, MatchFlags, NodeId};
use crate::query::{Query, SearchConfig};
use crate::tree::AggregateTree;

/// Results of the last search pass and the cursor into them.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchState {
    results: Vec<NodeId>,
    index: Option<usize>,
}

impl AggregateTree {
    /// Run a search over the whole tree and return the number of matches.
    ///
    /// Previous results are cleared first. Nodes are visited depth-first in
    /// display order, populating on the way. The cursor starts on the last
    /// result, or on the first when `jump_backwards` is set. The refresh
    /// hook fires once for every node whose match flags changed.
    pub fn perform_search(&mut self, config: &SearchConfig, jump_backwards: bool) -> usize {
        let previous = self.clear_search_flags();
        let Some(query) = Query::parse(config) else {
            for (id, _) in previous {
                self.notify_refresh(id);
            }
            return 0;
        };

        let mut previous: HashMap<NodeId, MatchFlags> = previous.into_iter().collect();
        let mut results = Vec::new();
        for id in self.walk_all() {
            let flags = query.matches(&self.nodes[id.0], self.total_time);
            self.nodes[id.0].matched = flags;
            if flags != previous.remove(&id).unwrap_or_default() {
                self.notify_refresh(id);
            }
            if flags.any() {
                results.push(id);
            }
        }

        // Former matches that are no longer in the tree lost their flags too.
        let mut stale: Vec<NodeId> = previous.into_keys().collect();
        stale.sort_unstable();
        for id in stale {
            self.notify_refresh(id);
        }

        let count = results.len();
        self.search.index = match count {
            0 => None,
            _ if jump_backwards => Some(0),
            _ => Some(count - 1),
        };
        self.search.results = results;
        debug!(query = %config.query, count, "search finished");
        count
    }

    /// Clear every highlight left by the last search and forget its results.
    pub fn search_canceled(&mut self) {
        for (id, _) in self.clear_search_flags() {
            self.notify_refresh(id);
        }
    }

    /// Advance the cursor, wrapping around, and reveal the result.
    pub fn jump_to_next_search_result(&mut self) -> Option<NodeId> {
        let len = self.search.results.len();
        if len == 0 {
            return None;
        }
        let next = self.search.index.map_or(0, |index| (index + 1) % len);
        self.jump_to_search_result(next)
    }

    /// Move the cursor back, wrapping around, and reveal the result.
    pub fn jump_to_previous_search_result(&mut self) -> Option<NodeId> {
        let len = self.search.results.len();
        if len == 0 {
            return None;
        }
        let previous = self
            .search
            .index
            .map_or(len - 1, |index| (index + len - 1) % len);
        self.jump_to_search_result(previous)
    }

    pub fn current_search_result_index(&self) -> Option<usize> {
        self.search.index
    }

    pub fn current_search_result(&self) -> Option<NodeId> {
        self.search
            .index
            .and_then(|index| self.search.results.get(index).copied())
    }

    pub fn search_results(&self) -> &[NodeId] {
        &self.search.results
    }

    fn jump_to_search_result(&mut self, index: usize) -> Option<NodeId> {
        self.search.index = Some(index);
        let id = *self.search.results.get(index)?;
        // A result detached by a later focus or exclude has nothing to reveal.
        self.reveal(id).ok();
        Some(id)
    }

    /// Reset flags of the current results; returns those that had any set.
    fn clear_search_flags(&mut self) -> Vec<(NodeId, MatchFlags)> {
        self.search.index = None;
        std::mem::take(&mut self.search.results)
            .into_iter()
            .filter_map(|id| {
                let flags = std::mem::take(&mut self.nodes.get_mut(id.0)?.matched);
                flags.any().then_some((id, flags))
            })
            .collect()
    }

    fn notify_refresh(&mut self, id: NodeId) {
        if let Some(hook) = self.refresh_hook.as_mut() {
            hook(id);
        }
    }

    /// Depth-first pre-order over every node in the tree.
    fn walk_all(&mut self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack: Vec<NodeId> = self.root.children.ids().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            self.populate(Container::Node(id));
            order.push(id);
            stack.extend(self.nodes[id.0].children.ids().iter().rev());
        }
        order
    }
}
