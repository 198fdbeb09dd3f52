mod search;
mod sort;

use std::fmt;

use calltree_protocol::ProfileNode;
use tracing::{debug, trace, warn};

use crate::comparator::{ComparatorId, ComparatorRegistry, SortProperty};
use crate::error::CallTreeError;
use crate::model::node::Snapshot;
use crate::model::source::{SourceArena, SourceId};
use crate::model::{AggregateNode, ChildContainer, ChildList, Container, NodeId};
use crate::parsers::{self, ParseError};

use search::SearchState;

/// Callback told which row to redraw after its search highlight changed.
pub type RefreshHook = Box<dyn FnMut(NodeId)>;

#[derive(Debug, Clone)]
struct RootSnapshot {
    total_time: f64,
    children: Vec<NodeId>,
}

/// Where a focused node lived before `focus` lifted it to the top level.
#[derive(Debug, Clone, Copy)]
struct SavedPosition {
    node: NodeId,
    parent: Container,
    index: usize,
}

/// The invisible root: owns the top-level rows. Always expanded.
#[derive(Debug, Clone, Default)]
struct RootNode {
    children: ChildList,
    last_comparator: Option<ComparatorId>,
    populated: bool,
    snapshot: Option<RootSnapshot>,
    focus_positions: Vec<SavedPosition>,
    /// Nodes checkpointed by `exclude`. Under a focus they are not
    /// reachable from the root's own snapshot.
    excluded_saves: Vec<NodeId>,
}

impl ChildContainer for RootNode {
    fn child_list(&self) -> &ChildList {
        &self.children
    }

    fn child_list_mut(&mut self) -> &mut ChildList {
        &mut self.children
    }

    fn last_comparator(&self) -> Option<ComparatorId> {
        self.last_comparator
    }

    fn set_last_comparator(&mut self, comparator: ComparatorId) {
        self.last_comparator = Some(comparator);
    }

    fn is_expanded(&self) -> bool {
        true
    }

    fn mark_needs_refresh(&mut self) {}
}

/// Aggregated call tree over one profile.
///
/// Nodes live in an arena owned by the tree and are addressed by
/// [`NodeId`]. A node belongs to at most one container at a time; detached
/// nodes (removed, absorbed, or only referenced from a snapshot) stay in the
/// arena so `restore` can bring them back.
pub struct AggregateTree {
    nodes: Vec<AggregateNode>,
    sources: SourceArena,
    root_source: SourceId,
    root: RootNode,
    total_time: f64,
    comparators: ComparatorRegistry,
    search: SearchState,
    refresh_hook: Option<RefreshHook>,
}

impl fmt::Debug for AggregateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateTree")
            .field("nodes", &self.nodes.len())
            .field("top_level", &self.root.children.ids())
            .field("total_time", &self.total_time)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl AggregateTree {
    /// Build the tree for `root`. The root itself is not a row: its children
    /// become the top level. The first idle node's total is left out of the
    /// percentage base.
    pub fn new(root: ProfileNode) -> Self {
        let idle_time = root.find_idle().map_or(0.0, |idle| idle.total_time);
        let total_time = root.total_time - idle_time;
        let (sources, root_source) = SourceArena::flatten(root);
        let mut tree = Self {
            nodes: Vec::new(),
            sources,
            root_source,
            root: RootNode::default(),
            total_time,
            comparators: ComparatorRegistry::new(),
            search: SearchState::default(),
            refresh_hook: None,
        };
        tree.populate(Container::Root);
        debug!(
            raw_nodes = tree.sources.len(),
            top_level = tree.root.children.len(),
            total_time,
            idle_time,
            "built aggregate tree"
        );
        tree
    }

    /// Parse a V8 `.cpuprofile` and build its tree.
    pub fn from_cpuprofile(data: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::new(parsers::cpuprofile::parse_cpuprofile(data)?))
    }

    /// Detect the input format and build the tree.
    pub fn load(data: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::new(parsers::parse_auto(data)?))
    }

    /// Grand total all percentages are relative to.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn node(&self, id: NodeId) -> Option<&AggregateNode> {
        self.nodes.get(id.0)
    }

    /// Materialized children of `container`; empty for unknown nodes.
    pub fn children(&self, container: Container) -> &[NodeId] {
        self.child_list(container).map_or(&[], ChildList::ids)
    }

    pub fn top_level(&self) -> &[NodeId] {
        self.root.children.ids()
    }

    pub fn self_percent(&self, id: NodeId) -> Option<f64> {
        self.node(id)
            .map(|node| node.self_time / self.total_time * 100.0)
    }

    pub fn total_percent(&self, id: NodeId) -> Option<f64> {
        self.node(id)
            .map(|node| node.total_time / self.total_time * 100.0)
    }

    /// Percentage to show in the self column; the idle row shows none.
    pub fn display_self_percent(&self, id: NodeId) -> Option<f64> {
        self.node(id)
            .filter(|node| !node.is_idle)
            .and_then(|_| self.self_percent(id))
    }

    /// Percentage to show in the total column; the idle row shows none.
    pub fn display_total_percent(&self, id: NodeId) -> Option<f64> {
        self.node(id)
            .filter(|node| !node.is_idle)
            .and_then(|_| self.total_percent(id))
    }

    /// Comparator the top level was last sorted with. Newly populated
    /// children are sorted with it as well.
    pub fn last_comparator(&self) -> Option<ComparatorId> {
        self.root.last_comparator
    }

    pub fn comparators(&self) -> &ComparatorRegistry {
        &self.comparators
    }

    /// Memoized comparator for `property`; see [`ComparatorRegistry`].
    pub fn property_comparator(&mut self, property: SortProperty, ascending: bool) -> ComparatorId {
        self.comparators.property_comparator(property, ascending)
    }

    pub fn set_refresh_hook(&mut self, hook: impl FnMut(NodeId) + 'static) {
        self.refresh_hook = Some(Box::new(hook));
    }

    pub(crate) fn container(&self, container: Container) -> Option<&dyn ChildContainer> {
        match container {
            Container::Root => Some(&self.root),
            Container::Node(id) => self
                .nodes
                .get(id.0)
                .map(|node| node as &dyn ChildContainer),
        }
    }

    pub(crate) fn container_mut(&mut self, container: Container) -> Option<&mut dyn ChildContainer> {
        match container {
            Container::Root => Some(&mut self.root),
            Container::Node(id) => self
                .nodes
                .get_mut(id.0)
                .map(|node| node as &mut dyn ChildContainer),
        }
    }

    fn child_list(&self, container: Container) -> Option<&ChildList> {
        self.container(container).map(|slot| slot.child_list())
    }

    fn child_list_mut(&mut self, container: Container) -> Option<&mut ChildList> {
        self.container_mut(container)
            .map(|slot| slot.child_list_mut())
    }

    fn node_ref(&self, id: NodeId) -> Result<&AggregateNode, CallTreeError> {
        self.nodes.get(id.0).ok_or(CallTreeError::UnknownNode(id))
    }

    fn check_container(&self, container: Container) -> Result<(), CallTreeError> {
        match container {
            Container::Root => Ok(()),
            Container::Node(id) => self.node_ref(id).map(|_| ()),
        }
    }

    /// Whether `node` is `container` or sits on its parent chain.
    fn is_ancestor_or_self(&self, node: NodeId, container: Container) -> bool {
        let mut current = container;
        while let Container::Node(id) = current {
            if id == node {
                return true;
            }
            match self.nodes.get(id.0).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    // --- Population ---

    /// Materialize the raw children of `container` once.
    ///
    /// When the top level already has an active comparator the new children
    /// are sorted with it right away, so they never show up unsorted next to
    /// siblings that are.
    pub fn populate(&mut self, container: Container) {
        let source = match container {
            Container::Root => {
                if self.root.populated {
                    return;
                }
                self.root.populated = true;
                self.root_source
            }
            Container::Node(id) => {
                let Some(node) = self.nodes.get_mut(id.0) else {
                    return;
                };
                if node.populated {
                    return;
                }
                node.populated = true;
                node.source
            }
        };

        let raw_children = self.sources.get(source).children.clone();
        trace!(%container, count = raw_children.len(), "populating");
        for raw in raw_children {
            let id = self.create_node(raw);
            if let Err(CallTreeError::DuplicateCallUid { existing, .. }) =
                self.append_child(container, id)
            {
                // Some backends report one call site twice under a parent.
                self.merge_unchecked(Container::Node(existing), id, false);
            }
        }

        if let Some(comparator) = self.root.last_comparator {
            self.sort(container, comparator, true);
        }
    }

    fn create_node(&mut self, source: SourceId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(AggregateNode::from_source(source, self.sources.get(source)));
        id
    }

    /// Populate and expand `id`, sorting its children if they were skipped
    /// while it was collapsed.
    pub fn expand(&mut self, id: NodeId) -> Result<(), CallTreeError> {
        self.node_ref(id)?;
        self.populate(Container::Node(id));
        self.nodes[id.0].expanded = true;
        if let Some(comparator) = self.root.last_comparator
            && self.nodes[id.0].last_comparator != Some(comparator)
        {
            self.sort(Container::Node(id), comparator, false);
        }
        Ok(())
    }

    pub fn collapse(&mut self, id: NodeId) -> Result<(), CallTreeError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(CallTreeError::UnknownNode(id))?
            .expanded = false;
        Ok(())
    }

    /// Expand every ancestor of `id` so it becomes visible.
    pub fn reveal(&mut self, id: NodeId) -> Result<(), CallTreeError> {
        let mut ancestors = Vec::new();
        let mut current = self.node_ref(id)?.parent;
        while let Some(Container::Node(parent)) = current {
            ancestors.push(parent);
            current = self.nodes[parent.0].parent;
        }
        for ancestor in ancestors.into_iter().rev() {
            self.expand(ancestor)?;
        }
        Ok(())
    }

    /// Read and clear the "children need refreshing" signal left by a sort
    /// that skipped this node.
    pub fn take_needs_refresh(&mut self, id: NodeId) -> bool {
        self.nodes
            .get_mut(id.0)
            .is_some_and(|node| std::mem::take(&mut node.needs_refresh))
    }

    // --- Structure ---

    /// Insert `node` at `index` (clamped) among the children of `container`,
    /// detaching it from wherever it currently is.
    ///
    /// Fails with [`CallTreeError::DuplicateCallUid`] if a different child
    /// already has the same call uid; the tree is left untouched then.
    pub fn insert_child(
        &mut self,
        container: Container,
        node: NodeId,
        index: usize,
    ) -> Result<(), CallTreeError> {
        self.check_container(container)?;
        let call_uid = self.node_ref(node)?.call_uid.clone();
        if self.is_ancestor_or_self(node, container) {
            return Err(CallTreeError::WouldCycle { container, node });
        }
        if let Some(existing) = self.child_list(container).and_then(|list| list.get(&call_uid))
            && existing != node
        {
            return Err(CallTreeError::DuplicateCallUid {
                container,
                call_uid,
                existing,
            });
        }

        self.detach(node);
        if let Some(list) = self.child_list_mut(container) {
            list.insert(index, node, call_uid.clone())
                .map_err(|existing| CallTreeError::DuplicateCallUid {
                    container,
                    call_uid,
                    existing,
                })?;
        }
        self.nodes[node.0].parent = Some(container);
        Ok(())
    }

    pub fn append_child(&mut self, container: Container, node: NodeId) -> Result<(), CallTreeError> {
        let index = self.children(container).len();
        self.insert_child(container, node, index)
    }

    pub fn remove_child(&mut self, container: Container, node: NodeId) -> Result<(), CallTreeError> {
        self.check_container(container)?;
        if self.node_ref(node)?.parent != Some(container) {
            return Err(CallTreeError::NotAChild { container, node });
        }
        self.detach(node);
        Ok(())
    }

    /// Detach every child of `container` at once.
    pub fn remove_children(&mut self, container: Container) {
        let Some(list) = self.child_list_mut(container) else {
            return;
        };
        for id in list.clear() {
            self.nodes[id.0].parent = None;
        }
    }

    /// The child of `container` sharing `candidate`'s call uid.
    pub fn find_child(&self, container: Container, candidate: Option<NodeId>) -> Option<NodeId> {
        let candidate = self.nodes.get(candidate?.0)?;
        self.child_list(container)?.get(&candidate.call_uid)
    }

    pub fn find_child_by_call_uid(&self, container: Container, call_uid: &str) -> Option<NodeId> {
        self.child_list(container)?.get(call_uid)
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return;
        };
        let call_uid = self.nodes[node.0].call_uid.clone();
        if let Some(list) = self.child_list_mut(parent) {
            list.remove(node, &call_uid);
        }
    }

    /// Append where uniqueness is already guaranteed by the caller. A node
    /// moved under its own checkpointed child cannot return and stays put.
    fn attach(&mut self, container: Container, node: NodeId) {
        if let Err(err) = self.append_child(container, node) {
            warn!(%err, %container, %node, "node could not be re-attached");
        }
    }

    // --- Merge ---

    /// Fold `child` into `container`.
    ///
    /// Self time always accumulates. Total time accumulates only when not
    /// absorbing: an absorbed child (a direct child, e.g. a recursive call
    /// or an excluded function) is already part of its container's total.
    /// The absorbed child leaves the container; its children are merged
    /// into same-identity children of the container or appended as new ones.
    /// The root has no self time, so merging into it only moves totals.
    ///
    /// Both sides are populated first so no raw children are lost.
    pub fn merge(
        &mut self,
        container: Container,
        child: NodeId,
        should_absorb: bool,
    ) -> Result<(), CallTreeError> {
        self.check_container(container)?;
        let is_direct_child = self.node_ref(child)?.parent == Some(container);
        if self.is_ancestor_or_self(child, container) {
            return Err(CallTreeError::WouldCycle {
                container,
                node: child,
            });
        }
        if should_absorb && !is_direct_child {
            return Err(CallTreeError::NotAChild {
                container,
                node: child,
            });
        }
        if !should_absorb && is_direct_child {
            return Err(CallTreeError::AlreadyAChild {
                container,
                node: child,
            });
        }
        debug!(%container, %child, should_absorb, "merging");
        self.merge_unchecked(container, child, should_absorb);
        Ok(())
    }

    fn merge_unchecked(&mut self, container: Container, child: NodeId, should_absorb: bool) {
        self.populate(container);
        self.populate(Container::Node(child));

        let (self_time, total_time) = {
            let node = &self.nodes[child.0];
            (node.self_time, node.total_time)
        };
        match container {
            Container::Root => {
                if !should_absorb {
                    self.total_time += total_time;
                }
            }
            Container::Node(id) => {
                let node = &mut self.nodes[id.0];
                node.self_time += self_time;
                if !should_absorb {
                    node.total_time += total_time;
                }
            }
        }

        let siblings = self.children(container).to_vec();
        self.remove_children(container);
        for sibling in siblings {
            if !should_absorb || sibling != child {
                self.attach(container, sibling);
            }
        }

        let orphans = self.nodes[child.0].children.ids().to_vec();
        for orphan in orphans {
            let call_uid = self.nodes[orphan.0].call_uid.clone();
            match self.find_child_by_call_uid(container, &call_uid) {
                Some(existing) => self.merge_unchecked(Container::Node(existing), orphan, false),
                None => self.attach(container, orphan),
            }
        }
    }

    // --- Save / restore ---

    /// Checkpoint times and children of `container`. An existing checkpoint
    /// is older and therefore kept.
    pub fn save(&mut self, container: Container) {
        match container {
            Container::Root => {
                if self.root.snapshot.is_none() {
                    self.root.snapshot = Some(RootSnapshot {
                        total_time: self.total_time,
                        children: self.root.children.ids().to_vec(),
                    });
                }
            }
            Container::Node(id) => {
                let Some(node) = self.nodes.get_mut(id.0) else {
                    return;
                };
                if node.snapshot.is_none() {
                    node.snapshot = Some(Snapshot {
                        self_time: node.self_time,
                        total_time: node.total_time,
                        children: node.children.ids().to_vec(),
                    });
                }
            }
        }
    }

    /// Roll `container` back to its checkpoint, and each checkpointed child
    /// with it, transitively. The checkpoint is consumed; without one this
    /// does nothing. Restoring the root also undoes every exclude and focus
    /// made since its checkpoint.
    pub fn restore(&mut self, container: Container) {
        let mut pending = Vec::new();
        if container == Container::Root && self.root.snapshot.is_some() {
            // Visited after the root, parents before children.
            pending.extend(
                std::mem::take(&mut self.root.excluded_saves)
                    .into_iter()
                    .rev()
                    .map(Container::Node),
            );
            // Newest first, so stacked focuses unwind in order.
            for position in std::mem::take(&mut self.root.focus_positions)
                .into_iter()
                .rev()
            {
                if let Err(err) = self.insert_child(position.parent, position.node, position.index) {
                    warn!(%err, "focused node could not return to its parent");
                }
            }
        }

        pending.push(container);
        while let Some(current) = pending.pop() {
            let children = match current {
                Container::Root => {
                    let Some(snapshot) = self.root.snapshot.take() else {
                        continue;
                    };
                    self.total_time = snapshot.total_time;
                    snapshot.children
                }
                Container::Node(id) => {
                    let Some(node) = self.nodes.get_mut(id.0) else {
                        continue;
                    };
                    let Some(snapshot) = node.snapshot.take() else {
                        continue;
                    };
                    node.self_time = snapshot.self_time;
                    node.total_time = snapshot.total_time;
                    snapshot.children
                }
            };
            self.remove_children(current);
            for child in children {
                self.attach(current, child);
                pending.push(Container::Node(child));
            }
        }
    }

    // --- Focus / exclude ---

    /// Show only `node`'s subtree, with percentages relative to it.
    /// Undone by `restore(Container::Root)`.
    pub fn focus(&mut self, node: NodeId) -> Result<(), CallTreeError> {
        let target = self.node_ref(node)?;
        let total_time = target.total_time;
        let Some(parent) = target.parent else {
            return Err(CallTreeError::NotAChild {
                container: Container::Root,
                node,
            });
        };
        let index = self
            .children(parent)
            .iter()
            .position(|&child| child == node)
            .unwrap_or_default();

        self.save(Container::Root);
        self.root.focus_positions.push(SavedPosition {
            node,
            parent,
            index,
        });
        self.remove_children(Container::Root);
        self.attach(Container::Root, node);
        self.total_time = total_time;
        debug!(%node, total_time, "focused");
        Ok(())
    }

    /// Hide every call to `call_uid`, charging its time to its callers.
    /// Undone by `restore(Container::Root)`.
    pub fn exclude(&mut self, call_uid: &str) {
        self.save(Container::Root);
        if let Some(top_level) = self.root.children.get(call_uid) {
            self.detach(top_level);
        }

        // Checkpoint the whole tree before the first merge touches it.
        let mut visit_order = Vec::new();
        let mut stack: Vec<NodeId> = self.root.children.ids().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            self.populate(Container::Node(id));
            self.save(Container::Node(id));
            self.root.excluded_saves.push(id);
            visit_order.push(id);
            stack.extend(self.nodes[id.0].children.ids().iter().rev());
        }

        // Reverse pre-order handles descendants before their ancestors.
        let mut absorbed = 0usize;
        for &id in visit_order.iter().rev() {
            if let Some(child) = self.nodes[id.0].children.get(call_uid) {
                self.merge_unchecked(Container::Node(id), child, true);
                absorbed += 1;
            }
        }

        if let Some(comparator) = self.root.last_comparator {
            self.sort(Container::Root, comparator, true);
        }
        debug!(call_uid, absorbed, "excluded");
    }
}
