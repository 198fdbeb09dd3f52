use calltree_protocol::CallUid;

use crate::comparator::ComparatorId;
use crate::model::children::{ChildContainer, ChildList};
use crate::model::source::{SourceId, SourceNode};

const ANONYMOUS_FUNCTION: &str = "(anonymous function)";

/// Handle to a node in an [`AggregateTree`](crate::AggregateTree) arena.
///
/// Handles stay valid for the lifetime of the tree, including while the node
/// is detached (removed, absorbed by a merge, or parked in a snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// Anything that can hold children: the tree root or a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Root,
    Node(NodeId),
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "the root"),
            Self::Node(id) => id.fmt(f),
        }
    }
}

impl From<NodeId> for Container {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Which columns of a row matched the current search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    pub self_column: bool,
    pub total_column: bool,
    pub function_column: bool,
}

impl MatchFlags {
    pub const NONE: Self = Self {
        self_column: false,
        total_column: false,
        function_column: false,
    };

    /// A node is a search result iff any column matched.
    pub fn any(self) -> bool {
        self.self_column || self.total_column || self.function_column
    }
}

/// State captured by `save` and consumed by `restore`.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) self_time: f64,
    pub(crate) total_time: f64,
    pub(crate) children: Vec<NodeId>,
}

/// One row of the aggregated call tree.
#[derive(Debug, Clone)]
pub struct AggregateNode {
    pub(crate) call_uid: CallUid,
    pub(crate) function_name: String,
    pub(crate) url: String,
    pub(crate) deopt_reason: Option<String>,
    pub(crate) is_idle: bool,
    pub(crate) self_time: f64,
    pub(crate) total_time: f64,
    pub(crate) source: SourceId,
    pub(crate) has_source_children: bool,
    pub(crate) children: ChildList,
    pub(crate) parent: Option<Container>,
    pub(crate) expanded: bool,
    pub(crate) populated: bool,
    pub(crate) needs_refresh: bool,
    pub(crate) last_comparator: Option<ComparatorId>,
    pub(crate) snapshot: Option<Snapshot>,
    pub(crate) matched: MatchFlags,
}

impl AggregateNode {
    pub(crate) fn from_source(id: SourceId, source: &SourceNode) -> Self {
        let deopt_reason = source
            .deopt_reason
            .as_deref()
            .filter(|reason| !reason.is_empty() && *reason != "no reason")
            .map(str::to_string);
        Self {
            call_uid: source.call_uid.clone(),
            function_name: beautify_function_name(&source.function_name).to_string(),
            url: source.url.clone(),
            deopt_reason,
            is_idle: source.idle,
            self_time: source.self_time,
            total_time: source.total_time,
            source: id,
            has_source_children: !source.children.is_empty(),
            children: ChildList::default(),
            parent: None,
            expanded: false,
            populated: false,
            needs_refresh: false,
            last_comparator: None,
            snapshot: None,
            matched: MatchFlags::NONE,
        }
    }

    pub fn call_uid(&self) -> &CallUid {
        &self.call_uid
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Why the function was not optimized; `None` when it was, or when the
    /// backend reported the placeholder "no reason".
    pub fn deopt_reason(&self) -> Option<&str> {
        self.deopt_reason.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn self_time(&self) -> f64 {
        self.self_time
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Materialized children in display order. Empty until populated.
    pub fn children(&self) -> &[NodeId] {
        self.children.ids()
    }

    /// Whether the node has, or will have once populated, any children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty() || (!self.populated && self.has_source_children)
    }

    pub fn parent(&self) -> Option<Container> {
        self.parent
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Set when a sort skipped this collapsed (or already sorted) subtree;
    /// the renderer should re-read the children before showing them.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn last_comparator(&self) -> Option<ComparatorId> {
        self.last_comparator
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn search_matches(&self) -> MatchFlags {
        self.matched
    }
}

impl ChildContainer for AggregateNode {
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
        self.expanded
    }

    fn mark_needs_refresh(&mut self) {
        self.needs_refresh = true;
    }
}

/// Display name for a function; anonymous functions get a placeholder.
pub fn beautify_function_name(name: &str) -> &str {
    if name.is_empty() {
        ANONYMOUS_FUNCTION
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::source::SourceArena;
    use calltree_protocol::ProfileNode;

    fn node_from(profile: ProfileNode) -> AggregateNode {
        let (arena, root) = SourceArena::flatten(profile);
        AggregateNode::from_source(root, arena.get(root))
    }

    #[test]
    fn anonymous_functions_get_a_name() {
        assert_eq!(beautify_function_name(""), "(anonymous function)");
        assert_eq!(beautify_function_name("main"), "main");
        let node = node_from(ProfileNode::new("anon@a.js:3:1", "", 1.0, 1.0));
        assert_eq!(node.function_name(), "(anonymous function)");
    }

    #[test]
    fn placeholder_deopt_reason_is_dropped() {
        let node = node_from(ProfileNode::new("f", "f", 1.0, 1.0).with_deopt_reason("no reason"));
        assert_eq!(node.deopt_reason(), None);
        let node = node_from(ProfileNode::new("g", "g", 1.0, 1.0).with_deopt_reason("TryCatchStatement"));
        assert_eq!(node.deopt_reason(), Some("TryCatchStatement"));
    }

    #[test]
    fn unpopulated_node_reports_pending_children() {
        let node = node_from(
            ProfileNode::new("p", "p", 1.0, 2.0)
                .with_children(vec![ProfileNode::new("c", "c", 1.0, 1.0)]),
        );
        assert!(node.has_children());
        assert!(node.children().is_empty());
        assert!(!node.is_populated());
    }

    #[test]
    fn match_flags_any() {
        assert!(!MatchFlags::NONE.any());
        let flags = MatchFlags {
            total_column: true,
            ..MatchFlags::NONE
        };
        assert!(flags.any());
    }
}
