use calltree_protocol::{CallUid, ProfileNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourceId(usize);

/// A raw profile node with its children replaced by arena indices.
#[derive(Debug, Clone)]
pub(crate) struct SourceNode {
    pub(crate) call_uid: CallUid,
    pub(crate) function_name: String,
    pub(crate) url: String,
    pub(crate) self_time: f64,
    pub(crate) total_time: f64,
    pub(crate) deopt_reason: Option<String>,
    pub(crate) idle: bool,
    pub(crate) children: Vec<SourceId>,
}

/// Read-only raw profile data that lazy population draws children from.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceArena {
    nodes: Vec<SourceNode>,
}

impl SourceArena {
    /// Flatten a profile into the arena without recursing, so arbitrarily
    /// deep profiles are fine.
    pub(crate) fn flatten(root: ProfileNode) -> (Self, SourceId) {
        let mut arena = Self {
            nodes: Vec::with_capacity(root.node_count()),
        };
        let mut stack: Vec<(ProfileNode, Option<SourceId>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let id = SourceId(arena.nodes.len());
            let ProfileNode {
                call_uid,
                function_name,
                url,
                self_time,
                total_time,
                deopt_reason,
                idle,
                children,
            } = node;
            arena.nodes.push(SourceNode {
                call_uid,
                function_name,
                url,
                self_time,
                total_time,
                deopt_reason,
                idle,
                children: Vec::with_capacity(children.len()),
            });
            if let Some(parent) = parent {
                arena.nodes[parent.0].children.push(id);
            }
            // Reversed so siblings pop, and register with the parent, in order.
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }
        (arena, SourceId(0))
    }

    pub(crate) fn get(&self, id: SourceId) -> &SourceNode {
        &self.nodes[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
