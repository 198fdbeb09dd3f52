use serde::{Deserialize, Serialize};

use crate::CallUid;

/// One call-tree node as produced by a profiling backend.
///
/// Times are durations in milliseconds. `total_time` includes every
/// descendant, `self_time` only what was attributed to this frame directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNode {
    #[serde(rename = "callUID")]
    pub call_uid: CallUid,
    pub function_name: String,
    #[serde(default)]
    pub url: String,
    pub self_time: f64,
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deopt_reason: Option<String>,
    /// Marks the node holding non-executing time. Its total is excluded
    /// from the percentage base.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub idle: bool,
    #[serde(default)]
    pub children: Vec<ProfileNode>,
}

impl ProfileNode {
    /// A leaf with no url and no deopt reason.
    pub fn new(
        call_uid: impl Into<CallUid>,
        function_name: impl Into<String>,
        self_time: f64,
        total_time: f64,
    ) -> Self {
        Self {
            call_uid: call_uid.into(),
            function_name: function_name.into(),
            url: String::new(),
            self_time,
            total_time,
            deopt_reason: None,
            idle: false,
            children: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_children(mut self, children: Vec<ProfileNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_deopt_reason(mut self, reason: impl Into<String>) -> Self {
        self.deopt_reason = Some(reason.into());
        self
    }

    pub fn into_idle(mut self) -> Self {
        self.idle = true;
        self
    }

    /// First node flagged idle, searched depth-first from `self`.
    pub fn find_idle(&self) -> Option<&ProfileNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.idle {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Number of nodes in this subtree, `self` included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}
