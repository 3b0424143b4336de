use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageNode, Role};

/// Owned, render-ready projection of a message subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Message identifier.
    pub id: String,
    /// Who produced the message.
    pub role: Role,
    /// Full message text.
    pub content: String,
    /// Short caption, when one has been attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Subtrees for each continuation, in creation order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_node(node: &MessageNode, children: Vec<TreeNode>) -> Self {
        Self {
            id: node.id.clone(),
            role: node.role,
            content: node.content.clone(),
            label: node.label.clone(),
            timestamp: node.created_at,
            children,
        }
    }

    /// Ids in pre-order (node, then each child subtree in creation order).
    pub fn preorder_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            ids.push(node.id.as_str());
            stack.extend(node.children.iter().rev());
        }
        ids
    }

    /// Number of nodes in this subtree, itself included.
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

/// Work item for the iterative build: a node and the subtrees finished so far.
struct Frame<'a> {
    node: &'a MessageNode,
    children: Vec<TreeNode>,
    next_child: usize,
}

impl<'a> Frame<'a> {
    fn new(node: &'a MessageNode) -> Self {
        Self {
            node,
            children: Vec::with_capacity(node.child_ids.len()),
            next_child: 0,
        }
    }
}

/// Build the subtree rooted at `from`.
///
/// Returns `None` when `from` is `None` or unknown. Child ids that do not
/// resolve are skipped. The walk keeps its own stack, so very deep
/// conversations do not grow the call stack.
pub fn build_tree(nodes: &HashMap<String, MessageNode>, from: Option<&str>) -> Option<TreeNode> {
    let root = nodes.get(from?)?;
    let mut stack = vec![Frame::new(root)];

    while let Some(frame) = stack.last_mut() {
        let node = frame.node;
        if let Some(child_id) = node.child_ids.get(frame.next_child) {
            frame.next_child += 1;
            if let Some(child) = nodes.get(child_id) {
                stack.push(Frame::new(child));
            }
            continue;
        }

        let done = stack.pop()?;
        let built = TreeNode::from_node(done.node, done.children);
        match stack.last_mut() {
            Some(parent) => parent.children.push(built),
            None => return Some(built),
        }
    }

    None
}
