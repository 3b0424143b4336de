use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_path, MessageNode, Role};
use crate::error::{StoreError, StoreResult};

/// One conversation tree plus the path currently treated as "the conversation".
///
/// Every mutating method validates its inputs before touching any field, so a
/// call either applies completely or leaves the session as it was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// All messages ever created in this session, keyed by id.
    pub nodes: HashMap<String, MessageNode>,
    /// First message created in the session.
    pub root_id: Option<String>,
    /// Message ids from the root to the selected message.
    pub active_branch: Vec<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Shape summary of a session's tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStats {
    /// Total number of messages.
    pub node_count: usize,
    /// Number of distinct root-to-leaf paths.
    pub leaf_count: usize,
    /// Length of the active branch.
    pub active_length: usize,
    /// Number of messages on the longest root-to-leaf path.
    pub max_depth: usize,
    /// Leaf ending the longest path (earliest in creation order on ties).
    pub deepest_leaf_id: Option<String>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            nodes: HashMap::new(),
            root_id: None,
            active_branch: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Look up a message by id.
    pub fn node(&self, id: &str) -> StoreResult<&MessageNode> {
        self.nodes.get(id).ok_or_else(|| StoreError::MessageNotFound {
            message_id: id.to_string(),
        })
    }

    /// Append a user turn after the tail of the active branch.
    pub fn append_user(&mut self, content: &str) -> StoreResult<String> {
        validate_content(content)?;

        let parent = self.active_branch.last().cloned();
        let id = self.insert(Role::User, content, parent);
        self.active_branch.push(id.clone());

        Ok(id)
    }

    /// Append an assistant turn under `parent_id` and make it the active tail.
    ///
    /// When `parent_id` is not the current tail, the active branch is re-rooted
    /// onto the parent's ancestry first so it stays a contiguous path.
    pub fn append_assistant(&mut self, parent_id: &str, content: &str) -> StoreResult<String> {
        validate_content(content)?;
        self.node(parent_id)?;

        let rebased = if self.active_branch.last().map(String::as_str) == Some(parent_id) {
            None
        } else {
            Some(resolve_path(&self.nodes, parent_id)?)
        };

        let id = self.insert(Role::Assistant, content, Some(parent_id.to_string()));
        if let Some(path) = rebased {
            self.active_branch = path;
        }
        self.active_branch.push(id.clone());

        Ok(id)
    }

    /// Replace the active branch with the ancestry of `target`.
    pub fn switch_to(&mut self, target: &str) -> StoreResult<Vec<String>> {
        let path = resolve_path(&self.nodes, target)?;
        self.active_branch = path.clone();
        Ok(path)
    }

    /// Attach a caption to an existing message.
    pub fn set_label(&mut self, node_id: &str, label: impl Into<String>) -> StoreResult<()> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| StoreError::MessageNotFound {
                message_id: node_id.to_string(),
            })?;
        node.label = Some(label.into());
        Ok(())
    }

    /// Messages along the active branch, root first.
    pub fn active_nodes(&self) -> Vec<MessageNode> {
        self.active_branch
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .cloned()
            .collect()
    }

    /// Summarize the tree shape.
    pub fn stats(&self) -> BranchStats {
        let mut stats = BranchStats {
            node_count: self.nodes.len(),
            leaf_count: 0,
            active_length: self.active_branch.len(),
            max_depth: 0,
            deepest_leaf_id: None,
        };

        let Some(root) = self.root_id.as_deref().and_then(|id| self.nodes.get(id)) else {
            return stats;
        };

        // Pre-order walk: children pushed in reverse so the first child pops first.
        let mut stack: Vec<(&MessageNode, usize)> = vec![(root, 1)];
        while let Some((node, depth)) = stack.pop() {
            if node.is_leaf() {
                stats.leaf_count += 1;
                if depth > stats.max_depth {
                    stats.max_depth = depth;
                    stats.deepest_leaf_id = Some(node.id.clone());
                }
                continue;
            }
            for child_id in node.child_ids.iter().rev() {
                if let Some(child) = self.nodes.get(child_id) {
                    stack.push((child, depth + 1));
                }
            }
        }

        stats
    }

    /// Verify the tree and active-branch invariants.
    ///
    /// Returns the first violation found as [`StoreError::CorruptTree`].
    pub fn check_invariants(&self) -> StoreResult<()> {
        let corrupt = |message: String| Err(StoreError::CorruptTree { message });

        match &self.root_id {
            None if !self.nodes.is_empty() => {
                return corrupt("nodes present but no root".to_string());
            }
            Some(root_id) => match self.nodes.get(root_id) {
                None => return corrupt(format!("root {} missing", root_id)),
                Some(root) if !root.is_root() => {
                    return corrupt(format!("root {} has a parent", root_id));
                }
                Some(_) => {}
            },
            None => {}
        }

        for node in self.nodes.values() {
            match &node.parent_id {
                None => {
                    if self.root_id.as_deref() != Some(node.id.as_str()) {
                        return corrupt(format!("{} has no parent but is not the root", node.id));
                    }
                }
                Some(parent_id) => {
                    let Some(parent) = self.nodes.get(parent_id) else {
                        return corrupt(format!("{} references missing parent {}", node.id, parent_id));
                    };
                    let listed = parent.child_ids.iter().filter(|c| **c == node.id).count();
                    if listed != 1 {
                        return corrupt(format!(
                            "{} listed {} times under parent {}",
                            node.id, listed, parent_id
                        ));
                    }
                }
            }

            for child_id in &node.child_ids {
                let linked = self
                    .nodes
                    .get(child_id)
                    .and_then(|c| c.parent_id.as_deref())
                    == Some(node.id.as_str());
                if !linked {
                    return corrupt(format!("{} lists {} which does not point back", node.id, child_id));
                }
            }
        }

        if let Some(first) = self.active_branch.first() {
            if self.root_id.as_deref() != Some(first.as_str()) {
                return corrupt(format!("active branch starts at {} instead of the root", first));
            }
        }

        for pair in self.active_branch.windows(2) {
            let parent_ok = self
                .nodes
                .get(&pair[1])
                .and_then(|n| n.parent_id.as_deref())
                == Some(pair[0].as_str());
            if !parent_ok {
                return corrupt(format!("active branch breaks between {} and {}", pair[0], pair[1]));
            }
        }

        Ok(())
    }

    fn insert(&mut self, role: Role, content: &str, parent_id: Option<String>) -> String {
        let mut node = MessageNode::new(role, content);
        let id = node.id.clone();

        if let Some(parent_id) = parent_id {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.child_ids.push(id.clone());
            }
            node = node.with_parent(parent_id);
        }

        if self.root_id.is_none() {
            self.root_id = Some(id.clone());
        }

        self.nodes.insert(id.clone(), node);
        id
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_content(content: &str) -> StoreResult<()> {
    if content.trim().is_empty() {
        return Err(StoreError::validation("message", "Message cannot be empty"));
    }
    Ok(())
}
