use std::collections::HashMap;

use super::MessageNode;
use crate::error::{StoreError, StoreResult};

/// Resolve the root-first path ending at `from`.
///
/// Walks `parent_id` links upward and reverses the result, so the first id is
/// the session root and the last is `from` itself. Fails with
/// [`StoreError::MessageNotFound`] when `from` is not in `nodes`.
///
/// A parent link pointing outside `nodes`, or a walk longer than the node
/// count, is reported as [`StoreError::CorruptTree`] instead of looping.
pub fn resolve_path(nodes: &HashMap<String, MessageNode>, from: &str) -> StoreResult<Vec<String>> {
    let mut current = nodes.get(from).ok_or_else(|| StoreError::MessageNotFound {
        message_id: from.to_string(),
    })?;

    let mut path = vec![current.id.clone()];

    while let Some(parent_id) = &current.parent_id {
        if path.len() > nodes.len() {
            return Err(StoreError::CorruptTree {
                message: format!("cycle detected while resolving {}", from),
            });
        }

        current = nodes.get(parent_id).ok_or_else(|| StoreError::CorruptTree {
            message: format!("{} references missing parent {}", current.id, parent_id),
        })?;
        path.push(current.id.clone());
    }

    path.reverse();
    Ok(path)
}
