//! Group tree returned by nesting queries

use serde::{Deserialize, Serialize};

use super::group::GroupId;

/// A group and the nested groups attached beneath it
///
/// Built from a possibly cyclic graph, so every group appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: GroupId,

    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Node without children
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Find a node by name anywhere in this subtree
    pub fn find(&self, name: &str) -> Option<&Node> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Total number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// True when the node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_len() {
        let tree = Node {
            name: "all".to_string(),
            children: vec![
                Node {
                    name: "it".to_string(),
                    children: vec![Node::leaf("network")],
                },
                Node::leaf("hr"),
            ],
        };

        assert_eq!(tree.size(), 4);
        assert!(tree.find("network").unwrap().is_leaf());
        assert!(tree.find("finance").is_none());
    }
}
