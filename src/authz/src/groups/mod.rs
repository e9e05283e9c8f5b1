//! Group membership graph and its transitive-closure resolution
//!
//! Groups may nest other groups, and the nesting graph may contain cycles
//! (A nests B nests A). Every traversal here tracks visited groups, so
//! resolution always terminates.
//!
//! # Example
//!
//! ```rust
//! use sac_authz::groups::GroupGraph;
//!
//! let graph = GroupGraph::new();
//! graph.assign("all-employees", "hr", true);
//! graph.assign("hr", "alice", false);
//!
//! let groups = graph.transitive_groups("alice");
//! assert!(groups.contains("hr"));
//! assert!(groups.contains("all-employees"));
//! ```

pub mod graph;
pub mod resolver;

pub use graph::GroupGraph;
pub use resolver::{group_tree, transitive_groups, GroupEdges};
