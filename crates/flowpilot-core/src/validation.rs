use std::collections::HashSet;

use crate::Workflow;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionIssue {
    #[error("Connection source '{0}' is not a node in the workflow")]
    UnknownSource(String),

    #[error("Connection from '{source_node}' targets missing node '{target}'")]
    DanglingTarget { source_node: String, target: String },

    #[error("Node name '{0}' is used more than once")]
    DuplicateName(String),
}

/// Report connections that do not line up with the node list.
///
/// The store does its own validation; this only exists so callers can
/// surface likely mistakes (for example a removed node still referenced
/// by an upstream edge) without blocking the write.
pub fn check_connections(workflow: &Workflow) -> Vec<ConnectionIssue> {
    let mut issues = Vec::new();
    let mut names = HashSet::new();

    for node in &workflow.nodes {
        if !names.insert(node.name.as_str()) {
            issues.push(ConnectionIssue::DuplicateName(node.name.clone()));
        }
    }

    for source in workflow.connections.keys() {
        if !names.contains(source.as_str()) {
            issues.push(ConnectionIssue::UnknownSource(source.clone()));
        }
    }

    for (source, target) in workflow.edges() {
        if !names.contains(target) {
            issues.push(ConnectionIssue::DanglingTarget {
                source_node: source.to_string(),
                target: target.to_string(),
            });
        }
    }

    issues
}
